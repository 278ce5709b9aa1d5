use crate::error::AppError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Utility for converting database errors to structured AppError variants.
///
/// Unique violations are mapped through the constraint name; the naming
/// convention of the migrations is `{table}_{column...}_key`.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info.message(), info.constraint_name(), operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        message: &str,
        constraint_name: Option<&str>,
        operation: &str,
    ) -> AppError {
        match kind {
            DatabaseErrorKind::UniqueViolation => match constraint_name.and_then(split_constraint) {
                Some((entity, field)) => AppError::Duplicate {
                    entity,
                    field,
                    value: "unknown".to_string(),
                },
                None => AppError::Database {
                    operation: operation.to_string(),
                    source: anyhow::Error::msg(format!("Unique constraint violation: {}", message)),
                },
            },
            DatabaseErrorKind::ForeignKeyViolation | DatabaseErrorKind::CheckViolation => {
                AppError::Validation {
                    field: constraint_name.unwrap_or("unknown").to_string(),
                    reason: message.to_string(),
                }
            }
            _ => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::msg(format!("Database error: {}", message)),
            },
        }
    }
}

/// Splits `meeting_reminders_meeting_id_user_id_reminder_type_key` into
/// (`meeting_reminders`, `meeting_id_user_id_reminder_type`).
fn split_constraint(name: &str) -> Option<(String, String)> {
    const TABLES: &[&str] = &[
        "meeting_participants",
        "meeting_reminders",
        "meetings",
        "tasks",
        "users",
    ];

    let body = name.strip_suffix("_key")?;
    TABLES.iter().find_map(|table| {
        body.strip_prefix(table)
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|field| (table.to_string(), field.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockDatabaseErrorInfo {
        message: String,
        constraint_name: Option<String>,
    }

    impl diesel::result::DatabaseErrorInformation for MockDatabaseErrorInfo {
        fn message(&self) -> &str {
            &self.message
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            None
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            self.constraint_name.as_deref()
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn db_error(kind: DatabaseErrorKind, constraint: Option<&str>) -> DieselError {
        DieselError::DatabaseError(
            kind,
            Box::new(MockDatabaseErrorInfo {
                message: "duplicate key value violates unique constraint".to_string(),
                constraint_name: constraint.map(String::from),
            }),
        )
    }

    #[test]
    fn test_convert_not_found_error() {
        let result = DatabaseErrorConverter::convert_diesel_error(DieselError::NotFound, "find user");
        assert!(matches!(result, AppError::NotFound { .. }));
    }

    #[test]
    fn test_unique_violation_on_reminders() {
        let error = db_error(
            DatabaseErrorKind::UniqueViolation,
            Some("meeting_reminders_meeting_id_user_id_reminder_type_key"),
        );

        match DatabaseErrorConverter::convert_diesel_error(error, "record reminder") {
            AppError::Duplicate { entity, field, .. } => {
                assert_eq!(entity, "meeting_reminders");
                assert_eq!(field, "meeting_id_user_id_reminder_type");
            }
            other => panic!("Expected Duplicate, got {other:?}"),
        }
    }

    #[test]
    fn test_unique_violation_unknown_constraint_is_database_error() {
        let error = db_error(DatabaseErrorKind::UniqueViolation, Some("weird_idx"));
        let result = DatabaseErrorConverter::convert_diesel_error(error, "insert");
        assert!(matches!(result, AppError::Database { .. }));
        assert!(result.is_storage_failure());
    }

    #[test]
    fn test_other_kinds_become_database_errors() {
        let error = db_error(DatabaseErrorKind::SerializationFailure, None);
        let result = DatabaseErrorConverter::convert_diesel_error(error, "update");
        match result {
            AppError::Database { operation, .. } => assert_eq!(operation, "update"),
            other => panic!("Expected Database, got {other:?}"),
        }
    }

    #[test]
    fn test_split_constraint() {
        assert_eq!(
            split_constraint("users_email_key"),
            Some(("users".to_string(), "email".to_string()))
        );
        assert_eq!(split_constraint("users_pkey"), None);
    }
}
