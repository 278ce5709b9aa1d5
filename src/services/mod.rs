//! Service layer.
//!
//! Services sit between the job bodies / handlers and the outside world.

pub mod notifications;

pub use notifications::NotificationService;
