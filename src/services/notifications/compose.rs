//! Email bodies for the reminder jobs.
//!
//! Plain HTML strings with a text alternative; user-supplied text is escaped.

use jiff::{SignedDuration, Timestamp};

use super::provider::EmailMessage;
use crate::jobs::gateway::{DueMeeting, PendingTask};
use crate::models::TaskStatistics;

const SIGNATURE: &str = "Taskdash";

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family:sans-serif;color:#333\"><h2>{title}</h2>{body}\
         <p style=\"color:#888;font-size:12px\">{SIGNATURE}</p></body></html>",
        title = escape(title),
    )
}

fn minute_precision(ts: Timestamp) -> String {
    ts.strftime("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn task_reminder(to: &str, task: &PendingTask, now: Timestamp) -> EmailMessage {
    let age_hours = now.duration_since(task.created_at).as_hours().max(0);
    let description = task.description.as_deref().unwrap_or("");
    let html = layout(
        "Task reminder",
        &format!(
            "<p>Hello {name},</p><p>Your task <strong>{title}</strong> ({priority} priority) \
             has been pending for {age_hours} hours.</p><p>{description}</p>",
            name = escape(&task.owner.display_name),
            title = escape(&task.title),
            priority = escape(&task.priority),
            description = escape(description),
        ),
    );
    let text = format!(
        "Hello {},\n\nYour task '{}' ({} priority) has been pending for {} hours.\n\n{}",
        task.owner.display_name, task.title, task.priority, age_hours, SIGNATURE
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Task Reminder: {}", task.title),
        html_body: html,
        text_body: Some(text),
    }
}

pub fn meeting_reminder(to: &str, meeting: &DueMeeting) -> EmailMessage {
    let when = minute_precision(meeting.meeting_date);
    let location = meeting.location.as_deref().unwrap_or("TBD");
    let url = meeting.meeting_url.as_deref().unwrap_or("N/A");
    let html = layout(
        "Meeting reminder",
        &format!(
            "<p>Hello {name},</p><p>You have a meeting <strong>{title}</strong> at {when} \
             ({duration} minutes).</p><ul><li>Location: {location}</li><li>Link: {url}</li></ul>",
            name = escape(&meeting.participant.display_name),
            title = escape(&meeting.title),
            duration = meeting.duration_minutes,
            location = escape(location),
            url = escape(url),
        ),
    );
    let text = format!(
        "Hello {},\n\nYou have a meeting '{}' scheduled for {}.\n\nLocation: {}\nMeeting URL: {}\n\n{}",
        meeting.participant.display_name, meeting.title, when, location, url, SIGNATURE
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Meeting Reminder: {}", meeting.title),
        html_body: html,
        text_body: Some(text),
    }
}

pub fn daily_summary(to: &str, name: &str, stats: &TaskStatistics, day: Timestamp) -> EmailMessage {
    let date = day.strftime("%Y-%m-%d").to_string();
    let html = layout(
        "Daily task summary",
        &format!(
            "<p>Hello {name},</p><table>\
             <tr><td>Total</td><td>{total}</td></tr>\
             <tr><td>Pending</td><td>{pending}</td></tr>\
             <tr><td>In progress</td><td>{in_progress}</td></tr>\
             <tr><td>Completed</td><td>{completed}</td></tr>\
             <tr><td>Overdue</td><td>{overdue}</td></tr>\
             </table><p>Completion rate: {rate}%</p>",
            name = escape(name),
            total = stats.total,
            pending = stats.pending,
            in_progress = stats.in_progress,
            completed = stats.completed,
            overdue = stats.overdue,
            rate = stats.completion_rate(),
        ),
    );
    let text = format!(
        "Hello {name},\n\nTotal: {}\nPending: {}\nIn progress: {}\nCompleted: {}\nOverdue: {}\n\n{SIGNATURE}",
        stats.total, stats.pending, stats.in_progress, stats.completed, stats.overdue
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Daily Task Summary - {date}"),
        html_body: html,
        text_body: Some(text),
    }
}

/// Facts carried by health alerts
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub app_name: String,
    pub hostname: String,
    pub environment: String,
}

pub fn server_down(to: &str, server: &ServerInfo, error: &str, since: Timestamp) -> EmailMessage {
    let at = since.strftime("%Y-%m-%d %H:%M:%S UTC").to_string();
    let html = layout(
        "Server down",
        &format!(
            "<p>The health check of <strong>{app}</strong> failed.</p><ul>\
             <li>Host: {host}</li><li>Environment: {env}</li><li>Since: {at}</li>\
             <li>Error: <code>{error}</code></li></ul>",
            app = escape(&server.app_name),
            host = escape(&server.hostname),
            env = escape(&server.environment),
            error = escape(error),
        ),
    );
    let text = format!(
        "{} health check failed on {} ({}) at {}.\n\nError: {}",
        server.app_name, server.hostname, server.environment, at, error
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Server Down Alert - {} ({})", server.app_name, server.hostname),
        html_body: html,
        text_body: Some(text),
    }
}

pub fn server_recovered(to: &str, server: &ServerInfo, downtime: SignedDuration) -> EmailMessage {
    let downtime = format!("{downtime:#}");
    let html = layout(
        "Server recovered",
        &format!(
            "<p><strong>{app}</strong> on {host} ({env}) is healthy again after {downtime}.</p>",
            app = escape(&server.app_name),
            host = escape(&server.hostname),
            env = escape(&server.environment),
        ),
    );
    let text = format!(
        "{} on {} ({}) is healthy again after {}.",
        server.app_name, server.hostname, server.environment, downtime
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Server Recovered - {} ({})", server.app_name, server.hostname),
        html_body: html,
        text_body: Some(text),
    }
}
