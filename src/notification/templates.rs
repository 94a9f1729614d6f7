//! HTML email bodies. Assignment and mention emails have their own layout;
//! every other kind shares the generic one.

use super::email::EmailMessage;
use super::{Notification, NotificationType};

pub fn render(notification: &Notification, to: &str, recipient_name: &str) -> EmailMessage {
    let (subject, body) = match notification.kind {
        NotificationType::TaskAssigned => (
            format!("You were assigned: {}", notification.title),
            task_assigned(notification, recipient_name),
        ),
        NotificationType::Mentioned => (
            format!("You were mentioned: {}", notification.title),
            mentioned(notification, recipient_name),
        ),
        _ => (
            notification.title.clone(),
            generic(notification, recipient_name),
        ),
    };
    EmailMessage {
        to: to.to_string(),
        subject,
        html: layout(&body),
    }
}

fn task_assigned(notification: &Notification, recipient_name: &str) -> String {
    let task_title = metadata_str(notification, "task_title").unwrap_or(notification.title.as_str());
    format!(
        "<p>Hi {name},</p>\n<p>You have been assigned to <strong>{task}</strong>.</p>\n<p>{message}</p>\n{button}",
        name = escape_html(recipient_name),
        task = escape_html(task_title),
        message = escape_html(&notification.message),
        button = link_button(notification.link.as_deref(), "View task"),
    )
}

fn mentioned(notification: &Notification, recipient_name: &str) -> String {
    let excerpt = metadata_str(notification, "excerpt")
        .map(|text| format!("<blockquote>{}</blockquote>\n", escape_html(text)))
        .unwrap_or_default();
    format!(
        "<p>Hi {name},</p>\n<p>{message}</p>\n{excerpt}{button}",
        name = escape_html(recipient_name),
        message = escape_html(&notification.message),
        button = link_button(notification.link.as_deref(), "View comment"),
    )
}

fn generic(notification: &Notification, recipient_name: &str) -> String {
    format!(
        "<p>Hi {name},</p>\n<h2>{title}</h2>\n<p>{message}</p>\n{button}",
        name = escape_html(recipient_name),
        title = escape_html(&notification.title),
        message = escape_html(&notification.message),
        button = link_button(notification.link.as_deref(), "Open"),
    )
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><body style=\"font-family: sans-serif; line-height: 1.5;\">\n{body}\n</body></html>\n"
    )
}

fn link_button(link: Option<&str>, label: &str) -> String {
    match link {
        Some(href) => format!(
            "<p><a href=\"{}\" style=\"padding: 8px 14px; background: #2563eb; color: #fff; text-decoration: none;\">{}</a></p>",
            escape_html(href),
            label
        ),
        None => String::new(),
    }
}

fn metadata_str<'a>(notification: &'a Notification, key: &str) -> Option<&'a str> {
    notification.metadata.get(key).and_then(|value| value.as_str())
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_uses_bespoke_subject() {
        let mut row = Notification::new(
            NotificationType::TaskAssigned,
            "u-9",
            "Ship <beta>",
            "Ana assigned you",
        );
        row.link = Some("http://localhost:3000/projects/p1/tasks/t1".to_string());
        let email = render(&row, "carol@example.com", "Carol");
        assert_eq!(email.subject, "You were assigned: Ship <beta>");
        assert!(email.html.contains("Ship &lt;beta&gt;"));
        assert!(email.html.contains("View task"));
        assert_eq!(email.to, "carol@example.com");
    }

    #[test]
    fn mention_quotes_excerpt() {
        let mut row = Notification::new(NotificationType::Mentioned, "u-9", "Fix login", "Ana mentioned you");
        row.metadata = serde_json::json!({"excerpt": "@[Carol](u-9) thanks!"});
        let email = render(&row, "carol@example.com", "Carol");
        assert!(email.subject.starts_with("You were mentioned"));
        assert!(email.html.contains("<blockquote>@[Carol](u-9) thanks!</blockquote>"));
    }

    #[test]
    fn other_kinds_share_generic_layout() {
        let row = Notification::new(NotificationType::TaskOverdue, "u-9", "Task overdue", "Fix login is overdue");
        let email = render(&row, "carol@example.com", "Carol");
        assert_eq!(email.subject, "Task overdue");
        assert!(email.html.contains("<h2>Task overdue</h2>"));
        assert!(!email.html.contains("<a href"));
    }
}
