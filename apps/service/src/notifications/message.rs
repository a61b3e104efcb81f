use tera::{Context, Tera};

use super::{Alert, NotificationError};

const ALERT_TEMPLATE_NAME: &str = "alert";

const ALERT_TEMPLATE: &str = "{{ emoji }} {{ title }}: {{ monitor_name }}
URL: {{ target }}
Status: {{ status }}
{% if latency_ms > 0 %}Response Time: {{ latency_ms }}ms
{% endif %}{% if message %}Message: {{ message }}
{% endif %}Checked: {{ checked_at }}";

pub const TEST_MESSAGE: &str =
    "🧪 Test notification from Uptime Monitor - Your notification channel is configured correctly!";

/// Renders alert text; the template is compiled once
pub struct MessageRenderer {
    tera: Tera,
}

impl MessageRenderer {
    pub fn new() -> Result<Self, NotificationError> {
        let mut tera = Tera::default();
        tera.add_raw_template(ALERT_TEMPLATE_NAME, ALERT_TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn render(&self, alert: &Alert) -> Result<String, NotificationError> {
        let (emoji, title) = alert.event.headline();

        let mut context = Context::new();
        context.insert("emoji", emoji);
        context.insert("title", title);
        context.insert("monitor_name", &alert.monitor.name);
        context.insert("target", &alert.monitor.target);
        context.insert("status", &status_line(alert));
        context.insert("latency_ms", &alert.check.latency_ms);
        context.insert("message", &alert.check.message);
        context.insert(
            "checked_at",
            &alert.check.checked_at.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        );

        Ok(self.tera.render(ALERT_TEMPLATE_NAME, &context)?)
    }
}

/// `previous → current` when the status moved, otherwise just `current`
fn status_line(alert: &Alert) -> String {
    match alert.previous {
        Some(previous) if previous != alert.check.status => {
            format!("{previous} → {}", alert.check.status)
        }
        _ => alert.check.status.to_string(),
    }
}
