use serde::Serialize;
use url::Url;

use super::{NotificationSender, PushRequest, SenderError};

/// `discord://token@webhook_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordSender {
    webhook_id: String,
    token: String,
}

#[derive(Serialize)]
struct DiscordMessage<'a> {
    content: &'a str,
}

impl DiscordSender {
    pub fn from_url(url: &Url) -> Result<Self, SenderError> {
        let token = url.username();
        let webhook_id = url.host_str().unwrap_or_default();

        if token.is_empty() || webhook_id.is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "discord URL must look like discord://token@webhook_id".into(),
            ));
        }

        Ok(Self { webhook_id: webhook_id.to_string(), token: token.to_string() })
    }

    pub fn endpoint(&self) -> String {
        format!("https://discord.com/api/webhooks/{}/{}", self.webhook_id, self.token)
    }
}

impl NotificationSender for DiscordSender {
    fn service(&self) -> &'static str {
        "Discord"
    }

    fn requests(&self, message: &str) -> Vec<PushRequest> {
        vec![PushRequest::json(self.endpoint(), DiscordMessage { content: message })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::senders::PushBody;

    #[test]
    fn test_builds_webhook_endpoint() {
        let sender = DiscordSender::from_url(&Url::parse("discord://s3cr3t@123456789").unwrap()).unwrap();
        let requests = sender.requests("down!");

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://discord.com/api/webhooks/123456789/s3cr3t");
        assert_eq!(requests[0].body, PushBody::Json(serde_json::json!({ "content": "down!" })));
    }

    #[test]
    fn test_missing_token_rejected() {
        assert!(DiscordSender::from_url(&Url::parse("discord://123456789").unwrap()).is_err());
    }
}
