use serde::Serialize;
use url::Url;

use super::{NotificationSender, PushRequest, SenderError, path_segments, query_value};

/// `slack://token-a/token-b/token-c[?channel=name]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSender {
    tokens: [String; 3],
    channel: Option<String>,
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

impl SlackSender {
    pub fn from_url(url: &Url) -> Result<Self, SenderError> {
        let mut parts: Vec<String> = url.host_str().map(str::to_string).into_iter().collect();
        parts.extend(path_segments(url));

        let tokens: [String; 3] = parts.try_into().map_err(|_| {
            SenderError::InvalidConfiguration("slack URL must look like slack://token-a/token-b/token-c".into())
        })?;

        Ok(Self { tokens, channel: query_value(url, "channel") })
    }

    pub fn endpoint(&self) -> String {
        format!("https://hooks.slack.com/services/{}", self.tokens.join("/"))
    }
}

impl NotificationSender for SlackSender {
    fn service(&self) -> &'static str {
        "Slack"
    }

    fn requests(&self, message: &str) -> Vec<PushRequest> {
        vec![PushRequest::json(
            self.endpoint(),
            SlackMessage { text: message, channel: self.channel.as_deref() },
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::senders::PushBody;

    #[test]
    fn test_three_tokens_and_channel() {
        let sender = SlackSender::from_url(&Url::parse("slack://T0AB/B0CD/xyzXYZ?channel=ops").unwrap()).unwrap();
        let request = &sender.requests("hi")[0];

        assert_eq!(request.url, "https://hooks.slack.com/services/T0AB/B0CD/xyzXYZ");
        assert_eq!(request.body, PushBody::Json(serde_json::json!({ "text": "hi", "channel": "ops" })));
    }

    #[test]
    fn test_wrong_token_count_rejected() {
        assert!(SlackSender::from_url(&Url::parse("slack://T0AB/B0CD").unwrap()).is_err());
        assert!(SlackSender::from_url(&Url::parse("slack://a/b/c/d").unwrap()).is_err());
    }
}
