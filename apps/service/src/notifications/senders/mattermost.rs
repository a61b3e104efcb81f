use serde::Serialize;
use url::Url;

use super::{NotificationSender, PushRequest, SenderError, authority, path_segments, web_scheme};

/// `mattermost://[user@]host[:port]/token[/channel]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MattermostSender {
    endpoint: String,
    username: Option<String>,
    channel: Option<String>,
}

#[derive(Serialize)]
struct MattermostMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

impl MattermostSender {
    pub fn from_url(url: &Url) -> Result<Self, SenderError> {
        let segments = path_segments(url);
        let (token, channel) = match segments.as_slice() {
            [token] => (token.clone(), None),
            [token, channel] => (token.clone(), Some(channel.clone())),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "mattermost URL must look like mattermost://[user@]host/token[/channel]".into(),
                ));
            }
        };

        let username = Some(url.username().to_string()).filter(|u| !u.is_empty());

        Ok(Self {
            endpoint: format!("{}://{}/hooks/{}", web_scheme(url), authority(url)?, token),
            username,
            channel,
        })
    }
}

impl NotificationSender for MattermostSender {
    fn service(&self) -> &'static str {
        "Mattermost"
    }

    fn requests(&self, message: &str) -> Vec<PushRequest> {
        vec![PushRequest::json(
            self.endpoint.clone(),
            MattermostMessage {
                text: message,
                username: self.username.as_deref(),
                channel: self.channel.as_deref(),
            },
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::senders::PushBody;

    #[test]
    fn test_user_token_and_channel() {
        let url = Url::parse("mattermost://uptime@chat.example.com/hooktoken/town-square").unwrap();
        let request = &MattermostSender::from_url(&url).unwrap().requests("t")[0];

        assert_eq!(request.url, "https://chat.example.com/hooks/hooktoken");
        assert_eq!(
            request.body,
            PushBody::Json(serde_json::json!({ "text": "t", "username": "uptime", "channel": "town-square" }))
        );
    }

    #[test]
    fn test_token_only() {
        let url = Url::parse("mattermost://chat.example.com/hooktoken").unwrap();
        let request = &MattermostSender::from_url(&url).unwrap().requests("t")[0];
        assert_eq!(request.body, PushBody::Json(serde_json::json!({ "text": "t" })));
    }
}
