use serde::Serialize;
use url::Url;

use super::{NotificationSender, PushRequest, SenderError, authority, path_segments, web_scheme};

/// `gotify://host[:port][/path]/token`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotifySender {
    base: String,
    token: String,
}

#[derive(Serialize)]
struct GotifyMessage<'a> {
    title: &'a str,
    message: &'a str,
    priority: u8,
}

impl GotifySender {
    pub fn from_url(url: &Url) -> Result<Self, SenderError> {
        let mut segments = path_segments(url);
        let token = segments
            .pop()
            .ok_or_else(|| SenderError::InvalidConfiguration("gotify URL must end with the app token".into()))?;

        let mut base = format!("{}://{}", web_scheme(url), authority(url)?);
        for segment in segments {
            base.push('/');
            base.push_str(&segment);
        }

        Ok(Self { base, token })
    }
}

impl NotificationSender for GotifySender {
    fn service(&self) -> &'static str {
        "Gotify"
    }

    fn requests(&self, message: &str) -> Vec<PushRequest> {
        vec![PushRequest::json(
            format!("{}/message?token={}", self.base, self.token),
            GotifyMessage { title: "Uptime Monitor", message, priority: 5 },
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_path_and_plain_http() {
        let url = Url::parse("gotify://push.example.com:8080/gotify/AbCd?disabletls=yes").unwrap();
        let request = &GotifySender::from_url(&url).unwrap().requests("m")[0];
        assert_eq!(request.url, "http://push.example.com:8080/gotify/message?token=AbCd");
    }

    #[test]
    fn test_missing_token_rejected() {
        assert!(GotifySender::from_url(&Url::parse("gotify://push.example.com").unwrap()).is_err());
    }
}
