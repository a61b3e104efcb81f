use serde::Serialize;
use url::Url;

use super::{NotificationSender, PushRequest, SenderError, authority, query_value, web_scheme};

/// Query keys consumed here rather than forwarded to the webhook
const OWN_PARAMS: [&str; 3] = ["disabletls", "template", "title"];

/// `generic://host[:port]/path[?template=json]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericSender {
    endpoint: String,
    json: bool,
    title: String,
}

#[derive(Serialize)]
struct GenericMessage<'a> {
    title: &'a str,
    message: &'a str,
}

impl GenericSender {
    pub fn from_url(url: &Url) -> Result<Self, SenderError> {
        let mut target = Url::parse(&format!("{}://{}{}", web_scheme(url), authority(url)?, url.path()))
            .map_err(|e| SenderError::InvalidConfiguration(e.to_string()))?;

        let forwarded: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !OWN_PARAMS.iter().any(|own| key.eq_ignore_ascii_case(own)))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if !forwarded.is_empty() {
            target.query_pairs_mut().extend_pairs(forwarded);
        }

        let json = query_value(url, "template").is_some_and(|t| t.eq_ignore_ascii_case("json"));
        let title = query_value(url, "title").unwrap_or_else(|| "Uptime Monitor".to_string());

        Ok(Self { endpoint: target.to_string(), json, title })
    }
}

impl NotificationSender for GenericSender {
    fn service(&self) -> &'static str {
        "Webhook (Generic)"
    }

    fn requests(&self, message: &str) -> Vec<PushRequest> {
        let request = if self.json {
            PushRequest::json(self.endpoint.clone(), GenericMessage { title: &self.title, message })
        } else {
            PushRequest::text(self.endpoint.clone(), message)
        };
        vec![request]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::senders::PushBody;

    #[test]
    fn test_json_template_and_forwarded_query() {
        let url = Url::parse("generic://hooks.example.com/alerts?template=json&key=abc").unwrap();
        let request = &GenericSender::from_url(&url).unwrap().requests("boom")[0];

        assert_eq!(request.url, "https://hooks.example.com/alerts?key=abc");
        assert_eq!(
            request.body,
            PushBody::Json(serde_json::json!({ "title": "Uptime Monitor", "message": "boom" }))
        );
    }

    #[test]
    fn test_plain_text_over_http() {
        let url = Url::parse("generic://127.0.0.1:9000/hook?disabletls=yes").unwrap();
        let request = &GenericSender::from_url(&url).unwrap().requests("boom")[0];

        assert_eq!(request.url, "http://127.0.0.1:9000/hook");
        assert_eq!(request.body, PushBody::Text("boom".into()));
    }
}
