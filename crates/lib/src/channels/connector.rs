//! Connector channel: POST replies to the conversation's service url.

use crate::activity::Reply;
use crate::channels::sender::{ChannelError, ReplySender};
use async_trait::async_trait;

/// HTTP client for the connector's "reply to activity" endpoint.
#[derive(Clone)]
pub struct ConnectorClient {
    id: String,
    /// Used instead of the reply's own service url when set (e.g. a local emulator).
    service_url: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
}

impl ConnectorClient {
    pub fn new(service_url: Option<String>, token: Option<String>) -> Self {
        Self {
            id: "connector".to_string(),
            service_url,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// `{serviceUrl}/v3/conversations/{conversationId}/activities[/{replyToId}]`. A path already
    /// on the service url is kept; ids are pushed as percent-encoded segments.
    pub fn reply_url(&self, reply: &Reply) -> Result<reqwest::Url, ChannelError> {
        let base = [self.service_url.as_deref(), reply.service_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|u| !u.is_empty())
            .ok_or(ChannelError::NoServiceUrl)?;
        let mut url = reqwest::Url::parse(base)
            .map_err(|e| ChannelError::InvalidServiceUrl(format!("{}: {}", base, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ChannelError::InvalidServiceUrl(base.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["v3", "conversations"])
                .push(&reply.conversation.id)
                .push("activities");
            if let Some(ref id) = reply.reply_to_id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ReplySender for ConnectorClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_reply(&self, reply: &Reply) -> Result<(), ChannelError> {
        let url = self.reply_url(reply)?;
        let mut req = self.client.post(url).json(reply);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Activity;

    fn reply_in(conversation: &str, service_url: Option<&str>) -> Reply {
        let mut activity = Activity::message("emulator", conversation, "u1", "bot", "hi");
        activity.service_url = service_url.map(str::to_string);
        activity.id = Some("act1".to_string());
        activity.create_reply("x")
    }

    #[test]
    fn reply_url_uses_activity_service_url() {
        let reply = reply_in("a/b c", Some("http://localhost:50000/"));
        let client = ConnectorClient::new(None, None);
        assert_eq!(
            client.reply_url(&reply).unwrap().as_str(),
            "http://localhost:50000/v3/conversations/a%2Fb%20c/activities/act1"
        );
    }

    #[test]
    fn service_url_path_is_kept() {
        let reply = reply_in("c", Some("https://smba.example.net/amer/"));
        let url = ConnectorClient::new(None, None).reply_url(&reply).unwrap();
        assert_eq!(
            url.as_str(),
            "https://smba.example.net/amer/v3/conversations/c/activities/act1"
        );
    }

    #[test]
    fn configured_service_url_wins_and_missing_is_an_error() {
        let reply = reply_in("c", None);
        assert!(matches!(
            ConnectorClient::new(None, None).reply_url(&reply),
            Err(ChannelError::NoServiceUrl)
        ));
        let url = ConnectorClient::new(Some("http://svc".into()), None)
            .reply_url(&reply_in("c", Some("http://ignored")))
            .unwrap();
        assert_eq!(url.as_str(), "http://svc/v3/conversations/c/activities/act1");
    }

    #[test]
    fn unusable_service_url_is_an_error() {
        let client = ConnectorClient::new(None, None);
        for bad in ["not a url", "mailto:bot@example.com"] {
            assert!(matches!(
                client.reply_url(&reply_in("c", Some(bad))),
                Err(ChannelError::InvalidServiceUrl(_))
            ));
        }
    }
}
