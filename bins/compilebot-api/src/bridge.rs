// Chat platform adapter that talks to the gateway bridge over HTTP

use std::time::Duration;

use async_trait::async_trait;
use compilebot_common::types::MessageRef;
use compilebot_pipeline::error::PlatformError;
use compilebot_pipeline::{ChatPlatform, DisplayPayload};
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Clone)]
pub struct BridgePlatform {
    http: reqwest::Client,
    base: Url,
    token: String,
    timeout: Duration,
}

impl BridgePlatform {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let base = Url::parse(base_url)
            .map_err(|e| PlatformError(format!("invalid bridge url {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(PlatformError(format!("invalid bridge url {}", base_url)));
        }
        Ok(Self {
            http,
            base,
            token: token.into(),
            timeout,
        })
    }

    /// Base url plus percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn reaction_endpoint(&self, target: &MessageRef, emoji: &str) -> Url {
        self.endpoint(&[
            "channels",
            &target.channel_id,
            "messages",
            &target.message_id,
            "reactions",
            emoji,
        ])
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(self.timeout);
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }
}

#[async_trait]
impl ChatPlatform for BridgePlatform {
    async fn react(&self, target: &MessageRef, emoji: &str) -> Result<(), PlatformError> {
        let url = self.reaction_endpoint(target, emoji);
        debug!(url = %url, "Adding reaction");
        self.authorized(self.http.put(url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        target: &MessageRef,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        let url = self.reaction_endpoint(target, emoji);
        debug!(url = %url, "Removing reaction");
        self.authorized(self.http.delete(url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send(
        &self,
        channel_id: &str,
        payload: &DisplayPayload,
    ) -> Result<MessageRef, PlatformError> {
        let url = self.endpoint(&["channels", channel_id, "messages"]);
        let sent: SentMessage = self
            .authorized(self.http.post(url))
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(MessageRef {
            channel_id: channel_id.to_string(),
            message_id: sent.id,
        })
    }
}
