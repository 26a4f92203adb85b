//! Outbound collaborators: the chat platform and the compile log.
//!
//! Failures on either side are reported to the caller but never change the
//! compilation outcome the user receives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use compilebot_common::types::MessageRef;
use serde::Serialize;
use tracing::warn;

use crate::error::PlatformError;
use crate::formatter::DisplayPayload;

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn react(&self, target: &MessageRef, emoji: &str) -> Result<(), PlatformError>;

    async fn remove_reaction(&self, target: &MessageRef, emoji: &str)
        -> Result<(), PlatformError>;

    /// Post a payload to a channel, returning the new message
    async fn send(
        &self,
        channel_id: &str,
        payload: &DisplayPayload,
    ) -> Result<MessageRef, PlatformError>;
}

/// Reaction marker held for the duration of a compile.
///
/// `release` removes it explicitly; a guard dropped without release (early
/// return, panic, cancelled task) schedules the removal on the runtime.
pub struct ReactionGuard {
    platform: Arc<dyn ChatPlatform>,
    target: MessageRef,
    emoji: String,
    released: bool,
}

impl ReactionGuard {
    pub async fn acquire(
        platform: Arc<dyn ChatPlatform>,
        target: MessageRef,
        emoji: &str,
    ) -> Result<Self, PlatformError> {
        platform.react(&target, emoji).await?;
        Ok(Self {
            platform,
            target,
            emoji: emoji.to_string(),
            released: false,
        })
    }

    pub async fn release(mut self) -> Result<(), PlatformError> {
        self.released = true;
        self.platform
            .remove_reaction(&self.target, &self.emoji)
            .await
    }
}

impl Drop for ReactionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Cannot await in Drop; hand the removal to the runtime if there is one
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(message_id = %self.target.message_id, "No runtime to remove reaction");
            return;
        };
        let platform = self.platform.clone();
        let target = self.target.clone();
        let emoji = self.emoji.clone();
        handle.spawn(async move {
            if let Err(e) = platform.remove_reaction(&target, &emoji).await {
                warn!(message_id = %target.message_id, error = %e, "Failed to remove reaction");
            }
        });
    }
}

/// Record of one compilation for the compile log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileLogEntry {
    pub code: String,
    pub language: String,
    pub result_url: Option<String>,
    pub author: String,
    pub guild: Option<String>,
    pub success: bool,
    pub compiler_message: Option<String>,
}

#[async_trait]
pub trait CompileLog: Send + Sync {
    async fn post(&self, entry: &CompileLogEntry) -> Result<(), PlatformError>;
}

/// Posts entries as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookCompileLog {
    http: reqwest::Client,
    url: String,
    token: String,
    timeout: Duration,
}

impl WebhookCompileLog {
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            token: token.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CompileLog for WebhookCompileLog {
    async fn post(&self, entry: &CompileLogEntry) -> Result<(), PlatformError> {
        let mut request = self.http.post(&self.url).timeout(self.timeout).json(entry);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Fire-and-forget post; errors are only logged
pub fn spawn_log(log: Arc<dyn CompileLog>, entry: CompileLogEntry) {
    tokio::spawn(async move {
        if let Err(e) = log.post(&entry).await {
            warn!(error = %e, "Compile log post failed");
        }
    });
}
