// In-process stand-ins for the remote collaborators, shared by unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use compilebot_common::types::{CompilationRequest, MessageRef};
use serde_json::Value;

use crate::client::{CompilationBackend, CompilationResult};
use crate::error::{DatasetError, PlatformError, RemoteServiceError};
use crate::formatter::DisplayPayload;
use crate::platform::{ChatPlatform, CompileLog, CompileLogEntry};
use crate::validator::{key_from_document, DatasetSource};

pub(crate) fn result(json: &str) -> CompilationResult {
    CompilationResult::from_backend_json(json).unwrap()
}

/// Replays scripted responses; the last one repeats once the script runs out
pub(crate) struct FakeBackend {
    responses: Mutex<VecDeque<Result<CompilationResult, RemoteServiceError>>>,
    last: Mutex<Option<Result<CompilationResult, RemoteServiceError>>>,
    requests: Mutex<Vec<CompilationRequest>>,
}

impl FakeBackend {
    pub(crate) fn new(responses: Vec<Result<CompilationResult, RemoteServiceError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<CompilationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompilationBackend for FakeBackend {
    async fn submit(
        &self,
        request: &CompilationRequest,
    ) -> Result<CompilationResult, RemoteServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(RemoteServiceError::Transport("no script".to_string()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlatformCall {
    React(String, String),
    RemoveReaction(String, String),
    Send(String, DisplayPayload),
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    calls: Mutex<Vec<PlatformCall>>,
    fail_reactions: bool,
    sent: AtomicUsize,
}

impl FakePlatform {
    pub(crate) fn failing_reactions() -> Self {
        Self {
            fail_reactions: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn sent_payloads(&self) -> Vec<DisplayPayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Send(_, payload) => Some(payload),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn react(&self, target: &MessageRef, emoji: &str) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(PlatformCall::React(
            target.message_id.clone(),
            emoji.to_string(),
        ));
        if self.fail_reactions {
            return Err(PlatformError("missing permissions".to_string()));
        }
        Ok(())
    }

    async fn remove_reaction(
        &self,
        target: &MessageRef,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(PlatformCall::RemoveReaction(
            target.message_id.clone(),
            emoji.to_string(),
        ));
        Ok(())
    }

    async fn send(
        &self,
        channel_id: &str,
        payload: &DisplayPayload,
    ) -> Result<MessageRef, PlatformError> {
        self.calls
            .lock()
            .unwrap()
            .push(PlatformCall::Send(channel_id.to_string(), payload.clone()));
        let id = self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(MessageRef {
            channel_id: channel_id.to_string(),
            message_id: format!("reply-{}", id),
        })
    }
}

pub(crate) struct FakeDatasetSource {
    key: Option<Value>,
    records: Option<Value>,
}

impl FakeDatasetSource {
    pub(crate) fn ok(key: Value, records: Value) -> Self {
        Self {
            key: Some(key),
            records: Some(records),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            key: None,
            records: None,
        }
    }
}

#[async_trait]
impl DatasetSource for FakeDatasetSource {
    async fn fetch_key(&self) -> Result<String, DatasetError> {
        let key = self.key.as_ref().ok_or(DatasetError::Missing("access key"))?;
        key_from_document(key)
    }

    async fn fetch_records(&self) -> Result<Value, DatasetError> {
        self.records.clone().ok_or(DatasetError::Missing("records"))
    }
}

#[derive(Default)]
pub(crate) struct FakeCompileLog {
    entries: Mutex<Vec<CompileLogEntry>>,
}

impl FakeCompileLog {
    pub(crate) fn entries(&self) -> Vec<CompileLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompileLog for FakeCompileLog {
    async fn post(&self, entry: &CompileLogEntry) -> Result<(), PlatformError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
