// HTTP route handlers for the CompileBot API

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use compilebot_common::types::MessageEvent;
use compilebot_pipeline::metrics;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub invocation_id: String,
}

#[derive(Debug, Serialize)]
pub struct EventIgnored {
    pub ignored: bool,
}

#[derive(Debug, Serialize)]
pub struct LanguageEntry {
    pub language: String,
    pub compilers: Vec<String>,
}

/// POST /events - Accept a chat message and run the pipeline in the background
pub async fn receive_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<MessageEvent>,
) -> Response {
    if !state.pipeline.accepts(&event) {
        return (StatusCode::OK, Json(EventIgnored { ignored: true })).into_response();
    }

    let invocation_id = Uuid::new_v4();
    info!(
        invocation_id = %invocation_id,
        channel_id = %event.channel_id,
        author_id = %event.author_id,
        "Event accepted"
    );

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.handle_with_id(&event, invocation_id).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            invocation_id: invocation_id.to_string(),
        }),
    )
        .into_response()
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics() -> Response {
    match metrics::encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /languages - Catalog languages with their compiler ids
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Json<Vec<LanguageEntry>> {
    let languages = state
        .pipeline
        .catalog()
        .languages()
        .into_iter()
        .map(|(language, compilers)| LanguageEntry {
            language,
            compilers,
        })
        .collect();
    Json(languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use compilebot_common::types::{CompilationRequest, MessageRef};
    use compilebot_pipeline::error::{PlatformError, RemoteServiceError};
    use compilebot_pipeline::{
        ChatPlatform, CompilationBackend, CompilationResult, CompilerCatalog, DisplayPayload,
        GradingValidator, Pipeline,
    };
    use std::sync::Mutex;
    use std::time::Duration;

    struct EchoBackend;

    #[async_trait]
    impl CompilationBackend for EchoBackend {
        async fn submit(
            &self,
            request: &CompilationRequest,
        ) -> Result<CompilationResult, RemoteServiceError> {
            let body = serde_json::json!({
                "status": "0",
                "program_message": request.source_code(),
            });
            CompilationResult::from_backend_json(&body.to_string())
        }
    }

    #[derive(Default)]
    struct RecordingPlatform {
        sent: Mutex<Vec<DisplayPayload>>,
    }

    #[async_trait]
    impl ChatPlatform for RecordingPlatform {
        async fn react(&self, _: &MessageRef, _: &str) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn remove_reaction(&self, _: &MessageRef, _: &str) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn send(
            &self,
            channel_id: &str,
            payload: &DisplayPayload,
        ) -> Result<MessageRef, PlatformError> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(MessageRef {
                channel_id: channel_id.to_string(),
                message_id: "reply".to_string(),
            })
        }
    }

    const CATALOG: &str = r#"{
        "compilers": [
            { "id": "cpython-3.12.7", "language": "Python" }
        ]
    }"#;

    async fn spawn_api() -> (String, Arc<RecordingPlatform>) {
        let platform = Arc::new(RecordingPlatform::default());
        let pipeline = Pipeline::new(
            ";",
            Arc::new(CompilerCatalog::from_json(CATALOG).unwrap()),
            Arc::new(GradingValidator::empty()),
            Arc::new(EchoBackend),
            platform.clone(),
        );
        let state = Arc::new(AppState {
            pipeline: Arc::new(pipeline),
        });
        let app = crate::routes::routes().with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), platform)
    }

    fn event(content: &str) -> serde_json::Value {
        serde_json::json!({
            "message_id": "1",
            "channel_id": "2",
            "author_id": "3",
            "content": content,
        })
    }

    #[tokio::test]
    async fn test_event_is_accepted_and_answered() {
        let (base, platform) = spawn_api().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/events", base))
            .json(&event(";compile 1 python ```print(1)```"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(Uuid::parse_str(body["invocation_id"].as_str().unwrap()).is_ok());

        let mut waited = 0;
        while platform.sent.lock().unwrap().is_empty() && waited < 50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += 1;
        }
        let sent = platform.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].success);
        assert!(sent[0].contains("print(1)"));
    }

    #[tokio::test]
    async fn test_event_without_prefix_is_ignored() {
        let (base, platform) = spawn_api().await;
        let response = reqwest::Client::new()
            .post(format!("{}/events", base))
            .json(&event("hello there"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["ignored"], true);
        assert!(platform.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_languages_and_metrics() {
        let (base, _) = spawn_api().await;
        let client = reqwest::Client::new();

        let status = client.get(format!("{}/status", base)).send().await.unwrap();
        assert_eq!(status.text().await.unwrap(), "OK");

        let languages: serde_json::Value = client
            .get(format!("{}/languages", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(languages[0]["compilers"][0], "cpython-3.12.7");

        let metrics = client.get(format!("{}/metrics", base)).send().await.unwrap();
        assert_eq!(metrics.status(), reqwest::StatusCode::OK);
    }
}
