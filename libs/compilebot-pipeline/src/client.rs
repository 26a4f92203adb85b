/// Remote Compilation Client
///
/// **Responsibility:**
/// Turn a `CompilationRequest` into exactly one HTTP POST against the
/// compilation backend and decode the reply into a `CompilationResult`.
///
/// **Failure classes:**
/// - Transport problems and non-success HTTP statuses → `Transport` / `Status`
/// - A body that is not the expected JSON shape → `InvalidResponse`
///
/// Compiler errors are not failures here; they come back as a result with a
/// non-zero status for the fixer and formatter to judge.

use std::time::Duration;

use async_trait::async_trait;
use compilebot_common::types::{split_option_tokens, CompilationRequest};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};

use crate::error::RemoteServiceError;

/// Outcome reported by the backend for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationResult {
    status_code: Option<i32>,
    signal: Option<String>,
    compiler_message: Option<String>,
    program_message: Option<String>,
    result_url: Option<String>,
}

impl CompilationResult {
    /// Decode a backend response body
    pub fn from_backend_json(body: &str) -> Result<Self, RemoteServiceError> {
        let response: CompileResponse = serde_json::from_str(body)
            .map_err(|e| RemoteServiceError::InvalidResponse(e.to_string()))?;

        if response.status.is_none() && response.signal.is_none() {
            return Err(RemoteServiceError::InvalidResponse(
                "response carries neither status nor signal".to_string(),
            ));
        }

        Ok(Self {
            status_code: response.status,
            signal: response.signal,
            compiler_message: response.compiler_message,
            program_message: response.program_message,
            result_url: response.url,
        })
    }

    pub fn status_code(&self) -> Option<i32> {
        self.status_code
    }

    pub fn signal(&self) -> Option<&str> {
        self.signal.as_deref()
    }

    pub fn compiler_message(&self) -> Option<&str> {
        self.compiler_message.as_deref()
    }

    pub fn program_message(&self) -> Option<&str> {
        self.program_message.as_deref()
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    /// Success is decided by the exit status alone
    pub fn is_success(&self) -> bool {
        self.status_code == Some(0)
    }
}

/// Body of a compile call
#[derive(Debug, Serialize)]
struct CompileBody<'a> {
    code: &'a str,
    compiler: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdin: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<String>,
    save: bool,
}

impl<'a> From<&'a CompilationRequest> for CompileBody<'a> {
    fn from(request: &'a CompilationRequest) -> Self {
        // The backend takes option switches comma separated
        let options = request
            .options()
            .map(|o| split_option_tokens(o).join(","))
            .filter(|o| !o.is_empty());

        Self {
            code: request.source_code(),
            compiler: request.compiler(),
            stdin: request.stdin(),
            options,
            save: request.save(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompileResponse {
    #[serde(default, deserialize_with = "deserialize_status")]
    status: Option<i32>,
    #[serde(default)]
    signal: Option<String>,
    #[serde(default)]
    compiler_message: Option<String>,
    #[serde(default)]
    program_message: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// The backend sends the exit status either as a number or as a string
fn deserialize_status<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawStatus {
        Number(i32),
        Text(String),
    }

    match Option::<RawStatus>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawStatus::Number(n)) => Ok(Some(n)),
        Some(RawStatus::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawStatus::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid status '{}'", text))),
    }
}

/// Anything that can run a compile attempt
#[async_trait]
pub trait CompilationBackend: Send + Sync {
    async fn submit(
        &self,
        request: &CompilationRequest,
    ) -> Result<CompilationResult, RemoteServiceError>;
}

/// HTTP client for the Wandbox-style compile endpoint
#[derive(Debug, Clone)]
pub struct RemoteCompilationClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl RemoteCompilationClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CompilationBackend for RemoteCompilationClient {
    #[instrument(skip(self, request), fields(compiler = %request.compiler()))]
    async fn submit(
        &self,
        request: &CompilationRequest,
    ) -> Result<CompilationResult, RemoteServiceError> {
        let body = CompileBody::from(request);

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteServiceError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let result = CompilationResult::from_backend_json(&text)?;

        debug!(
            status = ?result.status_code(),
            signal = ?result.signal(),
            "Backend answered"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_status_as_string_or_number() {
        let text = CompilationResult::from_backend_json(r#"{"status":"0","program_message":"hi\n"}"#)
            .unwrap();
        assert_eq!(text.status_code(), Some(0));
        assert!(text.is_success());
        assert_eq!(text.program_message(), Some("hi\n"));

        let number = CompilationResult::from_backend_json(r#"{"status":1}"#).unwrap();
        assert_eq!(number.status_code(), Some(1));
        assert!(!number.is_success());
    }

    #[test]
    fn test_signal_only_is_failure() {
        let killed =
            CompilationResult::from_backend_json(r#"{"signal":"Killed","url":"https://x/1"}"#)
                .unwrap();
        assert_eq!(killed.status_code(), None);
        assert_eq!(killed.signal(), Some("Killed"));
        assert_eq!(killed.result_url(), Some("https://x/1"));
        assert!(!killed.is_success());
    }

    #[test]
    fn test_shapeless_bodies_are_invalid() {
        for body in ["not json", "[]", "{}", r#"{"status":"zero"}"#] {
            assert!(
                matches!(
                    CompilationResult::from_backend_json(body),
                    Err(RemoteServiceError::InvalidResponse(_))
                ),
                "{} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_body_shape() {
        let request = CompilationRequest::new("int main(){}", "gcc-head")
            .with_options(Some("warning  -O2".to_string()));
        let body = serde_json::to_value(CompileBody::from(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "code": "int main(){}",
                "compiler": "gcc-head",
                "options": "warning,-O2",
                "save": true
            })
        );
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route(
                "/compile.json",
                post(
                    |State(seen): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                        *seen.lock().unwrap() = Some(body);
                        Json(json!({
                            "status": "0",
                            "program_message": "5\n",
                            "url": "https://wandbox.org/permlink/abc"
                        }))
                    },
                ),
            )
            .with_state(seen.clone());
        let base = serve(router).await;

        let client = RemoteCompilationClient::new(
            reqwest::Client::new(),
            format!("{}/compile.json", base),
            Duration::from_secs(5),
        );
        let request = CompilationRequest::new("print(input())", "cpython-3.12.7")
            .with_stdin(Some("5".to_string()));
        let result = client.submit(&request).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.program_message(), Some("5\n"));
        assert_eq!(result.result_url(), Some("https://wandbox.org/permlink/abc"));

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["stdin"], "5");
        assert_eq!(body["save"], true);
        assert!(body.get("options").is_none());
    }

    #[tokio::test]
    async fn test_submit_error_classes() {
        let router = Router::new()
            .route(
                "/down",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route("/html", post(|| async { "<html>oops</html>" }));
        let base = serve(router).await;
        let request = CompilationRequest::new("x", "y");

        let down = RemoteCompilationClient::new(
            reqwest::Client::new(),
            format!("{}/down", base),
            Duration::from_secs(5),
        );
        assert_eq!(
            down.submit(&request).await,
            Err(RemoteServiceError::Status { status: 503 })
        );

        let html = RemoteCompilationClient::new(
            reqwest::Client::new(),
            format!("{}/html", base),
            Duration::from_secs(5),
        );
        assert!(matches!(
            html.submit(&request).await,
            Err(RemoteServiceError::InvalidResponse(_))
        ));

        let unreachable = RemoteCompilationClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/compile.json",
            Duration::from_secs(2),
        );
        assert!(matches!(
            unreachable.submit(&request).await,
            Err(RemoteServiceError::Transport(_))
        ));
    }
}
