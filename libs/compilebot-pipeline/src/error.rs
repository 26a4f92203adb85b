use thiserror::Error;

/// Problems with what the user typed; always reported, never retried
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no arguments given")]
    EmptyArguments,

    #[error("no language or compiler given")]
    MissingLanguage,

    #[error("'{0}' is not a known language or compiler")]
    UnknownLanguage(String),

    #[error("no code block attached")]
    MissingCodeBlock,

    #[error("'<' must be followed by a url")]
    MissingUrl,
}

/// Retrieving code from a referenced url failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Calling the compilation backend failed for reasons outside the user's code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteServiceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend answered with HTTP {status}")]
    Status { status: u16 },

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RemoteServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteServiceError::InvalidResponse(e.to_string())
        } else {
            RemoteServiceError::Transport(e.to_string())
        }
    }
}

/// Everything that ends an invocation before a result can be shown
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not retrieve code from url: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    RemoteService(#[from] RemoteServiceError),
}

impl PipelineError {
    /// Label used for the error counter
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Fetch(_) => "fetch",
            PipelineError::RemoteService(_) => "remote_service",
        }
    }

    /// Text shown to the user in the failure reply
    pub fn user_message(&self, usage: &str) -> String {
        match self {
            PipelineError::Validation(ValidationError::EmptyArguments) => usage.to_string(),
            PipelineError::Validation(ValidationError::MissingLanguage)
            | PipelineError::Validation(ValidationError::UnknownLanguage(_)) => format!(
                "You must input a valid level, language or compiler \n\n Usage: {}",
                usage
            ),
            PipelineError::Validation(ValidationError::MissingCodeBlock) => {
                "You must attach codeblocks containing code to your message".to_string()
            }
            PipelineError::Validation(ValidationError::MissingUrl) => {
                format!("You must provide a url after '<' \n\n Usage: {}", usage)
            }
            PipelineError::Fetch(e) => format!("Could not retrieve code from url \n {}", e),
            PipelineError::RemoteService(RemoteServiceError::InvalidResponse(_)) => {
                "Invalid compiler backend response \nPlease try again later".to_string()
            }
            PipelineError::RemoteService(e) => format!(
                "Compiler backend request failure \n {} \nPlease try again later",
                e
            ),
        }
    }
}

/// A reaction or message call on the chat platform failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("platform interaction failed: {0}")]
pub struct PlatformError(pub String);

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        PlatformError(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to download compiler list: {0}")]
    Download(#[from] reqwest::Error),

    #[error("catalog contains no compilers")]
    Empty,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("dataset store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("dataset document missing: {0}")]
    Missing(&'static str),

    #[error("malformed dataset: {0}")]
    Malformed(String),
}
