use serde::{Deserialize, Serialize};

/// A chat message as delivered by the platform bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_id: String,
    pub channel_id: String,
    pub author_id: String,
    /// Display handle used in footers ("Requested by: ...")
    #[serde(default)]
    pub author_tag: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_bot_author: bool,
}

impl MessageEvent {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id.clone(),
            message_id: self.message_id.clone(),
        }
    }
}

/// Address of a message on the platform (reaction and reply target)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// A single compile attempt against the remote backend.
///
/// Built once per invocation; the fixer derives new requests through
/// [`CompilationRequest::with_substitution`] instead of mutating one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationRequest {
    source_code: String,
    compiler: String,
    stdin: Option<String>,
    options: Option<String>,
    save: bool,
}

impl CompilationRequest {
    pub fn new(source_code: impl Into<String>, compiler: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            compiler: compiler.into(),
            stdin: None,
            options: None,
            save: true,
        }
    }

    pub fn with_stdin(mut self, stdin: Option<String>) -> Self {
        self.stdin = stdin;
        self
    }

    /// Blank option strings are stored as `None`
    pub fn with_options(mut self, options: Option<String>) -> Self {
        self.options = normalize_options(options);
        self
    }

    /// Copy of this request targeting another compiler/option pair
    pub fn with_substitution(&self, compiler: &str, options: Option<String>) -> Self {
        Self {
            source_code: self.source_code.clone(),
            compiler: compiler.to_string(),
            stdin: self.stdin.clone(),
            options: normalize_options(options),
            save: self.save,
        }
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    pub fn options(&self) -> Option<&str> {
        self.options.as_deref()
    }

    pub fn save(&self) -> bool {
        self.save
    }
}

/// Individual option tokens; users separate them with spaces or commas
pub fn split_option_tokens(options: &str) -> Vec<&str> {
    options
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .collect()
}

fn normalize_options(options: Option<String>) -> Option<String> {
    options
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
}

/// One input/output pair of a grading level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingRecord {
    pub input: String,
    pub output: String,
}
