pub mod arguments;
pub mod catalog;
pub mod client;
pub mod error;
pub mod fixer;
pub mod formatter;
pub mod metrics;
pub mod pipeline;
pub mod platform;
pub mod source;
pub mod tokenizer;
pub mod validator;

#[cfg(test)]
mod testing;

pub use catalog::CompilerCatalog;
pub use client::{CompilationBackend, CompilationResult, RemoteCompilationClient};
pub use error::PipelineError;
pub use fixer::Fixer;
pub use formatter::DisplayPayload;
pub use pipeline::{Command, Disposition, Pipeline};
pub use platform::{ChatPlatform, CompileLog, WebhookCompileLog};
pub use validator::{GradingValidator, HttpDatasetSource, RedisDatasetSource};
