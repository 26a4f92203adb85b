/// Compilation Request Pipeline - High-Level Orchestration
///
/// **Flow per message:**
/// 1. Tokenize (ignore non-prefixed, bot-authored or unknown commands)
/// 2. Validate language/compiler against the catalog (before any I/O)
/// 3. Resolve source: code block or url
/// 4. Extract options and stdin (grading fallback for the level)
/// 5. Compile through the fixer while holding the loading reaction
/// 6. Format, grade, log, reply, react
///
/// Every step that fails short-circuits into a single failure reply.
/// Platform hiccups (reactions, sends) are logged and never hide a result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use compilebot_common::types::{CompilationRequest, MessageEvent, MessageRef};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::arguments::{parse_arguments, resolve_stdin};
use crate::catalog::CompilerCatalog;
use crate::client::CompilationBackend;
use crate::error::{PipelineError, ValidationError};
use crate::fixer::{build_request, CompileReport, Fixer};
use crate::formatter::{
    escape_block_delimiters, format_compilation, format_submission, DisplayPayload,
    FormatContext, PayloadField,
};
use crate::metrics;
use crate::platform::{spawn_log, ChatPlatform, CompileLog, CompileLogEntry, ReactionGuard};
use crate::source::{code_from_text, fetch_code_from_url};
use crate::tokenizer::{argument_header, tokenize_event, Invocation};
use crate::validator::GradingValidator;

/// Level and language/compiler precede the free-form arguments
const POSITIONAL_ARGS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Compile,
    Submit,
    Help,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "compile" => Some(Command::Compile),
            "submit" => Some(Command::Submit),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// A compilation that reached the user
#[derive(Debug, Clone)]
pub struct CompletedInvocation {
    pub invocation_id: Uuid,
    pub payload: DisplayPayload,
    pub report: CompileReport,
    pub verdict: Option<bool>,
}

/// What the pipeline did with an event
#[derive(Debug, Clone)]
pub enum Disposition {
    Ignored,
    Help,
    Completed(Box<CompletedInvocation>),
    Rejected(PipelineError),
}

/// Validated, extracted input ready for compilation
struct PreparedRequest {
    request: CompilationRequest,
    level: String,
    language: String,
    /// Stdin came from the level's grading records
    graded: bool,
}

pub struct Pipeline {
    prefix: String,
    catalog: Arc<CompilerCatalog>,
    validator: Arc<GradingValidator>,
    backend: Arc<dyn CompilationBackend>,
    platform: Arc<dyn ChatPlatform>,
    compile_log: Option<Arc<dyn CompileLog>>,
    http: reqwest::Client,
    fetch_timeout: Duration,
    fixer: Fixer,
    loading_emote: Option<String>,
}

impl Pipeline {
    pub fn new(
        prefix: impl Into<String>,
        catalog: Arc<CompilerCatalog>,
        validator: Arc<GradingValidator>,
        backend: Arc<dyn CompilationBackend>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            catalog,
            validator,
            backend,
            platform,
            compile_log: None,
            http: reqwest::Client::new(),
            fetch_timeout: Duration::from_secs(10),
            fixer: Fixer::new(4),
            loading_emote: None,
        }
    }

    pub fn with_compile_log(mut self, log: Arc<dyn CompileLog>) -> Self {
        self.compile_log = Some(log);
        self
    }

    pub fn with_loading_emote(mut self, emote: Option<String>) -> Self {
        self.loading_emote = emote;
        self
    }

    pub fn with_fixer(mut self, fixer: Fixer) -> Self {
        self.fixer = fixer;
        self
    }

    /// Client and timeout used for code-from-url fetches
    pub fn with_http(mut self, http: reqwest::Client, fetch_timeout: Duration) -> Self {
        self.http = http;
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn catalog(&self) -> &CompilerCatalog {
        &self.catalog
    }

    pub fn validator(&self) -> &GradingValidator {
        &self.validator
    }

    /// Whether an event would start an invocation
    pub fn accepts(&self, event: &MessageEvent) -> bool {
        tokenize_event(event, &self.prefix)
            .and_then(|invocation| Command::parse(&invocation.command))
            .is_some()
    }

    pub fn usage(&self) -> String {
        format!(
            "{}compile <level> <language|compiler> {}<code>{}",
            self.prefix,
            escape_block_delimiters("```"),
            escape_block_delimiters("```")
        )
    }

    fn help_payload(&self) -> DisplayPayload {
        let fence = escape_block_delimiters("```");
        let p = &self.prefix;
        let mut payload = DisplayPayload::notice(
            "Command Usage",
            "*Compiles a script \nNote: This command's code input MUST be encapsulated in codeblocks*",
        );
        for (name, usage) in [
            ("Standard compile", format!("{p}compile <level> <language|compiler> {fence}<code>{fence}")),
            ("Compile w/ options", format!("{p}compile <level> <language|compiler> <options> {fence}<code>{fence}")),
            ("Compile w/ stdin", format!("{p}compile <level> <language|compiler> | <stdin> {fence}<code>{fence}")),
            ("Compile w/ url code", format!("{p}compile <level> <language|compiler> < http://online.file/url")),
            ("Submission", format!("{p}submit <task> <language|compiler> {fence}<code>{fence}")),
        ] {
            payload.fields.push(PayloadField {
                name: name.to_string(),
                value: usage,
                inline: false,
            });
        }
        payload
    }

    /// Handle one inbound event end to end
    pub async fn handle(&self, event: &MessageEvent) -> Disposition {
        self.handle_with_id(event, Uuid::new_v4()).await
    }

    /// Same as [`Pipeline::handle`], with a caller-chosen invocation id
    pub async fn handle_with_id(&self, event: &MessageEvent, invocation_id: Uuid) -> Disposition {
        let Some(invocation) = tokenize_event(event, &self.prefix) else {
            return Disposition::Ignored;
        };
        let Some(command) = Command::parse(&invocation.command) else {
            return Disposition::Ignored;
        };

        if command == Command::Help {
            self.reply(&event.channel_id, &self.help_payload()).await;
            return Disposition::Help;
        }

        match self.run(command, event, &invocation, invocation_id).await {
            Ok(completed) => Disposition::Completed(Box::new(completed)),
            Err(e) => {
                metrics::record_error(e.kind());
                warn!(invocation_id = %invocation_id, error = %e, "Invocation rejected");
                self.reply(
                    &event.channel_id,
                    &DisplayPayload::failure(e.user_message(&self.usage())),
                )
                .await;
                Disposition::Rejected(e)
            }
        }
    }

    #[instrument(
        skip(self, event, invocation, invocation_id),
        fields(invocation_id = %invocation_id, author = %event.author_id)
    )]
    async fn run(
        &self,
        command: Command,
        event: &MessageEvent,
        invocation: &Invocation,
        invocation_id: Uuid,
    ) -> Result<CompletedInvocation, PipelineError> {
        let prepared = self.prepare(event, invocation).await?;
        info!(
            compiler = %prepared.request.compiler(),
            level = %prepared.level,
            source_size = prepared.request.source_code().len(),
            has_stdin = prepared.request.stdin().is_some(),
            "Compiling"
        );

        let guard = self.acquire_loading_reaction(event).await;
        let compiled = self
            .fixer
            .compile(self.backend.as_ref(), &self.catalog, &prepared.request)
            .await;
        if let Some(guard) = guard {
            if let Err(e) = guard.release().await {
                warn!(error = %e, "Failed to remove loading reaction");
                self.reply(
                    &event.channel_id,
                    &DisplayPayload::failure(format!(
                        "Unable to remove reactions, am I missing permissions?\n{}",
                        e
                    )),
                )
                .await;
            }
        }
        let report = compiled?;
        let result = report.result();

        let language = self
            .catalog
            .resolve(report.request().compiler())
            .map(|c| c.language.clone())
            .unwrap_or_else(|| prepared.language.clone());
        let verdict = if prepared.graded {
            self.validator.grade(&prepared.level, result.program_message())
        } else {
            None
        };

        let ctx = FormatContext {
            author_tag: display_author(event),
            level: prepared.level.clone(),
            language: prepared.language.clone(),
            verdict,
            graded_records: self.validator.record_count(&prepared.level),
            substitution: report.substitution(),
        };
        let payload = match command {
            Command::Submit => format_submission(result, &ctx, Utc::now().date_naive()),
            _ => format_compilation(result, &ctx),
        };

        if let Some(log) = &self.compile_log {
            spawn_log(
                log.clone(),
                CompileLogEntry {
                    code: prepared.request.source_code().to_string(),
                    language: prepared.language.clone(),
                    result_url: result.result_url().map(str::to_string),
                    author: display_author(event),
                    guild: event.guild_id.clone(),
                    success: result.is_success(),
                    compiler_message: result.compiler_message().map(str::to_string),
                },
            );
        }

        metrics::record_compilation(&language, result.is_success());
        info!(
            status = ?result.status_code(),
            attempts = report.attempts().len(),
            verdict = ?verdict,
            "Compilation finished"
        );

        if let Some(reply) = self.reply(&event.channel_id, &payload).await {
            if let Err(e) = self.platform.react(&reply, payload.reaction()).await {
                warn!(error = %e, "Failed to react to result");
            }
        }

        Ok(CompletedInvocation {
            invocation_id,
            payload,
            report,
            verdict,
        })
    }

    /// Validation and extraction; nothing here touches the backend
    async fn prepare(
        &self,
        event: &MessageEvent,
        invocation: &Invocation,
    ) -> Result<PreparedRequest, PipelineError> {
        let mut args = invocation.args.iter();
        let level = args
            .next()
            .ok_or(ValidationError::EmptyArguments)?
            .to_lowercase();
        let language = args
            .next()
            .and_then(|arg| arg.split("```").next())
            .filter(|arg| !arg.is_empty())
            .ok_or(ValidationError::MissingLanguage)?
            .to_lowercase();

        if !self.catalog.is_valid_compiler(&language) && !self.catalog.is_valid_language(&language)
        {
            return Err(ValidationError::UnknownLanguage(language).into());
        }

        let header = argument_header(&event.content, &self.prefix);
        let arguments = parse_arguments(header, POSITIONAL_ARGS)?;

        let (code, source_blocks) = match &arguments.redirect {
            Some(url) => (
                fetch_code_from_url(&self.http, url, self.fetch_timeout).await?,
                0,
            ),
            None => (code_from_text(&event.content)?, 1),
        };

        let mut graded = false;
        let stdin = resolve_stdin(arguments.stdin, &event.content, source_blocks, || {
            let expected = self.validator.expected_stdin(&level);
            graded = expected.is_some();
            expected
        });

        let request = build_request(&self.catalog, &language, code, stdin, arguments.options)?;

        Ok(PreparedRequest {
            request,
            level,
            language,
            graded,
        })
    }

    async fn acquire_loading_reaction(&self, event: &MessageEvent) -> Option<ReactionGuard> {
        let emote = self.loading_emote.as_deref()?;
        match ReactionGuard::acquire(self.platform.clone(), event.message_ref(), emote).await {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(error = %e, "Failed to add loading reaction");
                self.reply(
                    &event.channel_id,
                    &DisplayPayload::failure(format!(
                        "Failed to react to message, am I missing permissions?\n{}",
                        e
                    )),
                )
                .await;
                None
            }
        }
    }

    /// Send a payload; failures are logged and swallowed
    async fn reply(
        &self,
        channel_id: &str,
        payload: &DisplayPayload,
    ) -> Option<MessageRef> {
        match self.platform.send(channel_id, payload).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(channel_id = %channel_id, error = %e, "Failed to send reply");
                None
            }
        }
    }
}

fn display_author(event: &MessageEvent) -> String {
    if event.author_tag.is_empty() {
        event.author_id.clone()
    } else {
        event.author_tag.clone()
    }
}
