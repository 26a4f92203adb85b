/// Response Formatter - Pure Result → Display Transformation
///
/// **Sanitization Rules (both message fields):**
/// - Terminal control/color escape sequences: STRIPPED (tabs and `\r` kept)
/// - Compiler output ceiling: 1016 characters once it reaches 1017
/// - Program output ceiling: 1015 characters once it reaches 1016
/// - Backticks in program output: prefixed with a zero-width space
///
/// Ceilings apply to the message body before the closing fence is appended,
/// so every field stays under the platform's 1024 character field limit. A
/// grading verdict appended to the program field is taken out of the body's
/// ceiling.
///
/// **Classification:**
/// Success is `status == 0` and nothing else; message content never changes
/// the color.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::client::CompilationResult;

pub const SUCCESS_COLOR: u32 = 0x00FF00;
pub const FAILURE_COLOR: u32 = 0xFF0000;
pub const SUCCESS_MARKER: &str = "✅";
pub const FAILURE_MARKER: &str = "❌";

pub const COMPILER_MESSAGE_THRESHOLD: usize = 1017;
pub const COMPILER_MESSAGE_CEILING: usize = 1016;
pub const PROGRAM_MESSAGE_THRESHOLD: usize = 1016;
pub const PROGRAM_MESSAGE_CEILING: usize = 1015;
/// Platform limit for a single field value
pub const FIELD_VALUE_LIMIT: usize = 1024;

const ZERO_WIDTH_SPACE: char = '\u{200B}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// A rendered chat message, ready for the platform bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub color: u32,
    pub success: bool,
    #[serde(default)]
    pub fields: Vec<PayloadField>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl DisplayPayload {
    fn new(title: &str, success: bool) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            color: if success { SUCCESS_COLOR } else { FAILURE_COLOR },
            success,
            fields: Vec::new(),
            footer: None,
            url: None,
        }
    }

    /// Plain failure reply (validation problems, backend outages)
    pub fn failure(text: impl Into<String>) -> Self {
        let mut payload = Self::new("Request failed", false);
        payload.description = Some(text.into());
        payload
    }

    /// Informational reply such as the usage text
    pub fn notice(title: &str, text: impl Into<String>) -> Self {
        let mut payload = Self::new(title, true);
        payload.description = Some(text.into());
        payload
    }

    fn field(mut self, name: &str, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(PayloadField {
            name: name.to_string(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Whether any visible text contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.title.contains(needle)
            || self.description.as_deref().is_some_and(|d| d.contains(needle))
            || self
                .fields
                .iter()
                .any(|f| f.name.contains(needle) || f.value.contains(needle))
            || self.footer.as_deref().is_some_and(|f| f.contains(needle))
    }

    /// Reaction placed on the reply
    pub fn reaction(&self) -> &'static str {
        if self.success {
            SUCCESS_MARKER
        } else {
            FAILURE_MARKER
        }
    }
}

/// Remove terminal escape sequences (colors, cursor movement).
///
/// `strip_ansi_escapes` also drops tabs and carriage returns, which are
/// program output, so those are cut out first and put back between the
/// stripped segments.
pub fn strip_control_sequences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in text.split_inclusive(|c: char| c == '\t' || c == '\r') {
        match segment.char_indices().last() {
            Some((idx, sep @ ('\t' | '\r'))) => {
                out.push_str(&strip_ansi_escapes::strip_str(&segment[..idx]));
                out.push(sep);
            }
            _ => out.push_str(&strip_ansi_escapes::strip_str(segment)),
        }
    }
    out
}

/// Keep user output from closing the surrounding code fence
pub fn escape_block_delimiters(text: &str) -> String {
    text.replace('`', &format!("{}`", ZERO_WIDTH_SPACE))
}

pub fn unescape_block_delimiters(text: &str) -> String {
    text.replace(&format!("{}`", ZERO_WIDTH_SPACE), "`")
}

/// Cut to `ceiling` characters once the text reaches `threshold` characters
pub fn truncate_chars(text: &str, threshold: usize, ceiling: usize) -> String {
    if text.chars().count() >= threshold {
        text.chars().take(ceiling).collect()
    } else {
        text.to_string()
    }
}

pub fn sanitize_compiler_message(message: &str) -> String {
    truncate_chars(
        &strip_control_sequences(message),
        COMPILER_MESSAGE_THRESHOLD,
        COMPILER_MESSAGE_CEILING,
    )
}

pub fn sanitize_program_message(message: &str) -> String {
    sanitize_program_message_within(message, 0)
}

/// Program output with `reserved` characters of the ceiling left for a suffix
fn sanitize_program_message_within(message: &str, reserved: usize) -> String {
    truncate_chars(
        &escape_block_delimiters(&strip_control_sequences(message)),
        PROGRAM_MESSAGE_THRESHOLD - reserved,
        PROGRAM_MESSAGE_CEILING - reserved,
    )
}

/// Invocation details shown next to a result
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    pub author_tag: String,
    pub level: String,
    pub language: String,
    /// Grading outcome when the level has expected output
    pub verdict: Option<bool>,
    /// Number of graded records for the level
    pub graded_records: usize,
    /// Compiler/options actually used when the fixer substituted them
    pub substitution: Option<String>,
}

/// Payload for the `compile` command
pub fn format_compilation(result: &CompilationResult, ctx: &FormatContext) -> DisplayPayload {
    let mut payload = DisplayPayload::new("Compilation Results:", result.is_success());
    payload.footer = Some(format!("Requested by: {}", ctx.author_tag));
    payload.url = result.result_url().map(str::to_string);

    if let Some(status) = result.status_code() {
        payload = payload.field(
            "Status code",
            format!("Finished with exit code: {}", status),
            false,
        );
    }

    if let Some(signal) = result.signal().filter(|s| !s.is_empty()) {
        payload = payload.field("Signal", format!("```{}```", signal), false);
    }

    if let Some(substitution) = &ctx.substitution {
        payload = payload.field("Fixed", substitution.clone(), false);
    }

    if let Some(message) = result.compiler_message().filter(|m| !m.is_empty()) {
        payload = payload.field(
            "Compiler Output",
            format!("```{}\n```\n", sanitize_compiler_message(message)),
            false,
        );
    }

    if let Some(message) = result.program_message().filter(|m| !m.is_empty()) {
        let verdict = ctx.verdict.map(|valid| {
            let marker = if valid { SUCCESS_MARKER } else { FAILURE_MARKER };
            format!(" Valid: {}", marker)
        });
        let reserved = verdict.as_deref().map_or(0, |v| v.chars().count());
        let mut value = format!(
            "```\n{}\n```\n",
            sanitize_program_message_within(message, reserved)
        );
        if let Some(verdict) = verdict {
            value.push_str(&verdict);
        }
        payload = payload.field("Program Output", value, false);
    }

    payload
}

/// Payload for the `submit` command
pub fn format_submission(
    result: &CompilationResult,
    ctx: &FormatContext,
    date: NaiveDate,
) -> DisplayPayload {
    let mut payload = DisplayPayload::new("Submission Result:", result.is_success())
        .field("Date (UTC)", date.format("%Y-%m-%d").to_string(), true)
        .field("Task", format!("#{}", ctx.level), true)
        .field("Language", ctx.language.clone(), true)
        .field("Submitted By", ctx.author_tag.clone(), true);
    payload.url = result.result_url().map(str::to_string);

    if !result.is_success() {
        if let Some(message) = result.compiler_message().filter(|m| !m.is_empty()) {
            payload = payload.field(
                "Compiler Output",
                format!("```{}\n```\n", sanitize_compiler_message(message)),
                false,
            );
        }
        return payload;
    }

    let verdict = match ctx.verdict {
        Some(true) => format!(
            "{} {}/{}",
            SUCCESS_MARKER, ctx.graded_records, ctx.graded_records
        ),
        Some(false) => format!("{} 0/{}", FAILURE_MARKER, ctx.graded_records),
        None => "No grading data for this task".to_string(),
    };
    payload.field("Result", verdict, false)
}
