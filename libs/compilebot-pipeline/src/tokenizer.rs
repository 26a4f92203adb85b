//! Argument tokenizer
//!
//! Splits a prefixed chat message into a lowercase command name and
//! positional arguments. Only the first [`MAX_COMMAND_SPAN`] characters after
//! the prefix are scanned, so a huge paste cannot make command selection
//! expensive; code and stdin are extracted later from the full text.

use compilebot_common::types::MessageEvent;

/// Characters scanned for the command name and positional arguments
pub const MAX_COMMAND_SPAN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Lowercased first token
    pub command: String,
    pub args: Vec<String>,
}

/// Tokenize raw message text.
///
/// Returns `None` when the text does not start with `prefix` or carries no
/// command token at all.
pub fn tokenize(content: &str, prefix: &str) -> Option<Invocation> {
    let rest = content.strip_prefix(prefix)?.trim();
    let span: String = rest.chars().take(MAX_COMMAND_SPAN).collect();

    let mut tokens = span.split_whitespace();
    let command = tokens.next()?.to_lowercase();
    let args = tokens.map(str::to_string).collect();

    Some(Invocation { command, args })
}

/// Tokenize an inbound event, ignoring anything authored by a bot
pub fn tokenize_event(event: &MessageEvent, prefix: &str) -> Option<Invocation> {
    if event.is_bot_author {
        return None;
    }
    tokenize(&event.content, prefix)
}

/// Message text after the prefix and command word, up to the first code fence.
///
/// This is the argument header the extractor scans for options, inline stdin
/// and url redirects. It is not length-capped.
pub fn argument_header<'a>(content: &'a str, prefix: &str) -> &'a str {
    let rest = content
        .strip_prefix(prefix)
        .unwrap_or(content)
        .trim_start();
    let header = match rest.find("```") {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    // Drop the command word
    match header.find(char::is_whitespace) {
        Some(idx) => header[idx..].trim(),
        None => "",
    }
}
