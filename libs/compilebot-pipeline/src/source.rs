//! Code source resolver
//!
//! Program source comes either from the first fenced code block of the
//! message or, when the arguments carry a `<` redirect, from a url. The two
//! paths never combine.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{FetchError, ValidationError};

const FENCE: &str = "```";

/// Code fetched from a url larger than this is refused
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024;

/// Where the program source for a request comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    CodeBlock,
    Url(String),
}

/// Every complete fenced block in `text`, in order of appearance.
///
/// An unmatched trailing fence is ignored.
pub fn code_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        match after_open.find(FENCE) {
            Some(close) => {
                blocks.push(&after_open[..close]);
                rest = &after_open[close + FENCE.len()..];
            }
            None => break,
        }
    }

    blocks
}

/// Drop a language hint line such as `py` or `c++` right after the fence.
///
/// Only a single bare token followed by a newline counts as a hint; a one-line
/// block like `print(1)` is left alone.
pub fn clean_language_specifier(block: &str) -> &str {
    let Some(newline) = block.find('\n') else {
        return block;
    };
    let first_line = block[..newline].trim_end_matches('\r');

    let is_hint = !first_line.is_empty()
        && first_line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '-' | '_' | '.'));

    if is_hint {
        &block[newline + 1..]
    } else {
        block
    }
}

/// Source from the first code block, language hint removed
pub fn code_from_text(text: &str) -> Result<String, ValidationError> {
    code_blocks(text)
        .first()
        .map(|block| clean_language_specifier(block).to_string())
        .ok_or(ValidationError::MissingCodeBlock)
}

/// Download raw source from `url`.
///
/// A non-success status or any transport problem becomes a [`FetchError`]
/// holding the underlying message. No retries.
pub async fn fetch_code_from_url(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    debug!(url = %url, "Fetching code from url");

    let mut response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::new(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        warn!(url = %url, status = %status, "Code url returned an error status");
        return Err(FetchError::new(format!("HTTP {}", status)));
    }

    if response
        .content_length()
        .is_some_and(|len| len > MAX_SOURCE_CODE_BYTES as u64)
    {
        return Err(too_large());
    }

    // Content-Length can be absent or wrong; count while reading
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::new(e.to_string()))?
    {
        if body.len() + chunk.len() > MAX_SOURCE_CODE_BYTES {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn too_large() -> FetchError {
    FetchError::new(format!(
        "Source code exceeds maximum size of {} bytes",
        MAX_SOURCE_CODE_BYTES
    ))
}
