//! Stdin/options extractor
//!
//! Reads the argument header (text between the command word and the first
//! code fence) in the shape
//! `<level> <language> [options...] [< url] [| stdin...]`.

use crate::error::ValidationError;
use crate::source::code_blocks;

/// Inline stdin separator
const STDIN_MARKER: char = '|';
/// Url redirect token
const REDIRECT_MARKER: &str = "<";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentData {
    /// Option tokens, space separated
    pub options: Option<String>,
    /// Url to fetch source from instead of the code block
    pub redirect: Option<String>,
    /// Stdin given inline after `|`
    pub stdin: Option<String>,
}

/// Parse the argument header, skipping `positional` leading tokens
/// (level and language).
pub fn parse_arguments(header: &str, positional: usize) -> Result<ArgumentData, ValidationError> {
    let (flags, stdin) = match header.find(STDIN_MARKER) {
        Some(idx) => {
            let stdin = header[idx + STDIN_MARKER.len_utf8()..].trim();
            (
                &header[..idx],
                (!stdin.is_empty()).then(|| stdin.to_string()),
            )
        }
        None => (header, None),
    };

    let mut options = Vec::new();
    let mut redirect = None;
    let mut tokens = flags.split_whitespace().skip(positional);

    while let Some(token) = tokens.next() {
        if token == REDIRECT_MARKER {
            let url = tokens.next().ok_or(ValidationError::MissingUrl)?;
            redirect = Some(url.to_string());
        } else if let Some(url) = token.strip_prefix(REDIRECT_MARKER) {
            redirect = Some(url.to_string());
        } else {
            options.push(token);
        }
    }

    Ok(ArgumentData {
        options: (!options.is_empty()).then(|| options.join(" ")),
        redirect,
        stdin,
    })
}

/// Pick the stdin for a request.
///
/// Precedence: inline `|` stdin, then the stdin code block (the block after
/// the ones consumed as source, counted by `source_blocks`), then the grading
/// fallback for the level.
pub fn resolve_stdin<F>(
    inline: Option<String>,
    text: &str,
    source_blocks: usize,
    grading_fallback: F,
) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    if inline.is_some() {
        return inline;
    }

    if let Some(block) = code_blocks(text).get(source_blocks) {
        let block = block.strip_prefix('\n').unwrap_or(block);
        return Some(block.to_string());
    }

    grading_fallback()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_only() {
        let data = parse_arguments("1 cpp warning -O2", 2).unwrap();
        assert_eq!(data.options.as_deref(), Some("warning -O2"));
        assert!(data.redirect.is_none());
        assert!(data.stdin.is_none());
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(parse_arguments("1 python", 2).unwrap(), ArgumentData::default());
        assert_eq!(parse_arguments("", 2).unwrap(), ArgumentData::default());
    }

    #[test]
    fn test_inline_stdin_keeps_spacing() {
        let data = parse_arguments("1 python -O2 | 3 4  5", 2).unwrap();
        assert_eq!(data.options.as_deref(), Some("-O2"));
        assert_eq!(data.stdin.as_deref(), Some("3 4  5"));
    }

    #[test]
    fn test_redirect_forms() {
        let spaced = parse_arguments("1 python < https://example.com/a.py", 2).unwrap();
        assert_eq!(spaced.redirect.as_deref(), Some("https://example.com/a.py"));

        let glued = parse_arguments("1 python <https://example.com/b.py", 2).unwrap();
        assert_eq!(glued.redirect.as_deref(), Some("https://example.com/b.py"));
    }

    #[test]
    fn test_redirect_without_url() {
        assert_eq!(
            parse_arguments("1 python <", 2),
            Err(ValidationError::MissingUrl)
        );
    }

    #[test]
    fn test_stdin_precedence() {
        let text = "```print(input())``` ```\nfrom block```";

        let inline = resolve_stdin(Some("inline".into()), text, 1, || Some("graded".into()));
        assert_eq!(inline.as_deref(), Some("inline"));

        let block = resolve_stdin(None, text, 1, || Some("graded".into()));
        assert_eq!(block.as_deref(), Some("from block"));

        let graded = resolve_stdin(None, "```print(1)```", 1, || Some("graded".into()));
        assert_eq!(graded.as_deref(), Some("graded"));

        assert!(resolve_stdin(None, "```print(1)```", 1, || None).is_none());
    }

    #[test]
    fn test_url_source_reads_first_block_as_stdin() {
        let stdin = resolve_stdin(None, "```42```", 0, || None);
        assert_eq!(stdin.as_deref(), Some("42"));
    }
}
