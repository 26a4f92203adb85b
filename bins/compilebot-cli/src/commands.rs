// CLI commands: the same pipeline pieces the bot uses, driven from a terminal
use anyhow::{bail, Context, Result};
use compilebot_common::config::BotConfig;
use compilebot_pipeline::fixer::build_request;
use compilebot_pipeline::formatter::{format_compilation, unescape_block_delimiters, FormatContext};
use compilebot_pipeline::{
    CompilerCatalog, DisplayPayload, Fixer, GradingValidator, RemoteCompilationClient,
};
use std::fs;
use std::path::Path;

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("compilebot-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

async fn catalog(config: &BotConfig, http: &reqwest::Client) -> Result<CompilerCatalog> {
    CompilerCatalog::load_or_fetch(&config.compilers_file, http, &config.compiler_list_url)
        .await
        .context("Failed to build compiler catalog")
}

/// Compile a file and print the formatted result
pub async fn compile(
    file: &Path,
    language: &str,
    options: Option<String>,
    stdin: Option<String>,
    level: Option<&str>,
) -> Result<()> {
    let config = BotConfig::from_env();
    let http = http_client()?;
    let catalog = catalog(&config, &http).await?;

    let language = language.to_lowercase();
    if !catalog.is_valid_compiler(&language) && !catalog.is_valid_language(&language) {
        bail!("Unknown language or compiler: {}", language);
    }

    let code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    // Grading data is only needed when it supplies the stdin
    let validator = match (level, &stdin) {
        (Some(_), None) => GradingValidator::from_config(&config, &http).await,
        _ => GradingValidator::empty(),
    };
    let level = level.map(str::to_lowercase).unwrap_or_default();
    let graded_stdin = validator.expected_stdin(&level);
    let graded = stdin.is_none() && graded_stdin.is_some();
    let stdin = stdin.or(graded_stdin);

    let request = build_request(&catalog, &language, code, stdin, options)?;
    let backend = RemoteCompilationClient::new(
        http.clone(),
        config.backend_url.clone(),
        config.request_timeout,
    );

    println!("Compiling with {}...", request.compiler());
    let report = Fixer::new(config.max_fix_attempts)
        .compile(&backend, &catalog, &request)
        .await
        .context("Compilation request failed")?;

    let result = report.result();
    let ctx = FormatContext {
        author_tag: "compilebot-cli".to_string(),
        verdict: if graded {
            validator.grade(&level, result.program_message())
        } else {
            None
        },
        graded_records: validator.record_count(&level),
        level,
        language,
        substitution: report.substitution(),
    };

    println!("{}", render_payload(&format_compilation(result, &ctx)));
    Ok(())
}

/// Print catalog languages, optionally filtered by substring
pub async fn list_languages(filter: Option<&str>) -> Result<()> {
    let config = BotConfig::from_env();
    let http = http_client()?;
    let catalog = catalog(&config, &http).await?;
    let filter = filter.map(str::to_lowercase);

    let mut shown = 0;
    for (language, compilers) in catalog.languages() {
        if let Some(filter) = &filter {
            if !language.contains(filter.as_str()) {
                continue;
            }
        }
        println!("{}: {}", language, compilers.join(", "));
        shown += 1;
    }

    if shown == 0 {
        println!("No matching languages");
    }
    Ok(())
}

/// Print the grading input and expected output for a level
pub async fn show_expected(level: &str) -> Result<()> {
    let config = BotConfig::from_env();
    let http = http_client()?;
    let validator = GradingValidator::from_config(&config, &http).await;

    if validator.is_empty() {
        bail!("No grading dataset available (set DATASET_BASE_URL or DATASET_REDIS_URL)");
    }

    let (Some(stdin), Some(stdout)) = (
        validator.expected_stdin(level),
        validator.expected_stdout(level),
    ) else {
        bail!(
            "Unknown level '{}'. Available levels: {}",
            level,
            validator.levels().join(", ")
        );
    };

    println!("--- stdin ({} records) ---", validator.record_count(level));
    println!("{}", stdin);
    println!("--- expected stdout ---");
    print!("{}", stdout);
    Ok(())
}

/// Plain-text rendering of a payload for the terminal
pub fn render_payload(payload: &DisplayPayload) -> String {
    let mut out = String::new();
    out.push_str(&payload.title);
    out.push('\n');

    if let Some(description) = &payload.description {
        out.push_str(&unescape_block_delimiters(description));
        out.push('\n');
    }

    for field in &payload.fields {
        out.push_str(&format!(
            "\n[{}]\n{}\n",
            field.name,
            unescape_block_delimiters(field.value.trim_end())
        ));
    }

    if let Some(url) = &payload.url {
        out.push_str(&format!("\nPermalink: {}\n", url));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use compilebot_pipeline::formatter::PayloadField;

    #[test]
    fn test_render_payload() {
        let mut payload = DisplayPayload::notice("Compilation Results:", "done");
        payload.fields.push(PayloadField {
            name: "Program Output".to_string(),
            value: "```\nprint(\"\u{200B}```\")\n```\n".to_string(),
            inline: false,
        });
        payload.url = Some("https://example.org/p/1".to_string());

        let text = render_payload(&payload);

        assert!(text.starts_with("Compilation Results:\ndone\n"));
        assert!(text.contains("[Program Output]\n```\nprint(\"```\")\n```\n"));
        assert!(text.ends_with("Permalink: https://example.org/p/1\n"));
    }

    #[test]
    fn test_render_failure_has_no_fields() {
        let text = render_payload(&DisplayPayload::failure("You must attach codeblocks"));
        assert_eq!(text, "Request failed\nYou must attach codeblocks\n");
    }
}
