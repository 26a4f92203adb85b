/// Request Builder + Fixer
///
/// **Core Responsibility:**
/// Build the initial `CompilationRequest` from catalog-resolved input, then
/// run it through a bounded, ordered list of compiler/option substitutions
/// when the backend rejects an option.
///
/// **Retry Rules:**
/// - Transport/parse failures end the run immediately (not the user's fault)
/// - Only a non-zero exit whose messages match a known option error is retried
/// - Candidates are tried one at a time, in rank order, never in parallel
/// - When every candidate fails, the last failing result is returned as is

use compilebot_common::types::{split_option_tokens, CompilationRequest};
use tracing::{info, instrument, warn};

use crate::catalog::{CompilerCatalog, CompilerCandidate, FixCandidate};
use crate::client::{CompilationBackend, CompilationResult};
use crate::error::{RemoteServiceError, ValidationError};
use crate::metrics;

/// Compiler messages that mark a failure as caused by the option set
pub const RECOVERABLE_PATTERNS: &[&str] = &[
    "unrecognized option",
    "unrecognized command-line option",
    "unrecognized command line option",
    "unrecognised option",
    "unknown argument",
    "unknown option",
    "invalid option",
    "unsupported option",
];

/// Build the first request for an invocation.
///
/// `language_or_compiler` must resolve in the catalog; a language maps to its
/// preferred compiler.
pub fn build_request(
    catalog: &CompilerCatalog,
    language_or_compiler: &str,
    code: String,
    stdin: Option<String>,
    options: Option<String>,
) -> Result<CompilationRequest, ValidationError> {
    let candidate = catalog
        .resolve(language_or_compiler)
        .ok_or_else(|| ValidationError::UnknownLanguage(language_or_compiler.to_string()))?;

    Ok(CompilationRequest::new(code, candidate.compiler_id.clone())
        .with_stdin(stdin)
        .with_options(options))
}

/// Whether a failed result is worth retrying with other options
pub fn is_recoverable(result: &CompilationResult) -> bool {
    match result.status_code() {
        Some(code) if code != 0 => {}
        _ => return false,
    }

    // Program output is the user's own text and never blames the options
    result
        .compiler_message()
        .map(str::to_lowercase)
        .is_some_and(|message| RECOVERABLE_PATTERNS.iter().any(|p| message.contains(p)))
}

/// Ranked compiler/option pairs for one invocation, initial request first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixPlan {
    candidates: Vec<FixCandidate>,
}

impl FixPlan {
    /// Plan for `request`, capped at `max_attempts` entries.
    ///
    /// Order: the request itself, configured fixes for its compiler, the same
    /// compiler with only accepted options, then sibling compilers of the same
    /// language with the options each accepts.
    pub fn for_request(
        catalog: &CompilerCatalog,
        request: &CompilationRequest,
        max_attempts: usize,
    ) -> Self {
        let initial = FixCandidate {
            compiler: request.compiler().to_string(),
            options: request.options().map(str::to_string),
        };
        let mut candidates = vec![initial];

        candidates.extend(catalog.fix_candidates(request.compiler()).iter().cloned());

        if let Some(current) = catalog.resolve(request.compiler()) {
            candidates.push(FixCandidate {
                compiler: current.compiler_id.clone(),
                options: accepted_subset(current, request.options()),
            });
        }

        for sibling in catalog.siblings(request.compiler()) {
            candidates.push(FixCandidate {
                compiler: sibling.compiler_id.clone(),
                options: accepted_subset(sibling, request.options()),
            });
        }

        let mut plan = Self::from_candidates(candidates);
        plan.candidates.truncate(max_attempts.max(1));
        plan
    }

    /// Plan from an explicit list; duplicates are dropped, order kept
    pub fn from_candidates(candidates: Vec<FixCandidate>) -> Self {
        let mut unique: Vec<FixCandidate> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let duplicate = unique.iter().any(|seen| {
                seen.compiler.eq_ignore_ascii_case(&candidate.compiler)
                    && seen.options == candidate.options
            });
            if !duplicate {
                unique.push(candidate);
            }
        }
        Self { candidates: unique }
    }

    pub fn candidates(&self) -> &[FixCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

fn accepted_subset(candidate: &CompilerCandidate, options: Option<&str>) -> Option<String> {
    let kept: Vec<&str> = options
        .map(split_option_tokens)
        .unwrap_or_default()
        .into_iter()
        .filter(|token| candidate.accepts(token))
        .collect();
    (!kept.is_empty()).then(|| kept.join(" "))
}

/// One remote call made by the fixer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixAttempt {
    pub request: CompilationRequest,
    pub result: CompilationResult,
}

/// Every attempt of a run; the last one is the reported outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    attempts: Vec<FixAttempt>,
}

impl CompileReport {
    pub fn attempts(&self) -> &[FixAttempt] {
        &self.attempts
    }

    pub fn final_attempt(&self) -> &FixAttempt {
        // A report is only built after at least one call
        &self.attempts[self.attempts.len() - 1]
    }

    pub fn result(&self) -> &CompilationResult {
        &self.final_attempt().result
    }

    pub fn request(&self) -> &CompilationRequest {
        &self.final_attempt().request
    }

    /// True when the reported result came from a substituted request
    pub fn was_fixed(&self) -> bool {
        self.attempts.len() > 1
    }

    /// Human-readable note on what the fixer changed, if anything
    pub fn substitution(&self) -> Option<String> {
        if !self.was_fixed() {
            return None;
        }
        let request = self.request();
        Some(match request.options() {
            Some(options) => format!(
                "Compiled with {} ({}) after the requested options were rejected",
                request.compiler(),
                options
            ),
            None => format!(
                "Compiled with {} after the requested options were rejected",
                request.compiler()
            ),
        })
    }
}

/// Runs requests through their fix plans
#[derive(Debug, Clone)]
pub struct Fixer {
    max_attempts: usize,
}

impl Fixer {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Compile `request`, substituting catalog alternatives on option errors
    pub async fn compile(
        &self,
        backend: &dyn CompilationBackend,
        catalog: &CompilerCatalog,
        request: &CompilationRequest,
    ) -> Result<CompileReport, RemoteServiceError> {
        let plan = FixPlan::for_request(catalog, request, self.max_attempts);
        self.run(backend, request, &plan).await
    }

    /// Try the plan's candidates in order against `base`.
    #[instrument(skip_all, fields(compiler = %base.compiler(), candidates = plan.len()))]
    pub async fn run(
        &self,
        backend: &dyn CompilationBackend,
        base: &CompilationRequest,
        plan: &FixPlan,
    ) -> Result<CompileReport, RemoteServiceError> {
        let mut attempts: Vec<FixAttempt> = Vec::new();
        let candidates = if plan.is_empty() {
            vec![FixCandidate {
                compiler: base.compiler().to_string(),
                options: base.options().map(str::to_string),
            }]
        } else {
            plan.candidates().to_vec()
        };

        for (rank, candidate) in candidates.iter().enumerate() {
            let request = if rank == 0 {
                base.clone()
            } else {
                metrics::record_fix_attempt();
                info!(
                    rank = rank,
                    compiler = %candidate.compiler,
                    options = ?candidate.options,
                    "Retrying with fix candidate"
                );
                base.with_substitution(&candidate.compiler, candidate.options.clone())
            };

            let result = backend.submit(&request).await?;
            let done = result.is_success() || !is_recoverable(&result);
            attempts.push(FixAttempt { request, result });

            if done {
                break;
            }
        }

        let report = CompileReport { attempts };
        if !report.result().is_success() && is_recoverable(report.result()) {
            warn!(
                attempts = report.attempts().len(),
                "Fix candidates exhausted; reporting last failure"
            );
        }
        Ok(report)
    }
}
