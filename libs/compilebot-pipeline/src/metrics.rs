// Prometheus counters for compilation statistics

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref COMPILATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "compilebot_compilations_total",
        "Compilation results shown to users",
        &["language", "outcome"]
    )
    .expect("compilations counter registers once");
    pub static ref FIX_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        "compilebot_fix_attempts_total",
        "Remote calls made with a substituted compiler or options"
    )
    .expect("fix attempts counter registers once");
    pub static ref PIPELINE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "compilebot_pipeline_errors_total",
        "Invocations that ended in an error reply",
        &["kind"]
    )
    .expect("pipeline errors counter registers once");
}

/// `language` must come from the catalog, never raw user input
pub fn record_compilation(language: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    COMPILATIONS_TOTAL
        .with_label_values(&[&language.to_lowercase(), outcome])
        .inc();
}

pub fn record_fix_attempt() {
    FIX_ATTEMPTS_TOTAL.inc();
}

pub fn record_error(kind: &str) {
    PIPELINE_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

/// Text exposition of the default registry
pub fn encode_text() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
