//! Grading validator
//!
//! Holds the per-level input/output records of the validation dataset. The
//! dataset is fetched once when the validator is built; a failed fetch leaves
//! the validator empty so grading quietly switches off instead of breaking
//! compilation.
//!
//! Dataset documents:
//! - key document: a string, or an object whose string values concatenate
//!   into the access key
//! - records document: an object (or array) of entries shaped
//!   `{ "key": "...", "levels": { "<level>": [ { "input", "output" } ] } }`;
//!   only entries whose `key` equals the access key are used

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use compilebot_common::config::BotConfig;
use compilebot_common::redis as dataset_keys;
use compilebot_common::types::GradingRecord;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::formatter::strip_control_sequences;

/// Read-only access to the validation dataset store
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch_key(&self) -> Result<String, DatasetError>;
    async fn fetch_records(&self) -> Result<Value, DatasetError>;
}

/// Dataset served as `key.json` and `valid.json` under a base url
#[derive(Debug, Clone)]
pub struct HttpDatasetSource {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpDatasetSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn get_json(&self, document: &str) -> Result<Value, DatasetError> {
        let url = format!("{}/{}", self.base_url, document);
        let value = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl DatasetSource for HttpDatasetSource {
    async fn fetch_key(&self) -> Result<String, DatasetError> {
        key_from_document(&self.get_json("key.json").await?)
    }

    async fn fetch_records(&self) -> Result<Value, DatasetError> {
        self.get_json("valid.json").await
    }
}

/// Dataset kept in Redis under the `compilebot:dataset:*` keys
#[derive(Clone)]
pub struct RedisDatasetSource {
    conn: redis::aio::ConnectionManager,
}

impl RedisDatasetSource {
    pub async fn connect(url: &str) -> Result<Self, DatasetError> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl DatasetSource for RedisDatasetSource {
    async fn fetch_key(&self) -> Result<String, DatasetError> {
        let mut conn = self.conn.clone();
        let raw = dataset_keys::fetch_access_key(&mut conn)
            .await?
            .ok_or(DatasetError::Missing("access key"))?;

        // The key may be stored bare or as a JSON document
        match serde_json::from_str::<Value>(&raw) {
            Ok(document) => key_from_document(&document),
            Err(_) => Ok(raw),
        }
    }

    async fn fetch_records(&self) -> Result<Value, DatasetError> {
        let mut conn = self.conn.clone();
        dataset_keys::fetch_records(&mut conn)
            .await?
            .ok_or(DatasetError::Missing("records"))
    }
}

/// Access key from a key document
pub fn key_from_document(document: &Value) -> Result<String, DatasetError> {
    match document {
        Value::String(key) => Ok(key.clone()),
        Value::Object(map) => Ok(map
            .values()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .concat()),
        Value::Null => Err(DatasetError::Missing("access key")),
        other => Err(DatasetError::Malformed(format!(
            "unexpected key document: {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct DatasetEntry {
    key: String,
    #[serde(default)]
    levels: BTreeMap<String, Vec<GradingRecord>>,
}

/// Level records of every entry unlocked by `key`; level names are lowercased
pub fn records_for_key(
    document: &Value,
    key: &str,
) -> Result<HashMap<String, Vec<GradingRecord>>, DatasetError> {
    let entries: Vec<&Value> = match document {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        Value::Null => return Err(DatasetError::Missing("records")),
        other => {
            return Err(DatasetError::Malformed(format!(
                "unexpected records document: {}",
                other
            )))
        }
    };

    let mut levels = HashMap::new();
    for raw in entries {
        let entry: DatasetEntry = match serde_json::from_value(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping malformed dataset entry");
                continue;
            }
        };
        if entry.key != key {
            continue;
        }
        for (level, records) in entry.levels {
            levels.insert(level.to_lowercase(), records);
        }
    }

    Ok(levels)
}

/// Expected stdin/stdout per grading level
#[derive(Debug, Clone, Default)]
pub struct GradingValidator {
    levels: HashMap<String, Vec<GradingRecord>>,
}

impl GradingValidator {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_levels(levels: HashMap<String, Vec<GradingRecord>>) -> Self {
        let levels = levels
            .into_iter()
            .map(|(level, records)| (level.to_lowercase(), records))
            .collect();
        Self { levels }
    }

    /// Fetch the dataset; any failure is logged and yields an empty validator
    pub async fn load(source: &dyn DatasetSource) -> Self {
        match Self::try_load(source).await {
            Ok(validator) => {
                info!(levels = validator.levels.len(), "Validation dataset loaded");
                validator
            }
            Err(e) => {
                warn!(error = %e, "Validation dataset unavailable; grading disabled");
                Self::empty()
            }
        }
    }

    /// Redis dataset first, then HTTP; neither configured means no grading
    pub async fn from_config(config: &BotConfig, http: &reqwest::Client) -> Self {
        if let Some(url) = &config.dataset_redis_url {
            match RedisDatasetSource::connect(url).await {
                Ok(source) => return Self::load(&source).await,
                Err(e) => warn!(error = %e, "Dataset redis unavailable"),
            }
        }

        if let Some(base_url) = &config.dataset_base_url {
            let source =
                HttpDatasetSource::new(http.clone(), base_url.clone(), config.fetch_timeout);
            return Self::load(&source).await;
        }

        info!("No grading dataset configured");
        Self::empty()
    }

    pub async fn try_load(source: &dyn DatasetSource) -> Result<Self, DatasetError> {
        let key = source.fetch_key().await?;
        let document = source.fetch_records().await?;
        Ok(Self {
            levels: records_for_key(&document, &key)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> Vec<&str> {
        let mut levels: Vec<&str> = self.levels.keys().map(String::as_str).collect();
        levels.sort_unstable();
        levels
    }

    fn records(&self, level: &str) -> Option<&[GradingRecord]> {
        self.levels.get(&level.to_lowercase()).map(Vec::as_slice)
    }

    pub fn record_count(&self, level: &str) -> usize {
        self.records(level).map_or(0, <[GradingRecord]>::len)
    }

    /// Record inputs joined by newlines, no newline after the last
    pub fn expected_stdin(&self, level: &str) -> Option<String> {
        self.records(level).map(|records| {
            records
                .iter()
                .map(|r| r.input.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    /// Record outputs, each followed by a newline
    pub fn expected_stdout(&self, level: &str) -> Option<String> {
        self.records(level).map(|records| {
            records.iter().fold(String::new(), |mut acc, r| {
                acc.push_str(&r.output);
                acc.push('\n');
                acc
            })
        })
    }

    /// Exact comparison of program output against the level's expected stdout.
    ///
    /// `None` when the level has no records.
    pub fn grade(&self, level: &str, program_output: Option<&str>) -> Option<bool> {
        let expected = self.expected_stdout(level)?;
        let actual = strip_control_sequences(program_output.unwrap_or(""));
        Some(actual == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDatasetSource;
    use serde_json::json;

    fn record(input: &str, output: &str) -> GradingRecord {
        GradingRecord {
            input: input.to_string(),
            output: output.to_string(),
        }
    }

    fn validator() -> GradingValidator {
        let mut levels = HashMap::new();
        levels.insert("1".to_string(), vec![record("x", "a"), record("y", "b")]);
        levels.insert("Boss".to_string(), vec![]);
        GradingValidator::from_levels(levels)
    }

    #[test]
    fn test_expected_stdin_and_stdout() {
        let v = validator();
        assert_eq!(v.expected_stdout("1").as_deref(), Some("a\nb\n"));
        assert_eq!(v.expected_stdin("1").as_deref(), Some("x\ny"));
        assert_eq!(v.record_count("1"), 2);
    }

    #[test]
    fn test_unknown_and_empty_levels() {
        let v = validator();
        assert!(v.expected_stdin("9").is_none());
        assert!(v.grade("9", Some("a\nb\n")).is_none());
        assert_eq!(v.expected_stdout("boss").as_deref(), Some(""));
        assert_eq!(v.expected_stdin("BOSS").as_deref(), Some(""));
    }

    #[test]
    fn test_grade_is_exact() {
        let v = validator();
        assert_eq!(v.grade("1", Some("a\nb\n")), Some(true));
        assert_eq!(v.grade("1", Some("\x1b[1ma\x1b[0m\nb\n")), Some(true));
        assert_eq!(v.grade("1", Some("a\nb")), Some(false));
        assert_eq!(v.grade("1", Some(" a\nb\n")), Some(false));
        assert_eq!(v.grade("1", None), Some(false));
    }

    #[test]
    fn test_grade_keeps_tabs() {
        let mut levels = HashMap::new();
        levels.insert("1".to_string(), vec![record("3", "a\tb")]);
        let v = GradingValidator::from_levels(levels);

        assert_eq!(v.grade("1", Some("a\tb\n")), Some(true));
        assert_eq!(v.grade("1", Some("\x1b[32ma\x1b[0m\tb\n")), Some(true));
        assert_eq!(v.grade("1", Some("ab\n")), Some(false));
    }

    #[test]
    fn test_key_documents() {
        assert_eq!(key_from_document(&json!("abc")).unwrap(), "abc");
        assert_eq!(
            key_from_document(&json!({ "-Ma": "ab", "-Mb": "cd" })).unwrap(),
            "abcd"
        );
        assert!(key_from_document(&Value::Null).is_err());
        assert!(key_from_document(&json!(42)).is_err());
    }

    #[test]
    fn test_records_filtered_by_key() {
        let document = json!({
            "-A": { "key": "secret", "levels": { "1": [ { "input": "2", "output": "4" } ] } },
            "-B": { "key": "other", "levels": { "2": [ { "input": "3", "output": "9" } ] } },
            "-C": { "broken": true }
        });
        let levels = records_for_key(&document, "secret").unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels["1"], vec![record("2", "4")]);
    }

    #[tokio::test]
    async fn test_load_from_source() {
        let source = FakeDatasetSource::ok(
            json!({ "-K": "sec", "-L": "ret" }),
            json!([ { "key": "secret", "levels": { "3": [ { "input": "1", "output": "1" } ] } } ]),
        );
        let v = GradingValidator::load(&source).await;
        assert_eq!(v.levels(), vec!["3"]);
        assert_eq!(v.expected_stdout("3").as_deref(), Some("1\n"));
    }

    #[tokio::test]
    async fn test_load_failure_leaves_cache_empty() {
        let source = FakeDatasetSource::failing();
        let v = GradingValidator::load(&source).await;
        assert!(v.is_empty());
        assert!(v.expected_stdin("1").is_none());
    }

    #[tokio::test]
    async fn test_http_source() {
        use axum::{routing::get, Json, Router};

        let router = Router::new()
            .route("/key.json", get(|| async { Json(json!({ "-X": "k1" })) }))
            .route(
                "/valid.json",
                get(|| async {
                    Json(json!({
                        "-Y": { "key": "k1", "levels": { "1": [ { "input": "x", "output": "a" } ] } }
                    }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let source = HttpDatasetSource::new(
            reqwest::Client::new(),
            format!("http://{}/", addr),
            Duration::from_secs(5),
        );
        let v = GradingValidator::try_load(&source).await.unwrap();
        assert_eq!(v.expected_stdin("1").as_deref(), Some("x"));
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_source() {
        let source = RedisDatasetSource::connect("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");
        let _ = GradingValidator::try_load(&source).await;
    }
}
