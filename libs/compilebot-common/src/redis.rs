use redis::{AsyncCommands, RedisResult};

/// Redis semantics for the validation dataset store
/// The bot only reads these keys; the key-setting feature writes them

pub const DATASET_PREFIX: &str = "compilebot:dataset";

/// Key holding the active access key (plain string or JSON document)
pub fn access_key_name() -> String {
    format!("{}:key", DATASET_PREFIX)
}

/// Key holding the records document, same shape as the HTTP store's `valid.json`
pub fn records_key_name() -> String {
    format!("{}:valid", DATASET_PREFIX)
}

/// Read the raw access key document
pub async fn fetch_access_key(
    conn: &mut redis::aio::ConnectionManager,
) -> RedisResult<Option<String>> {
    conn.get(access_key_name()).await
}

/// Read and decode the records document
pub async fn fetch_records(
    conn: &mut redis::aio::ConnectionManager,
) -> RedisResult<Option<serde_json::Value>> {
    let payload: Option<String> = conn.get(records_key_name()).await?;

    match payload {
        Some(data) => {
            let document = serde_json::from_str(&data).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(document))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_naming() {
        assert_eq!(access_key_name(), "compilebot:dataset:key");
        assert_eq!(records_key_name(), "compilebot:dataset:valid");
    }

    #[test]
    fn test_keys_share_prefix() {
        assert!(access_key_name().starts_with(DATASET_PREFIX));
        assert!(records_key_name().starts_with(DATASET_PREFIX));
        assert_ne!(access_key_name(), records_key_name());
    }
}
