//! JSON file persistence.
//!
//! Both the library cache and the playlist store are kept as single JSON
//! files that are rewritten wholesale on every mutation. Last writer wins;
//! callers serialize their own writes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;

/// Reads and deserializes a JSON file. `Ok(None)` when the file does not
/// exist yet, `Err` when it exists but cannot be parsed.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Serializes a value to pretty-printed JSON, overwriting the file.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing.json");

        let read: Option<Vec<String>> = read_json(&path).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("map.json");

        let mut value = HashMap::new();
        value.insert("key".to_string(), vec![1u32, 2, 3]);

        write_json(&path, &value).await.unwrap();
        let read: HashMap<String, Vec<u32>> = read_json(&path).await.unwrap().unwrap();
        assert_eq!(read, value);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let read: Result<Option<Vec<String>>> = read_json(&path).await;
        assert!(read.is_err());
    }
}
