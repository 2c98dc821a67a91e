//! Local-first TMC location file lookup (spec §6, §4.17 step 2).
//!
//! Layout: `{base_dir}/tmc/{cid}_{tabcd}.json`, a JSON object mapping
//! stringified LCDs to `[lat, lon, name, prev_lcd, next_lcd]`. `prev`/`next
//! == 0` denote absent linkage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
struct LocalEntry(f64, f64, String, u32, u32);

pub fn local_file_path(base_dir: &Path, cid: u16, tabcd: u16) -> PathBuf {
    base_dir.join("tmc").join(format!("{cid}_{tabcd}.json"))
}

/// Result of a local-file fetch: `None` when the file is missing, empty,
/// or fails to parse as the expected shape — the caller marks the
/// `(cid, tabcd)` pair local-unavailable and falls back to remote.
pub async fn load_local_file(base_dir: &Path, cid: u16, tabcd: u16) -> Option<HashMap<u32, LocalLocation>> {
    let path = local_file_path(base_dir, cid, tabcd);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "local tmc file unavailable");
            return None;
        }
    };

    let parsed: HashMap<String, LocalEntry> = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "local tmc file failed to parse");
            return None;
        }
    };

    let mut out = HashMap::with_capacity(parsed.len());
    for (key, entry) in parsed {
        let Ok(lcd) = key.parse::<u32>() else {
            continue;
        };
        out.insert(
            lcd,
            LocalLocation {
                lat: entry.0,
                lon: entry.1,
                name: entry.2,
                prev_lcd: if entry.3 == 0 { None } else { Some(entry.3) },
                next_lcd: if entry.4 == 0 { None } else { Some(entry.4) },
            },
        );
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalLocation {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub prev_lcd: Option<u32>,
    pub next_lcd: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn write_fixture(dir: &Path, cid: u16, tabcd: u16, body: &str) {
        let path = local_file_path(dir, cid, tabcd);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn missing_file_returns_none() {
        let dir = tempdir();
        let result = load_local_file(dir.path(), 58, 1).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn parses_entries_and_zero_linkage_as_absent() {
        let dir = tempdir();
        write_fixture(
            dir.path(),
            58,
            1,
            r#"{"1": [51.5, -0.1, "Junction 1", 0, 2], "2": [51.6, -0.2, "Junction 2", 1, 0]}"#,
        )
        .await;

        let result = load_local_file(dir.path(), 58, 1).await.expect("parses");
        assert_eq!(result.len(), 2);
        assert_eq!(result[&1].prev_lcd, None);
        assert_eq!(result[&1].next_lcd, Some(2));
        assert_eq!(result[&2].prev_lcd, Some(1));
    }

    #[tokio::test]
    async fn corrupt_file_returns_none() {
        let dir = tempdir();
        write_fixture(dir.path(), 58, 1, "not json").await;
        assert!(load_local_file(dir.path(), 58, 1).await.is_none());
    }

    // Minimal temp-dir helper so tests don't pull in a dev-dependency for it.
    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
    fn tempdir() -> TempDir {
        let mut dir = std::env::temp_dir();
        let unique = format!(
            "rds-resolver-test-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        dir.push(unique);
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }
}
