//! Plain-text description log (`descriptions.txt`)

use super::traits::DescriptionLog;
use crate::types::Photo;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File name used inside the download directory
pub const DESCRIPTIONS_FILE_NAME: &str = "descriptions.txt";

const SEPARATOR: &str = "-------------------";

/// Appends one block per photo to a text file
///
/// ```text
/// Photo ID: p42
/// Description: a lake at dawn
/// Photographer: Alice A.
/// Tags: lake, dawn
/// -------------------
/// ```
///
/// The photographer and tag lines are omitted when the record has none.
#[derive(Debug)]
pub struct FileDescriptionLog {
    path: PathBuf,
    // one writer at a time keeps blocks contiguous
    write_lock: Mutex<()>,
}

impl FileDescriptionLog {
    /// Log appending to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Log at `<dir>/descriptions.txt`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DESCRIPTIONS_FILE_NAME))
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Render the log block for `photo`
pub fn format_entry(photo: &Photo) -> String {
    let mut out = String::new();
    let description = photo
        .description
        .as_deref()
        .or(photo.alt_description.as_deref())
        .unwrap_or("");

    let _ = writeln!(out, "Photo ID: {}", photo.id);
    let _ = writeln!(out, "Description: {}", description);
    if let Some(user) = &photo.user {
        let name = user.name.as_deref().unwrap_or(&user.username);
        let _ = writeln!(out, "Photographer: {}", name);
    }
    if !photo.tags.is_empty() {
        let tags: Vec<&str> = photo.tags.iter().map(|t| t.title.as_str()).collect();
        let _ = writeln!(out, "Tags: {}", tags.join(", "));
    }
    let _ = writeln!(out, "{}", SEPARATOR);
    out
}

#[async_trait]
impl DescriptionLog for FileDescriptionLog {
    async fn append(&self, photo: &Photo) -> crate::Result<()> {
        let entry = format_entry(photo);
        let _guard = self.write_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn photo(value: serde_json::Value) -> Photo {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn entry_lists_all_known_fields() {
        let p = photo(serde_json::json!({
            "id": "p42",
            "description": "a lake at dawn",
            "urls": {},
            "user": {"username": "alice", "name": "Alice A."},
            "tags": [{"title": "lake"}, {"title": "dawn"}]
        }));

        assert_eq!(
            format_entry(&p),
            "Photo ID: p42\nDescription: a lake at dawn\nPhotographer: Alice A.\nTags: lake, dawn\n-------------------\n"
        );
    }

    #[test]
    fn entry_falls_back_to_alt_text_and_skips_missing_sections() {
        let p = photo(serde_json::json!({
            "id": "p7",
            "alt_description": "grey cat",
            "urls": {}
        }));

        assert_eq!(
            format_entry(&p),
            "Photo ID: p7\nDescription: grey cat\n-------------------\n"
        );
    }

    #[tokio::test]
    async fn append_accumulates_blocks() {
        let dir = TempDir::new().unwrap();
        let log = FileDescriptionLog::in_dir(dir.path());

        for id in ["p1", "p2"] {
            let p = photo(serde_json::json!({"id": id, "urls": {}}));
            log.append(&p).await.unwrap();
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.matches(SEPARATOR).count(), 2);
        assert!(content.find("Photo ID: p1").unwrap() < content.find("Photo ID: p2").unwrap());
    }
}
