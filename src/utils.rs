//! Utility functions for snapshot files, naming and token masking

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix for in-progress files (`photo.jpg` -> `photo.jpg.part`)
pub const TEMP_SUFFIX: &str = ".part";

/// Path of the temp file used while producing `final_path`
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use unsplash_dl::utils::temp_path;
///
/// assert_eq!(temp_path(Path::new("alice_p1.jpg")), Path::new("alice_p1.jpg.part"));
/// ```
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Deterministic on-disk file name of a photo: `<username>_<photo id>.jpg`
///
/// The name is what lets a resumed session treat the disk as ground truth,
/// so it must never depend on anything but the username and the photo id.
pub fn photo_file_name(username: &str, photo_id: &str) -> String {
    format!("{}_{}.jpg", sanitize_component(username), sanitize_component(photo_id))
}

fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Masked rendering of a secret token for logs: first 6 and last 4 characters
///
/// ```
/// use unsplash_dl::utils::mask_token;
///
/// assert_eq!(mask_token("abcdefghijklmnop"), "abcdef***mnop");
/// assert_eq!(mask_token("short"), "***");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 8 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it
///
/// The document is written to a sibling temp file, synced, then renamed over
/// the destination, so readers only ever see the previous or the new snapshot.
///
/// # Errors
///
/// Returns [`Error::Persistence`] for any filesystem failure and
/// [`Error::Serialization`] if the value cannot be encoded.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let persistence = |source: std::io::Error| Error::Persistence {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(persistence)?;
    }

    let tmp = temp_path(path);
    let mut file = std::fs::File::create(&tmp).map_err(persistence)?;
    file.write_all(&json).map_err(persistence)?;
    file.sync_all().map_err(persistence)?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        persistence(e)
    })
}

/// Read a JSON snapshot, returning `Ok(None)` when the file does not exist
///
/// # Errors
///
/// Returns [`Error::Io`] if the file exists but cannot be read, and
/// [`Error::Serialization`] if it is not a valid document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}
