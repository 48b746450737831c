//! Best-effort dump of raw provider responses to
//! `{dir}/{endpoint}/{timestamp}_{suffix}.json` for offline analysis.
//!
//! Errors are logged and swallowed; saving must never interrupt a poll.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

/// Write `bytes` below `dir`.
///
/// - `endpoint`: sub-directory name, e.g. `"token"` or `"devices"`.
/// - `suffix`: appended after the timestamp, e.g. a device ID. Pass `""` to omit.
///
/// Returns the written path, or `None` if anything failed.
pub async fn save(dir: &Path, endpoint: &str, suffix: &str, bytes: &[u8]) -> Option<PathBuf> {
    let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let filename = if suffix.is_empty() {
        format!("{ts}.json")
    } else {
        format!("{ts}_{}.json", sanitize(suffix))
    };

    let dir = dir.join(endpoint);
    let path = dir.join(filename);

    if let Err(e) = fs::create_dir_all(&dir).await {
        warn!(path = %path.display(), error = %e, "response_store: failed to create directory");
        return None;
    }

    // Pretty-print valid JSON, keep anything else verbatim.
    let content = serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .and_then(|v| serde_json::to_vec_pretty(&v).ok())
        .unwrap_or_else(|| bytes.to_vec());

    match fs::write(&path, &content).await {
        Ok(()) => {
            debug!(path = %path.display(), bytes = content.len(), "response_store: saved");
            Some(path)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "response_store: failed to write response file");
            None
        }
    }
}

/// Device ids are opaque; keep them from escaping the target directory.
fn sanitize(suffix: &str) -> String {
    suffix
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
