//! MIME type handling

use std::collections::HashMap;
use std::path::Path;

/// Content type for a path: the override map wins over the generic
/// extension table, unknown extensions fall back to octet-stream.
pub fn resolve_mime(path: &Path, overrides: &HashMap<String, String>) -> String {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if let Some(mime) = overrides.get(&ext.to_ascii_lowercase()) {
            return mime.clone();
        }
    }
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}
