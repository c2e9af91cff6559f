//! Resource list files.
//!
//! One identifier per line. Whitespace anywhere on a line is ignored, `#`
//! starts a comment, blank lines are skipped:
//!
//! ```text
//! # pages published on both sides
//! http://example.org/index.html
//! http://example.org/news.html   # front page
//! ```

use crate::error::{RuntimeError, RuntimeResult};
use fifu_kernel::uri::Uri;
use std::path::Path;
use tracing::{debug, warn};

/// Parse the contents of a resource list.
pub fn parse_resource_list(text: &str) -> Vec<Uri> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            let entry = compact.split('#').next().unwrap_or_default();
            if entry.is_empty() {
                return None;
            }
            let uri = Uri::parse(entry);
            if uri.is_absolute() {
                debug!(line = index + 1, uri = %uri, "resource listed");
                Some(uri)
            } else {
                warn!(line = index + 1, entry = entry, "skipping invalid resource entry");
                None
            }
        })
        .collect()
}

/// Read and parse a resource list file.
pub fn load_resource_file(path: impl AsRef<Path>) -> RuntimeResult<Vec<Uri>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_resource_list(&text))
}
