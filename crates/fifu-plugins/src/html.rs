//! HTML converter.
//!
//! Finds `href="…"` and `src="…"` attributes and rewrites their values.

use fifu_kernel::plugin::ConverterPlugin;
use fifu_kernel::uri::Uri;
use regex::bytes::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{trace, warn};

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:href|src)="([^"]*)""#).expect("reference pattern is valid")
});

/// Content types handled by [`HtmlConverter`].
pub const HTML_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// Works on raw bytes so pages in any ASCII-compatible charset pass through
/// untouched outside the rewritten attribute values.
#[derive(Debug, Default, Clone)]
pub struct HtmlConverter;

impl HtmlConverter {
    pub fn new() -> Self {
        Self
    }
}

impl ConverterPlugin for HtmlConverter {
    fn name(&self) -> &str {
        "html"
    }

    fn file_types(&self) -> Vec<String> {
        HTML_TYPES.iter().map(|t| t.to_string()).collect()
    }

    fn extract_uris_from_content(&self, base: &Uri, content: &[u8]) -> HashMap<String, Uri> {
        let mut found = HashMap::new();
        for caps in REFERENCE.captures_iter(content) {
            // Values that are not UTF-8 cannot name an identifier.
            let Ok(literal) = std::str::from_utf8(&caps[1]) else {
                continue;
            };
            if literal.is_empty() || found.contains_key(literal) {
                continue;
            }
            let resolved = Uri::resolve(base, &Uri::parse(literal));
            if resolved.is_absolute() {
                trace!(literal = literal, resolved = %resolved, "reference found");
                found.insert(literal.to_string(), resolved);
            }
        }
        found
    }

    fn convert_content(&self, content: &[u8], replacements: &HashMap<String, Uri>) -> Vec<u8> {
        if replacements.is_empty() {
            return content.to_vec();
        }

        let quoted: HashMap<Vec<u8>, Vec<u8>> = replacements
            .iter()
            .map(|(literal, uri)| {
                (
                    format!("\"{literal}\"").into_bytes(),
                    format!("\"{}\"", uri.to_encoded_string()).into_bytes(),
                )
            })
            .collect();

        let mut alternatives: Vec<String> = replacements
            .keys()
            .map(|literal| regex::escape(&format!("\"{literal}\"")))
            .collect();
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let pattern = match Regex::new(&alternatives.join("|")) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(error = %e, references = replacements.len(), "cannot build rewrite pattern, passing content through");
                return content.to_vec();
            }
        };

        pattern
            .replace_all(content, |caps: &Captures<'_>| {
                quoted
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_vec())
            })
            .into_owned()
    }
}
