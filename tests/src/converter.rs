use fifu_kernel::plugin::ConverterPlugin;
use fifu_kernel::uri::Uri;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A mock converter.
///
/// Every whitespace-separated token starting with `link:` is a reference;
/// the text after the prefix is resolved against the message identifier.
/// Conversion replaces tokens verbatim. Each conversion's replacement map is
/// recorded.
#[derive(Clone)]
pub struct MockConverter {
    types: Vec<String>,
    /// Replacement maps passed to `convert_content`, in call order
    pub call_history: Arc<RwLock<Vec<HashMap<String, Uri>>>>,
}

impl MockConverter {
    pub const PREFIX: &'static str = "link:";

    pub fn new(types: &[&str]) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            call_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn history(&self) -> Vec<HashMap<String, Uri>> {
        self.call_history.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_history.read().len()
    }
}

impl ConverterPlugin for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    fn file_types(&self) -> Vec<String> {
        self.types.clone()
    }

    fn extract_uris_from_content(&self, base: &Uri, content: &[u8]) -> HashMap<String, Uri> {
        String::from_utf8_lossy(content)
            .split_whitespace()
            .filter_map(|token| {
                let reference = token.strip_prefix(Self::PREFIX)?;
                let resolved = Uri::resolve(base, &Uri::parse(reference));
                resolved.is_absolute().then(|| (token.to_string(), resolved))
            })
            .collect()
    }

    fn convert_content(&self, content: &[u8], replacements: &HashMap<String, Uri>) -> Vec<u8> {
        self.call_history.write().push(replacements.clone());
        let mut text = String::from_utf8_lossy(content).into_owned();
        for (literal, uri) in replacements {
            text = text.replace(literal.as_str(), &uri.to_string());
        }
        text.into_bytes()
    }
}
