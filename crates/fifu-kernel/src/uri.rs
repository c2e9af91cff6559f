//! Resource identifiers.
//!
//! [`Uri`] is the key type of every table in the gateway. It is always held
//! percent-decoded and normalized, and two identifiers compare, order and hash
//! by their serialized form so that `http://h/a/./b` and `http://h/a/b` land in
//! the same slot of a map.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

static ABSOLUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(([^:/?#]+):)(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?$")
        .expect("absolute identifier grammar is a valid regex")
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?$")
        .expect("relative identifier grammar is a valid regex")
});

/// Everything outside the RFC 3986 unreserved set is escaped on the wire.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A parsed, percent-decoded and normalized resource identifier.
///
/// Invalid input never fails loudly: it produces a `Uri` with
/// [`is_valid`](Uri::is_valid) returning `false` and every component empty.
#[derive(Debug, Clone, Default)]
pub struct Uri {
    scheme: String,
    authority: String,
    path: String,
    query: String,
    fragment: String,
    valid: bool,
    absolute: bool,
}

impl Uri {
    /// Parse an identifier from text.
    ///
    /// Surrounding whitespace is trimmed and the text is percent-decoded
    /// before being matched against the absolute grammar, then the relative
    /// one. Decoded bytes that are not UTF-8 make the identifier invalid.
    pub fn parse(text: &str) -> Self {
        let decoded = match percent_decode_str(text.trim()).decode_utf8() {
            Ok(decoded) => decoded,
            Err(_) => return Self::invalid(),
        };

        if let Some(caps) = ABSOLUTE.captures(&decoded) {
            let group = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();
            return Self {
                scheme: group(2),
                authority: group(4),
                path: group(5),
                query: group(7),
                fragment: group(9),
                valid: true,
                absolute: true,
            }
            .normalized();
        }

        if let Some(caps) = RELATIVE.captures(&decoded) {
            let group = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();
            return Self {
                scheme: String::new(),
                authority: group(2),
                path: group(3),
                query: group(5),
                fragment: group(7),
                valid: true,
                absolute: false,
            }
            .normalized();
        }

        Self::invalid()
    }

    /// An identifier that matched no grammar.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Resolve `reference` against `base`.
    ///
    /// The result is always absolute when both operands are valid. Either
    /// operand being invalid yields an invalid identifier.
    pub fn resolve(base: &Uri, reference: &Uri) -> Self {
        if !base.valid || !reference.valid {
            return Self::invalid();
        }

        let mut resolved = if reference.absolute {
            Self {
                scheme: reference.scheme.clone(),
                authority: reference.authority.clone(),
                path: reference.path.clone(),
                query: reference.query.clone(),
                ..Self::default()
            }
        } else if !reference.authority.is_empty() {
            // Scheme-relative: only authority and path come from the reference.
            Self {
                scheme: base.scheme.clone(),
                authority: reference.authority.clone(),
                path: reference.path.clone(),
                ..Self::default()
            }
        } else if !reference.path.is_empty() {
            let path = if reference.path.starts_with('/') {
                reference.path.clone()
            } else {
                match base.path.rfind('/') {
                    Some(pos) => format!("{}{}", &base.path[..=pos], reference.path),
                    None => format!("/{}", reference.path),
                }
            };
            Self {
                scheme: base.scheme.clone(),
                authority: base.authority.clone(),
                path,
                query: reference.query.clone(),
                ..Self::default()
            }
        } else {
            // An empty reference contributes nothing but its fragment.
            Self {
                scheme: base.scheme.clone(),
                authority: base.authority.clone(),
                path: base.path.clone(),
                query: base.query.clone(),
                ..Self::default()
            }
        };

        resolved.fragment = reference.fragment.clone();
        resolved.valid = true;
        resolved.absolute = true;
        resolved.normalized()
    }

    /// Return the normalized form of this identifier.
    ///
    /// Repeated slashes are collapsed in the authority and the path, `.` and
    /// `..` segments are removed from the path. Query and fragment are left
    /// untouched. Normalizing twice is the same as normalizing once.
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// In-place variant of [`normalized`](Uri::normalized).
    pub fn normalize(&mut self) {
        if !self.valid {
            return;
        }
        collapse_slashes(&mut self.authority);
        collapse_slashes(&mut self.path);
        compress_path(&mut self.path);
        collapse_slashes(&mut self.path);
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_absolute(&self) -> bool {
        self.valid && self.absolute
    }

    pub fn is_relative(&self) -> bool {
        self.valid && !self.absolute
    }

    /// Serialized form with query and fragment percent-encoded, suitable for
    /// placing on the wire or inside converted content.
    pub fn to_encoded_string(&self) -> String {
        self.render(true)
    }

    /// Copy of this identifier with a different scheme. Used by protocol
    /// plugins whose foreign names mirror the original's hierarchy.
    pub fn with_scheme(&self, scheme: impl Into<String>) -> Self {
        if !self.valid {
            return Self::invalid();
        }
        Self {
            scheme: scheme.into(),
            absolute: true,
            ..self.clone()
        }
    }

    fn render(&self, encoded: bool) -> String {
        if !self.valid {
            return String::new();
        }

        let mut out = String::with_capacity(
            self.scheme.len() + self.authority.len() + self.path.len() + self.query.len() + 8,
        );
        if self.absolute {
            out.push_str(&self.scheme);
            out.push(':');
        }
        if !self.authority.is_empty() {
            out.push_str("//");
            out.push_str(&self.authority);
        }
        out.push_str(&self.path);
        if !self.query.is_empty() {
            out.push('?');
            if encoded {
                out.extend(utf8_percent_encode(&self.query, COMPONENT));
            } else {
                out.push_str(&self.query);
            }
        }
        if !self.fragment.is_empty() {
            out.push('#');
            if encoded {
                out.extend(utf8_percent_encode(&self.fragment, COMPONENT));
            } else {
                out.push_str(&self.fragment);
            }
        }
        out
    }
}

fn collapse_slashes(s: &mut String) {
    while let Some(pos) = s.find("//") {
        s.replace_range(pos..pos + 2, "/");
    }
}

fn compress_path(path: &mut String) {
    if path.ends_with("/.") || path.ends_with("/..") {
        path.push('/');
    }

    while let Some(pos) = path.find("/./") {
        path.replace_range(pos..pos + 3, "/");
    }

    while let Some(pos) = path.find("/../") {
        if pos == 0 {
            path.replace_range(0..4, "/");
            continue;
        }
        // Drop the segment in front of `/../` along with it.
        match path[..pos].rfind('/') {
            Some(prev) => path.replace_range(prev + 1..pos + 4, ""),
            None => path.replace_range(..pos + 4, ""),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl FromStr for Uri {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Uri {}

impl PartialOrd for Uri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl Hash for Uri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl Serialize for Uri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}
