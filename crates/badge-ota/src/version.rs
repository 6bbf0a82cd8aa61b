//! Firmware version strings and their ordering
//!
//! Release tags are compared with [`VersionOrdering::Semantic`] by default.
//! [`VersionOrdering::Lexical`] keeps plain string comparison, which orders
//! `"1.10.0"` before `"1.9.0"`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Version reported by firmware built without a recorded git hash
pub const UNKNOWN_VERSION_SENTINEL: &str = "HEAD-HASH-NOTFOUND";

/// Label shown in place of [`UNKNOWN_VERSION_SENTINEL`]
pub const CUSTOM_VERSION_LABEL: &str = "Custom";

/// How two version strings are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrdering {
    /// Byte-wise string comparison
    Lexical,
    /// Semver precedence, falling back to numeric dotted components
    #[default]
    Semantic,
}

impl VersionOrdering {
    /// Compare two version strings
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            VersionOrdering::Lexical => a.cmp(b),
            VersionOrdering::Semantic => compare_semantic(a, b),
        }
    }

    /// Whether `discovered` should replace `current`
    ///
    /// Under [`VersionOrdering::Semantic`] a custom build has no comparable
    /// version, so any release is newer. [`VersionOrdering::Lexical`] compares
    /// the label like any other string.
    pub fn is_newer(self, discovered: &str, current: &str) -> bool {
        let custom = current == CUSTOM_VERSION_LABEL || current == UNKNOWN_VERSION_SENTINEL;
        if custom && self == VersionOrdering::Semantic {
            return true;
        }
        self.compare(discovered, current) == Ordering::Greater
    }
}

/// Map the raw firmware version to the label shown to the user
pub fn display_version(raw: &str) -> String {
    if raw == UNKNOWN_VERSION_SENTINEL || raw.is_empty() {
        CUSTOM_VERSION_LABEL.to_string()
    } else {
        raw.to_string()
    }
}

fn strip_prefix(v: &str) -> &str {
    let v = v.trim();
    v.strip_prefix(['v', 'V']).unwrap_or(v)
}

fn compare_semantic(a: &str, b: &str) -> Ordering {
    let (a, b) = (strip_prefix(a), strip_prefix(b));
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp_precedence(&vb),
        _ => compare_components(a, b),
    }
}

fn compare_components(a: &str, b: &str) -> Ordering {
    let separators = ['.', '-', '+'];
    let mut left = a.split(separators);
    let mut right = b.split(separators);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
