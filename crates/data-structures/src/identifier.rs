//! Identifier case-folding, as driven by the `DbSettings` resolved in C1.

use std::fmt;

/// How unquoted identifiers are folded before being used as map keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CaseFolding {
    /// Fold to upper case (`DATABASE_TO_UPPER`, the default).
    #[default]
    Upper,
    /// Fold to lower case (`DATABASE_TO_LOWER`).
    Lower,
    /// Leave case as written, but compare case-insensitively
    /// (`CASE_INSENSITIVE_IDENTIFIERS`).
    PreserveCaseInsensitiveCompare,
    /// Leave case as written and compare exactly.
    Preserve,
}

/// A catalog object name, normalized according to a database's
/// [`CaseFolding`] policy so it can be used as a stable map key.
#[derive(Clone, Eq)]
pub struct Identifier {
    display: Box<str>,
    key: Box<str>,
}

impl Identifier {
    pub fn new(raw: &str, folding: CaseFolding) -> Self {
        let key = match folding {
            CaseFolding::Upper => raw.to_uppercase(),
            CaseFolding::Lower => raw.to_lowercase(),
            CaseFolding::PreserveCaseInsensitiveCompare => raw.to_uppercase(),
            CaseFolding::Preserve => raw.to_owned(),
        };
        Self {
            display: raw.into(),
            key: key.into(),
        }
    }

    /// The name as originally supplied, for rendering `CREATE` SQL.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The normalized form used for map lookups and uniqueness checks.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({:?})", self.display)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state)
    }
}

impl std::borrow::Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.key
    }
}
