use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RefineryError;

/// Identifier of a single bin. Maps to a sequence file named
/// `<directory>/<id>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinId(String);

impl BinId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Disambiguated id for a bin merged into the final collection during
    /// loop iteration `iteration`. Bins moved before the loop keep their
    /// original id and never go through here.
    pub fn tagged(&self, iteration: u32) -> BinId {
        BinId(format!("{}_{}", self.0, iteration))
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BinId {
    type Err = RefineryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty()
            && !normalized.starts_with('.')
            && !normalized.contains('/')
            && !normalized.contains('\\');
        if !is_valid {
            return Err(RefineryError::InvalidBinId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// File extension of the bin sequence files in a directory. The seed
/// directory uses whatever the upstream binner produced; every refined
/// directory uses the fixed `fna` extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceExt(String);

impl SequenceExt {
    /// Extension of bins written by the refinement tool, and of every bin
    /// copied into the final collection.
    pub fn fna() -> Self {
        Self("fna".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SequenceExt {
    type Err = RefineryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_start_matches('.').to_string();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '_');
        if !is_valid {
            return Err(RefineryError::InvalidExtension(value.to_string()));
        }
        Ok(Self(normalized))
    }
}
