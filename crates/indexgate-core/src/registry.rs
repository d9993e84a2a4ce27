//! Static index registry.

use std::collections::HashSet;

use thiserror::Error;

use crate::{IndexDefinition, ValidationError};

/// Unknown index code, carrying every registered code for the error payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown index '{code}'")]
pub struct InvalidIndex {
    pub code: String,
    pub available: Vec<String>,
}

/// Immutable mapping from public index code to upstream symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRegistry {
    definitions: Vec<IndexDefinition>,
}

impl IndexRegistry {
    pub fn new(definitions: Vec<IndexDefinition>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(definitions.len());
        for definition in &definitions {
            if !seen.insert(definition.code.as_str()) {
                return Err(ValidationError::DuplicateIndexCode {
                    code: definition.code.clone(),
                });
            }
        }

        Ok(Self { definitions })
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored.
    pub fn resolve(&self, code: &str) -> Result<&IndexDefinition, InvalidIndex> {
        let needle = code.trim().to_ascii_lowercase();
        self.definitions
            .iter()
            .find(|definition| definition.code == needle)
            .ok_or_else(|| InvalidIndex {
                code: code.to_owned(),
                available: self.codes(),
            })
    }

    /// `(code, display_name)` pairs in registration order.
    pub fn list_all(&self) -> Vec<(&str, &str)> {
        self.definitions
            .iter()
            .map(|definition| (definition.code.as_str(), definition.display_name.as_str()))
            .collect()
    }

    pub fn codes(&self) -> Vec<String> {
        self.definitions
            .iter()
            .map(|definition| definition.code.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for IndexRegistry {
    fn default() -> Self {
        let definitions = DEFAULT_INDICES
            .iter()
            .map(|(code, symbol, name)| {
                IndexDefinition::new(code, symbol, *name).expect("seeded index definition is valid")
            })
            .collect();
        Self::new(definitions).expect("seeded index codes are unique")
    }
}

const DEFAULT_INDICES: [(&str, &str, &str); 5] = [
    ("sensex", "^BSESN", "S&P BSE SENSEX"),
    ("nifty50", "^NSEI", "NIFTY 50"),
    ("banknifty", "^NSEBANK", "NIFTY BANK"),
    ("niftyit", "^CNXIT", "NIFTY IT"),
    ("niftynext50", "^NSMIDCP", "NIFTY NEXT 50"),
];
