use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_TICKER_LEN: usize = 20;

/// Upstream ticker such as `^NSEI`, `^BSESN` or `BSE-500.BO`.
///
/// Stored uppercase. A single leading `^` marks an index ticker; the rest is
/// ASCII alphanumerics plus `.`, `-` and `=`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let ticker = input.trim().to_ascii_uppercase();
        let body = ticker.strip_prefix('^').unwrap_or(&ticker);
        if body.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if ticker.len() > MAX_TICKER_LEN {
            return Err(ValidationError::SymbolTooLong {
                len: ticker.len(),
                max: MAX_TICKER_LEN,
            });
        }

        let offset = ticker.len() - body.len();
        if let Some((index, ch)) = body
            .char_indices()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '=')))
        {
            return Err(ValidationError::SymbolInvalidChar {
                ch,
                index: index + offset,
            });
        }

        Ok(Self(ticker))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}
