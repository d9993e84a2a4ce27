use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Bar width requested from the chart API.
///
/// Realtime reads use minute bars and fall back to daily bars; historical
/// reads are always daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Value of the chart API's `interval` query parameter.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::OneDay => "1d",
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
