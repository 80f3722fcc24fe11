//! Operating modes of the log filter.

use std::fmt;

/// Which suppression rule the filter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Only massive logs are suppressed; ordinary duplicates pass.
    #[default]
    Plain = 0,
    /// Duplicates within the epoch are suppressed, massive logs included.
    Filtering = 1,
}

impl FilterMode {
    /// Short lowercase name, as printed in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Plain => "normal",
            FilterMode::Filtering => "filter",
        }
    }
}

impl From<u8> for FilterMode {
    fn from(value: u8) -> Self {
        match value {
            1 => FilterMode::Filtering,
            _ => FilterMode::Plain,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
