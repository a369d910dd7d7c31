//! Build mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether a build targets development or production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Source maps on, no minification
    #[default]
    Development,

    /// Minified output, no source maps
    Production,
}

impl Mode {
    /// Whether source maps are written next to compiled assets.
    pub fn source_maps(self) -> bool {
        self == Mode::Development
    }

    /// Whether compiled assets are minified.
    pub fn minify(self) -> bool {
        self == Mode::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!(
                "unknown mode '{}', expected 'development' or 'production'",
                other
            )),
        }
    }
}
