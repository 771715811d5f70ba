//! Runtime configuration for the overlay.
//!
//! Built from command-line flags (with environment fallbacks) by the CLI.
//! There is no configuration file.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::WrapConfig;

/// Shell used to interpret the command line.
pub const DEFAULT_SHELL: &str = "sh";

/// Interval between display refreshes.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// How long `terminate()` waits for a graceful exit before force-killing.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(1);

/// Screen corner the overlay is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Corner {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub fn is_top(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }

    pub fn is_left(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::BottomLeft)
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        })
    }
}

impl FromStr for Corner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" | "tl" => Ok(Corner::TopLeft),
            "top-right" | "tr" => Ok(Corner::TopRight),
            "bottom-left" | "bl" => Ok(Corner::BottomLeft),
            "bottom-right" | "br" => Ok(Corner::BottomRight),
            other => Err(format!(
                "unknown corner '{other}' (expected top-left, top-right, bottom-left, bottom-right)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub corner: Corner,
    pub wrap: WrapConfig,
    pub shell: String,
    pub refresh_interval: Duration,
    pub terminate_grace: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            corner: Corner::default(),
            wrap: WrapConfig::default(),
            shell: DEFAULT_SHELL.to_string(),
            refresh_interval: REFRESH_INTERVAL,
            terminate_grace: TERMINATE_GRACE,
        }
    }
}
