//! # Output Configuration
//!
//! Decides whether progress lines printed by the `castor` commands use emoji
//! or plain bracketed markers such as `[OK]`.
//!
//! `--color=always` and `--color=never` win outright. In `auto` mode colours
//! are off when `NO_COLOR` is set (any value), when `CLICOLOR=0` or when
//! `TERM=dumb`; `CLICOLOR_FORCE` turns them on even without a terminal.
//! Otherwise the `console` crate's terminal detection decides.
//!
//! ```rust,ignore
//! use castor::output::{emoji, OutputConfig};
//!
//! let out = OutputConfig::from_env_and_flag("auto");
//! println!("{} Froze 3 entries", emoji(&out, "✅", "[OK]"));
//! ```

use std::env;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the `--color` flag (`always`, `never` or `auto`) and the
    /// process environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => auto_color(
                |name| env::var(name).ok(),
                || console::Term::stdout().features().colors_supported(),
            ),
        };
        Self { use_color }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `auto` colour decision from an environment lookup and a terminal probe.
fn auto_color<E, T>(var: E, terminal_supports_color: T) -> bool
where
    E: Fn(&str) -> Option<String>,
    T: FnOnce() -> bool,
{
    if var("NO_COLOR").is_some() {
        return false;
    }
    if var("CLICOLOR").is_some_and(|v| v == "0") {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    if var("TERM").is_some_and(|v| v == "dumb") {
        return false;
    }
    terminal_supports_color()
}

/// `emoji_str` when colours are on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}
