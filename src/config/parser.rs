//! Configuration file parser.
//!
//! Parses TOML-style `key = value` files with a small hand-written parser.
//! Keys are either qualified (`wait.strategy = "polling"`) or scoped by the
//! most recent `[section]` header.

use super::types::*;
use log::*;
use std::{env, fs, io};

pub const ENV_CONFIG_PATH: &str = "WORDLOCK_CONFIG";
pub const ENV_WAIT_STRATEGY: &str = "WORDLOCK_WAIT_STRATEGY";
pub const ENV_POLL_SLICE_MS: &str = "WORDLOCK_POLL_SLICE_MS";

/// Load configuration from a file path.
pub fn load_config(path: &str) -> io::Result<Config> {
    let s = fs::read_to_string(path)?;
    parse_config(&s)
}

/// Parse configuration from a string.
pub fn parse_config(s: &str) -> io::Result<Config> {
    let mut cfg = Config::default();
    let mut current = String::new();

    for (lineno, line) in s.lines().enumerate() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.trim().to_string();
            continue;
        }
        let Some((lhs, rhs)) = line.split_once('=') else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: expected key = value", lineno + 1),
            ));
        };
        let lhs = lhs.trim();
        let val = rhs.trim();

        let (section, key) = match lhs.split_once('.') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (current.as_str(), lhs),
        };

        set_config_value(section, key, val, &mut cfg).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", lineno + 1, e),
            )
        })?;
    }

    Ok(cfg)
}

fn strip_comment(line: &str) -> &str {
    let mut in_str = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_str = !in_str,
            '#' if !in_str => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Set a configuration value based on section, key, and value strings.
fn set_config_value(section: &str, key: &str, val: &str, cfg: &mut Config) -> Result<(), String> {
    macro_rules! parse {
        (s) => {
            val.trim_matches('"').to_string()
        };
        (u) => {
            val.parse::<u64>().map_err(|e| format!("{key}: {e}"))?
        };
    }

    match (section, key) {
        ("wait", "strategy") => cfg.wait.strategy = parse!(s).parse()?,
        ("wait", "poll_slice_ms") => cfg.wait.poll_slice_ms = parse!(u),
        ("", key) => return Err(format!("key {key:?} outside of a section")),
        _ => return Err(format!("unknown key {section}.{key}")),
    }
    Ok(())
}

impl Config {
    /// Build the process configuration from the environment.
    ///
    /// Loads the file named by `WORDLOCK_CONFIG` if set, then applies the
    /// `WORDLOCK_WAIT_STRATEGY` and `WORDLOCK_POLL_SLICE_MS` overrides.
    /// Unusable inputs are logged and skipped.
    pub fn from_env() -> Config {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(path) => load_config(&path).unwrap_or_else(|e| {
                warn!("ignoring config file {}: {}", path, e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };
        cfg.apply_overrides(
            env::var(ENV_WAIT_STRATEGY).ok().as_deref(),
            env::var(ENV_POLL_SLICE_MS).ok().as_deref(),
        );
        cfg
    }

    fn apply_overrides(&mut self, strategy: Option<&str>, poll_slice_ms: Option<&str>) {
        if let Some(v) = strategy {
            match v.parse() {
                Ok(kind) => self.wait.strategy = kind,
                Err(e) => warn!("ignoring {}: {}", ENV_WAIT_STRATEGY, e),
            }
        }
        if let Some(v) = poll_slice_ms {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.wait.poll_slice_ms = ms,
                Err(e) => warn!("ignoring {}={:?}: {}", ENV_POLL_SLICE_MS, v, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.wait.strategy, StrategyKind::Auto);
        assert_eq!(cfg.wait.poll_slice(), Duration::from_millis(1));
    }

    #[test]
    fn section_and_dotted_keys() {
        let cfg = parse_config(
            "# wordlock\n[wait]\nstrategy = \"polling\"   # fallback\npoll_slice_ms = 5\n",
        )
        .unwrap();
        assert_eq!(cfg.wait.strategy, StrategyKind::Polling);
        assert_eq!(cfg.wait.poll_slice_ms, 5);

        let cfg = parse_config("wait.strategy = native").unwrap();
        assert_eq!(cfg.wait.strategy, StrategyKind::Native);
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse_config("[wait]\n\npoll_slice_ms = soon\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().starts_with("line 3:"));

        let err = parse_config("[wait]\nstrategy = \"futex2\"").unwrap_err();
        assert!(err.to_string().contains("futex2"));

        assert!(parse_config("[engine]\ndata_dir = \"x\"").is_err());
        assert!(parse_config("strategy = \"auto\"").is_err());
    }

    #[test]
    fn poll_slice_is_clamped() {
        let mut cfg = Config::default();
        cfg.wait.poll_slice_ms = 0;
        assert_eq!(cfg.wait.poll_slice(), Duration::from_millis(MIN_POLL_SLICE_MS));
        cfg.wait.poll_slice_ms = 1_000_000;
        assert_eq!(cfg.wait.poll_slice(), Duration::from_millis(MAX_POLL_SLICE_MS));
    }

    #[test]
    fn overrides_skip_bad_values() {
        let mut cfg = Config::default();
        cfg.apply_overrides(Some("polling"), Some("7"));
        assert_eq!(cfg.wait.strategy, StrategyKind::Polling);
        assert_eq!(cfg.wait.poll_slice_ms, 7);

        cfg.apply_overrides(Some("bogus"), Some("-3"));
        assert_eq!(cfg.wait.strategy, StrategyKind::Polling);
        assert_eq!(cfg.wait.poll_slice_ms, 7);
    }
}
