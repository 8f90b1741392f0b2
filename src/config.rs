//! Core configuration.
//!
//! Options arrive the way agent options do: a single `key=value,key=value`
//! string. Boolean options may be given bare (`vm_classes` means
//! `vm_classes=true`).

use crate::error::ConfigError;

/// Largest accepted breakpoint or tag table capacity.
pub const MAX_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Report runtime-internal classes and their instances to agents.
    pub vm_classes: bool,
    /// Log every posted event at `debug` rather than `trace`.
    pub trace_events: bool,
    /// Initial slot count of the breakpoint table.
    pub breakpoint_capacity: usize,
    /// Initial bucket count of each environment's tag map.
    pub tag_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            vm_classes: false,
            trace_events: false,
            breakpoint_capacity: 16,
            tag_capacity: 64,
        }
    }
}

impl Config {
    pub fn vm_classes(mut self, value: bool) -> Self {
        self.vm_classes = value;
        self
    }

    pub fn trace_events(mut self, value: bool) -> Self {
        self.trace_events = value;
        self
    }

    pub fn breakpoint_capacity(mut self, value: usize) -> Self {
        self.breakpoint_capacity = value.clamp(1, MAX_CAPACITY);
        self
    }

    pub fn tag_capacity(mut self, value: usize) -> Self {
        self.tag_capacity = value.clamp(1, MAX_CAPACITY);
        self
    }

    /// Parses an option string on top of the defaults.
    pub fn from_options(options: &str) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        for item in options.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = match item.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (item, None),
            };
            match key {
                "vm_classes" => config.vm_classes = parse_bool(key, value)?,
                "trace_events" => config.trace_events = parse_bool(key, value)?,
                "breakpoint_capacity" => {
                    config = config.breakpoint_capacity(parse_count(key, value)?);
                }
                "tag_capacity" => config = config.tag_capacity(parse_count(key, value)?),
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            }
        }
        Ok(config)
    }
}

fn parse_bool(key: &str, value: Option<&str>) -> Result<bool, ConfigError> {
    match value {
        None | Some("true") | Some("on") | Some("y") => Ok(true),
        Some("false") | Some("off") | Some("n") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_count(key: &str, value: Option<&str>) -> Result<usize, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingValue(key.to_string()))?;
    let count = value
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;
    if count > MAX_CAPACITY {
        return Err(ConfigError::CapacityTooLarge {
            key: key.to_string(),
            value: count,
            max: MAX_CAPACITY,
        });
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_give_defaults() {
        assert_eq!(Config::from_options("").unwrap(), Config::default());
    }

    #[test]
    fn parses_mixed_options() {
        let config = Config::from_options("vm_classes, trace_events=false,tag_capacity=8").unwrap();
        assert!(config.vm_classes);
        assert!(!config.trace_events);
        assert_eq!(config.tag_capacity, 8);
        assert_eq!(config.breakpoint_capacity, 16);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert_eq!(
            Config::from_options("verbose=1"),
            Err(ConfigError::UnknownKey("verbose".into()))
        );
        assert!(matches!(
            Config::from_options("tag_capacity=zero"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            Config::from_options("breakpoint_capacity"),
            Err(ConfigError::MissingValue("breakpoint_capacity".into()))
        );
    }

    #[test]
    fn capacities_are_bounded() {
        assert_eq!(
            Config::from_options("breakpoint_capacity=1000000000000000"),
            Err(ConfigError::CapacityTooLarge {
                key: "breakpoint_capacity".into(),
                value: 1_000_000_000_000_000,
                max: MAX_CAPACITY,
            })
        );
        assert!(matches!(
            Config::from_options(&format!("tag_capacity={}", usize::MAX)),
            Err(ConfigError::CapacityTooLarge { .. })
        ));
        let config = Config::default().breakpoint_capacity(usize::MAX).tag_capacity(usize::MAX);
        assert_eq!(config.breakpoint_capacity, MAX_CAPACITY);
        assert_eq!(config.tag_capacity, MAX_CAPACITY);
    }
}
