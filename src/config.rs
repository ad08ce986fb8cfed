//! Configuration access for telemetry setup.
//!
//! The configuration source is an external collaborator: this crate only
//! needs path-based typed lookups with defaults. Any nested key-value store
//! can implement [`Config`]; [`JsonConfig`] adapts a [`serde_json::Value`]
//! tree, which is how tests and most embedders wire it up.

use std::collections::BTreeMap;
use std::time::Duration;

/// Path-based typed accessors over a nested configuration tree.
///
/// Paths are dot-separated (`"telemetry.otlp.endpoint"`). Every getter other
/// than [`Config::get_str`] and [`Config::get_str_map`] takes a default that
/// is returned when the key is absent or has an incompatible type.
pub trait Config: Send + Sync {
    /// Look up a boolean value.
    fn get_bool(&self, path: &str, default: bool) -> bool;

    /// Look up a string value. Returns `None` when absent.
    fn get_str(&self, path: &str) -> Option<String>;

    /// Look up a floating-point value.
    fn get_f64(&self, path: &str, default: f64) -> f64;

    /// Look up an unsigned integer value.
    fn get_u64(&self, path: &str, default: u64) -> u64;

    /// Look up a duration value.
    ///
    /// Accepts a bare number (seconds) or a string with a unit suffix
    /// (`"250ms"`, `"5s"`, `"1m"`, `"1h"`).
    fn get_duration(&self, path: &str, default: Duration) -> Duration;

    /// Look up a string-to-string map. Returns an empty map when absent.
    fn get_str_map(&self, path: &str) -> BTreeMap<String, String>;
}

/// [`Config`] implementation backed by a [`serde_json::Value`] tree.
#[derive(Debug, Clone)]
pub struct JsonConfig {
    root: serde_json::Value,
}

impl JsonConfig {
    /// Wrap a parsed JSON document.
    pub fn new(root: serde_json::Value) -> Self {
        Self { root }
    }

    /// Parse a JSON string into a config tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid JSON.
    pub fn from_str(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    fn lookup(&self, path: &str) -> Option<&serde_json::Value> {
        let mut node = &self.root;
        for segment in path.split('.') {
            node = node.get(segment)?;
        }
        Some(node)
    }
}

impl Config for JsonConfig {
    fn get_bool(&self, path: &str, default: bool) -> bool {
        self.lookup(path).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    fn get_str(&self, path: &str) -> Option<String> {
        self.lookup(path).and_then(|v| v.as_str()).map(str::to_string)
    }

    fn get_f64(&self, path: &str, default: f64) -> f64 {
        self.lookup(path).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    fn get_u64(&self, path: &str, default: u64) -> u64 {
        self.lookup(path).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    fn get_duration(&self, path: &str, default: Duration) -> Duration {
        match self.lookup(path) {
            Some(serde_json::Value::Number(n)) => n
                .as_f64()
                .filter(|secs| *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(default),
            Some(serde_json::Value::String(s)) => parse_duration(s).unwrap_or(default),
            _ => default,
        }
    }

    fn get_str_map(&self, path: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(serde_json::Value::Object(obj)) = self.lookup(path) {
            for (key, value) in obj {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                map.insert(key.clone(), rendered);
            }
        }
        map
    }
}

/// Parse a duration string with a unit suffix.
///
/// Supported units: `ns`, `us`, `ms`, `s`, `m`, `h`. The numeric part may be
/// fractional (`"1.5s"`). Returns `None` for anything else.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| c.is_ascii_alphabetic())?;
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.trim().parse().ok()?;
    if value < 0.0 || !value.is_finite() {
        return None;
    }
    let secs = match unit {
        "ns" => value / 1_000_000_000.0,
        "us" => value / 1_000_000.0,
        "ms" => value / 1_000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return None,
    };
    Some(Duration::from_secs_f64(secs))
}
