//! Read-only, dot-path accessor over a parsed configuration tree.
//!
//! The simulation core never touches YAML (or any file) directly — `main.rs`
//! loads `config.yaml` with `serde_yaml` and hands the resulting
//! [`serde_yaml::Value`] to [`ConfigView::new`]. Everything downstream only
//! ever sees this read-only view, mirroring the "global configuration
//! singleton → constructor injection" redesign in the design notes.

use anyhow::{Context, Result, anyhow};
use serde_yaml::Value;

#[derive(Debug, Clone)]
pub struct ConfigView {
    root: Value,
}

impl ConfigView {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(raw).context("failed to parse config yaml")?;
        Ok(Self::new(root))
    }

    fn lookup(&self, key_path: &str) -> Option<&Value> {
        let mut cursor = &self.root;
        for segment in key_path.split('.') {
            cursor = cursor.as_mapping()?.get(segment)?;
        }
        Some(cursor)
    }

    /// Returns a value as `f64`, failing fast if the key is absent or the
    /// wrong shape. Used for every key construction-time code requires.
    pub fn require_f64(&self, key_path: &str) -> Result<f64> {
        self.lookup(key_path)
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow!("missing or non-numeric config key: {key_path}"))
    }

    pub fn require_bool(&self, key_path: &str) -> Result<bool> {
        self.lookup(key_path)
            .and_then(Value::as_bool)
            .ok_or_else(|| anyhow!("missing or non-boolean config key: {key_path}"))
    }

    pub fn require_u32(&self, key_path: &str) -> Result<u32> {
        self.lookup(key_path)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .ok_or_else(|| anyhow!("missing or non-integer config key: {key_path}"))
    }

    pub fn require_str(&self, key_path: &str) -> Result<String> {
        self.lookup(key_path)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("missing or non-string config key: {key_path}"))
    }

    /// Required `[min, max]` pair, e.g. `rocket.position_limits.x`.
    pub fn require_pair(&self, key_path: &str) -> Result<(f64, f64)> {
        let seq = self
            .lookup(key_path)
            .and_then(Value::as_sequence)
            .ok_or_else(|| anyhow!("missing or non-list config key: {key_path}"))?;
        if seq.len() != 2 {
            return Err(anyhow!("config key {key_path} must have exactly 2 entries"));
        }
        let lo = seq[0]
            .as_f64()
            .ok_or_else(|| anyhow!("config key {key_path}[0] is not numeric"))?;
        let hi = seq[1]
            .as_f64()
            .ok_or_else(|| anyhow!("config key {key_path}[1] is not numeric"))?;
        Ok((lo, hi))
    }

    /// The one genuinely optional key the core reads: `model.version`.
    pub fn optional_str(&self, key_path: &str) -> Option<String> {
        self.lookup(key_path)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigView {
        ConfigView::from_yaml_str(
            r#"
environment:
  gravity: -9.81
  num_rockets: 2
rocket:
  position_limits:
    x: [-100.0, 100.0]
model:
  version: "v3"
"#,
        )
        .unwrap()
    }

    #[test]
    fn reads_nested_scalars() {
        let cfg = sample();
        assert_eq!(cfg.require_f64("environment.gravity").unwrap(), -9.81);
        assert_eq!(cfg.require_u32("environment.num_rockets").unwrap(), 2);
    }

    #[test]
    fn reads_pairs() {
        let cfg = sample();
        assert_eq!(
            cfg.require_pair("rocket.position_limits.x").unwrap(),
            (-100.0, 100.0)
        );
    }

    #[test]
    fn missing_key_fails_fast() {
        let cfg = sample();
        assert!(cfg.require_f64("environment.does_not_exist").is_err());
    }

    #[test]
    fn optional_key_present_and_absent() {
        let cfg = sample();
        assert_eq!(cfg.optional_str("model.version").as_deref(), Some("v3"));
        assert_eq!(cfg.optional_str("model.missing"), None);
    }
}
