//! Key-value configuration sources
//!
//! The core is agnostic to where configuration comes from. A source is any
//! string-keyed lookup; sources can be layered so that earlier layers win,
//! mirroring the override > overlay > base priority of typical test-suite
//! setups.

use std::collections::HashMap;

use tracing::debug;

/// A read-only key-value configuration source.
pub trait ConfigSource: Send + Sync {
    /// Look up a key, e.g. `"grid.url"`.
    fn get(&self, key: &str) -> Option<String>;

    /// All keys this source can answer for. Used to collect `cap.*`
    /// passthrough entries.
    fn keys(&self) -> Vec<String>;
}

/// In-memory source backed by a map. External file loaders (properties,
/// JSON, whatever the suite uses) deserialize into this.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    entries: HashMap<String, String>,
}

impl MapSource {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Insert or replace a single entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl From<HashMap<String, String>> for MapSource {
    fn from(entries: HashMap<String, String>) -> Self {
        Self::new(entries)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapSource {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Environment-variable source. Keys map to variable names by uppercasing
/// and replacing dots with underscores (`grid.url` -> `GRID_URL`), with an
/// optional prefix. The reverse mapping lowercases names, so case-sensitive
/// `cap.*` keys should come from a map-backed source instead.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: Option<String>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Prefix every variable name, e.g. `WEBHARNESS_` -> `WEBHARNESS_GRID_URL`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn var_name(&self, key: &str) -> String {
        let mapped = key.replace('.', "_").to_uppercase();
        match &self.prefix {
            Some(p) => format!("{p}{mapped}"),
            None => mapped,
        }
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }

    fn keys(&self) -> Vec<String> {
        let prefix = self.prefix.clone().unwrap_or_default();
        std::env::vars()
            .filter_map(|(name, _)| {
                let stripped = name.strip_prefix(&prefix)?;
                Some(stripped.replace('_', ".").to_lowercase())
            })
            .collect()
    }
}

/// Layered source: layers are consulted in order and the first hit wins.
/// Put overrides first, base configuration last.
#[derive(Default)]
pub struct LayeredSource {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredSource {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append a layer with lower priority than all existing layers.
    pub fn push(mut self, layer: impl ConfigSource + 'static) -> Self {
        debug!("Adding config layer with {} keys", layer.keys().len());
        self.layers.push(Box::new(layer));
        self
    }
}

impl ConfigSource for LayeredSource {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .layers
            .iter()
            .flat_map(|layer| layer.keys())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_source_lookup() {
        let source = MapSource::from([("browser", "firefox")]);
        assert_eq!(source.get("browser").as_deref(), Some("firefox"));
        assert_eq!(source.get("headless"), None);
    }

    #[test]
    fn test_layered_source_first_layer_wins() {
        let overrides = MapSource::from([("browser", "edge")]);
        let base = MapSource::from([("browser", "chrome"), ("headless", "true")]);
        let layered = LayeredSource::new().push(overrides).push(base);

        assert_eq!(layered.get("browser").as_deref(), Some("edge"));
        assert_eq!(layered.get("headless").as_deref(), Some("true"));
    }

    #[test]
    fn test_layered_source_deduplicates_keys() {
        let layered = LayeredSource::new()
            .push(MapSource::from([("browser", "edge")]))
            .push(MapSource::from([("browser", "chrome")]));
        assert_eq!(layered.keys(), vec!["browser".to_string()]);
    }

    #[test]
    fn test_env_source_maps_dots_to_underscores() {
        std::env::set_var("WEBHARNESS_TEST_GRID_URL", "http://hub:4444/wd/hub");
        let source = EnvSource::with_prefix("WEBHARNESS_TEST_");
        assert_eq!(
            source.get("grid.url").as_deref(),
            Some("http://hub:4444/wd/hub")
        );
        std::env::remove_var("WEBHARNESS_TEST_GRID_URL");
    }
}
