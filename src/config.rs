use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// One configured backend: which adapter builds it, an optional public base
/// URL for serving its files, and adapter-specific connection parameters.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackendEntry {
    /// Adapter name, looked up in the registry table (e.g. "local", "s3").
    pub adapter: String,
    /// Base URL prepended when building public URLs for this backend.
    pub base_url: Option<String>,
    /// Adapter-specific connection parameters ("endpoint", "bucket", ...).
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl BackendEntry {
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            base_url: None,
            params: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One ordered entry of the format table: a regex pattern matched against
/// requested variant tags, and the name of the registered handler to invoke.
/// Declaration order is significant: the first matching pattern wins.
#[derive(Debug, Deserialize, Clone)]
pub struct FormatRule {
    pub pattern: String,
    pub handler: String,
}

/// Process-wide storage configuration. Loaded once at startup and passed by
/// reference into the mount manager and pipelines; never consulted through
/// any global.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for the implicit local backend.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Public base URL under which the local backend's files are served.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Backend used by `store` when the caller does not name one.
    #[serde(default = "default_backend_name")]
    pub default_backend: String,
    /// Named backends, each built through the adapter registry.
    #[serde(default)]
    pub backends: HashMap<String, BackendEntry>,
    /// Ordered variant-tag patterns.
    #[serde(default)]
    pub formats: Vec<FormatRule>,
}

fn default_base_path() -> String {
    "./files".into()
}
fn default_base_url() -> String {
    "/files".into()
}
fn default_backend_name() -> String {
    "local".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            base_url: default_base_url(),
            default_backend: default_backend_name(),
            backends: HashMap::new(),
            formats: Vec::new(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from `config/stowage.toml` (optional) with
    /// environment overrides (e.g. `STOWAGE__BASE_PATH=/srv/files`).
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config/stowage").required(false))
            .add_source(Environment::with_prefix("STOWAGE").separator("__"))
            .build()?;

        let mut cfg: Self = s.try_deserialize()?;
        cfg.ensure_local();
        Ok(cfg)
    }

    /// A configuration serving only the implicit local backend. Useful for
    /// tests and embedders that do not need remote storage.
    pub fn local_only(base_path: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut cfg = Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
            ..Self::default()
        };
        cfg.ensure_local();
        cfg
    }

    /// Register a backend entry, returning `self` for chaining.
    pub fn with_backend(mut self, name: impl Into<String>, entry: BackendEntry) -> Self {
        self.backends.insert(name.into(), entry);
        self
    }

    /// Append a format rule, returning `self` for chaining.
    pub fn with_format(mut self, pattern: impl Into<String>, handler: impl Into<String>) -> Self {
        self.formats.push(FormatRule {
            pattern: pattern.into(),
            handler: handler.into(),
        });
        self
    }

    /// The "local" backend is always present, rooted at `base_path` and
    /// served under `base_url`, unless the configuration overrides it.
    pub(crate) fn ensure_local(&mut self) {
        self.backends
            .entry("local".to_string())
            .or_insert_with(|| BackendEntry::new("local"));
    }

    /// Look up a configured backend by name.
    pub fn backend(&self, name: &str) -> Option<&BackendEntry> {
        self.backends.get(name)
    }

    /// Public base URL for a backend: its own entry if set, the process-wide
    /// base URL for the implicit local backend, empty otherwise.
    pub fn base_url_for(&self, name: &str) -> String {
        match self.backends.get(name).and_then(|e| e.base_url.clone()) {
            Some(url) => url,
            None if name == "local" => self.base_url.clone(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_only_registers_local_backend() {
        let cfg = StorageConfig::local_only("/data", "/files");
        let entry = cfg.backend("local").unwrap();
        assert_eq!(entry.adapter, "local");
        assert_eq!(cfg.base_url_for("local"), "/files");
    }

    #[test]
    fn ensure_local_does_not_override_explicit_entry() {
        let mut cfg = StorageConfig::default().with_backend(
            "local",
            BackendEntry::new("local").with_base_url("https://cdn.example.com"),
        );
        cfg.ensure_local();
        assert_eq!(cfg.base_url_for("local"), "https://cdn.example.com");
    }

    #[test]
    fn base_url_for_unconfigured_backend_is_empty() {
        let cfg = StorageConfig::local_only("/data", "/files");
        assert_eq!(cfg.base_url_for("archive"), "");
    }

    #[test]
    fn deserializes_from_toml_shape() {
        let toml = r#"
            base_path = "/srv/files"
            default_backend = "media"

            [backends.media]
            adapter = "webdav"
            base_url = "https://cdn.example.com/media"

            [backends.media.params]
            endpoint = "https://dav.example.com"
            token = "secret"

            [[formats]]
            pattern = "^thumb$"
            handler = "thumb"
        "#;
        let cfg: StorageConfig = toml_from_str(toml);
        assert_eq!(cfg.base_path, "/srv/files");
        assert_eq!(cfg.base_url, "/files"); // default kept
        let media = cfg.backend("media").unwrap();
        assert_eq!(media.adapter, "webdav");
        assert_eq!(media.params["endpoint"], "https://dav.example.com");
        assert_eq!(cfg.formats.len(), 1);
    }

    fn toml_from_str(s: &str) -> StorageConfig {
        Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
