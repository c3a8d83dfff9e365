use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::config::FormatRule;
use crate::error::StorageError;
use crate::record::FileRecord;

/// Transforms a source file into a derived artifact.
///
/// Handlers receive the capture groups of the matched tag pattern as
/// positional parameters, a temp-local copy of the canonical file, and the
/// record being processed. They return the derived bytes or fail; failures
/// are absorbed by the variant pipeline and reported as a `false` outcome.
#[async_trait]
pub trait VariantHandler: Send + Sync {
    async fn render(
        &self,
        params: &[String],
        source: &Path,
        record: &FileRecord,
    ) -> Result<Vec<u8>, StorageError>;
}

/// Named handler registry. Configuration refers to handlers by name so the
/// pattern table stays declarative.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn VariantHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in image handlers when the
    /// `image-formats` feature is enabled.
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "image-formats")]
        {
            registry.register("resize", Arc::new(crate::handlers::image::ResizeHandler));
            registry.register("thumb", Arc::new(crate::handlers::image::ThumbHandler));
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn VariantHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn VariantHandler>> {
        self.handlers.get(name)
    }
}

/// Ordered table of tag patterns. Evaluation order is declaration order and
/// the first matching pattern wins, so overlapping patterns behave
/// deterministically.
#[derive(Default)]
pub struct FormatTable {
    entries: Vec<(Regex, Arc<dyn VariantHandler>)>,
}

impl FormatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `rules` against the registry. Unknown handler names and
    /// invalid patterns fail construction; both indicate a deployment
    /// misconfiguration.
    pub fn from_rules(rules: &[FormatRule], registry: &HandlerRegistry) -> Result<Self, StorageError> {
        let mut table = Self::new();
        for rule in rules {
            let handler = registry.get(&rule.handler).ok_or_else(|| {
                StorageError::Variant(format!("no handler registered as \"{}\"", rule.handler))
            })?;
            table.push(&rule.pattern, handler.clone())?;
        }
        Ok(table)
    }

    /// Append a pattern to the end of the table.
    pub fn push(
        &mut self,
        pattern: &str,
        handler: Arc<dyn VariantHandler>,
    ) -> Result<(), StorageError> {
        let regex = Regex::new(pattern)
            .map_err(|e| StorageError::Variant(format!("invalid pattern \"{pattern}\": {e}")))?;
        self.entries.push((regex, handler));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first pattern matching `tag` and extract its capture groups
    /// as positional parameters.
    pub fn matched(&self, tag: &str) -> Option<(Vec<String>, Arc<dyn VariantHandler>)> {
        for (regex, handler) in &self.entries {
            if let Some(captures) = regex.captures(tag) {
                let params = captures
                    .iter()
                    .skip(1)
                    .map(|c| c.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Some((params, handler.clone()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TagEcho(&'static str);

    #[async_trait]
    impl VariantHandler for TagEcho {
        async fn render(
            &self,
            _params: &[String],
            _source: &Path,
            _record: &FileRecord,
        ) -> Result<Vec<u8>, StorageError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn first_declared_match_wins() {
        let mut table = FormatTable::new();
        table.push("^resize_(\\d+)x(\\d+)$", Arc::new(TagEcho("specific"))).unwrap();
        table.push("^resize_.*$", Arc::new(TagEcho("catchall"))).unwrap();

        let (params, handler) = table.matched("resize_300x200").unwrap();
        assert_eq!(params, vec!["300", "200"]);

        let record = sample_record();
        let out = handler.render(&params, Path::new("/dev/null"), &record).await.unwrap();
        assert_eq!(out, b"specific");

        let (params, handler) = table.matched("resize_original").unwrap();
        assert!(params.is_empty());
        let out = handler.render(&params, Path::new("/dev/null"), &record).await.unwrap();
        assert_eq!(out, b"catchall");
    }

    #[test]
    fn unmatched_tag_yields_none() {
        let mut table = FormatTable::new();
        table.push("^thumb$", Arc::new(TagEcho("t"))).unwrap();
        assert!(table.matched("huge").is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let mut table = FormatTable::new();
        let err = table.push("([", Arc::new(TagEcho("x"))).unwrap_err();
        assert!(matches!(err, StorageError::Variant(_)));
    }

    #[test]
    fn from_rules_rejects_unknown_handler_names() {
        let registry = HandlerRegistry::new();
        let rules = vec![FormatRule {
            pattern: "^thumb$".into(),
            handler: "thumb".into(),
        }];
        assert!(matches!(
            FormatTable::from_rules(&rules, &registry),
            Err(StorageError::Variant(_))
        ));
    }

    fn sample_record() -> FileRecord {
        FileRecord {
            id: 1,
            backend: "local".into(),
            path: "0/0/1/a.jpg".into(),
            extension: "jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 1,
            hash: None,
            variants: Default::default(),
            owner: None,
            expired_at: None,
            created_at: chrono::Utc::now(),
        }
    }
}
