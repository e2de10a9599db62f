//! Baseline resolution: scope key → (config, fingerprint)
//!
//! Layout of the manifests directory:
//! - `global.json` - fallback for every scope
//! - `scene.json`, `task.json`, `agent.json` - optional per-class overrides

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{CdeError, Result};
use crate::types::{BaselineConfig, ScopeKey};
use crate::GLOBAL_MANIFEST;

/// A parsed baseline document and the hex SHA-256 of its raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBaseline {
    pub config: BaselineConfig,
    pub fingerprint: String,
    /// Name of the document that resolved (e.g. `agent.json`)
    pub document: String,
}

/// Resolves baseline documents from a directory
#[derive(Debug)]
pub struct BaselineResolver {
    dir: PathBuf,
    /// Read-through cache keyed by document name, off unless enabled
    cache: Option<Mutex<HashMap<String, ResolvedBaseline>>>,
}

impl BaselineResolver {
    /// Resolver that reads documents fresh on every call
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: None,
        }
    }

    /// Enable the read-through cache. Documents edited after first use
    /// are not picked up again.
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(Mutex::new(HashMap::new()));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document name a scope resolves to: its class override if present,
    /// `global.json` otherwise
    pub fn document_for(&self, scope: &ScopeKey) -> String {
        if *scope != ScopeKey::Global {
            let name = format!("{}.json", scope.class());
            if self.dir.join(&name).is_file() {
                return name;
            }
        }
        GLOBAL_MANIFEST.to_string()
    }

    /// Resolve the baseline for a scope
    pub fn resolve(&self, scope: &ScopeKey) -> Result<ResolvedBaseline> {
        let document = self.document_for(scope);

        if let Some(hit) = self.cached(&document) {
            return Ok(hit);
        }

        let path = self.dir.join(&document);
        let raw = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CdeError::ConfigNotFound {
                scope: scope.to_string(),
                path: path.clone(),
            },
            _ => CdeError::Io(e),
        })?;

        let config: BaselineConfig = serde_json::from_slice(&raw)
            .map_err(|e| CdeError::config_invalid(&path, e.to_string()))?;
        config
            .validate()
            .map_err(|reason| CdeError::config_invalid(&path, reason))?;

        let resolved = ResolvedBaseline {
            config,
            fingerprint: fingerprint(&raw),
            document,
        };
        debug!(scope = %scope, document = %resolved.document, "baseline resolved");

        self.store(&resolved);
        Ok(resolved)
    }

    fn cached(&self, document: &str) -> Option<ResolvedBaseline> {
        let cache = self.cache.as_ref()?.lock().ok()?;
        cache.get(document).cloned()
    }

    fn store(&self, resolved: &ResolvedBaseline) {
        if let Some(mut cache) = self.cache.as_ref().and_then(|c| c.lock().ok()) {
            cache.insert(resolved.document.clone(), resolved.clone());
        }
    }
}

/// Hex SHA-256 of a document's raw bytes
pub fn fingerprint(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GLOBAL: &str = r#"{
        "manifest_version": "m1",
        "baseline_family_id": "global_fam",
        "parameter_version": "p1",
        "ema_beta": 0.5,
        "theta_enter": 0.6,
        "alpha_exit": 0.5,
        "layer_weights": {"lexical": 0.5, "pragmatic": 0.5},
        "baselines": {"lexical": {"mu": 0.05, "sigma": 0.15}}
    }"#;

    fn store(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        dir
    }

    #[test]
    fn test_falls_back_to_global() {
        let dir = store(&[("global.json", GLOBAL)]);
        let resolver = BaselineResolver::new(dir.path());
        let resolved = resolver.resolve(&ScopeKey::Agent("npc1".into())).unwrap();
        assert_eq!(resolved.document, "global.json");
        assert_eq!(resolved.config.baseline_family_id, "global_fam");
    }

    #[test]
    fn test_prefix_override() {
        let agent = GLOBAL.replace("global_fam", "agent_fam");
        let dir = store(&[("global.json", GLOBAL), ("agent.json", &agent)]);
        let resolver = BaselineResolver::new(dir.path());

        let resolved = resolver.resolve(&ScopeKey::Agent("npc1".into())).unwrap();
        assert_eq!(resolved.config.baseline_family_id, "agent_fam");

        // other classes still use global
        let resolved = resolver.resolve(&ScopeKey::Task("T1".into())).unwrap();
        assert_eq!(resolved.config.baseline_family_id, "global_fam");
        let resolved = resolver.resolve(&ScopeKey::Global).unwrap();
        assert_eq!(resolved.config.baseline_family_id, "global_fam");
    }

    #[test]
    fn test_idempotent() {
        let dir = store(&[("global.json", GLOBAL)]);
        let resolver = BaselineResolver::new(dir.path());
        let a = resolver.resolve(&ScopeKey::Global).unwrap();
        let b = resolver.resolve(&ScopeKey::Global).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_bytes() {
        let dir = store(&[("global.json", GLOBAL)]);
        let resolver = BaselineResolver::new(dir.path());
        let before = resolver.resolve(&ScopeKey::Global).unwrap();

        std::fs::write(dir.path().join("global.json"), format!("{}\n", GLOBAL)).unwrap();
        let after = resolver.resolve(&ScopeKey::Global).unwrap();

        assert_eq!(before.config, after.config);
        assert_ne!(before.fingerprint, after.fingerprint);
    }

    #[test]
    fn test_cache_keeps_first_read() {
        let dir = store(&[("global.json", GLOBAL)]);
        let resolver = BaselineResolver::new(dir.path()).with_cache();
        let before = resolver.resolve(&ScopeKey::Global).unwrap();

        std::fs::write(dir.path().join("global.json"), "not json").unwrap();
        let after = resolver.resolve(&ScopeKey::Global).unwrap();
        assert_eq!(before, after);
        assert_eq!(after.fingerprint, fingerprint(GLOBAL.as_bytes()));
    }

    #[test]
    fn test_not_found() {
        let dir = store(&[]);
        let resolver = BaselineResolver::new(dir.path());
        let err = resolver.resolve(&ScopeKey::Global).unwrap_err();
        assert!(matches!(err, CdeError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_invalid_shape() {
        let dir = store(&[("global.json", r#"{"manifest_version": "m1"}"#)]);
        let resolver = BaselineResolver::new(dir.path());
        let err = resolver.resolve(&ScopeKey::Global).unwrap_err();
        assert!(matches!(err, CdeError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("\"alpha_exit\": 0.5", "\"alpha_exit\": 2.0"),
            ("\"sigma\": 0.15", "\"sigma\": -0.5"),
            ("\"sigma\": 0.15", "\"sigma\": 0.0"),
            ("\"theta_enter\": 0.6", "\"theta_enter\": -0.4"),
        ];
        for (from, to) in cases {
            let bad = GLOBAL.replace(from, to);
            assert_ne!(bad, GLOBAL);
            let dir = store(&[("global.json", &bad)]);
            let resolver = BaselineResolver::new(dir.path());
            let err = resolver.resolve(&ScopeKey::Global).unwrap_err();
            assert!(matches!(err, CdeError::ConfigInvalid { .. }), "{}", to);
        }
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
