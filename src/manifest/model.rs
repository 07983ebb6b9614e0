//! # Module map data model.
//!
//! A [`ModuleMap`] is the parsed form of the remote manifest: an immutable, name-ordered
//! mapping to [`ModuleDescriptor`]s plus the [`FreshnessToken`] used for conditional refetch.
//!
//! ## Wire format
//! ```text
//! {
//!   "modules": {
//!     "frank-lloyd-root": {
//!       "version": "1.0.4",
//!       "node":          { "url": "https://cdn/.../frank-lloyd-root.node.js",   "integrity": "sha256-..." },
//!       "browser":       { "url": "https://cdn/.../frank-lloyd-root.browser.js", "integrity": "sha256-..." },
//!       "legacyBrowser": { "url": "https://cdn/.../frank-lloyd-root.legacy.js",  "integrity": "sha256-..." }
//!     }
//!   }
//! }
//! ```
//! Unknown fields are ignored. `version` may be omitted; a target may be omitted
//! (the module does not support it) but at least one must be present.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const CONTENT_HASH_PREFIX: &str = "sha256:";

/// Opaque freshness token of a fetched module map.
///
/// Either the server's `ETag` (used for `If-None-Match`) or a SHA-256 hash of the body
/// when the server sends none.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FreshnessToken(String);

impl FreshnessToken {
    /// Wraps an `ETag` header value verbatim (quotes and weak prefix included).
    pub fn etag(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derives a token from the document body.
    pub fn content_hash(body: &[u8]) -> Self {
        let digest = Sha256::digest(body);
        Self(format!("{CONTENT_HASH_PREFIX}{digest:x}"))
    }

    /// True if the token came from an `ETag` header and can be sent back as `If-None-Match`.
    pub fn is_etag(&self) -> bool {
        !self.0.starts_with(CONTENT_HASH_PREFIX)
    }

    /// Raw token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FreshnessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution target a bundle is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// Server-side bundle executed by the host.
    Node,
    /// Modern-browser bundle.
    Browser,
    /// Legacy-browser bundle.
    LegacyBrowser,
}

impl Target {
    /// All targets, in wire order.
    pub const ALL: [Target; 3] = [Target::Node, Target::Browser, Target::LegacyBrowser];

    /// Field name used in the manifest document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Node => "node",
            Target::Browser => "browser",
            Target::LegacyBrowser => "legacyBrowser",
        }
    }
}

/// Location and content hash of one bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRef {
    /// Where the bundle is served from.
    pub url: String,
    /// Subresource-integrity hash of the bundle contents.
    pub integrity: String,
}

/// One deployable module as described by the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Unique module name (manifest key).
    pub name: String,
    /// Semantic version string; empty if the manifest omits it.
    pub version: String,
    /// Server-side bundle.
    pub node: Option<BundleRef>,
    /// Modern-browser bundle.
    pub browser: Option<BundleRef>,
    /// Legacy-browser bundle.
    pub legacy_browser: Option<BundleRef>,
}

impl ModuleDescriptor {
    /// Creates a descriptor with no bundles.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            node: None,
            browser: None,
            legacy_browser: None,
        }
    }

    /// Sets the bundle for `target`.
    pub fn with_bundle(
        mut self,
        target: Target,
        url: impl Into<String>,
        integrity: impl Into<String>,
    ) -> Self {
        let bundle = Some(BundleRef {
            url: url.into(),
            integrity: integrity.into(),
        });
        match target {
            Target::Node => self.node = bundle,
            Target::Browser => self.browser = bundle,
            Target::LegacyBrowser => self.legacy_browser = bundle,
        }
        self
    }

    /// Bundle for `target`, if the module supports it.
    pub fn bundle(&self, target: Target) -> Option<&BundleRef> {
        match target {
            Target::Node => self.node.as_ref(),
            Target::Browser => self.browser.as_ref(),
            Target::LegacyBrowser => self.legacy_browser.as_ref(),
        }
    }

    /// Targets this module ships a bundle for.
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        Target::ALL
            .into_iter()
            .filter(|t| self.bundle(*t).is_some())
    }

    /// True if both descriptors denote the same release: equal version and equal
    /// integrity for every target (a target present on one side only is a change).
    pub fn same_release(&self, other: &ModuleDescriptor) -> bool {
        self.version == other.version
            && Target::ALL.iter().all(|t| {
                match (self.bundle(*t), other.bundle(*t)) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.integrity == b.integrity,
                    _ => false,
                }
            })
    }

    fn validate(&self) -> Result<(), ParseError> {
        if self.name.is_empty() {
            return Err(ParseError::EmptyName);
        }
        if self.targets().next().is_none() {
            return Err(ParseError::NoTargets {
                module: self.name.clone(),
            });
        }
        for target in self.targets() {
            if self.bundle(target).is_some_and(|b| b.url.is_empty()) {
                return Err(ParseError::EmptyUrl {
                    module: self.name.clone(),
                    target: target.as_str(),
                });
            }
        }
        Ok(())
    }
}

/// Why a document is not a valid module map.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParseError {
    /// Not JSON, or JSON of the wrong shape.
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),

    /// A module key is the empty string.
    #[error("module name must not be empty")]
    EmptyName,

    /// A module declares none of `node`, `browser`, `legacyBrowser`.
    #[error("module '{module}' declares no bundle targets")]
    NoTargets {
        /// Offending module.
        module: String,
    },

    /// A bundle reference has an empty `url`.
    #[error("module '{module}' has an empty url for target '{target}'")]
    EmptyUrl {
        /// Offending module.
        module: String,
        /// Target field name.
        target: &'static str,
    },
}

#[derive(Deserialize)]
struct RawModuleMap {
    modules: BTreeMap<String, RawDescriptor>,
}

#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    version: String,
    node: Option<BundleRef>,
    browser: Option<BundleRef>,
    #[serde(rename = "legacyBrowser")]
    legacy_browser: Option<BundleRef>,
}

/// Immutable point-in-time module map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleMap {
    modules: BTreeMap<String, ModuleDescriptor>,
    token: Option<FreshnessToken>,
}

impl ModuleMap {
    /// Parses a manifest document.
    pub fn from_json(body: &[u8], token: Option<FreshnessToken>) -> Result<Self, ParseError> {
        let raw: RawModuleMap = serde_json::from_slice(body)?;
        let modules = raw
            .modules
            .into_iter()
            .map(|(name, raw)| ModuleDescriptor {
                name,
                version: raw.version,
                node: raw.node,
                browser: raw.browser,
                legacy_browser: raw.legacy_browser,
            })
            .collect::<Vec<_>>();
        Self::from_descriptors(modules, token)
    }

    /// Builds a map from already-constructed descriptors.
    ///
    /// Later descriptors with a duplicate name replace earlier ones.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ModuleDescriptor>,
        token: Option<FreshnessToken>,
    ) -> Result<Self, ParseError> {
        let mut modules = BTreeMap::new();
        for d in descriptors {
            d.validate()?;
            modules.insert(d.name.clone(), d);
        }
        Ok(Self { modules, token })
    }

    /// Freshness token this map was fetched with.
    pub fn token(&self) -> Option<&FreshnessToken> {
        self.token.as_ref()
    }

    /// Descriptor for `name`.
    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    /// True if the map lists `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Module names in natural (lexicographic) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.values()
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if the map lists no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "key": "not-used",
        "modules": {
            "root": {
                "version": "1.0.0",
                "node": { "url": "https://cdn/root/1.0.0/root.node.js", "integrity": "sha256-a" },
                "browser": { "url": "https://cdn/root/1.0.0/root.browser.js", "integrity": "sha256-b" },
                "legacyBrowser": { "url": "https://cdn/root/1.0.0/root.legacy.js", "integrity": "sha256-c" }
            },
            "footer": {
                "browser": { "url": "https://cdn/footer/footer.browser.js", "integrity": "sha256-d" }
            }
        }
    }"#;

    #[test]
    fn parses_targets_and_defaults() {
        let map = ModuleMap::from_json(DOC.as_bytes(), None).unwrap();
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["footer", "root"]);

        let root = map.get("root").unwrap();
        assert_eq!(root.version, "1.0.0");
        assert_eq!(root.targets().count(), 3);
        assert_eq!(
            root.bundle(Target::LegacyBrowser).unwrap().integrity,
            "sha256-c"
        );

        let footer = map.get("footer").unwrap();
        assert_eq!(footer.version, "");
        assert!(footer.node.is_none());
        assert_eq!(footer.targets().collect::<Vec<_>>(), vec![Target::Browser]);
    }

    #[test]
    fn rejects_module_without_targets() {
        let doc = r#"{ "modules": { "ghost": { "version": "1.0.0" } } }"#;
        let err = ModuleMap::from_json(doc.as_bytes(), None).unwrap_err();
        assert!(matches!(err, ParseError::NoTargets { ref module } if module == "ghost"));
    }

    #[test]
    fn rejects_empty_url_and_bad_shape() {
        let doc = r#"{ "modules": { "m": { "node": { "url": "", "integrity": "x" } } } }"#;
        assert!(matches!(
            ModuleMap::from_json(doc.as_bytes(), None),
            Err(ParseError::EmptyUrl { target: "node", .. })
        ));
        assert!(matches!(
            ModuleMap::from_json(b"{\"mods\": {}}", None),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            ModuleMap::from_json(b"<html>", None),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn same_release_compares_version_and_integrity() {
        let a = ModuleDescriptor::new("a", "1.0.0").with_bundle(Target::Node, "u1", "i1");
        let moved = ModuleDescriptor::new("a", "1.0.0").with_bundle(Target::Node, "u2", "i1");
        let rehashed = ModuleDescriptor::new("a", "1.0.0").with_bundle(Target::Node, "u1", "i2");
        let bumped = ModuleDescriptor::new("a", "1.0.1").with_bundle(Target::Node, "u1", "i1");
        let extra = a.clone().with_bundle(Target::Browser, "u3", "i3");

        assert!(a.same_release(&moved));
        assert!(!a.same_release(&rehashed));
        assert!(!a.same_release(&bumped));
        assert!(!a.same_release(&extra));
    }

    #[test]
    fn content_hash_tokens_are_not_etags() {
        let t = FreshnessToken::content_hash(b"{}");
        assert!(!t.is_etag());
        assert!(t.as_str().starts_with("sha256:"));
        assert_eq!(t, FreshnessToken::content_hash(b"{}"));
        assert!(FreshnessToken::etag("\"abc\"").is_etag());
    }
}
