//! # Module map diffing.
//!
//! [`diff`] compares the previously applied module map with a freshly fetched one and
//! reports three disjoint name sets. Modules whose release did not change are omitted,
//! which is what keeps a poll cycle from reloading bundles it already has.
//!
//! ```text
//! previous: { root@1, a@1 (i=x), b@1 }
//! next:     { root@1, a@1 (i=y), c@1 }
//!
//! added   = { c }      in next only
//! updated = { a }      in both, version or integrity differs
//! removed = { b }      in previous only
//! ```

use std::collections::BTreeSet;

use crate::manifest::{ModuleDescriptor, ModuleMap};
use crate::registry::RegistryGeneration;

/// Result of comparing two module maps. Sets are ordered by name and pairwise disjoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    /// Present in the next map only.
    pub added: BTreeSet<String>,
    /// Present in both maps with a different release.
    pub updated: BTreeSet<String>,
    /// Present in the previous map only.
    pub removed: BTreeSet<String>,
}

impl ManifestDiff {
    /// True if nothing needs loading or unregistering.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Names that must be (re)loaded: `added ∪ updated`, in name order.
    pub fn to_load(&self) -> BTreeSet<String> {
        self.added.union(&self.updated).cloned().collect()
    }
}

/// Computes the difference between `previous` (`None` before the first successful cycle) and `next`.
///
/// Pure and deterministic.
pub fn diff(previous: Option<&ModuleMap>, next: &ModuleMap) -> ManifestDiff {
    diff_by(
        previous.into_iter().flat_map(|p| p.iter()),
        |name| previous.and_then(|p| p.get(name)),
        next,
    )
}

/// Same as [`diff`], with the previous state taken from the descriptors a registry
/// generation was loaded from.
///
/// Modules that failed to load are absent from the generation, so they reappear as
/// added (or stay updated) until a cycle manages to load them.
pub fn diff_against_generation<H>(current: &RegistryGeneration<H>, next: &ModuleMap) -> ManifestDiff {
    diff_by(
        current.iter().map(|m| &m.descriptor),
        |name| current.descriptor(name),
        next,
    )
}

fn diff_by<'a, I, F>(previous: I, lookup: F, next: &ModuleMap) -> ManifestDiff
where
    I: IntoIterator<Item = &'a ModuleDescriptor>,
    F: Fn(&str) -> Option<&'a ModuleDescriptor>,
{
    let mut out = ManifestDiff::default();

    for desc in next.iter() {
        match lookup(&desc.name) {
            None => {
                out.added.insert(desc.name.clone());
            }
            Some(prev) if !prev.same_release(desc) => {
                out.updated.insert(desc.name.clone());
            }
            Some(_) => {}
        }
    }

    for prev in previous {
        if !next.contains(&prev.name) {
            out.removed.insert(prev.name.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Target;

    fn module(name: &str, version: &str, integrity: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(name, version).with_bundle(
            Target::Node,
            format!("https://cdn/{name}/{version}/{name}.node.js"),
            integrity,
        )
    }

    fn map(mods: Vec<ModuleDescriptor>) -> ModuleMap {
        ModuleMap::from_descriptors(mods, None).unwrap()
    }

    fn names(xs: &[&str]) -> BTreeSet<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_with_itself_is_empty() {
        let m = map(vec![
            module("root", "1.0.0", "r"),
            module("a", "1.0.0", "a"),
            module("b", "2.1.0", "b"),
        ]);
        assert!(diff(Some(&m), &m).is_empty());
        assert!(diff(Some(&map(vec![])), &map(vec![])).is_empty());
    }

    #[test]
    fn first_diff_adds_everything() {
        let m = map(vec![module("root", "1.0.0", "r"), module("a", "1.0.0", "a")]);
        let d = diff(None, &m);
        assert_eq!(d.added, names(&["a", "root"]));
        assert!(d.updated.is_empty());
        assert!(d.removed.is_empty());
    }

    #[test]
    fn integrity_change_and_removal() {
        let v1 = map(vec![
            module("root", "1.0.0", "r"),
            module("a", "1.0.0", "a1"),
            module("b", "1.0.0", "b"),
        ]);
        let v2 = map(vec![module("root", "1.0.0", "r"), module("a", "1.0.0", "a2")]);

        let d = diff(Some(&v1), &v2);
        assert!(d.added.is_empty());
        assert_eq!(d.updated, names(&["a"]));
        assert_eq!(d.removed, names(&["b"]));
        assert_eq!(d.to_load(), names(&["a"]));
    }

    #[test]
    fn version_bump_is_update_and_sets_are_disjoint() {
        let v1 = map(vec![module("a", "1.0.0", "a"), module("b", "1.0.0", "b")]);
        let v2 = map(vec![module("a", "1.1.0", "a"), module("c", "1.0.0", "c")]);

        let d = diff(Some(&v1), &v2);
        assert_eq!(d.added, names(&["c"]));
        assert_eq!(d.updated, names(&["a"]));
        assert_eq!(d.removed, names(&["b"]));
        assert!(d.added.is_disjoint(&d.updated));
        assert!(d.added.is_disjoint(&d.removed));
        assert!(d.updated.is_disjoint(&d.removed));
    }

    #[test]
    fn generation_diff_retries_modules_missing_from_registry() {
        use crate::registry::{LoadedModule, RegistryStore};

        let v1 = map(vec![module("root", "1.0.0", "r"), module("a", "1.0.0", "a")]);
        let store = RegistryStore::new();
        // only root made it into the registry
        store
            .commit(
                vec![LoadedModule::new(v1.get("root").unwrap().clone(), ())],
                Vec::<String>::new(),
                None,
            )
            .unwrap();

        let d = diff_against_generation(&store.snapshot(), &v1);
        assert_eq!(d.added, names(&["a"]));
        assert!(d.updated.is_empty() && d.removed.is_empty());
        assert_eq!(diff_against_generation(&store.snapshot(), &map(vec![])).removed, names(&["root"]));
    }

    #[test]
    fn diff_is_independent_of_construction_order() {
        let v1 = map(vec![module("x", "1.0.0", "x"), module("y", "1.0.0", "y")]);
        let v2a = map(vec![module("z", "1.0.0", "z"), module("y", "1.0.1", "y")]);
        let v2b = map(vec![module("y", "1.0.1", "y"), module("z", "1.0.0", "z")]);
        assert_eq!(diff(Some(&v1), &v2a), diff(Some(&v1), &v2b));
    }
}
