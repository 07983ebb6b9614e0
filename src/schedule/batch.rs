//! # Root-first batching.
//!
//! [`batch`] splits the names a poll cycle must load into bounded groups. The root module
//! (the one every page render depends on) always goes first and alone, so dependents are
//! never committed against a stale or missing root.
//!
//! ```text
//! names = [a, b, root, c, ... (65 total)], root = Some("root"), size = 10
//!
//! [root]
//! [a, b, c, ... 10]
//! ...              6 groups of 10
//! [.. 4 more]      last group of the remaining 4
//! ```

use std::collections::HashSet;

/// Default number of modules per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Partitions `names` into ordered groups of at most `batch_size` (`0` is treated as `1`).
///
/// - If `root` is among `names`, the first group is `[root]` alone.
/// - Remaining names keep their input order.
/// - Every distinct input name appears exactly once; duplicates keep their first position.
pub fn batch<I, S>(names: I, root: Option<&str>, batch_size: usize) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let size = batch_size.max(1);
    let mut seen = HashSet::new();
    let mut has_root = false;
    let mut rest = Vec::new();

    for name in names {
        let name = name.as_ref();
        if !seen.insert(name.to_string()) {
            continue;
        }
        if root == Some(name) {
            has_root = true;
        } else {
            rest.push(name.to_string());
        }
    }

    let mut groups = Vec::with_capacity(rest.len().div_ceil(size) + 1);
    if let (true, Some(root)) = (has_root, root) {
        groups.push(vec![root.to_string()]);
    }
    groups.extend(rest.chunks(size).map(<[String]>::to_vec));
    groups
}
