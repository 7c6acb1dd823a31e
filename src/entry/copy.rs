//! The four copy strategies of §3.1.
//!
//! Directory children are held behind `Arc`, so a [`CopyMode::Shallow`]
//! copy is simply cloning the top-level `Entry` (cheap `Arc` bumps for
//! every child); the other three strategies are expressed in terms of how
//! they diverge from that baseline.

use std::sync::Arc;

use super::{Contents, Entry};

/// Which of the four §3.1 copy strategies to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyMode {
    /// Full recursive copy; no structure is shared with the original.
    Deep,
    /// Directories are copied (new nodes all the way down the directory
    /// spine); non-directory children are shared by reference.
    DeepPreservingLeaves,
    /// Top-level copy; the contents mapping is copied but children are
    /// shared by reference.
    Shallow,
    /// Shallow copy excluding the contents mapping entirely (directories
    /// become empty).
    Slim,
}

pub fn copy(entry: &Entry, mode: CopyMode) -> Entry {
    match mode {
        CopyMode::Deep => deep(entry),
        CopyMode::DeepPreservingLeaves => deep_preserving_leaves(entry),
        CopyMode::Shallow => entry.clone(),
        CopyMode::Slim => slim(entry),
    }
}

fn deep(entry: &Entry) -> Entry {
    match entry {
        Entry::Directory { contents } => Entry::Directory { contents: deep_contents(contents) },
        Entry::PhantomDirectory { contents } => {
            Entry::PhantomDirectory { contents: deep_contents(contents) }
        }
        other => other.clone(),
    }
}

fn deep_contents(contents: &Contents) -> Contents {
    contents
        .iter()
        .map(|(name, child)| (name.clone(), Arc::new(deep(child))))
        .collect()
}

fn deep_preserving_leaves(entry: &Entry) -> Entry {
    match entry {
        Entry::Directory { contents } => {
            Entry::Directory { contents: deep_preserving_leaves_contents(contents) }
        }
        Entry::PhantomDirectory { contents } => {
            Entry::PhantomDirectory { contents: deep_preserving_leaves_contents(contents) }
        }
        other => other.clone(),
    }
}

fn deep_preserving_leaves_contents(contents: &Contents) -> Contents {
    contents
        .iter()
        .map(|(name, child)| {
            let copied = if child.is_directory_kind() {
                Arc::new(deep_preserving_leaves(child))
            } else {
                Arc::clone(child)
            };
            (name.clone(), copied)
        })
        .collect()
}

fn slim(entry: &Entry) -> Entry {
    match entry {
        Entry::Directory { .. } => Entry::Directory { contents: Contents::new() },
        Entry::PhantomDirectory { .. } => Entry::PhantomDirectory { contents: Contents::new() },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::contents_from;

    fn sample() -> Entry {
        Entry::directory(contents_from([
            ("f", Entry::file(vec![1], false)),
            ("d", Entry::directory(contents_from([("g", Entry::file(vec![2], false))]))),
        ]))
    }

    #[test]
    fn deep_copy_shares_nothing() {
        let original = sample();
        let copied = copy(&original, CopyMode::Deep);
        assert!(Entry::equal(Some(&original), Some(&copied), true));
        let (Entry::Directory { contents: oc }, Entry::Directory { contents: cc }) =
            (&original, &copied)
        else {
            panic!("expected directories");
        };
        assert!(!Arc::ptr_eq(oc.get("f").unwrap(), cc.get("f").unwrap()));
    }

    #[test]
    fn shallow_copy_shares_children() {
        let original = sample();
        let copied = copy(&original, CopyMode::Shallow);
        let (Entry::Directory { contents: oc }, Entry::Directory { contents: cc }) =
            (&original, &copied)
        else {
            panic!("expected directories");
        };
        assert!(Arc::ptr_eq(oc.get("f").unwrap(), cc.get("f").unwrap()));
        assert!(Arc::ptr_eq(oc.get("d").unwrap(), cc.get("d").unwrap()));
    }

    #[test]
    fn deep_preserving_leaves_copies_directory_spine_only() {
        let original = sample();
        let copied = copy(&original, CopyMode::DeepPreservingLeaves);
        let (Entry::Directory { contents: oc }, Entry::Directory { contents: cc }) =
            (&original, &copied)
        else {
            panic!("expected directories");
        };
        // Leaf "f" shared.
        assert!(Arc::ptr_eq(oc.get("f").unwrap(), cc.get("f").unwrap()));
        // Directory "d" is a new node.
        assert!(!Arc::ptr_eq(oc.get("d").unwrap(), cc.get("d").unwrap()));
        // But the leaf inside "d" is still shared.
        let Entry::Directory { contents: od } = oc.get("d").unwrap().as_ref() else { panic!() };
        let Entry::Directory { contents: cd } = cc.get("d").unwrap().as_ref() else { panic!() };
        assert!(Arc::ptr_eq(od.get("g").unwrap(), cd.get("g").unwrap()));
    }

    #[test]
    fn slim_drops_contents_but_keeps_kind() {
        let original = sample();
        let copied = copy(&original, CopyMode::Slim);
        match copied {
            Entry::Directory { contents } => assert!(contents.is_empty()),
            _ => panic!("expected directory"),
        }
    }

    #[test]
    fn deep_then_slim_equals_slim() {
        let original = sample();
        let deep_then_slim = copy(&copy(&original, CopyMode::Deep), CopyMode::Slim);
        let direct_slim = copy(&original, CopyMode::Slim);
        assert!(Entry::equal(Some(&deep_then_slim), Some(&direct_slim), true));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::entry::contents_from;
    use proptest::prelude::*;

    /// Small, bounded-depth `Entry` trees: leaves are files, internal
    /// nodes are directories with 0-3 named children.
    fn entry_tree() -> impl Strategy<Value = Entry> {
        let leaf = (proptest::collection::vec(any::<u8>(), 1..4), any::<bool>())
            .prop_map(|(digest, executable)| Entry::file(digest, executable));
        leaf.prop_recursive(4, 16, 3, |inner| {
            proptest::collection::vec(("[a-d]", inner), 0..3).prop_map(|children| {
                Entry::directory(contents_from(
                    children.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
                ))
            })
        })
    }

    proptest! {
        /// §8: `copy(copy(E, deep), slim) == copy(E, slim)`.
        #[test]
        fn deep_then_slim_equals_slim_for_any_tree(e in entry_tree()) {
            let deep_then_slim = copy(&copy(&e, CopyMode::Deep), CopyMode::Slim);
            let direct_slim = copy(&e, CopyMode::Slim);
            prop_assert!(Entry::equal(Some(&deep_then_slim), Some(&direct_slim), true));
        }

        /// A deep copy is always deeply equal to its source.
        #[test]
        fn deep_copy_is_deeply_equal(e in entry_tree()) {
            let copied = copy(&e, CopyMode::Deep);
            prop_assert!(Entry::equal(Some(&e), Some(&copied), true));
        }

        /// Shallow copy never changes what `equal(.., deep)` reports,
        /// since content is shared, not altered.
        #[test]
        fn shallow_copy_is_deeply_equal(e in entry_tree()) {
            let copied = copy(&e, CopyMode::Shallow);
            prop_assert!(Entry::equal(Some(&e), Some(&copied), true));
        }
    }
}
