//! Deterministic, order-dependent application of a change list to an
//! entry (§4.6). Pure forward projection: `change.old` is never
//! consulted, only `change.new`.

use std::sync::Arc;

use crate::change::Change;
use crate::entry::{CopyMode, Entry};
use crate::error::ApplyError;
use crate::path;

/// Applies `changes`, in order, to `base`, returning the resulting
/// entry. `None` denotes an empty tree (the root itself is absent).
///
/// # Errors
///
/// Fails with [`ApplyError`] if any non-root change's path has no
/// resolvable parent directory in the working tree (§8 boundary
/// behavior).
pub fn apply(base: Option<&Entry>, changes: &[Change]) -> Result<Option<Entry>, ApplyError> {
    if changes.is_empty() {
        return Ok(base.cloned());
    }
    if changes.len() == 1 && changes[0].is_root() {
        return Ok(changes[0].new.as_ref().map(|e| e.copy(CopyMode::Deep)));
    }

    let mut root = base.map(|e| e.copy(CopyMode::Deep));
    for change in changes {
        if change.is_root() {
            root = change.new.as_ref().map(|e| e.copy(CopyMode::Deep));
            continue;
        }
        apply_one(&mut root, change)?;
    }
    Ok(root)
}

fn apply_one(root: &mut Option<Entry>, change: &Change) -> Result<(), ApplyError> {
    let parent_path = path::parent(&change.path);
    let leaf = path::base(&change.path);

    let Some(root_entry) = root.as_mut() else {
        return Err(ApplyError { path: change.path.clone() });
    };
    let parent_entry = resolve_parent_mut(root_entry, parent_path)
        .ok_or_else(|| ApplyError { path: change.path.clone() })?;

    let contents = match parent_entry {
        Entry::Directory { contents } | Entry::PhantomDirectory { contents } => contents,
        _ => return Err(ApplyError { path: change.path.clone() }),
    };

    match &change.new {
        None => {
            contents.shift_remove(leaf);
        }
        Some(new_entry) => {
            contents.insert(leaf.to_owned(), Arc::new(new_entry.copy(CopyMode::Deep)));
        }
    }
    Ok(())
}

/// Walks from `root` to the entry at `path`, following directory
/// contents component by component. `path == ""` returns `root` itself.
fn resolve_parent_mut<'a>(root: &'a mut Entry, path: &str) -> Option<&'a mut Entry> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for component in path.split('/') {
        let contents = match current {
            Entry::Directory { contents } | Entry::PhantomDirectory { contents } => contents,
            _ => return None,
        };
        let child = contents.get_mut(component)?;
        current = Arc::make_mut(child);
    }
    Some(current)
}
