//! Minimal change-list computation between two (possibly absent) entries
//! (§4.5).

use crate::change::Change;
use crate::entry::Entry;
use crate::path;

/// Computes the minimal change list that transforms `base` into `target`.
#[must_use]
pub fn diff(base: Option<&Entry>, target: Option<&Entry>) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_at(String::new(), base, target, &mut changes);
    changes
}

fn diff_at(path: String, base: Option<&Entry>, target: Option<&Entry>, out: &mut Vec<Change>) {
    if Entry::equal(base, target, false) {
        if let (Some(base), Some(target)) = (base, target) {
            if let (Some(base_contents), Some(target_contents)) = (base.contents(), target.contents()) {
                for name in union_names(base_contents, target_contents) {
                    let child_path = path::join(&path, &name);
                    let base_child = base_contents.get(&name).map(|e| e.as_ref());
                    let target_child = target_contents.get(&name).map(|e| e.as_ref());
                    diff_at(child_path, base_child, target_child, out);
                }
            }
        }
        return;
    }
    out.push(Change::new(path, base.cloned(), target.cloned()));
}

fn union_names(a: &crate::entry::Contents, b: &crate::entry::Contents) -> Vec<String> {
    let mut names: Vec<String> = a.keys().cloned().collect();
    for name in b.keys() {
        if !a.contains_key(name) {
            names.push(name.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::contents_from;

    fn file(bytes: &[u8]) -> Entry {
        Entry::file(bytes.to_vec(), false)
    }

    #[test]
    fn no_change_yields_empty_diff() {
        let e = Entry::directory(contents_from([("a", file(b"1"))]));
        assert!(diff(Some(&e), Some(&e)).is_empty());
    }

    #[test]
    fn root_replacement_is_a_single_change() {
        let base = Some(file(b"1"));
        let target = Some(file(b"2"));
        let changes = diff(base.as_ref(), target.as_ref());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "");
    }

    #[test]
    fn nested_change_reports_child_path() {
        let base = Entry::directory(contents_from([("a", file(b"1")), ("b", file(b"x"))]));
        let target = Entry::directory(contents_from([("a", file(b"2")), ("b", file(b"x"))]));
        let changes = diff(Some(&base), Some(&target));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "a");
    }

    #[test]
    fn addition_and_deletion_both_reported() {
        let base = Entry::directory(contents_from([("a", file(b"1"))]));
        let target = Entry::directory(contents_from([("b", file(b"2"))]));
        let mut changes = diff(Some(&base), Some(&target));
        changes.sort_by(|x, y| x.path.cmp(&y.path));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "a");
        assert!(changes[0].new.is_none());
        assert_eq!(changes[1].path, "b");
        assert!(changes[1].new.is_some());
    }

    #[test]
    fn deletion_of_whole_root() {
        let base = Entry::directory(contents_from([("a", file(b"1"))]));
        let changes = diff(Some(&base), None);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "");
        assert!(changes[0].new.is_none());
    }

    #[test]
    fn ancestor_replacement_precedes_descendant_changes_in_recursion_order() {
        // A root type change (directory -> file) must short-circuit before
        // any attempt to recurse into the old directory's children.
        let base = Entry::directory(contents_from([("a", file(b"1"))]));
        let target = file(b"whole-new-file");
        let changes = diff(Some(&base), Some(&target));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "");
    }
}
