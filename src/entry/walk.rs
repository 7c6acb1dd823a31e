//! Depth-first traversal of an [`super::Entry`] tree (§4.2).

use super::Entry;
use crate::path;

/// Visitation order for [`walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Visit a node before its children.
    Pre,
    /// Visit a node after its children.
    Post,
}

pub fn walk(entry: &Entry, start: &str, order: Order, visitor: &mut dyn FnMut(&str, &Entry)) {
    if order == Order::Pre {
        visitor(start, entry);
    }
    if let Some(contents) = entry.contents() {
        for (name, child) in contents {
            let child_path = path::join(start, name);
            walk(child, &child_path, order, visitor);
        }
    }
    if order == Order::Post {
        visitor(start, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::contents_from;

    #[test]
    fn pre_order_visits_parent_before_child() {
        let tree = Entry::directory(contents_from([("a", Entry::file(vec![1], false))]));
        let mut seen = Vec::new();
        tree.walk("", Order::Pre, &mut |path, _| seen.push(path.to_owned()));
        assert_eq!(seen, vec!["".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn post_order_visits_child_before_parent() {
        let tree = Entry::directory(contents_from([("a", Entry::file(vec![1], false))]));
        let mut seen = Vec::new();
        tree.walk("", Order::Post, &mut |path, _| seen.push(path.to_owned()));
        assert_eq!(seen, vec!["a".to_owned(), "".to_owned()]);
    }

    #[test]
    fn walk_descends_multiple_levels() {
        let tree = Entry::directory(contents_from([(
            "a",
            Entry::directory(contents_from([("b", Entry::file(vec![1], false))])),
        )]));
        let mut seen = Vec::new();
        tree.walk("", Order::Pre, &mut |path, _| seen.push(path.to_owned()));
        assert_eq!(seen, vec!["".to_owned(), "a".to_owned(), "a/b".to_owned()]);
    }
}
