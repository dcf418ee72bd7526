//! Manifest identifier allocation.

use std::collections::HashSet;

/// Ids the package document uses for its own elements.
pub(crate) const RESERVED_IDS: &[&str] = &[
    "book-id",
    "title",
    "subtitle",
    "author",
    "ncx",
    "nav",
    "cover-image",
];

/// Hands out unique XML ids.
///
/// Candidates are sanitized to XML name characters; a candidate already
/// taken gets a numeric suffix (`chapter`, `chapter_1`, `chapter_2`, ...).
#[derive(Debug, Clone)]
pub struct IdAllocator {
    used: HashSet<String>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// An allocator with the package document's own ids already taken.
    pub fn new() -> Self {
        Self {
            used: RESERVED_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Allocate an id derived from `candidate`.
    pub fn allocate(&mut self, candidate: &str) -> String {
        let base = sanitize_id(candidate);
        let mut id = base.clone();
        let mut counter = 1;
        while self.used.contains(&id) {
            id = format!("{base}_{counter}");
            counter += 1;
        }
        self.used.insert(id.clone());
        id
    }
}

/// Map a string to a valid XML id: letters, digits, `_`, `-` and `.`,
/// starting with a letter or underscore.
pub(crate) fn sanitize_id(candidate: &str) -> String {
    let mut id: String = candidate
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !id.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        id.insert(0, '_');
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("chapter1"), "chapter1");
        assert_eq!(sanitize_id("images/my cover.jpg"), "images_my_cover.jpg");
        assert_eq!(sanitize_id("1st"), "_1st");
        assert_eq!(sanitize_id(""), "_");
        assert_eq!(sanitize_id("é"), "_");
    }

    #[test]
    fn test_collisions_get_suffixes() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate("a b"), "a_b");
        assert_eq!(ids.allocate("a_b"), "a_b_1");
        assert_eq!(ids.allocate("a/b"), "a_b_2");
    }

    #[test]
    fn test_reserved_ids_are_avoided() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate("nav"), "nav_1");
        assert_eq!(ids.allocate("title"), "title_1");
        assert_eq!(ids.allocate("cover-image"), "cover-image_1");
    }

    proptest! {
        #[test]
        fn prop_allocated_ids_are_unique(candidates in prop::collection::vec("[a-zA-Z0-9 ./_-]{0,8}", 0..40)) {
            let mut ids = IdAllocator::new();
            let mut seen = HashSet::new();
            for candidate in &candidates {
                let id = ids.allocate(candidate);
                prop_assert!(crate::util::is_xml_name(&id), "invalid id {id:?}");
                prop_assert!(seen.insert(id));
            }
        }
    }
}
