use crate::Frontmatter;

/// Overlay `required` onto `existing`.
///
/// Required keys overwrite in place, keys only present in `existing` are
/// left alone, new keys are appended in `required` order. Shallow: nested
/// maps are replaced, not merged.
pub fn merge_frontmatter(existing: &Frontmatter, required: &Frontmatter) -> Frontmatter {
    let mut merged = existing.clone();
    for (key, value) in required {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
