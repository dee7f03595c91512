/// Turns the comma-separated tag input into the stored tag list.
///
/// Empty input means "no tags" (`None`, not an empty list). Otherwise the
/// input is lowercased and split on commas, and later duplicates are
/// dropped. Segments are not trimmed.
pub fn normalize_tags(raw: &str) -> Option<Vec<String>> {
    if raw.is_empty() {
        return None;
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in raw.to_lowercase().split(',') {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    Some(tags)
}

/// Inverse used to pre-fill the hidden tag field of the entry form.
pub fn join_tags(tags: Option<&[String]>) -> String {
    tags.map(|t| t.join(",")).unwrap_or_default()
}
