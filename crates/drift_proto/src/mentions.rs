//! @mention extraction from message content.

/// Collect `@name` tokens from message content. A mention is `@` followed
/// by word characters; each name is reported once, in order of first
/// appearance.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = content;
    while let Some(idx) = rest.find('@') {
        rest = &rest[idx + 1..];
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() && !found.contains(&name) {
            found.push(name);
        }
    }
    found
}
