/// Formats a snake_case category tag for display, either as title-cased
/// words or as an abbreviation of their initials.
pub fn format_tag(tag: &str, abbreviate: bool) -> String {
    let words = tag.split('_').filter(|word| !word.is_empty());

    if abbreviate {
        return words
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect();
    }

    words
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapses paragraph breaks so step text reads as one block.
pub fn flatten_text(text: &str) -> String {
    text.replace("\n\n", " ").trim().to_owned()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }

    let mut truncated = text.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    truncated.push('…');
    truncated
}
