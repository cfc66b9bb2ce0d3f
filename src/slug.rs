//! Slugs for run directory and file names.

/// Maximum slug length; longer titles are cut at a word boundary
const MAX_SLUG_LENGTH: usize = 30;

/// Lowercase, hyphen-separated slug of `title`, at most `MAX_SLUG_LENGTH` chars.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for word in title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let extra = if slug.is_empty() { word.len() } else { word.len() + 1 };
        if slug.len() + extra > MAX_SLUG_LENGTH {
            if slug.is_empty() {
                slug.extend(word.chars().take(MAX_SLUG_LENGTH));
            }
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(word);
    }
    slug
}
