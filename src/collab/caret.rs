//! # Caret Bookmark
//!
//! Re-anchors a user's caret after a remote change replaces the buffer.
//! The bookmark captures the caret offset plus a short context slice from
//! the old content; resolution keeps the offset when the context still
//! matches there, otherwise searches for the context in the new content,
//! otherwise falls back to the document start. The fallback is a documented
//! degradation, not a failure.

/// Characters of context captured on each side of the caret
const CONTEXT_RADIUS: usize = 16;

/// A position-anchored caret bookmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretBookmark {
    offset: usize,
    prefix: String,
    suffix: String,
}

impl CaretBookmark {
    /// Capture a bookmark for `caret` within `content`
    ///
    /// The caret is clamped to the content length and to a char boundary.
    pub fn capture(content: &str, caret: usize) -> Self {
        let offset = clamp_to_boundary(content, caret);

        let prefix_start = floor_chars_back(content, offset, CONTEXT_RADIUS);
        let suffix_end = ceil_chars_forward(content, offset, CONTEXT_RADIUS);

        Self {
            offset,
            prefix: content[prefix_start..offset].to_string(),
            suffix: content[offset..suffix_end].to_string(),
        }
    }

    /// Resolve the bookmark against replacement content
    pub fn resolve(&self, new_content: &str) -> usize {
        // Fast path: the context still matches at the recorded offset.
        if self.matches_at(new_content, self.offset) {
            return self.offset;
        }

        // The surrounding text may simply have shifted; look for it.
        if !self.prefix.is_empty() || !self.suffix.is_empty() {
            let needle = format!("{}{}", self.prefix, self.suffix);
            if !needle.is_empty() {
                if let Some(pos) = new_content.find(&needle) {
                    return pos + self.prefix.len();
                }
            }
        }

        // Weaker anchor: prefix alone.
        if !self.prefix.is_empty() {
            if let Some(pos) = new_content.find(&self.prefix) {
                return pos + self.prefix.len();
            }
        }

        // Unresolvable: caret resets to the document start.
        0
    }

    fn matches_at(&self, content: &str, offset: usize) -> bool {
        if offset > content.len() || !content.is_char_boundary(offset) {
            return false;
        }
        content[..offset].ends_with(&self.prefix) && content[offset..].starts_with(&self.suffix)
    }
}

/// Clamp an offset to the content length and the nearest lower char boundary
pub(crate) fn clamp_to_boundary(content: &str, offset: usize) -> usize {
    let mut offset = offset.min(content.len());
    while offset > 0 && !content.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn floor_chars_back(content: &str, offset: usize, count: usize) -> usize {
    content[..offset]
        .char_indices()
        .rev()
        .nth(count - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn ceil_chars_forward(content: &str, offset: usize, count: usize) -> usize {
    content[offset..]
        .char_indices()
        .nth(count)
        .map(|(i, _)| offset + i)
        .unwrap_or(content.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_content_keeps_offset() {
        let content = "the quick brown fox";
        let bookmark = CaretBookmark::capture(content, 10);
        assert_eq!(bookmark.resolve(content), 10);
    }

    #[test]
    fn test_insertion_before_caret_shifts_offset() {
        let old = "hello world";
        let bookmark = CaretBookmark::capture(old, 6); // before "world"

        let new = "PREFIX hello world";
        let resolved = bookmark.resolve(new);
        assert_eq!(&new[resolved..resolved + 5], "world");
    }

    #[test]
    fn test_unresolvable_falls_back_to_start() {
        let bookmark = CaretBookmark::capture("alpha beta gamma", 8);
        assert_eq!(bookmark.resolve("completely different text"), 0);
    }

    #[test]
    fn test_caret_clamped_to_length() {
        let bookmark = CaretBookmark::capture("abc", 99);
        assert_eq!(bookmark.resolve("abc"), 3);
    }

    #[test]
    fn test_empty_new_content() {
        let bookmark = CaretBookmark::capture("some text", 4);
        assert_eq!(bookmark.resolve(""), 0);
    }

    #[test]
    fn test_multibyte_boundary_clamp() {
        let content = "héllo wörld";
        // 2 lands inside the two-byte 'é'; capture must not panic.
        let bookmark = CaretBookmark::capture(content, 2);
        let resolved = bookmark.resolve(content);
        assert!(content.is_char_boundary(resolved));
    }

    #[test]
    fn test_prefix_only_anchor() {
        let old = "abcdef";
        let bookmark = CaretBookmark::capture(old, 6); // caret at end, no suffix
        let new = "xx abcdef yy";
        let resolved = bookmark.resolve(new);
        assert_eq!(&new[resolved - 6..resolved], "abcdef");
    }
}
