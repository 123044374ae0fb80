/*!
 * Path parsing for the namespace store
 */

/// A path split into its segments.
///
/// Leading/trailing whitespace is trimmed and repeated separators are
/// collapsed; "." and ".." are kept as segments and interpreted during
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath<'a> {
    /// Whether resolution starts at the root
    pub absolute: bool,
    /// Non-empty segments in order
    pub segments: Vec<&'a str>,
}

impl<'a> ParsedPath<'a> {
    /// Parse a user-supplied path
    pub fn parse(path: &'a str) -> Self {
        let trimmed = path.trim();
        Self {
            absolute: trimmed.starts_with('/'),
            segments: trimmed.split('/').filter(|s| !s.is_empty()).collect(),
        }
    }

    /// Split off the final segment, returning the parent path and basename.
    ///
    /// Returns `None` when there is no final segment (e.g. "/" or "").
    pub fn split_last(mut self) -> Option<(Self, &'a str)> {
        let name = self.segments.pop()?;
        Some((self, name))
    }
}

/// Whether `name` may be used for a new directory entry
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
