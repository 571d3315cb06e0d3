//! Message formatting boundary
//!
//! Channel-specific formatting and escaping are owned by the broadcast
//! target, not by the rotation core. The dispatcher only needs a primary
//! payload plus optional secondary payloads to thread underneath it.

use crate::catalog::ContentItem;

/// Payloads produced for a single publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPost {
    /// Primary message sent to the channel
    pub primary: String,

    /// Secondary messages sent as thread follow-ups, best-effort
    pub secondary: Vec<String>,
}

/// Turns a content item into channel payloads
pub trait Formatter: Send + Sync {
    fn format(&self, item: &ContentItem) -> FormattedPost;
}

/// Minimal formatter: title and body, no markup, no follow-ups
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn format(&self, item: &ContentItem) -> FormattedPost {
        let primary = if item.body.is_empty() {
            item.title.clone()
        } else {
            format!("{}\n\n{}", item.title, item.body)
        };

        FormattedPost {
            primary,
            secondary: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_formatter_with_body() {
        let item = ContentItem::new("t1", "algorithms", "Sorting", "Merge sort basics");
        let post = PlainFormatter.format(&item);

        assert_eq!(post.primary, "Sorting\n\nMerge sort basics");
        assert!(post.secondary.is_empty());
    }

    #[test]
    fn test_plain_formatter_title_only() {
        let item = ContentItem::new("t2", "databases", "Indexes", "");
        let post = PlainFormatter.format(&item);

        assert_eq!(post.primary, "Indexes");
    }
}
