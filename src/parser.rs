//! Structural markdown parser.
//!
//! Turns raw document text into an ordered tree of [`Section`]s rooted at
//! level 0. Each heading of level L closes every open section of level >= L
//! and opens a new child under the nearest open ancestor of lower level.
//! Non-heading lines accumulate into the body of the deepest open section.
//!
//! Fenced code blocks are opaque: heading markers inside a fence are body
//! text, not structure. An unterminated fence is closed implicitly at end of
//! document — recovered, logged, never fatal.

use tracing::warn;

/// A node in the parsed structure tree.
///
/// The root has level 0 and an empty heading; its body holds any text that
/// precedes the first heading. Child levels are strictly greater than their
/// parent's, and children preserve source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub level: usize,
    pub heading: String,
    pub body: String,
    pub children: Vec<Section>,
}

impl Section {
    fn new(level: usize, heading: String) -> Self {
        Self {
            level,
            heading,
            body: String::new(),
            children: Vec::new(),
        }
    }

    fn push_body_line(&mut self, line: &str) {
        if !self.body.is_empty() {
            self.body.push('\n');
        }
        self.body.push_str(line);
    }
}

/// Parse markdown text into a [`Section`] tree.
pub fn parse(text: &str) -> Section {
    let mut stack: Vec<Section> = vec![Section::new(0, String::new())];
    let mut in_fence = false;

    for line in text.lines() {
        if is_fence_marker(line) {
            in_fence = !in_fence;
            stack.last_mut().unwrap().push_body_line(line);
            continue;
        }

        if !in_fence {
            if let Some((level, heading)) = heading_marker(line) {
                while stack.last().unwrap().level >= level {
                    let closed = stack.pop().unwrap();
                    stack.last_mut().unwrap().children.push(closed);
                }
                stack.push(Section::new(level, heading));
                continue;
            }
        }

        stack.last_mut().unwrap().push_body_line(line);
    }

    if in_fence {
        warn!("unterminated fenced block; closing at end of document");
    }

    while stack.len() > 1 {
        let closed = stack.pop().unwrap();
        stack.last_mut().unwrap().children.push(closed);
    }
    stack.pop().unwrap()
}

fn is_fence_marker(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Recognize an ATX heading: 1–6 `#` characters followed by a space (or
/// nothing). Returns the level and the trimmed heading text.
fn heading_marker(line: &str) -> Option<(usize, String)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((hashes, rest.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_levels_increase(section: &Section) {
        for child in &section.children {
            assert!(
                child.level > section.level,
                "child level {} not greater than parent level {}",
                child.level,
                section.level
            );
            assert_levels_increase(child);
        }
    }

    #[test]
    fn test_flat_document() {
        let root = parse("just some text\n\nno headings at all");
        assert_eq!(root.level, 0);
        assert!(root.children.is_empty());
        assert_eq!(root.body, "just some text\n\nno headings at all");
    }

    #[test]
    fn test_nested_headings() {
        let root = parse("# A\nalpha\n## B\nbeta\n### C\ngamma\n## D\ndelta\n");
        assert_eq!(root.children.len(), 1);
        let a = &root.children[0];
        assert_eq!(a.heading, "A");
        assert_eq!(a.body, "alpha");
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].heading, "B");
        assert_eq!(a.children[0].children[0].heading, "C");
        assert_eq!(a.children[1].heading, "D");
        assert_levels_increase(&root);
    }

    #[test]
    fn test_skipped_levels() {
        // ### directly under # still nests; closing ## later attaches to #.
        let root = parse("# A\n### C\ndeep\n## B\nshallow\n");
        let a = &root.children[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].heading, "C");
        assert_eq!(a.children[0].level, 3);
        assert_eq!(a.children[1].heading, "B");
        assert_eq!(a.children[1].level, 2);
        assert_levels_increase(&root);
    }

    #[test]
    fn test_sibling_heading_closes_previous() {
        let root = parse("# One\nfirst\n# Two\nsecond\n");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].heading, "One");
        assert_eq!(root.children[1].heading, "Two");
    }

    #[test]
    fn test_fenced_block_is_opaque() {
        let text = "# Top\n```\n# not a heading\ncode line\n```\nafter\n";
        let root = parse(text);
        assert_eq!(root.children.len(), 1);
        let top = &root.children[0];
        assert!(top.children.is_empty());
        assert!(top.body.contains("# not a heading"));
        assert!(top.body.contains("after"));
    }

    #[test]
    fn test_unterminated_fence_recovers() {
        let text = "# Top\n```\n# swallowed\n";
        let root = parse(text);
        assert_eq!(root.children.len(), 1);
        assert!(root.children[0].body.contains("# swallowed"));
    }

    #[test]
    fn test_text_before_first_heading() {
        let root = parse("preamble\n\n# A\nbody\n");
        assert_eq!(root.body, "preamble\n");
        assert_eq!(root.children[0].heading, "A");
    }

    #[test]
    fn test_hash_without_space_is_not_heading() {
        let root = parse("#nospace\n");
        assert!(root.children.is_empty());
        assert_eq!(root.body, "#nospace");
    }

    #[test]
    fn test_heading_without_text() {
        let root = parse("#\nbody\n");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].heading, "");
    }
}
