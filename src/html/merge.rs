//! Injecting `<ins>`/`<del>` markers into pre-rendered highlighted HTML.
//!
//! Change ranges are byte offsets into the plain-text projection of the
//! fragment (see [`super::parse`]). Text nodes are split at range boundaries
//! and the fully covered pieces wrapped, leaving the highlighter's own tags
//! untouched.

use std::collections::BTreeMap;

use super::parse::{parse_html, HtmlNode};

/// What a [`ChangeRange`] marks in the plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Default,
}

/// A half-open `[start, end)` byte range in the plain-text projection.
/// Offsets inside a multi-byte character create no boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRange {
    pub start: usize,
    pub end: usize,
    pub kind: ChangeKind,
}

/// CSS class names attached to the injected marker elements.
#[derive(Debug, Clone)]
pub struct DiffTagClasses {
    pub word_diff: String,
    pub word_added: String,
    pub word_removed: String,
}

impl Default for DiffTagClasses {
    fn default() -> Self {
        Self {
            word_diff: "word-diff".to_string(),
            word_added: "word-added".to_string(),
            word_removed: "word-removed".to_string(),
        }
    }
}

impl DiffTagClasses {
    fn class_for(&self, kind: ChangeKind) -> String {
        let specific = match kind {
            ChangeKind::Added => &self.word_added,
            ChangeKind::Removed => &self.word_removed,
            ChangeKind::Default => return self.word_diff.clone(),
        };
        format!("{} {}", self.word_diff, specific)
    }
}

/// A renderable element tree, the merge output handed to the presentation
/// layer. Keys are positionally derived ("0", "0-1") and stable across
/// identical inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderElement {
    Text {
        key: String,
        text: String,
    },
    Element {
        key: String,
        tag: String,
        class_name: Option<String>,
        style: Vec<(String, String)>,
        attrs: BTreeMap<String, String>,
        children: Vec<RenderElement>,
    },
}

impl RenderElement {
    /// Concatenated text content, in document order.
    pub fn text_content(&self) -> String {
        match self {
            RenderElement::Text { text, .. } => text.clone(),
            RenderElement::Element { children, .. } => {
                children.iter().map(RenderElement::text_content).collect()
            }
        }
    }
}

/// Parse `html`, wrap the characters covered by non-default `changes` in
/// insertion/deletion markers, and return the renderable tree.
pub fn merge_html_with_diff(
    html: &str,
    changes: &[ChangeRange],
    classes: &DiffTagClasses,
) -> Vec<RenderElement> {
    if html.is_empty() {
        return Vec::new();
    }
    let parsed = parse_html(html);
    let tree = inject_diff_tags(parsed.tree, changes, classes);
    tree_to_elements(&tree)
}

/// Rewrite the tree so every text span fully covered by a non-default change
/// range is wrapped in an `<ins>`/`<del>` element. Boundaries strictly inside
/// a text node's span split it; partially covered sub-spans stay unwrapped.
pub fn inject_diff_tags(
    tree: Vec<HtmlNode>,
    changes: &[ChangeRange],
    classes: &DiffTagClasses,
) -> Vec<HtmlNode> {
    if changes.is_empty() {
        return tree;
    }
    tree.into_iter()
        .flat_map(|node| process_node(node, changes, classes))
        .collect()
}

fn process_node(
    node: HtmlNode,
    changes: &[ChangeRange],
    classes: &DiffTagClasses,
) -> Vec<HtmlNode> {
    match node {
        HtmlNode::Element {
            tag,
            attrs,
            children,
        } => {
            let children = children
                .into_iter()
                .flat_map(|child| process_node(child, changes, classes))
                .collect();
            vec![HtmlNode::Element {
                tag,
                attrs,
                children,
            }]
        }
        HtmlNode::Text { text, start, end } => {
            let overlapping: Vec<&ChangeRange> = changes
                .iter()
                .filter(|change| !(change.end <= start || change.start >= end))
                .collect();
            if overlapping.is_empty() {
                return vec![HtmlNode::Text { text, start, end }];
            }

            let mut boundaries: Vec<usize> = Vec::new();
            for change in &overlapping {
                if change.start > start && change.start < end {
                    boundaries.push(change.start);
                }
                if change.end > start && change.end < end {
                    boundaries.push(change.end);
                }
            }
            boundaries.sort_unstable();
            boundaries.dedup();

            split_text(&text, start, end, &boundaries)
                .into_iter()
                .map(|(segment, seg_start, seg_end)| {
                    let piece = HtmlNode::Text {
                        text: segment,
                        start: seg_start,
                        end: seg_end,
                    };
                    let containing = changes
                        .iter()
                        .find(|c| c.start <= seg_start && c.end >= seg_end);
                    match containing {
                        Some(change) if change.kind != ChangeKind::Default => {
                            wrap_with_diff_tag(piece, change.kind, classes)
                        }
                        _ => piece,
                    }
                })
                .collect()
        }
    }
}

/// Split one text node at the given plain-text positions. Positions are
/// expected to be strictly inside `[start, end)` and sorted; empty segments
/// are dropped. Positions that do not land on a char boundary of `text` are
/// ignored rather than splitting mid-character.
fn split_text(text: &str, start: usize, end: usize, boundaries: &[usize]) -> Vec<(String, usize, usize)> {
    if boundaries.is_empty() {
        return vec![(text.to_string(), start, end)];
    }

    let mut pieces = Vec::new();
    let mut cursor = start;
    for &boundary in boundaries {
        if !text.is_char_boundary(boundary - start) {
            continue;
        }
        let segment = &text[cursor - start..boundary - start];
        if !segment.is_empty() {
            pieces.push((segment.to_string(), cursor, boundary));
        }
        cursor = boundary;
    }
    let tail = &text[cursor - start..];
    if !tail.is_empty() {
        pieces.push((tail.to_string(), cursor, end));
    }
    pieces
}

fn wrap_with_diff_tag(node: HtmlNode, kind: ChangeKind, classes: &DiffTagClasses) -> HtmlNode {
    let tag = match kind {
        ChangeKind::Added => "ins",
        ChangeKind::Removed => "del",
        ChangeKind::Default => "span",
    };
    let mut attrs = BTreeMap::new();
    attrs.insert("class".to_string(), classes.class_for(kind));
    HtmlNode::Element {
        tag: tag.to_string(),
        attrs,
        children: vec![node],
    }
}

/// Convert the (possibly rewritten) tree into renderable elements. The
/// `class` attribute maps to `class_name`, `style` is parsed from its CSS
/// declaration string, everything else passes through verbatim.
pub fn tree_to_elements(tree: &[HtmlNode]) -> Vec<RenderElement> {
    tree.iter()
        .enumerate()
        .map(|(index, node)| node_to_element(node, index.to_string()))
        .collect()
}

fn node_to_element(node: &HtmlNode, key: String) -> RenderElement {
    match node {
        HtmlNode::Text { text, .. } => RenderElement::Text {
            key,
            text: text.clone(),
        },
        HtmlNode::Element {
            tag,
            attrs,
            children,
        } => {
            let mut class_name = None;
            let mut style = Vec::new();
            let mut passthrough = BTreeMap::new();
            for (name, value) in attrs {
                match name.as_str() {
                    "class" => class_name = Some(value.clone()),
                    "style" => style = parse_style(value),
                    _ => {
                        passthrough.insert(name.clone(), value.clone());
                    }
                }
            }
            let children = children
                .iter()
                .enumerate()
                .map(|(index, child)| node_to_element(child, format!("{key}-{index}")))
                .collect();
            RenderElement::Element {
                key,
                tag: tag.clone(),
                class_name,
                style,
                attrs: passthrough,
                children,
            }
        }
    }
}

/// Parse `"color: red; font-size: 14px"` into ordered property pairs with
/// kebab-case names converted to camelCase.
fn parse_style(css: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for declaration in css.split(';') {
        let Some(colon) = declaration.find(':') else {
            continue;
        };
        let property = declaration[..colon].trim();
        let value = declaration[colon + 1..].trim();
        if property.is_empty() || value.is_empty() {
            continue;
        }
        pairs.push((kebab_to_camel(property), value.to_string()));
    }
    pairs
}

fn kebab_to_camel(property: &str) -> String {
    let mut result = String::with_capacity(property.len());
    let mut upper_next = false;
    for ch in property.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            result.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn removed(start: usize, end: usize) -> ChangeRange {
        ChangeRange {
            start,
            end,
            kind: ChangeKind::Removed,
        }
    }

    fn added(start: usize, end: usize) -> ChangeRange {
        ChangeRange {
            start,
            end,
            kind: ChangeKind::Added,
        }
    }

    fn flatten_text(elements: &[RenderElement]) -> String {
        elements.iter().map(RenderElement::text_content).collect()
    }

    /// Walk the tree collecting (tag, text_content) for every marker element.
    fn collect_markers(elements: &[RenderElement], out: &mut Vec<(String, String)>) {
        for element in elements {
            if let RenderElement::Element { tag, children, .. } = element {
                if tag == "ins" || tag == "del" {
                    out.push((tag.clone(), flatten_text(children)));
                }
                collect_markers(children, out);
            }
        }
    }

    #[test]
    fn wraps_exact_range_not_substring_elsewhere() {
        // "selectedOption" occupies [0, 14); ".avatarUrl" follows it. Only
        // the first text node may be wrapped even though "Option" and "avatar"
        // share characters with other spans.
        let html = r#"<span class="var">selectedOption</span>.<span class="prop">avatarUrl</span>"#;
        let elements =
            merge_html_with_diff(html, &[removed(0, 14)], &DiffTagClasses::default());

        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(markers, vec![("del".to_string(), "selectedOption".to_string())]);
        assert_eq!(flatten_text(&elements), "selectedOption.avatarUrl");
    }

    #[test]
    fn splits_text_node_at_interior_boundaries() {
        let elements = merge_html_with_diff(
            "<span>hello world</span>",
            &[added(6, 11)],
            &DiffTagClasses::default(),
        );

        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(markers, vec![("ins".to_string(), "world".to_string())]);
        assert_eq!(flatten_text(&elements), "hello world");
    }

    #[test]
    fn marker_carries_merged_class_list() {
        let classes = DiffTagClasses {
            word_diff: "wd".to_string(),
            word_added: "wa".to_string(),
            word_removed: "wr".to_string(),
        };
        let elements = merge_html_with_diff("<span>abc</span>", &[added(0, 3)], &classes);

        let RenderElement::Element { children, .. } = &elements[0] else {
            panic!("expected element root");
        };
        let RenderElement::Element {
            tag, class_name, ..
        } = &children[0]
        else {
            panic!("expected marker element");
        };
        assert_eq!(tag, "ins");
        assert_eq!(class_name.as_deref(), Some("wd wa"));
    }

    #[test]
    fn empty_changes_render_tree_unmodified() {
        let elements = merge_html_with_diff(
            r#"<span class="k">let</span> x"#,
            &[],
            &DiffTagClasses::default(),
        );
        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert!(markers.is_empty());
        assert_eq!(flatten_text(&elements), "let x");
    }

    #[test]
    fn degenerate_ranges_are_inert() {
        let html = "<span>stable</span>";
        let zero_length = merge_html_with_diff(html, &[added(2, 2)], &DiffTagClasses::default());
        let inverted = merge_html_with_diff(html, &[removed(4, 1)], &DiffTagClasses::default());
        let out_of_bounds =
            merge_html_with_diff(html, &[added(20, 30)], &DiffTagClasses::default());

        for elements in [zero_length, inverted, out_of_bounds] {
            let mut markers = Vec::new();
            collect_markers(&elements, &mut markers);
            assert!(markers.is_empty());
            assert_eq!(flatten_text(&elements), "stable");
        }
    }

    #[test]
    fn partially_covered_segment_stays_unwrapped() {
        // The range [3, 8) spans two text nodes. The sub-spans it fully
        // contains ("lo" and " wo") get wrapped; the uncovered prefix and
        // suffix stay plain.
        let html = "<span>hello</span><span> world</span>";
        let elements =
            merge_html_with_diff(html, &[removed(3, 8)], &DiffTagClasses::default());

        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(
            markers,
            vec![
                ("del".to_string(), "lo".to_string()),
                ("del".to_string(), " wo".to_string()),
            ]
        );
        assert_eq!(flatten_text(&elements), "hello world");
    }

    #[test]
    fn mid_character_offsets_create_no_boundary() {
        // "é" spans bytes 1..3; an offset at byte 2 is inside it and must
        // neither split nor panic.
        let elements = merge_html_with_diff(
            "<span>héllo</span>",
            &[removed(2, 3)],
            &DiffTagClasses::default(),
        );
        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert!(markers.is_empty());
        assert_eq!(flatten_text(&elements), "héllo");
    }

    #[test]
    fn first_matching_range_wins_on_conflict() {
        let elements = merge_html_with_diff(
            "<span>token</span>",
            &[removed(0, 5), added(0, 5)],
            &DiffTagClasses::default(),
        );
        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(markers, vec![("del".to_string(), "token".to_string())]);
    }

    #[test]
    fn style_attribute_parses_to_camel_case_pairs() {
        let elements = merge_html_with_diff(
            r#"<span style="color: red; font-size: 14px; ; broken">x</span>"#,
            &[],
            &DiffTagClasses::default(),
        );
        let RenderElement::Element { style, .. } = &elements[0] else {
            panic!("expected element root");
        };
        assert_eq!(
            style,
            &vec![
                ("color".to_string(), "red".to_string()),
                ("fontSize".to_string(), "14px".to_string()),
            ]
        );
    }

    #[test]
    fn positional_keys_are_stable() {
        let elements = merge_html_with_diff(
            "<span>a<span>b</span></span>",
            &[],
            &DiffTagClasses::default(),
        );
        let RenderElement::Element { key, children, .. } = &elements[0] else {
            panic!("expected element root");
        };
        assert_eq!(key, "0");
        let RenderElement::Element { key, .. } = &children[1] else {
            panic!("expected nested element");
        };
        assert_eq!(key, "0-1");
    }

    #[test]
    fn empty_html_merges_to_nothing() {
        assert_eq!(
            merge_html_with_diff("", &[added(0, 1)], &DiffTagClasses::default()),
            Vec::<RenderElement>::new()
        );
    }
}
