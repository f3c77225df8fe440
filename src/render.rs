//! Turning one aligned line into renderable content.
//!
//! A line renders through a priority ladder: word-diff segments are merged
//! into the pre-rendered HTML when present, otherwise emitted as marker
//! elements; lines without a word diff pass their rendered HTML through
//! untouched; forced word highlights apply only where no automatic word diff
//! exists; everything else falls back to plain text.

use tracing::warn;

use crate::compute_lines::{DiffSide, DiffType, SideContent, WordDiffSegment};
use crate::html::{
    merge_html_with_diff, parse_html, ChangeKind, ChangeRange, DiffTagClasses, RenderElement,
};

/// Which half of the diff a highlight or line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A caller-forced word-level highlight, applied even on pure
/// additions/deletions where no automatic word diff is computed. Columns are
/// 0-based byte offsets into the line, half-open; offsets that do not land on
/// a char boundary of the text they address are ignored rather than
/// splitting mid-character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordHighlight {
    pub side: Side,
    /// 1-based line number on that side.
    pub line_number: u32,
    pub start_column: usize,
    pub end_column: usize,
    pub kind: ChangeKind,
}

/// The rendered form of one line, for the presentation layer to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedContent {
    /// Merged or marker element tree.
    Elements(Vec<RenderElement>),
    /// Pre-rendered HTML passed through untouched.
    Html(String),
    /// Plain text, no markup.
    Text(String),
}

/// Render word-diff segments, merging them into `rendered_html` when present.
///
/// With rendered HTML, each segment's text is located in the HTML's
/// plain-text projection with a forward-moving search offset so repeated
/// tokens resolve to successive occurrences. A segment whose text cannot be
/// found is skipped with a warning and renders unwrapped.
pub fn render_word_diff(
    segments: &[WordDiffSegment],
    rendered_html: Option<&str>,
    classes: &DiffTagClasses,
) -> Vec<RenderElement> {
    let Some(html) = rendered_html else {
        return segments_to_elements(segments, classes);
    };

    let plain_text = parse_html(html).plain_text;
    let mut changes = Vec::new();
    let mut search_offset = 0usize;

    for segment in segments {
        if segment.value.is_empty() {
            continue;
        }
        let Some(found) = plain_text[search_offset..].find(&segment.value) else {
            warn!(token = %segment.value, "token not found in rendered line");
            continue;
        };
        let position = search_offset + found;
        let end = position + segment.value.len();

        match segment.kind {
            DiffType::Added => changes.push(ChangeRange {
                start: position,
                end,
                kind: ChangeKind::Added,
            }),
            DiffType::Removed => changes.push(ChangeRange {
                start: position,
                end,
                kind: ChangeKind::Removed,
            }),
            _ => {}
        }
        search_offset = end;
    }

    merge_html_with_diff(html, &changes, classes)
}

/// Marker-element rendering for word diffs without pre-rendered HTML.
fn segments_to_elements(
    segments: &[WordDiffSegment],
    classes: &DiffTagClasses,
) -> Vec<RenderElement> {
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let (tag, class_name) = match segment.kind {
                DiffType::Added => (
                    "ins",
                    format!("{} {}", classes.word_diff, classes.word_added),
                ),
                DiffType::Removed => (
                    "del",
                    format!("{} {}", classes.word_diff, classes.word_removed),
                ),
                _ => ("span", classes.word_diff.clone()),
            };
            let key = index.to_string();
            RenderElement::Element {
                key: key.clone(),
                tag: tag.to_string(),
                class_name: Some(class_name),
                style: Vec::new(),
                attrs: Default::default(),
                children: vec![RenderElement::Text {
                    key: format!("{key}-0"),
                    text: segment.value.clone(),
                }],
            }
        })
        .collect()
}

/// Highlights targeting this side and line. For rows where one side is
/// empty (inline view), `fallback_line_number` carries the other column's
/// line number.
pub fn highlights_for_line<'a>(
    highlights: &'a [WordHighlight],
    side: Side,
    line_number: Option<u32>,
    fallback_line_number: Option<u32>,
) -> Vec<&'a WordHighlight> {
    let Some(effective) = line_number.or(fallback_line_number) else {
        return Vec::new();
    };
    highlights
        .iter()
        .filter(|h| h.side == side && h.line_number == effective)
        .collect()
}

fn highlight_changes(highlights: &[&WordHighlight]) -> Vec<ChangeRange> {
    highlights
        .iter()
        .map(|h| ChangeRange {
            start: h.start_column,
            end: h.end_column,
            kind: h.kind,
        })
        .collect()
}

/// Render one side of an aligned row.
///
/// Automatic word diffs take precedence over forced highlights, so a CHANGED
/// pair never gets highlights applied on top of its word diff.
pub fn render_line(
    side: &DiffSide,
    highlights: &[&WordHighlight],
    classes: &DiffTagClasses,
) -> RenderedContent {
    let rendered = side.rendered_html.as_deref();
    match &side.value {
        SideContent::Segments(segments) => {
            RenderedContent::Elements(render_word_diff(segments, rendered, classes))
        }
        SideContent::Text(text) => match rendered {
            Some(html) if !highlights.is_empty() => RenderedContent::Elements(
                merge_html_with_diff(html, &highlight_changes(highlights), classes),
            ),
            Some(html) => RenderedContent::Html(html.to_string()),
            None if !highlights.is_empty() => RenderedContent::Elements(merge_html_with_diff(
                text,
                &highlight_changes(highlights),
                classes,
            )),
            None => RenderedContent::Text(text.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segment(value: &str, kind: DiffType) -> WordDiffSegment {
        WordDiffSegment {
            value: value.to_string(),
            kind,
        }
    }

    fn flatten_text(elements: &[RenderElement]) -> String {
        elements.iter().map(RenderElement::text_content).collect()
    }

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
    fn segments_without_rendered_html_become_marker_elements() {
        let classes = DiffTagClasses::default();
        let elements = render_word_diff(
            &[
                segment("keep ", DiffType::Default),
                segment("old", DiffType::Removed),
                segment("new", DiffType::Added),
            ],
            None,
            &classes,
        );

        assert_eq!(elements.len(), 3);
        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(
            markers,
            vec![
                ("del".to_string(), "old".to_string()),
                ("ins".to_string(), "new".to_string()),
            ]
        );
        assert_eq!(flatten_text(&elements), "keep oldnew");
    }

    #[test]
    fn repeated_tokens_resolve_to_successive_occurrences() {
        // Both "a" tokens must map to distinct positions, not both to the
        // first occurrence.
        let html = "<span>a + a</span>";
        let elements = render_word_diff(
            &[
                segment("a", DiffType::Default),
                segment(" + ", DiffType::Default),
                segment("a", DiffType::Removed),
            ],
            Some(html),
            &DiffTagClasses::default(),
        );

        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(markers, vec![("del".to_string(), "a".to_string())]);
        assert_eq!(flatten_text(&elements), "a + a");
    }

    #[test]
    fn exact_token_wrapped_despite_substring_collision() {
        let html =
            r#"<span class="var">selectedOption</span>.<span class="prop">avatarUrl</span>"#;
        let elements = render_word_diff(
            &[segment("selectedOption", DiffType::Removed)],
            Some(html),
            &DiffTagClasses::default(),
        );

        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(
            markers,
            vec![("del".to_string(), "selectedOption".to_string())]
        );
        assert_eq!(flatten_text(&elements), "selectedOption.avatarUrl");
    }

    #[test]
    fn unresolvable_token_is_skipped_not_fatal() {
        let html = "<span>actual text</span>";
        let elements = render_word_diff(
            &[
                segment("missing", DiffType::Removed),
                segment("actual", DiffType::Added),
            ],
            Some(html),
            &DiffTagClasses::default(),
        );

        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(markers, vec![("ins".to_string(), "actual".to_string())]);
        assert_eq!(flatten_text(&elements), "actual text");
    }

    #[test]
    fn word_diff_takes_precedence_over_forced_highlights() {
        let side = DiffSide {
            line_number: Some(1),
            kind: DiffType::Changed,
            value: SideContent::Segments(vec![segment("old", DiffType::Removed)]),
            rendered_html: None,
        };
        let highlight = WordHighlight {
            side: Side::Left,
            line_number: 1,
            start_column: 0,
            end_column: 3,
            kind: ChangeKind::Added,
        };
        let content = render_line(&side, &[&highlight], &DiffTagClasses::default());

        let RenderedContent::Elements(elements) = content else {
            panic!("expected element content");
        };
        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(markers, vec![("del".to_string(), "old".to_string())]);
    }

    #[test]
    fn forced_highlights_apply_to_plain_text_lines() {
        let side = DiffSide {
            line_number: Some(2),
            kind: DiffType::Added,
            value: SideContent::Text("renamed_symbol()".to_string()),
            rendered_html: None,
        };
        let highlight = WordHighlight {
            side: Side::Right,
            line_number: 2,
            start_column: 0,
            end_column: 14,
            kind: ChangeKind::Added,
        };
        let content = render_line(&side, &[&highlight], &DiffTagClasses::default());

        let RenderedContent::Elements(elements) = content else {
            panic!("expected element content");
        };
        let mut markers = Vec::new();
        collect_markers(&elements, &mut markers);
        assert_eq!(
            markers,
            vec![("ins".to_string(), "renamed_symbol".to_string())]
        );
    }

    #[test]
    fn rendered_html_passes_through_without_diff_or_highlights() {
        let side = DiffSide {
            line_number: Some(3),
            kind: DiffType::Default,
            value: SideContent::Text("let x = 1;".to_string()),
            rendered_html: Some("<span class=\"k\">let</span> x = 1;".to_string()),
        };
        let content = render_line(&side, &[], &DiffTagClasses::default());
        assert_eq!(
            content,
            RenderedContent::Html("<span class=\"k\">let</span> x = 1;".to_string())
        );
    }

    #[test]
    fn plain_text_falls_through_unchanged() {
        let side = DiffSide {
            line_number: Some(4),
            kind: DiffType::Default,
            value: SideContent::Text("plain".to_string()),
            rendered_html: None,
        };
        assert_eq!(
            render_line(&side, &[], &DiffTagClasses::default()),
            RenderedContent::Text("plain".to_string())
        );
    }

    #[test]
    fn highlight_filter_matches_side_and_line() {
        let highlights = vec![
            WordHighlight {
                side: Side::Left,
                line_number: 5,
                start_column: 0,
                end_column: 1,
                kind: ChangeKind::Removed,
            },
            WordHighlight {
                side: Side::Right,
                line_number: 5,
                start_column: 0,
                end_column: 1,
                kind: ChangeKind::Added,
            },
        ];

        let left = highlights_for_line(&highlights, Side::Left, Some(5), None);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].side, Side::Left);

        // Empty half of an inline row falls back to the companion number.
        let fallback = highlights_for_line(&highlights, Side::Right, None, Some(5));
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].side, Side::Right);

        assert!(highlights_for_line(&highlights, Side::Left, None, None).is_empty());
    }
}
