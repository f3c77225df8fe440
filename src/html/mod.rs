//! HTML fragment handling: parsing into position-mapped trees, splitting
//! continuous highlighted fragments into per-line fragments, and merging
//! diff markers into highlighted markup.

pub mod merge;
pub mod parse;
pub mod split;

pub use merge::{merge_html_with_diff, ChangeKind, ChangeRange, DiffTagClasses, RenderElement};
pub use parse::{parse_html, HtmlNode, ParsedHtml};
pub use split::{is_continuous_html, process_rendered_lines, split_continuous_html};
