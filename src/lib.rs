//! Core diff engine for side-by-side and inline diff views.
//!
//! Two texts (or JSON values) are aligned into ordered line pairs with
//! per-line classification and word-level sub-diffs. From the aligned rows,
//! unchanged runs are grouped into foldable blocks. When pre-rendered
//! syntax-highlighted HTML is supplied, it is broken into per-line fragments
//! and merged with the word-diff ranges so highlighting and diff markers
//! coexist in one tree.
//!
//! The presentation layer is not part of this crate: everything here is a
//! pure function from strings and options to structured results, plus a
//! memoization cache and an optional worker thread for off-thread execution.
//!
//! ```
//! use diffview::{compute_diff_view, DiffInput, DiffOptions, DiffType};
//!
//! let view = compute_diff_view(&DiffOptions {
//!     old: DiffInput::Text("a\nb\nc".to_string()),
//!     new: DiffInput::Text("a\nx\nc".to_string()),
//!     ..DiffOptions::default()
//! })
//! .unwrap();
//!
//! assert_eq!(view.line_information.len(), 3);
//! assert_eq!(view.line_information[1].left.kind, DiffType::Changed);
//! assert_eq!(view.line_information[1].right.kind, DiffType::Changed);
//! ```

pub mod cache;
pub mod compute_lines;
pub mod error;
pub mod hidden_blocks;
pub mod highlight;
pub mod html;
pub mod render;

pub use cache::{compute_diff_view, CacheKey, ComputedDiff, DiffCache, DiffWorker};
pub use compute_lines::{
    compute_line_information, ChangeChunk, CustomCompare, DiffInput, DiffMethod, DiffOptions,
    DiffSide, DiffType, LineDiff, LineId, LineInformation, SideContent, WordDiffSegment,
};
pub use error::DiffError;
pub use hidden_blocks::{compute_hidden_blocks, Block, HiddenBlocks};
pub use highlight::Highlighter;
pub use html::{
    is_continuous_html, merge_html_with_diff, parse_html, process_rendered_lines,
    split_continuous_html, ChangeKind, ChangeRange, DiffTagClasses, HtmlNode, ParsedHtml,
    RenderElement,
};
pub use render::{
    highlights_for_line, render_line, render_word_diff, RenderedContent, Side, WordHighlight,
};
