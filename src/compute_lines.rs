//! Line alignment and word-level diffing between two texts.
//!
//! [`compute_line_information`] aligns the old and new text into ordered line
//! pairs, classifies each side, and computes a word-level sub-diff for changed
//! pairs. The output drives both the split and inline views downstream.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::error::DiffError;
use crate::html::split::process_rendered_lines;

/// Classification of one side of an aligned line pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiffType {
    #[default]
    Default,
    Added,
    Removed,
    Changed,
}

/// One chunk of a word-level sub-diff. Concatenating the `Default` and
/// `Removed` segments of the left side reconstructs the left line exactly;
/// `Default` and `Added` on the right reconstruct the right line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordDiffSegment {
    pub value: String,
    pub kind: DiffType,
}

/// Content of one side of a line pair: the raw line, or the ordered word-diff
/// segments of a changed pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideContent {
    Text(String),
    Segments(Vec<WordDiffSegment>),
}

impl Default for SideContent {
    fn default() -> Self {
        SideContent::Text(String::new())
    }
}

/// One side of an aligned row. The empty half of a pure addition/removal row
/// is `DiffSide::default()`: no line number, `Default` kind, empty text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffSide {
    pub line_number: Option<u32>,
    pub kind: DiffType,
    pub value: SideContent,
    /// Per-line syntax-highlighted fragment, when rendered HTML was supplied.
    pub rendered_html: Option<String>,
}

/// One aligned row of the diff output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineInformation {
    pub left: DiffSide,
    pub right: DiffSide,
}

/// jsdiff-style change chunk produced by custom comparison functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeChunk {
    pub value: String,
    pub added: bool,
    pub removed: bool,
}

/// A caller-supplied comparison function with a stable name for cache keying.
pub struct CustomCompare {
    name: String,
    compare: Box<dyn Fn(&str, &str) -> Vec<ChangeChunk> + Send + Sync>,
}

impl CustomCompare {
    pub fn new(
        name: impl Into<String>,
        compare: impl Fn(&str, &str) -> Vec<ChangeChunk> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            compare: Box::new(compare),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomCompare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCompare")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Text-comparison granularity for the word-level sub-diff of changed pairs.
#[derive(Debug, Clone, Default)]
pub enum DiffMethod {
    #[default]
    Chars,
    Words,
    WordsWithSpace,
    Lines,
    TrimmedLines,
    Sentences,
    Css,
    /// Both inputs are canonicalized to pretty-printed JSON before diffing.
    /// Key order is preserved as provided, not sorted.
    Json,
    Custom(Arc<CustomCompare>),
}

impl DiffMethod {
    /// Stable name used in cache keys and error messages.
    pub fn key_name(&self) -> &str {
        match self {
            DiffMethod::Chars => "chars",
            DiffMethod::Words => "words",
            DiffMethod::WordsWithSpace => "words-with-space",
            DiffMethod::Lines => "lines",
            DiffMethod::TrimmedLines => "trimmed-lines",
            DiffMethod::Sentences => "sentences",
            DiffMethod::Css => "css",
            DiffMethod::Json => "json",
            DiffMethod::Custom(custom) => custom.name(),
        }
    }
}

/// Input value for one side of the diff: raw text, or a JSON value to be
/// canonicalized under [`DiffMethod::Json`].
#[derive(Debug, Clone, PartialEq)]
pub enum DiffInput {
    Text(String),
    Json(serde_json::Value),
}

impl From<&str> for DiffInput {
    fn from(value: &str) -> Self {
        DiffInput::Text(value.to_string())
    }
}

impl From<String> for DiffInput {
    fn from(value: String) -> Self {
        DiffInput::Text(value)
    }
}

impl From<serde_json::Value> for DiffInput {
    fn from(value: serde_json::Value) -> Self {
        DiffInput::Json(value)
    }
}

/// A pinned line identifier: `"L20"` is line 20 on the left (old) side,
/// `"R18"` line 18 on the right (new) side. 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LineId {
    Left(u32),
    Right(u32),
}

impl FromStr for LineId {
    type Err = DiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DiffError::InvalidInput(format!("invalid line id: {s:?}"));
        if let Some(rest) = s.strip_prefix('L') {
            rest.parse().map(LineId::Left).map_err(|_| invalid())
        } else if let Some(rest) = s.strip_prefix('R') {
            rest.parse().map(LineId::Right).map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineId::Left(n) => write!(f, "L{n}"),
            LineId::Right(n) => write!(f, "R{n}"),
        }
    }
}

/// Options for one diff computation.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub old: DiffInput,
    pub new: DiffInput,
    pub disable_word_diff: bool,
    pub compare_method: DiffMethod,
    /// Offset added to the 1-based line numbers on both sides.
    pub lines_offset: u32,
    /// Rows that must never collapse into a hidden block.
    pub always_show_lines: Vec<LineId>,
    /// Unchanged-context margin kept visible around each change. Negative
    /// values are clamped to zero.
    pub extra_lines_surrounding_diff: i32,
    /// Pre-rendered syntax-highlighted HTML for the old side, either one
    /// fragment per line (newline-separated) or a continuous fragment.
    pub old_rendered: Option<String>,
    /// Same as `old_rendered`, for the new side.
    pub new_rendered: Option<String>,
    /// Compare lines with whitespace runs collapsed to a single space. The
    /// raw, non-normalized text is what gets displayed.
    pub ignore_whitespace: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            old: DiffInput::Text(String::new()),
            new: DiffInput::Text(String::new()),
            disable_word_diff: false,
            compare_method: DiffMethod::Chars,
            lines_offset: 0,
            always_show_lines: Vec::new(),
            extra_lines_surrounding_diff: 3,
            old_rendered: None,
            new_rendered: None,
            ignore_whitespace: false,
        }
    }
}

/// Output of [`compute_line_information`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineDiff {
    /// Ordered rows, top-to-bottom reading of a conventional diff.
    pub line_information: Vec<LineInformation>,
    /// Indices of rows that are not Default/Default, plus pinned rows.
    pub diff_lines: BTreeSet<usize>,
}

/// Align `old` and `new` into ordered line pairs with diff classification and
/// word-level sub-diffs.
///
/// Fails fast when a JSON input is supplied under a text-only comparison
/// method; every other anomaly degrades to best-effort output.
pub fn compute_line_information(options: &DiffOptions) -> Result<LineDiff, DiffError> {
    validate(options)?;

    let old_text = canonical_text(&options.old, &options.compare_method);
    let new_text = canonical_text(&options.new, &options.compare_method);

    let old_lines = construct_lines(strip_trailing_newline(&old_text));
    let new_lines = construct_lines(strip_trailing_newline(&new_text));

    let old_keys = comparison_keys(&old_lines, options.ignore_whitespace);
    let new_keys = comparison_keys(&new_lines, options.ignore_whitespace);
    let ops = capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys);

    let mut builder = RowBuilder {
        options,
        old_rendered: process_rendered_lines(options.old_rendered.as_deref()),
        new_rendered: process_rendered_lines(options.new_rendered.as_deref()),
        left_line: options.lines_offset,
        right_line: options.lines_offset,
        rows: Vec::new(),
        diff_lines: BTreeSet::new(),
    };

    for op in &ops {
        match *op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => {
                for offset in 0..len {
                    builder.push_default(old_lines[old_index + offset], new_lines[new_index + offset]);
                }
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                for offset in 0..old_len {
                    builder.push_removed(old_lines[old_index + offset]);
                }
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                for offset in 0..new_len {
                    builder.push_added(new_lines[new_index + offset]);
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                let paired = old_len.min(new_len);
                for offset in 0..paired {
                    let old_line = old_lines[old_index + offset];
                    let new_line = new_lines[new_index + offset];
                    if old_line == new_line {
                        // Whitespace-only difference under ignore_whitespace,
                        // or identical lines the alignment chose to replace.
                        builder.push_default(old_line, new_line);
                    } else {
                        builder.push_changed(old_line, new_line);
                    }
                }
                for offset in paired..old_len {
                    builder.push_removed(old_lines[old_index + offset]);
                }
                for offset in paired..new_len {
                    builder.push_added(new_lines[new_index + offset]);
                }
            }
        }
    }

    Ok(LineDiff {
        line_information: builder.rows,
        diff_lines: builder.diff_lines,
    })
}

fn validate(options: &DiffOptions) -> Result<(), DiffError> {
    if matches!(options.compare_method, DiffMethod::Json) {
        return Ok(());
    }
    if matches!(options.old, DiffInput::Json(_)) || matches!(options.new, DiffInput::Json(_)) {
        return Err(DiffError::InvalidInput(format!(
            "old and new values must be text when using the {} comparison method",
            options.compare_method.key_name()
        )));
    }
    Ok(())
}

fn canonical_text(input: &DiffInput, method: &DiffMethod) -> String {
    match input {
        DiffInput::Text(text) => {
            if matches!(method, DiffMethod::Json) {
                serde_json::to_string_pretty(&serde_json::Value::String(text.clone()))
                    .unwrap_or_default()
            } else {
                text.clone()
            }
        }
        DiffInput::Json(value) => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Drop the newline terminating the last real line, and nothing else.
/// Trailing blank lines and trailing spaces are content the diff must see.
fn strip_trailing_newline(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

fn construct_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n').collect()
    }
}

fn comparison_keys<'a>(lines: &[&'a str], ignore_whitespace: bool) -> Vec<Cow<'a, str>> {
    lines
        .iter()
        .map(|line| {
            if ignore_whitespace {
                normalize_whitespace(line)
            } else {
                Cow::Borrowed(*line)
            }
        })
        .collect()
}

/// Collapse every run of whitespace to a single space.
fn normalize_whitespace(line: &str) -> Cow<'_, str> {
    if !line.chars().any(|c| c.is_whitespace() && c != ' ')
        && !line.contains("  ")
    {
        return Cow::Borrowed(line);
    }
    let mut normalized = String::with_capacity(line.len());
    let mut in_run = false;
    for ch in line.chars() {
        if ch.is_whitespace() {
            if !in_run {
                normalized.push(' ');
            }
            in_run = true;
        } else {
            normalized.push(ch);
            in_run = false;
        }
    }
    Cow::Owned(normalized)
}

struct RowBuilder<'a> {
    options: &'a DiffOptions,
    old_rendered: Vec<String>,
    new_rendered: Vec<String>,
    left_line: u32,
    right_line: u32,
    rows: Vec<LineInformation>,
    diff_lines: BTreeSet<usize>,
}

impl RowBuilder<'_> {
    fn rendered_for(rendered: &[String], line_number: u32, offset: u32) -> Option<String> {
        let index = line_number.checked_sub(1 + offset)? as usize;
        rendered.get(index).cloned()
    }

    fn left_side(&mut self, kind: DiffType, value: SideContent) -> DiffSide {
        self.left_line += 1;
        DiffSide {
            line_number: Some(self.left_line),
            kind,
            value,
            rendered_html: Self::rendered_for(
                &self.old_rendered,
                self.left_line,
                self.options.lines_offset,
            ),
        }
    }

    fn right_side(&mut self, kind: DiffType, value: SideContent) -> DiffSide {
        self.right_line += 1;
        DiffSide {
            line_number: Some(self.right_line),
            kind,
            value,
            rendered_html: Self::rendered_for(
                &self.new_rendered,
                self.right_line,
                self.options.lines_offset,
            ),
        }
    }

    fn push(&mut self, left: DiffSide, right: DiffSide, changed: bool) {
        let index = self.rows.len();
        let pinned = self.options.always_show_lines.iter().any(|id| match id {
            LineId::Left(n) => left.line_number == Some(*n),
            LineId::Right(n) => right.line_number == Some(*n),
        });
        if changed || pinned {
            self.diff_lines.insert(index);
        }
        self.rows.push(LineInformation { left, right });
    }

    fn push_default(&mut self, old_line: &str, new_line: &str) {
        let left = self.left_side(DiffType::Default, SideContent::Text(old_line.to_string()));
        let right = self.right_side(DiffType::Default, SideContent::Text(new_line.to_string()));
        self.push(left, right, false);
    }

    fn push_removed(&mut self, old_line: &str) {
        let left = self.left_side(DiffType::Removed, SideContent::Text(old_line.to_string()));
        self.push(left, DiffSide::default(), true);
    }

    fn push_added(&mut self, new_line: &str) {
        let right = self.right_side(DiffType::Added, SideContent::Text(new_line.to_string()));
        self.push(DiffSide::default(), right, true);
    }

    fn push_changed(&mut self, old_line: &str, new_line: &str) {
        let (left_value, right_value) = if self.options.disable_word_diff {
            (
                SideContent::Text(old_line.to_string()),
                SideContent::Text(new_line.to_string()),
            )
        } else {
            let (left_segments, right_segments) =
                compute_word_diff(old_line, new_line, &self.options.compare_method);
            (
                SideContent::Segments(left_segments),
                SideContent::Segments(right_segments),
            )
        };
        let left = self.left_side(DiffType::Changed, left_value);
        let right = self.right_side(DiffType::Changed, right_value);
        self.push(left, right, true);
    }
}

/// Word-level sub-diff of one changed line pair. Returns the ordered segments
/// for the left and right side; the round-trip invariant holds by
/// construction (every token of each line lands in exactly one segment of its
/// side, in order).
pub fn compute_word_diff(
    old_line: &str,
    new_line: &str,
    method: &DiffMethod,
) -> (Vec<WordDiffSegment>, Vec<WordDiffSegment>) {
    if let DiffMethod::Custom(custom) = method {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for chunk in (custom.compare)(old_line, new_line) {
            if chunk.added {
                right.push(WordDiffSegment {
                    value: chunk.value,
                    kind: DiffType::Added,
                });
            } else if chunk.removed {
                left.push(WordDiffSegment {
                    value: chunk.value,
                    kind: DiffType::Removed,
                });
            } else {
                left.push(WordDiffSegment {
                    value: chunk.value.clone(),
                    kind: DiffType::Default,
                });
                right.push(WordDiffSegment {
                    value: chunk.value,
                    kind: DiffType::Default,
                });
            }
        }
        return (left, right);
    }

    let (old_tokens, old_keys) = tokenize(old_line, method);
    let (new_tokens, new_keys) = tokenize(new_line, method);
    let ops = capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys);

    let mut left = Vec::new();
    let mut right = Vec::new();
    for op in &ops {
        match *op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => {
                left.push(WordDiffSegment {
                    value: old_tokens[old_index..old_index + len].concat(),
                    kind: DiffType::Default,
                });
                right.push(WordDiffSegment {
                    value: new_tokens[new_index..new_index + len].concat(),
                    kind: DiffType::Default,
                });
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                left.push(WordDiffSegment {
                    value: old_tokens[old_index..old_index + old_len].concat(),
                    kind: DiffType::Removed,
                });
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                right.push(WordDiffSegment {
                    value: new_tokens[new_index..new_index + new_len].concat(),
                    kind: DiffType::Added,
                });
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                left.push(WordDiffSegment {
                    value: old_tokens[old_index..old_index + old_len].concat(),
                    kind: DiffType::Removed,
                });
                right.push(WordDiffSegment {
                    value: new_tokens[new_index..new_index + new_len].concat(),
                    kind: DiffType::Added,
                });
            }
        }
    }
    (left, right)
}

fn tokenize<'a>(line: &'a str, method: &DiffMethod) -> (Vec<&'a str>, Vec<Cow<'a, str>>) {
    match method {
        DiffMethod::Chars => {
            let tokens = char_tokens(line);
            let keys = borrow_keys(&tokens);
            (tokens, keys)
        }
        DiffMethod::Words => {
            let tokens = whitespace_runs(line);
            let keys = tokens
                .iter()
                .map(|token| {
                    if token.chars().all(char::is_whitespace) {
                        Cow::Borrowed(" ")
                    } else {
                        Cow::Borrowed(*token)
                    }
                })
                .collect();
            (tokens, keys)
        }
        DiffMethod::WordsWithSpace => {
            let tokens = whitespace_runs(line);
            let keys = borrow_keys(&tokens);
            (tokens, keys)
        }
        DiffMethod::Lines => {
            let tokens: Vec<&str> = line.split_inclusive('\n').collect();
            let keys = borrow_keys(&tokens);
            (tokens, keys)
        }
        DiffMethod::TrimmedLines | DiffMethod::Json => {
            let tokens: Vec<&str> = line.split_inclusive('\n').collect();
            let keys = tokens.iter().map(|t| Cow::Borrowed(t.trim())).collect();
            (tokens, keys)
        }
        DiffMethod::Sentences => {
            let tokens = sentence_tokens(line);
            let keys = borrow_keys(&tokens);
            (tokens, keys)
        }
        DiffMethod::Css => {
            let tokens = css_tokens(line);
            let keys = borrow_keys(&tokens);
            (tokens, keys)
        }
        DiffMethod::Custom(_) => unreachable!("custom methods bypass tokenization"),
    }
}

fn borrow_keys<'a>(tokens: &[&'a str]) -> Vec<Cow<'a, str>> {
    tokens.iter().map(|t| Cow::Borrowed(*t)).collect()
}

fn char_tokens(line: &str) -> Vec<&str> {
    line.char_indices()
        .map(|(i, ch)| &line[i..i + ch.len_utf8()])
        .collect()
}

/// Alternating runs of whitespace and non-whitespace characters.
fn whitespace_runs(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut previous: Option<bool> = None;
    for (i, ch) in line.char_indices() {
        let is_ws = ch.is_whitespace();
        if let Some(prev) = previous {
            if prev != is_ws {
                tokens.push(&line[start..i]);
                start = i;
            }
        }
        previous = Some(is_ws);
    }
    if start < line.len() {
        tokens.push(&line[start..]);
    }
    tokens
}

/// Split after sentence-ending punctuation that is followed by whitespace
/// (or end of input). The whitespace belongs to the next token.
fn sentence_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut iter = line.char_indices().peekable();
    while let Some((i, ch)) = iter.next() {
        if matches!(ch, '.' | '!' | '?') {
            let followed_by_ws = iter
                .peek()
                .map(|&(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if followed_by_ws {
                let end = i + ch.len_utf8();
                tokens.push(&line[start..end]);
                start = end;
            }
        }
    }
    if start < line.len() {
        tokens.push(&line[start..]);
    }
    tokens
}

/// CSS tokenization: `{ } : ; ,` are single-character tokens, whitespace runs
/// are their own tokens, everything else accumulates.
fn css_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut previous: Option<bool> = None;
    for (i, ch) in line.char_indices() {
        if matches!(ch, '{' | '}' | ':' | ';' | ',') {
            if start < i {
                tokens.push(&line[start..i]);
            }
            let end = i + ch.len_utf8();
            tokens.push(&line[i..end]);
            start = end;
            previous = None;
            continue;
        }
        let is_ws = ch.is_whitespace();
        if let Some(prev) = previous {
            if prev != is_ws && start < i {
                tokens.push(&line[start..i]);
                start = i;
            }
        }
        previous = Some(is_ws);
    }
    if start < line.len() {
        tokens.push(&line[start..]);
    }
    tokens
}
