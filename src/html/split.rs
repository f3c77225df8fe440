//! Splitting continuous highlighted HTML into self-contained per-line
//! fragments.
//!
//! Syntax highlighters commonly emit one continuous fragment in which a tag
//! may span several source lines (highlight.js wraps everything in
//! `<code>`/`<pre>`). Per-line rendering needs each line to be independently
//! well-formed, so tags spanning a newline are closed at the line boundary
//! and reopened with their original attributes on the next line.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::parse::{parse_html, HtmlNode};

static WRAPPER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(code|pre)[^>]*>").unwrap());
static OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^/][^>]*>").unwrap());
static CLOSE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</[^>]+>").unwrap());

/// Heuristic: is this fragment continuous (tags may span newlines) rather
/// than already line-separated?
///
/// A `<code>`/`<pre>` wrapper anywhere means continuous. Otherwise, a
/// fragment without newlines cannot be continuous; with newlines, any of the
/// first 10 naive lines having more opening than closing tags means a tag
/// spans past that line's split point.
pub fn is_continuous_html(html: &str) -> bool {
    if html.is_empty() {
        return false;
    }
    if WRAPPER_TAG.is_match(html) {
        return true;
    }

    let lines: Vec<&str> = html.split('\n').collect();
    if lines.len() <= 1 {
        return false;
    }
    for line in lines.iter().take(10) {
        let opens = OPEN_TAG.find_iter(line).count();
        let closes = CLOSE_TAG.find_iter(line).count();
        if opens > closes {
            return true;
        }
    }
    false
}

/// Split a continuous fragment into one self-contained HTML string per line.
/// `<code>`/`<pre>` wrappers are stripped at any depth; every other tag open
/// at a newline is closed before the line break and reopened after it.
pub fn split_continuous_html(html: &str) -> Vec<String> {
    if html.is_empty() {
        return Vec::new();
    }
    let parsed = parse_html(html);
    let unwrapped = unwrap_elements(parsed.tree);

    let mut splitter = LineSplitter::default();
    splitter.process(&unwrapped);
    splitter.finish()
}

/// Normalize a rendered-lines input to one HTML string per line: continuous
/// fragments are split, line-separated input is split on newline verbatim.
pub fn process_rendered_lines(rendered: Option<&str>) -> Vec<String> {
    let Some(html) = rendered else {
        return Vec::new();
    };
    if html.is_empty() {
        return Vec::new();
    }
    if is_continuous_html(html) {
        split_continuous_html(html)
    } else {
        html.split('\n').map(str::to_string).collect()
    }
}

fn is_wrapper(tag: &str) -> bool {
    matches!(tag, "code" | "pre")
}

/// Remove `<code>`/`<pre>` wrappers at any depth, keeping their children.
fn unwrap_elements(nodes: Vec<HtmlNode>) -> Vec<HtmlNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            HtmlNode::Element {
                tag,
                attrs,
                children,
            } => {
                if is_wrapper(&tag) {
                    result.extend(unwrap_elements(children));
                } else {
                    result.push(HtmlNode::Element {
                        tag,
                        attrs,
                        children: unwrap_elements(children),
                    });
                }
            }
            text => result.push(text),
        }
    }
    result
}

#[derive(Default)]
struct LineSplitter<'a> {
    lines: Vec<String>,
    current: String,
    context: Vec<(&'a str, &'a BTreeMap<String, String>)>,
}

impl<'a> LineSplitter<'a> {
    fn process(&mut self, nodes: &'a [HtmlNode]) {
        for node in nodes {
            match node {
                HtmlNode::Text { text, .. } => {
                    for (index, part) in text.split('\n').enumerate() {
                        if index > 0 {
                            self.break_line();
                        }
                        self.current.push_str(&escape_html(part));
                    }
                }
                HtmlNode::Element {
                    tag,
                    attrs,
                    children,
                } => {
                    self.current.push_str(&open_tag(tag, attrs));
                    self.context.push((tag.as_str(), attrs));
                    self.process(children);
                    self.context.pop();
                    self.current.push_str(&format!("</{tag}>"));
                }
            }
        }
    }

    /// Close every open ancestor tag, flush the line, reopen the ancestors.
    fn break_line(&mut self) {
        for (tag, _) in self.context.iter().rev() {
            self.current.push_str(&format!("</{tag}>"));
        }
        self.lines.push(std::mem::take(&mut self.current));
        for &(tag, attrs) in &self.context {
            self.current.push_str(&open_tag(tag, attrs));
        }
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() || self.lines.is_empty() {
            self.lines.push(self.current);
        }
        self.lines
    }
}

fn open_tag(tag: &str, attrs: &BTreeMap<String, String>) -> String {
    if attrs.is_empty() {
        return format!("<{tag}>");
    }
    let attrs: Vec<String> = attrs
        .iter()
        .map(|(name, value)| format!("{name}=\"{}\"", value.replace('"', "&quot;")))
        .collect();
    format!("<{tag} {}>", attrs.join(" "))
}

/// Re-escape text content so source characters that look like markup are not
/// reinterpreted when the line fragment is parsed again.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
