//! HTML fragment parsing into a tree with a plain-text projection.

use std::collections::BTreeMap;

use ego_tree::NodeRef;
use scraper::{Html, Node};

/// A node of a parsed HTML fragment. Text nodes carry the half-open byte
/// range they occupy in the flattened plain-text projection of the whole
/// tree; that projection is the address space [`super::merge::ChangeRange`]
/// offsets are defined against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
        children: Vec<HtmlNode>,
    },
    Text {
        text: String,
        start: usize,
        end: usize,
    },
}

/// Result of [`parse_html`]: top-level nodes plus the concatenation of all
/// text node contents in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedHtml {
    pub tree: Vec<HtmlNode>,
    pub plain_text: String,
}

/// Parse an HTML fragment. Multiple top-level siblings are handled by the
/// fragment parser's synthetic root; comments and other non-element,
/// non-text nodes are dropped. Unparseable input degrades to an empty tree
/// rather than an error.
pub fn parse_html(html: &str) -> ParsedHtml {
    let fragment = Html::parse_fragment(html);
    let root = fragment.tree.root();
    let Some(root_element) = root.children().find(|child| child.value().is_element()) else {
        return ParsedHtml::default();
    };

    let mut parsed = ParsedHtml::default();
    let mut position = 0usize;
    for child in root_element.children() {
        if let Some(node) = convert(child, &mut parsed.plain_text, &mut position) {
            parsed.tree.push(node);
        }
    }
    parsed
}

fn convert(
    node: NodeRef<'_, Node>,
    plain_text: &mut String,
    position: &mut usize,
) -> Option<HtmlNode> {
    match node.value() {
        Node::Text(text) => {
            let text = text.to_string();
            let start = *position;
            *position += text.len();
            plain_text.push_str(&text);
            Some(HtmlNode::Text {
                text,
                start,
                end: *position,
            })
        }
        Node::Element(element) => {
            let tag = element.name().to_ascii_lowercase();
            let attrs = element
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            let mut children = Vec::new();
            for child in node.children() {
                if let Some(converted) = convert(child, plain_text, position) {
                    children.push(converted);
                }
            }
            Some(HtmlNode::Element {
                tag,
                attrs,
                children,
            })
        }
        _ => None,
    }
}
