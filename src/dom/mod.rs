//! Markup tree for the HTML analyzers
//!
//! [`ElementTree::parse`] runs `html5ever` over the source and flattens the
//! resulting `markup5ever_rcdom` tree into an arena indexed by [`NodeId`],
//! in document order. html5ever silently repairs broken markup, so
//! [`ElementTree::structural_errors`] comes from a separate tag-stack scan of
//! the raw source.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use rustc_hash::FxHashMap as HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Index of a node in an [`ElementTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Last node of this node's subtree; descendants are `self + 1 ..= last`
    last_descendant: NodeId,
    kind: NodeKind,
}

/// Elements whose text never counts as content
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style", "template", "noscript"];

/// A parsed HTML document
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: Vec<Node>,
    has_doctype: bool,
    id_index: HashMap<String, Vec<NodeId>>,
    structural_errors: Vec<StructuralError>,
}

impl ElementTree {
    /// Parse `source` as an HTML document. Parsing never fails; malformed
    /// markup is repaired the way a browser would and reported through
    /// [`structural_errors`](Self::structural_errors).
    pub fn parse(source: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(source);
        let mut tree = Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                last_descendant: NodeId(0),
                kind: NodeKind::Document,
            }],
            has_doctype: false,
            id_index: HashMap::default(),
            structural_errors: scan_structure(source),
        };

        let mut stack: Vec<(Handle, NodeId)> = dom
            .document
            .children
            .borrow()
            .iter()
            .rev()
            .map(|child| (child.clone(), NodeId(0)))
            .collect();

        while let Some((handle, parent)) = stack.pop() {
            let mut children = handle.children.borrow().clone();
            let kind = match &handle.data {
                NodeData::Doctype { .. } => {
                    tree.has_doctype = true;
                    continue;
                }
                NodeData::Element {
                    name,
                    attrs,
                    template_contents,
                    ..
                } => {
                    if let Some(contents) = template_contents.borrow().as_ref() {
                        children.extend(contents.children.borrow().iter().cloned());
                    }
                    NodeKind::Element {
                        tag: name.local.to_ascii_lowercase().to_string(),
                        attrs: attrs
                            .borrow()
                            .iter()
                            .map(|a| (a.name.local.to_ascii_lowercase().to_string(), a.value.to_string()))
                            .collect(),
                    }
                }
                NodeData::Text { contents } => NodeKind::Text(contents.borrow().to_string()),
                _ => continue,
            };
            let id = tree.push(parent, kind);
            stack.extend(children.into_iter().rev().map(|child| (child, id)));
        }

        for index in (0..tree.nodes.len()).rev() {
            if let Some(&last_child) = tree.nodes[index].children.last() {
                tree.nodes[index].last_descendant = tree.nodes[last_child.0].last_descendant;
            }
        }
        tree
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let NodeKind::Element { attrs, .. } = &kind {
            if let Some((_, value)) = attrs.iter().find(|(name, _)| name == "id") {
                if !value.is_empty() {
                    self.id_index.entry(value.clone()).or_default().push(id);
                }
            }
        }
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            last_descendant: id,
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Whether the source declared a doctype
    pub fn has_doctype(&self) -> bool {
        self.has_doctype
    }

    /// Unclosed, mismatched and stray tags found in the source
    pub fn structural_errors(&self) -> &[StructuralError] {
        &self.structural_errors
    }

    /// Every element in document order
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        (0..self.nodes.len()).filter_map(move |i| self.element(NodeId(i)))
    }

    /// Elements with the given (lower-case) tag name, in document order
    pub fn elements_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
        self.elements().filter(move |e| e.tag() == tag)
    }

    /// Elements whose tag is one of `tags`, in document order
    pub fn elements_by_tags<'a>(
        &'a self,
        tags: &'a [&'a str],
    ) -> impl Iterator<Item = ElementRef<'a>> {
        self.elements().filter(move |e| tags.contains(&e.tag()))
    }

    pub fn count(&self, tag: &str) -> usize {
        self.elements_by_tag(tag).count()
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        match self.nodes.get(id.0)?.kind {
            NodeKind::Element { .. } => Some(ElementRef { tree: self, id }),
            _ => None,
        }
    }

    /// The `<html>` element
    pub fn root_element(&self) -> Option<ElementRef<'_>> {
        self.elements_by_tag("html").next()
    }

    /// The first element carrying `id`
    pub fn element_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.id_index
            .get(id)
            .and_then(|ids| ids.first())
            .and_then(|&node| self.element(node))
    }

    /// `id` values carried by more than one element, in first-use order
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut duplicates: Vec<(NodeId, &str)> = self
            .id_index
            .iter()
            .filter(|(_, nodes)| nodes.len() > 1)
            .map(|(id, nodes)| (nodes[0], id.as_str()))
            .collect();
        duplicates.sort();
        duplicates.into_iter().map(|(_, id)| id).collect()
    }

    /// Text of the whole document, without script and style contents
    pub fn text(&self) -> String {
        self.collect_text(NodeId(0))
    }

    fn collect_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current.0];
            match &node.kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { tag, .. } if NON_TEXT_ELEMENTS.contains(&tag.as_str()) => {}
                _ => stack.extend(node.children.iter().rev()),
            }
        }
        out
    }
}

/// A borrowed element of an [`ElementTree`]
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    tree: &'a ElementTree,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn node(&self) -> &'a Node {
        &self.tree.nodes[self.id.0]
    }

    /// Lower-case tag name
    pub fn tag(&self) -> &'a str {
        match &self.node().kind {
            NodeKind::Element { tag, .. } => tag,
            _ => "",
        }
    }

    pub fn attrs(&self) -> &'a [(String, String)] {
        match &self.node().kind {
            NodeKind::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// Attribute value by (lower-case) name
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Attribute value with surrounding whitespace removed, `None` when
    /// missing or blank
    pub fn non_empty_attr(&self, name: &str) -> Option<&'a str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Text content with whitespace runs collapsed and trimmed
    pub fn text(&self) -> String {
        self.tree
            .collect_text(self.id)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn parent(&self) -> Option<ElementRef<'a>> {
        self.node().parent.and_then(|p| self.tree.element(p))
    }

    /// Enclosing elements, innermost first
    pub fn ancestors(&self) -> impl Iterator<Item = ElementRef<'a>> {
        let tree = self.tree;
        std::iter::successors(self.parent(), move |e| {
            e.node().parent.and_then(|p| tree.element(p))
        })
    }

    /// Whether any enclosing element has one of `tags`
    pub fn has_ancestor(&self, tags: &[&str]) -> bool {
        self.ancestors().any(|a| tags.contains(&a.tag()))
    }

    /// Direct child elements
    pub fn children(&self) -> impl Iterator<Item = ElementRef<'a>> {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .filter_map(move |&child| tree.element(child))
    }

    /// Elements inside this one, in document order
    pub fn descendants(&self) -> impl Iterator<Item = ElementRef<'a>> {
        let tree = self.tree;
        (self.id.0 + 1..=self.node().last_descendant.0).filter_map(move |i| tree.element(NodeId(i)))
    }

    /// No child elements and no non-whitespace text
    pub fn is_empty(&self) -> bool {
        self.node().children.iter().all(|&child| match &self.tree.nodes[child.0].kind {
            NodeKind::Text(text) => text.trim().is_empty(),
            _ => false,
        })
    }
}

// ---------------------------------------------------------------------------
// Structural scan
// ---------------------------------------------------------------------------

/// What is wrong with a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralErrorKind {
    /// Opened but never closed
    Unclosed { tag: String },
    /// Closed while a different element was still open
    Mismatched { expected: String, found: String },
    /// Closing tag with no matching open element
    Stray { tag: String },
}

/// A broken tag found by the tag-stack scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralError {
    pub kind: StructuralErrorKind,
    /// 1-based source line
    pub line: usize,
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StructuralErrorKind::Unclosed { tag } => {
                write!(f, "Unclosed <{}> opened on line {}", tag, self.line)
            }
            StructuralErrorKind::Mismatched { expected, found } => write!(
                f,
                "Mismatched closing tag </{}> on line {}, expected </{}>",
                found, self.line, expected
            ),
            StructuralErrorKind::Stray { tag } => {
                write!(f, "Stray closing tag </{}> on line {}", tag, self.line)
            }
        }
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose end tag may be omitted
const OPTIONAL_END: &[&str] = &[
    "html", "head", "body", "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th",
    "thead", "tbody", "tfoot", "colgroup", "rp", "rt",
];

/// Elements whose content is raw text up to the matching end tag
const RAW_TEXT: &[&str] = &["script", "style", "textarea", "title"];

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r#"<(/?)([A-Za-z][A-Za-z0-9-]*)(?:\s(?:[^>"']|"[^"]*"|'[^']*')*?)?(/?)>"#)
            .expect("valid tag regex")
    })
}

fn comment_regex() -> &'static Regex {
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    COMMENT.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex")
    })
}

/// Replace comments with spaces, keeping newlines so line numbers survive
fn mask_comments(source: &str) -> String {
    comment_regex()
        .replace_all(source, |caps: &regex::Captures<'_>| {
            caps[0]
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' })
                .collect::<String>()
        })
        .into_owned()
}

/// Walk the tags of `source` with an open-element stack
fn scan_structure(source: &str) -> Vec<StructuralError> {
    let text = mask_comments(source);
    let lower = text.to_ascii_lowercase();
    let mut errors = Vec::new();
    let mut open: Vec<(String, usize)> = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut line_pos = 0;

    while let Some(caps) = tag_regex().captures_at(&text, pos) {
        let Some(whole) = caps.get(0) else { break };
        line += text[line_pos..whole.start()].matches('\n').count();
        line_pos = whole.start();
        pos = whole.end();

        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();
        let tag = caps[2].to_ascii_lowercase();

        if !closing {
            if VOID_ELEMENTS.contains(&tag.as_str()) || self_closing {
                continue;
            }
            if RAW_TEXT.contains(&tag.as_str()) {
                match lower[pos..].find(&format!("</{}", tag)) {
                    Some(offset) => pos += offset,
                    None => {
                        errors.push(StructuralError {
                            kind: StructuralErrorKind::Unclosed { tag },
                            line,
                        });
                        break;
                    }
                }
                open.push((tag, line));
                continue;
            }
            open.push((tag, line));
            continue;
        }

        if VOID_ELEMENTS.contains(&tag.as_str()) {
            continue;
        }
        match open.iter().rposition(|(t, _)| *t == tag) {
            Some(index) => {
                let unclosed = open.split_off(index + 1);
                open.pop();
                if let Some((expected, _)) = unclosed
                    .iter()
                    .rev()
                    .find(|(t, _)| !OPTIONAL_END.contains(&t.as_str()))
                {
                    errors.push(StructuralError {
                        kind: StructuralErrorKind::Mismatched {
                            expected: expected.clone(),
                            found: tag,
                        },
                        line,
                    });
                }
            }
            None if matches!(tag.as_str(), "html" | "head" | "body") => {}
            None => errors.push(StructuralError {
                kind: StructuralErrorKind::Stray { tag },
                line,
            }),
        }
    }

    errors.extend(
        open.into_iter()
            .filter(|(tag, _)| !OPTIONAL_END.contains(&tag.as_str()))
            .map(|(tag, line)| StructuralError {
                kind: StructuralErrorKind::Unclosed { tag },
                line,
            }),
    );
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><title>Demo</title></head>
<body>
  <main id="content">
    <h1>Hello <em>there</em></h1>
    <img src="a.png" alt="A">
    <p id="x">one</p><p id="x">two</p>
    <div></div>
    <script>if (a < b) { document.write("</div>"); }</script>
  </main>
</body>
</html>"#;

    #[test]
    fn test_parse_and_query() {
        let tree = ElementTree::parse(PAGE);
        assert!(tree.has_doctype());
        assert_eq!(tree.root_element().and_then(|h| h.attr("lang")), Some("en"));
        assert_eq!(tree.count("p"), 2);
        let h1 = tree.elements_by_tag("h1").next().unwrap();
        assert_eq!(h1.text(), "Hello there");
        assert!(h1.has_ancestor(&["main"]));
        assert_eq!(h1.parent().map(|p| p.tag()), Some("main"));
        assert_eq!(tree.element_by_id("content").map(|e| e.tag()), Some("main"));
        assert_eq!(tree.duplicate_ids(), vec!["x"]);
        assert!(tree.elements_by_tag("div").next().unwrap().is_empty());
        assert!(tree.structural_errors().is_empty(), "{:?}", tree.structural_errors());
    }

    #[test]
    fn test_descendants_in_document_order() {
        let tree = ElementTree::parse("<ul><li><a>1</a></li><li>2</li></ul><p>after</p>");
        let ul = tree.elements_by_tag("ul").next().unwrap();
        let tags: Vec<_> = ul.descendants().map(|e| e.tag()).collect();
        assert_eq!(tags, vec!["li", "a", "li"]);
    }

    #[test]
    fn test_missing_doctype_is_reported() {
        let tree = ElementTree::parse("<p>hi</p>");
        assert!(!tree.has_doctype());
        assert!(tree.root_element().is_some());
    }

    #[test]
    fn test_structural_errors() {
        let errors = ElementTree::parse("<div>\n<span>text</div>\n</section>\n<article>")
            .structural_errors()
            .to_vec();
        assert_eq!(
            errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec![
                "Mismatched closing tag </div> on line 2, expected </span>",
                "Stray closing tag </section> on line 3",
                "Unclosed <article> opened on line 4",
            ]
        );
    }

    #[test]
    fn test_optional_end_tags_are_not_errors() {
        let tree = ElementTree::parse("<ul><li>a<li>b</ul><p>one<p>two<br><img src=x />");
        assert!(tree.structural_errors().is_empty());
    }

    #[test]
    fn test_comments_are_ignored() {
        let tree = ElementTree::parse("<!-- <div> -->\n<section></section>");
        assert!(tree.structural_errors().is_empty());
    }
}
