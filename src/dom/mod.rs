//! Arena DOM that html5ever parses into, and its XHTML serialization.
//!
//! Used to turn tag soup into well-formed XHTML: the HTML5 tree builder
//! fixes the structure, the serializer writes it back as XML.

mod tree_sink;

use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;
use html5ever::{QualName, parse_document};

use crate::util::escape_xml;

pub use tree_sink::ArenaSink;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const OPS_NS: &str = "http://www.idpf.org/2007/ops";

/// HTML elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena-allocated document tree.
#[derive(Debug)]
pub struct ArenaDom {
    nodes: Vec<Node>,
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaDom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse an HTML string with the HTML5 tree builder.
    pub fn parse(html: &str) -> Self {
        parse_document(ArenaSink::new(), ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes())
            .into_dom()
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// Append text, merging with a trailing text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.children(parent).last()
            && let Some(Node {
                data: NodeData::Text(existing),
                ..
            }) = self.get_mut(last)
        {
            existing.push_str(text);
            return;
        }
        let id = self.create(NodeData::Text(text.to_string()));
        self.append(parent, id);
    }

    /// Insert `node` right before `sibling` under the sibling's parent.
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        let Some(parent) = self.get(sibling).and_then(|n| n.parent) else {
            return;
        };
        self.detach(node);
        let Some(parent_node) = self.get_mut(parent) else {
            return;
        };
        let index = parent_node
            .children
            .iter()
            .position(|&c| c == sibling)
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, node);
        if let Some(n) = self.get_mut(node) {
            n.parent = Some(parent);
        }
    }

    /// Remove `node` from its parent's children.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.get_mut(node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.retain(|&c| c != node);
        }
    }

    /// First element with the given local name, in document order.
    pub fn find_by_tag(&self, local: &str) -> Option<NodeId> {
        let mut stack = vec![self.document()];
        while let Some(id) = stack.pop() {
            if let Some(NodeData::Element { name, .. }) = self.get(id).map(|n| &n.data)
                && name.local.as_ref() == local
            {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev());
        }
        None
    }

    /// Concatenated text below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(_) => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
            None => {}
        }
    }

    /// Serialize as a UTF-8 XHTML document with an XML declaration.
    pub fn to_xhtml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let uses_epub_prefix = self.nodes.iter().any(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .any(|a| a.name.local.as_ref().starts_with("epub:")),
            _ => false,
        });
        let mut serializer = Serializer {
            dom: self,
            out: &mut out,
            uses_epub_prefix,
        };
        for &child in self.children(self.document()) {
            serializer.node(child, None);
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

struct Serializer<'a> {
    dom: &'a ArenaDom,
    out: &'a mut String,
    uses_epub_prefix: bool,
}

impl Serializer<'_> {
    fn node(&mut self, id: NodeId, parent_ns: Option<&str>) {
        let Some(node) = self.dom.get(id) else { return };
        match &node.data {
            NodeData::Document => {}
            NodeData::Doctype {
                name,
                public_id,
                system_id,
            } => {
                let name = if name.is_empty() { "html" } else { name.as_str() };
                if public_id.is_empty() {
                    self.out.push_str(&format!("<!DOCTYPE {name}>\n"));
                } else {
                    self.out.push_str(&format!(
                        "<!DOCTYPE {name} PUBLIC \"{public_id}\" \"{system_id}\">\n"
                    ));
                }
            }
            NodeData::Text(text) => self.out.push_str(&escape_text(text)),
            NodeData::Comment(text) => {
                self.out.push_str("<!--");
                self.out.push_str(&text.replace("--", "- -"));
                self.out.push_str("-->");
            }
            NodeData::Element { name, attrs } => self.element(id, name, attrs, parent_ns),
        }
    }

    /// Whether the element or anything below it has an `xlink:` attribute.
    fn uses_xlink(&self, id: NodeId) -> bool {
        let own = match self.dom.get(id).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => {
                attrs.iter().any(|a| a.name.ns.as_ref() == XLINK_NS)
            }
            _ => false,
        };
        own || self.dom.children(id).iter().any(|&child| self.uses_xlink(child))
    }

    fn element(&mut self, id: NodeId, name: &QualName, attrs: &[Attribute], parent_ns: Option<&str>) {
        let ns: &str = name.ns.as_ref();
        let local: &str = name.local.as_ref();
        self.out.push('<');
        self.out.push_str(local);

        // Declare the namespace where it changes.
        if parent_ns != Some(ns) && matches!(ns, XHTML_NS | SVG_NS | MATHML_NS) {
            self.out.push_str(&format!(" xmlns=\"{ns}\""));
        }
        let is_root = parent_ns.is_none();
        let has_attr = |qualified: &str| attrs.iter().any(|a| attribute_name(a) == qualified);
        if is_root && self.uses_epub_prefix && !has_attr("xmlns:epub") {
            self.out.push_str(&format!(" xmlns:epub=\"{OPS_NS}\""));
        }
        if ns == SVG_NS
            && parent_ns != Some(SVG_NS)
            && !has_attr("xmlns:xlink")
            && self.uses_xlink(id)
        {
            self.out.push_str(&format!(" xmlns:xlink=\"{XLINK_NS}\""));
        }

        for attr in attrs {
            let qualified = attribute_name(attr);
            if qualified == "xmlns" || !is_xml_name(&qualified) {
                continue;
            }
            let value = if local == "meta" {
                utf8_charset(&qualified, &attr.value, attrs)
            } else {
                attr.value.clone()
            };
            self.out
                .push_str(&format!(" {}=\"{}\"", qualified, escape_xml(&value)));
        }

        let children = self.dom.children(id);
        if children.is_empty() {
            if ns != XHTML_NS || VOID_ELEMENTS.contains(&local) {
                self.out.push_str("/>");
            } else {
                self.out.push_str(&format!("></{local}>"));
            }
            return;
        }

        self.out.push('>');
        for &child in children {
            self.node(child, Some(ns));
        }
        self.out.push_str(&format!("</{local}>"));
    }
}

fn attribute_name(attr: &Attribute) -> String {
    match &attr.name.prefix {
        Some(prefix) => format!("{}:{}", prefix.as_ref(), attr.name.local.as_ref()),
        None => attr.name.local.to_string(),
    }
}

/// Attribute names the tag-soup parser accepts but XML does not.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

/// Character set declarations now describe UTF-8.
fn utf8_charset(name: &str, value: &str, attrs: &[Attribute]) -> String {
    let is_content_type = attrs.iter().any(|a| {
        a.name.local.as_ref() == "http-equiv" && a.value.eq_ignore_ascii_case("content-type")
    });
    match name {
        "charset" => "utf-8".to_string(),
        "content" if is_content_type => "application/xhtml+xml; charset=utf-8".to_string(),
        _ => value.to_string(),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
