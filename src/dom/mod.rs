//! In-process document model with browser script semantics.
//!
//! Two insertion paths behave differently, as in a browser:
//! - `set_inner_html` parses markup; every `<script>` it produces is marked
//!   already started and never runs.
//! - elements built with `create_element` run their script once, at the moment
//!   they become connected to the document.
//!
//! An `iframe` with a `sandbox` attribute is an isolation surface. Scripts
//! below it run only with `allow-scripts`, and see the host origin only with
//! `allow-same-origin`.

mod host;
mod parse;
mod serialize;

use std::fmt;

pub use host::{Script, ScriptHost, ScriptLog, ScriptOrigin};
pub use parse::{parse_fragment, ParsedNode};
pub use serialize::SerializeOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attrs: Vec<(String, String)>,
    /// Set once a script element has been prepared (or was produced by the
    /// fragment parser); a started script never runs again.
    pub(crate) already_started: bool,
    /// Set only on script copies made by the re-execution pass.
    pub(crate) reexecuted: bool,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Effective sandbox flags at a point in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxFlags {
    pub scripts: bool,
    pub same_origin: bool,
}

impl SandboxFlags {
    const UNRESTRICTED: SandboxFlags = SandboxFlags { scripts: true, same_origin: true };

    pub fn from_tokens(tokens: &str) -> Self {
        let mut flags = SandboxFlags { scripts: false, same_origin: false };
        for token in tokens.split_ascii_whitespace() {
            match token.to_ascii_lowercase().as_str() {
                "allow-scripts" => flags.scripts = true,
                "allow-same-origin" => flags.same_origin = true,
                _ => {}
            }
        }
        flags
    }

    fn intersect(self, other: SandboxFlags) -> SandboxFlags {
        SandboxFlags {
            scripts: self.scripts && other.scripts,
            same_origin: self.same_origin && other.same_origin,
        }
    }
}

#[derive(Debug)]
pub struct Document<H> {
    nodes: Vec<Node>,
    root: NodeId,
    host: H,
}

impl<H: ScriptHost> Document<H> {
    pub fn new(host: H) -> Self {
        let body = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData {
                tag: "body".into(),
                attrs: Vec::new(),
                already_started: false,
                reexecuted: false,
            }),
        };
        Self { nodes: vec![body], root: NodeId(0), host }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Drop every node but an empty root, keeping the host. Ids issued before
    /// the reset are invalid afterwards.
    pub fn reset(&mut self) {
        self.nodes.truncate(1);
        self.nodes[self.root.0].children.clear();
    }

    /// Nodes held by the arena, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            already_started: false,
            reexecuted: false,
        }))
    }

    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.push(NodeData::Text(data.to_string()))
    }

    /// Append `child` under `parent`, detaching it from any previous parent.
    /// Scripts in the child's subtree run if `parent` is connected.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        if self.is_connected(parent) {
            self.prepare_scripts(child);
        }
    }

    /// Put `new` at `old`'s position and detach `old`.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.nodes[old.0].parent else {
            return;
        };
        self.detach(new);
        let index = self.child_index(parent, old);
        self.nodes[parent.0].children[index] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        if self.is_connected(parent) {
            self.prepare_scripts(new);
        }
    }

    pub fn remove_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Markup injection: replace the children of `node` with parsed content.
    /// Scripts produced here are inert.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) {
        self.remove_children(node);
        for parsed in parse_fragment(html) {
            let child = self.build(parsed);
            self.nodes[child.0].parent = Some(node);
            self.nodes[node.0].children.push(child);
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element(el) = &mut self.nodes[node.0].data {
            let name = name.to_ascii_lowercase();
            match el.attrs.iter_mut().find(|(k, _)| *k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => el.attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        self.element(node).map(|el| el.attrs.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => Some(t),
            NodeData::Element(_) => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == self.root {
                return true;
            }
            cur = self.nodes[n.0].parent;
        }
        false
    }

    /// Nodes below `node` in document order, `node` itself excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    pub fn elements_by_tag(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.tag(*n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// Concatenated text below `node`, skipping script and style bodies.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    /// Raw text of a node's direct text children (script bodies).
    pub fn child_text(&self, node: NodeId) -> String {
        self.nodes[node.0]
            .children
            .iter()
            .filter_map(|c| self.text(*c))
            .collect()
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        serialize::inner_html(self, node, SerializeOptions::default())
    }

    pub fn outer_html(&self, node: NodeId, opts: SerializeOptions) -> String {
        serialize::outer_html(self, node, opts)
    }

    pub fn to_markdown(&self, node: NodeId) -> String {
        serialize::to_markdown(self, node)
    }

    /// Sandbox flags in force for content placed under `node`.
    pub fn sandbox_at(&self, node: NodeId) -> SandboxFlags {
        let mut flags = SandboxFlags::UNRESTRICTED;
        let mut cur = Some(node);
        while let Some(n) = cur {
            if self.tag(n) == Some("iframe") {
                if let Some(tokens) = self.attribute(n, "sandbox") {
                    flags = flags.intersect(SandboxFlags::from_tokens(tokens));
                }
            }
            cur = self.nodes[n.0].parent;
        }
        flags
    }

    /// Whether `node` is a script copy made by the re-execution pass. Markup
    /// can never set this, whatever attributes it carries.
    pub fn is_reexecuted(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|el| el.reexecuted)
    }

    pub(crate) fn mark_reexecuted(&mut self, node: NodeId) {
        if let NodeData::Element(el) = &mut self.nodes[node.0].data {
            el.reexecuted = true;
        }
    }

    pub(crate) fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0].data
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes[node.0].data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node { parent: None, children: Vec::new(), data });
        NodeId(self.nodes.len() - 1)
    }

    fn build(&mut self, parsed: ParsedNode) -> NodeId {
        match parsed {
            ParsedNode::Text(t) => self.push(NodeData::Text(t)),
            ParsedNode::Element { tag, attrs, children } => {
                let already_started = tag == "script";
                let id = self.push(NodeData::Element(ElementData { tag, attrs, already_started, reexecuted: false }));
                for child in children {
                    let c = self.build(child);
                    self.nodes[c.0].parent = Some(id);
                    self.nodes[id.0].children.push(c);
                }
                id
            }
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == child)
            .unwrap_or_else(|| unreachable!("{} is not a child of {}", child, parent))
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => out.push_str(t),
            NodeData::Element(el) => {
                if matches!(el.tag.as_str(), "script" | "style") {
                    return;
                }
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Run every not-yet-started script in `node`'s subtree, in tree order.
    fn prepare_scripts(&mut self, node: NodeId) {
        let mut candidates = vec![node];
        candidates.extend(self.descendants(node));
        for id in candidates {
            let is_pending_script = matches!(
                &self.nodes[id.0].data,
                NodeData::Element(el) if el.tag == "script" && !el.already_started
            );
            if !is_pending_script {
                continue;
            }
            if let NodeData::Element(el) = &mut self.nodes[id.0].data {
                el.already_started = true;
            }

            let flags = self.sandbox_at(id);
            if !flags.scripts {
                tracing::debug!(node = %id, "script blocked by sandbox");
                continue;
            }
            let script = Script {
                text: self.child_text(id),
                src: self.attribute(id, "src").map(str::to_string),
                attributes: self.attributes(id).to_vec(),
                origin: if flags.same_origin { ScriptOrigin::Host } else { ScriptOrigin::Opaque },
            };
            tracing::debug!(node = %id, origin = ?script.origin, "executing script");
            self.host.execute(&script);
        }
    }
}
