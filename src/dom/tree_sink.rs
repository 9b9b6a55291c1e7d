//! html5ever TreeSink implementation for the arena DOM.

use std::cell::RefCell;

use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as Html5Attribute, QualName};

use super::arena::{Arena, Attr, NodeId};
use crate::consts::KEY_POSITION_ID;

/// Handle used by TreeSink to reference nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(pub NodeId);

impl Default for NodeHandle {
    fn default() -> Self {
        NodeHandle(NodeId::NONE)
    }
}

/// TreeSink that builds an [`Arena`].
///
/// Uses interior mutability (RefCell) because html5ever's TreeSink trait
/// takes `&self` while we need to mutate the arena. Character data is stored
/// etree-style: leading text on the enclosing element, trailing text on the
/// previous sibling element's `tail`.
pub struct ArenaSink {
    arena: RefCell<Arena>,
    quirks_mode: RefCell<QuirksMode>,
}

impl Default for ArenaSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaSink {
    pub fn new() -> Self {
        Self {
            arena: RefCell::new(Arena::new()),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }

    /// Consume the sink and return the arena.
    pub fn into_arena(self) -> Arena {
        self.arena.into_inner()
    }

    /// Place character data at the right mixed-content slot under `parent`.
    fn push_text(arena: &mut Arena, parent: NodeId, text: &str) {
        // Find the last element child; text after it is that child's tail.
        let mut last_elem = NodeId::NONE;
        for child in arena.children(parent) {
            if arena.is_element(child) {
                last_elem = child;
            }
        }
        if last_elem.is_some() {
            let tail = format!("{}{}", arena.tail(last_elem), text);
            arena.set_tail(last_elem, &tail);
        } else if arena.is_element(parent) {
            let body = format!("{}{}", arena.text(parent), text);
            arena.set_text(parent, &body);
        }
        // Text directly under the document root is dropped.
    }
}

impl TreeSink for ArenaSink {
    type Handle = NodeHandle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: std::borrow::Cow<'static, str>) {
        // Ignore parse errors - be lenient like browsers
    }

    fn get_document(&self) -> Self::Handle {
        NodeHandle(self.arena.borrow().document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };

        let arena = self.arena.borrow();
        match arena.element(target.0) {
            Some(e) => {
                // SAFETY: the QualName lives in the arena, which lives as
                // long as self; the borrow checker cannot see through the
                // RefCell. The returned reference is used immediately by the
                // tree builder and never stored.
                unsafe { std::mem::transmute::<&QualName, &'a QualName>(&e.name) }
            }
            None => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Html5Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let mut position_id = 0u32;
        let converted: Vec<Attr> = attrs
            .into_iter()
            .filter_map(|a| {
                let name = a.name.local.as_ref().to_string();
                if name == KEY_POSITION_ID {
                    position_id = a.value.parse().unwrap_or(0);
                    return None;
                }
                Some(Attr {
                    name,
                    value: a.value.to_string(),
                })
            })
            .collect();

        let mut arena = self.arena.borrow_mut();
        let id = arena.create_element(name, converted);
        if position_id != 0 {
            arena.set_position_id(id, position_id);
        }
        NodeHandle(id)
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        let id = self.arena.borrow_mut().create_comment(text.to_string());
        NodeHandle(id)
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        NodeHandle(self.arena.borrow_mut().create_comment(String::new()))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => {
                arena.append(parent.0, node.0);
            }
            NodeOrText::AppendText(text) => {
                Self::push_text(&mut arena, parent.0, &text);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let parent = self.arena.borrow().parent(element.0);
        if parent.is_some() {
            let mut arena = self.arena.borrow_mut();
            match child {
                NodeOrText::AppendNode(node) => arena.append(parent, node.0),
                NodeOrText::AppendText(text) => Self::push_text(&mut arena, parent, &text),
            }
            return;
        }
        self.append(prev_element, child);
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        // Doctype carries nothing the reader output needs.
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.0 == y.0
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => {
                arena.insert_before(sibling.0, node.0);
            }
            NodeOrText::AppendText(text) => {
                // Text before `sibling` belongs to the nearest preceding
                // element's tail, or to the parent's leading text.
                let mut prev = arena.get(sibling.0).map(|n| n.prev_sibling).unwrap_or(NodeId::NONE);
                while prev.is_some() && !arena.is_element(prev) {
                    prev = arena.get(prev).map(|n| n.prev_sibling).unwrap_or(NodeId::NONE);
                }
                if prev.is_some() {
                    let tail = format!("{}{}", arena.tail(prev), text);
                    arena.set_tail(prev, &tail);
                } else {
                    let parent = arena.parent(sibling.0);
                    if arena.is_element(parent) {
                        let body = format!("{}{}", arena.text(parent), text);
                        arena.set_text(parent, &body);
                    }
                }
            }
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let Some(e) = arena.element_mut(target.0) {
            for attr in attrs {
                let name = attr.name.local.as_ref();
                if !e.attrs.iter().any(|a| a.name == name) {
                    e.attrs.push(Attr {
                        name: name.to_string(),
                        value: attr.value.to_string(),
                    });
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.arena.borrow_mut().detach(target.0);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children: Vec<NodeId> = self.arena.borrow().children(node.0).collect();
        let mut arena = self.arena.borrow_mut();
        for child in children {
            arena.detach(child);
            arena.append(new_parent.0, child);
        }
    }
}

/// Parse an HTML string into an arena.
pub fn parse_html(html: &str) -> Arena {
    use html5ever::driver::ParseOpts;
    use html5ever::parse_document;
    use html5ever::tendril::TendrilSink;

    let sink = ArenaSink::new();
    let result = parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes());
    result.into_arena()
}
