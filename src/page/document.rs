use std::collections::HashMap;
use std::fmt;

use blitz_dom::node::NodeData;
use blitz_dom::{local_name, ns, BaseDocument, DocumentConfig, DocumentMutator, LocalName, QualName};
use blitz_html::HtmlDocument;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use super::style::InlineStyle;

/// Stable reference to a node in the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn id(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_id(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("missing node {0}")]
    MissingNode(NodeHandle),
    #[error("node {child} is not attached under {parent}")]
    NotAChild {
        parent: NodeHandle,
        child: NodeHandle,
    },
}

/// Notification fired on an element for the embedding page to observe
/// (the `CustomEvent` of a browser host).
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub target: NodeHandle,
    pub element_id: Option<String>,
    pub name: String,
    pub detail: Option<Value>,
}

/// The embedding document: a parsed HTML tree plus the queue of host
/// notifications dispatched on its elements.
pub struct HostPage {
    document: HtmlDocument,
    id_index: HashMap<String, usize>,
    events_tx: mpsc::UnboundedSender<HostEvent>,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
}

impl HostPage {
    pub fn from_html(html: &str) -> Self {
        let mut document = HtmlDocument::from_html(html, DocumentConfig::default());
        let mut id_index = HashMap::new();
        Self::reindex(&mut document, &mut id_index);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            document,
            id_index,
            events_tx,
            events_rx,
        }
    }

    fn reindex(document: &mut BaseDocument, index: &mut HashMap<String, usize>) {
        index.clear();
        let root_id = document.root_node().id;
        document.iter_subtree_mut(root_id, |node_id, doc| {
            if let Some(node) = doc.get_node(node_id) {
                if let Some(id_attr) = node.attr(local_name!("id")) {
                    index.insert(id_attr.to_string(), node_id);
                }
            }
        });
    }

    fn html_name(name: &str) -> QualName {
        QualName::new(None, ns!(html), LocalName::from(name))
    }

    fn node_exists(&self, node: NodeHandle) -> Result<(), PageError> {
        self.document
            .get_node(node.0)
            .map(|_| ())
            .ok_or(PageError::MissingNode(node))
    }

    /// Resolve an element by its `id` attribute among attached nodes.
    pub fn find_by_id(&mut self, id: &str) -> Option<NodeHandle> {
        if let Some(node_id) = self.id_index.get(id).copied() {
            if self.is_attached(NodeHandle(node_id)) {
                return Some(NodeHandle(node_id));
            }
        }
        Self::reindex(&mut self.document, &mut self.id_index);
        self.id_index.get(id).copied().map(NodeHandle)
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeHandle {
        let mut mutator = DocumentMutator::new(&mut self.document);
        NodeHandle(mutator.create_element(Self::html_name(tag), Vec::new()))
    }

    pub fn create_text_node(&mut self, value: &str) -> NodeHandle {
        let mut mutator = DocumentMutator::new(&mut self.document);
        NodeHandle(mutator.create_text_node(value))
    }

    pub fn set_attribute(&mut self, node: NodeHandle, name: &str, value: &str) -> Result<(), PageError> {
        self.node_exists(node)?;
        let normalized = name.to_ascii_lowercase();
        {
            let mut mutator = DocumentMutator::new(&mut self.document);
            mutator.set_attribute(node.0, Self::html_name(&normalized), value);
        }
        if normalized == "id" {
            Self::reindex(&mut self.document, &mut self.id_index);
        }
        Ok(())
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Result<Option<String>, PageError> {
        let element = self
            .document
            .get_node(node.0)
            .ok_or(PageError::MissingNode(node))?;
        Ok(element.attr(LocalName::from(name)).map(|s| s.to_string()))
    }

    pub fn style(&self, node: NodeHandle) -> Result<InlineStyle, PageError> {
        Ok(self
            .attribute(node, "style")?
            .map(|raw| InlineStyle::parse(&raw))
            .unwrap_or_default())
    }

    pub fn set_style(&mut self, node: NodeHandle, style: &InlineStyle) -> Result<(), PageError> {
        self.set_attribute(node, "style", &style.to_string())
    }

    pub fn style_property(&self, node: NodeHandle, name: &str) -> Result<Option<String>, PageError> {
        Ok(self.style(node)?.get(name).map(str::to_string))
    }

    pub fn set_style_property(
        &mut self,
        node: NodeHandle,
        name: &str,
        value: &str,
    ) -> Result<(), PageError> {
        let mut style = self.style(node)?;
        style.set(name, value);
        self.set_style(node, &style)
    }

    pub fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), PageError> {
        self.node_exists(parent)?;
        self.node_exists(child)?;
        {
            let mut mutator = DocumentMutator::new(&mut self.document);
            mutator.append_children(parent.0, &[child.0]);
        }
        Self::reindex(&mut self.document, &mut self.id_index);
        Ok(())
    }

    /// Detach `node` (and its subtree) from its parent. Detached nodes are left alone.
    pub fn remove_node(&mut self, node: NodeHandle) -> Result<(), PageError> {
        let element = self
            .document
            .get_node(node.0)
            .ok_or(PageError::MissingNode(node))?;
        if element.parent.is_none() {
            return Ok(());
        }
        {
            let mut mutator = DocumentMutator::new(&mut self.document);
            mutator.remove_node(node.0);
        }
        Self::reindex(&mut self.document, &mut self.id_index);
        Ok(())
    }

    /// Drop every child of `parent` and append `child` in their place.
    pub fn replace_children(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), PageError> {
        self.node_exists(parent)?;
        self.node_exists(child)?;
        {
            let mut mutator = DocumentMutator::new(&mut self.document);
            mutator.remove_and_drop_all_children(parent.0);
            mutator.append_children(parent.0, &[child.0]);
        }
        Self::reindex(&mut self.document, &mut self.id_index);
        Ok(())
    }

    pub fn parent(&self, node: NodeHandle) -> Result<Option<NodeHandle>, PageError> {
        let element = self
            .document
            .get_node(node.0)
            .ok_or(PageError::MissingNode(node))?;
        Ok(element.parent.map(NodeHandle))
    }

    pub fn children(&self, node: NodeHandle) -> Result<Vec<NodeHandle>, PageError> {
        let element = self
            .document
            .get_node(node.0)
            .ok_or(PageError::MissingNode(node))?;
        Ok(element.children.iter().copied().map(NodeHandle).collect())
    }

    pub fn tag_name(&self, node: NodeHandle) -> Result<Option<String>, PageError> {
        let element = self
            .document
            .get_node(node.0)
            .ok_or(PageError::MissingNode(node))?;
        Ok(match &element.data {
            NodeData::Element(data) => Some(data.name.local.as_ref().to_ascii_lowercase()),
            _ => None,
        })
    }

    pub fn text_content(&self, node: NodeHandle) -> Result<String, PageError> {
        self.document
            .get_node(node.0)
            .map(|element| element.text_content())
            .ok_or(PageError::MissingNode(node))
    }

    /// Whether `node` is reachable from the document root.
    pub fn is_attached(&self, node: NodeHandle) -> bool {
        let root_id = self.document.root_node().id;
        let mut current = Some(node.0);
        while let Some(node_id) = current {
            if node_id == root_id {
                return true;
            }
            current = self.document.get_node(node_id).and_then(|n| n.parent);
        }
        false
    }

    pub fn dispatch_event(
        &mut self,
        target: NodeHandle,
        name: &str,
        detail: Option<Value>,
    ) -> Result<(), PageError> {
        let element_id = self.attribute(target, "id")?;
        let event = HostEvent {
            target,
            element_id,
            name: name.to_string(),
            detail,
        };
        // The receiver lives as long as the page.
        let _ = self.events_tx.send(event);
        Ok(())
    }

    /// Next host notification, in dispatch order.
    pub fn try_recv_event(&mut self) -> Option<HostEvent> {
        self.events_rx.try_recv().ok()
    }

    pub fn serialize(&self) -> String {
        let mut output = String::from("<!DOCTYPE html>");
        let root_id = self.document.root_node().id;
        self.serialize_children(root_id, &mut output);
        output
    }

    fn serialize_children(&self, node_id: usize, output: &mut String) {
        let Some(node) = self.document.get_node(node_id) else {
            return;
        };
        for child in &node.children {
            self.serialize_node(*child, output);
        }
    }

    fn serialize_node(&self, node_id: usize, output: &mut String) {
        let Some(node) = self.document.get_node(node_id) else {
            return;
        };

        match &node.data {
            NodeData::Document | NodeData::AnonymousBlock(_) => {
                self.serialize_children(node_id, output);
            }
            NodeData::Element(data) => {
                output.push('<');
                output.push_str(data.name.local.as_ref());
                for attr in data.attrs.iter() {
                    output.push(' ');
                    output.push_str(attr.name.local.as_ref());
                    output.push_str("=\"");
                    output.push_str(&encode_double_quoted_attribute(&attr.value));
                    output.push('"');
                }
                output.push('>');
                self.serialize_children(node_id, output);
                output.push_str("</");
                output.push_str(data.name.local.as_ref());
                output.push('>');
            }
            NodeData::Text(text) => {
                output.push_str(&encode_text(&text.content));
            }
            NodeData::Comment => output.push_str("<!---->"),
        }
    }
}
