//! Virtualization of existing DOM content, for example server-rendered markup, into [`Node`] trees.
//!
//! The result can be handed to [`Renderer::adopt`](crate::Renderer::adopt) along with the DOM node it was loaded from.

use crate::{facts::Fact, node::Node};
use std::rc::Rc;
use tracing::{trace, warn};
use wasm_bindgen::JsCast;
use web_sys::{Attr, Element, NamedNodeMap, NodeList, Text};

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Loads `node` and its descendants.
///
/// Node kinds without counterpart, like comments, load as empty text so that positions are preserved.
#[must_use]
pub fn load_node(node: &web_sys::Node) -> Rc<Node> {
	if let Some(element) = node.dyn_ref::<Element>() {
		load_element(element)
	} else if let Some(text) = node.dyn_ref::<Text>() {
		Node::text(text.data())
	} else {
		trace!("Loading {:?} as empty text.", node.node_name());
		Node::text("")
	}
}

#[must_use]
pub fn load_child_nodes(child_nodes: &NodeList) -> Vec<Rc<Node>> {
	(0..child_nodes.length())
		.filter_map(|i| {
			let child = child_nodes.item(i);
			if child.is_none() {
				warn!("Child node {} vanished while loading.", i);
			}
			child
		})
		.map(|child| load_node(&child))
		.collect()
}

#[must_use]
pub fn load_element(element: &Element) -> Rc<Node> {
	let node: &web_sys::Node = element.as_ref();
	let facts = load_attributes(&element.attributes());
	let children = load_child_nodes(&node.child_nodes());
	match element.namespace_uri() {
		Some(namespace) if namespace != XHTML_NAMESPACE => Node::element_ns(namespace, element.local_name(), facts, children),
		_ => Node::element(element.local_name(), facts, children),
	}
}

#[must_use]
pub fn load_attributes(attributes: &NamedNodeMap) -> Vec<Fact> {
	(0..attributes.length()).filter_map(|i| attributes.item(i)).map(|attribute| load_attribute(&attribute)).collect()
}

#[must_use]
pub fn load_attribute(attribute: &Attr) -> Fact {
	match attribute.namespace_uri() {
		Some(namespace) => Fact::attribute_ns(namespace, attribute.name(), attribute.value()),
		None => Fact::attribute(attribute.local_name(), attribute.value()),
	}
}

