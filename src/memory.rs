//! A headless [`RenderTarget`] that keeps its live tree in memory.
//!
//! Useful for server-side rendering through [`MemoryTarget::to_html`] and for observing exactly what patching does.
//!
//! Nodes live in an arena. [`RenderTarget::release_detached`] frees every node that is no longer connected to the root's tree,
//! and new nodes reuse the freed slots. A [`NodeId`] of a released node stays distinct from any later one
//! and reads as a detached, empty node.

use crate::{
	event::{EventOutcome, EventRoute, Listener, ListenerOptions},
	facts::Value,
	target::RenderTarget,
};
use core::{any::Any, cell::Cell, fmt::Write};
use std::{collections::BTreeMap, rc::Rc};
use tracing::{error, trace};

/// A handle to one node of a [`MemoryTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
	index: usize,
	generation: u32,
}

#[derive(Debug, Default)]
pub struct MemoryTarget {
	nodes: Vec<Slot>,
	free: Vec<usize>,
	child_lookups: Cell<usize>,
	listener_registrations: usize,
}

#[derive(Debug)]
struct Slot {
	generation: u32,
	released: bool,
	parent: Option<NodeId>,
	route: Option<Rc<EventRoute>>,
	data: Data,
}

#[derive(Debug)]
enum Data {
	Text(String),
	Element(ElementData),
}

#[derive(Debug, Default)]
struct ElementData {
	namespace: Option<String>,
	tag: String,
	properties: BTreeMap<String, Value>,
	styles: BTreeMap<String, String>,
	attributes: BTreeMap<String, String>,
	namespaced: BTreeMap<(String, String), String>,
	listeners: BTreeMap<String, (Rc<Listener>, ListenerOptions)>,
	children: Vec<NodeId>,
}

/// The observable state of a live subtree, independent of node identities and of event handler identities.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
	Text(String),
	Element {
		namespace: Option<String>,
		tag: String,
		properties: BTreeMap<String, Value>,
		styles: BTreeMap<String, String>,
		attributes: BTreeMap<String, String>,
		namespaced: BTreeMap<(String, String), String>,
		listeners: BTreeMap<String, ListenerOptions>,
		children: Vec<Snapshot>,
	},
}

impl MemoryTarget {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// `None` iff `node` was released.
	fn slot(&self, node: NodeId) -> Option<&Slot> {
		self.nodes.get(node.index).filter(|slot| slot.generation == node.generation)
	}

	fn slot_mut(&mut self, node: NodeId) -> Option<&mut Slot> {
		match self.nodes.get_mut(node.index) {
			Some(slot) if slot.generation == node.generation => Some(slot),
			_ => {
				error!("{:?} was released and can't be changed.", node);
				None
			}
		}
	}

	fn element(&self, node: NodeId) -> Option<&ElementData> {
		match &self.slot(node)?.data {
			Data::Element(element) => Some(element),
			Data::Text(_) => None,
		}
	}

	fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
		match &mut self.slot_mut(node)?.data {
			Data::Element(element) => Some(element),
			Data::Text(_) => {
				error!("Expected element but found text node {:?}.", node);
				None
			}
		}
	}

	fn push(&mut self, data: Data) -> NodeId {
		if let Some(index) = self.free.pop() {
			let slot = &mut self.nodes[index];
			slot.released = false;
			slot.data = data;
			return NodeId {
				index,
				generation: slot.generation,
			};
		}

		self.nodes.push(Slot {
			generation: 0,
			released: false,
			parent: None,
			route: None,
			data,
		});
		NodeId {
			index: self.nodes.len() - 1,
			generation: 0,
		}
	}

	fn detach(&mut self, child: NodeId) {
		if let Some(parent) = self.slot_mut(child).and_then(|slot| slot.parent.take()) {
			if let Some(element) = self.element_mut(parent) {
				element.children.retain(|&sibling| sibling != child);
			}
		}
	}

	/// Children of `node`, which are always empty for text nodes.
	#[must_use]
	pub fn children(&self, node: NodeId) -> &[NodeId] {
		match self.element(node) {
			Some(element) => &element.children,
			None => &[],
		}
	}

	#[must_use]
	pub fn text(&self, node: NodeId) -> Option<&str> {
		match &self.slot(node)?.data {
			Data::Text(text) => Some(text),
			Data::Element(_) => None,
		}
	}

	#[must_use]
	pub fn tag(&self, node: NodeId) -> Option<&str> {
		self.element(node).map(|element| &*element.tag)
	}

	#[must_use]
	pub fn property(&self, node: NodeId, key: &str) -> Option<&Value> {
		self.element(node)?.properties.get(key)
	}

	#[must_use]
	pub fn style(&self, node: NodeId, key: &str) -> Option<&str> {
		self.element(node)?.styles.get(key).map(|value| &**value)
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, key: &str) -> Option<&str> {
		self.element(node)?.attributes.get(key).map(|value| &**value)
	}

	#[must_use]
	pub fn listener_options(&self, node: NodeId, event: &str) -> Option<ListenerOptions> {
		self.element(node)?.listeners.get(event).map(|(_, options)| *options)
	}

	/// Dispatches `event` to the `name` listeners of `node` and its ancestors, until one stops propagation.
	///
	/// Returns `None` iff no listener was found.
	pub fn dispatch_event(&self, node: NodeId, name: &str, event: &dyn Any) -> Option<EventOutcome> {
		let mut outcome = None;
		let mut current = Some(node);
		while let Some(node) = current {
			let listener = self.element(node).and_then(|element| element.listeners.get(name)).map(|(listener, _)| listener.clone());
			if let Some(listener) = listener {
				let handled = listener.handle(event);
				let combined: &mut EventOutcome = outcome.get_or_insert_with(EventOutcome::default);
				combined.prevent_default |= handled.prevent_default;
				if handled.stop_propagation {
					combined.stop_propagation = true;
					break;
				}
			}
			current = self.slot(node).and_then(|slot| slot.parent);
		}
		outcome
	}

	/// How often [`RenderTarget::child`] was called since creation or the last reset.
	#[must_use]
	pub fn child_lookups(&self) -> usize {
		self.child_lookups.get()
	}

	pub fn reset_child_lookups(&self) {
		self.child_lookups.set(0);
	}

	/// How often [`RenderTarget::add_listener`] was called.
	#[must_use]
	pub fn listener_registrations(&self) -> usize {
		self.listener_registrations
	}

	/// How many nodes are currently allocated, attached or not.
	#[must_use]
	pub fn node_count(&self) -> usize {
		self.nodes.len() - self.free.len()
	}

	#[must_use]
	pub fn snapshot(&self, node: NodeId) -> Snapshot {
		match self.slot(node).map(|slot| &slot.data) {
			None => {
				error!("Can't take a snapshot of released {:?}.", node);
				Snapshot::Text(String::new())
			}
			Some(Data::Text(text)) => Snapshot::Text(text.clone()),
			Some(Data::Element(element)) => Snapshot::Element {
				namespace: element.namespace.clone(),
				tag: element.tag.clone(),
				properties: element.properties.clone(),
				styles: element.styles.clone(),
				attributes: element.attributes.clone(),
				namespaced: element.namespaced.clone(),
				listeners: element.listeners.iter().map(|(event, (_, options))| (event.clone(), *options)).collect(),
				children: element.children.iter().map(|&child| self.snapshot(child)).collect(),
			},
		}
	}

	/// Serializes the subtree at `node` as markup. Properties and listeners aren't included.
	#[must_use]
	pub fn to_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.write_html(node, &mut html);
		html
	}

	fn write_html(&self, node: NodeId, html: &mut String) {
		match self.slot(node).map(|slot| &slot.data) {
			None => error!("Can't serialize released {:?}.", node),
			Some(Data::Text(text)) => escape_into(text, html),
			Some(Data::Element(element)) => {
				html.push('<');
				html.push_str(&element.tag);
				for (key, value) in &element.attributes {
					write_attribute(html, key, value);
				}
				for ((_, key), value) in &element.namespaced {
					write_attribute(html, key, value);
				}
				if !element.styles.is_empty() {
					let mut style = String::new();
					for (key, value) in &element.styles {
						// Writing to a `String` can't fail.
						let _ = write!(style, "{}: {};", key, value);
					}
					write_attribute(html, "style", &style);
				}
				html.push('>');
				for &child in &element.children {
					self.write_html(child, html);
				}
				html.push_str("</");
				html.push_str(&element.tag);
				html.push('>');
			}
		}
	}
}

fn write_attribute(html: &mut String, key: &str, value: &str) {
	html.push(' ');
	html.push_str(key);
	html.push_str("=\"");
	escape_into(value, html);
	html.push('"');
}

fn escape_into(text: &str, html: &mut String) {
	for c in text.chars() {
		match c {
			'&' => html.push_str("&amp;"),
			'<' => html.push_str("&lt;"),
			'>' => html.push_str("&gt;"),
			'"' => html.push_str("&quot;"),
			c => html.push(c),
		}
	}
}

impl RenderTarget for MemoryTarget {
	type Handle = NodeId;

	fn create_element(&mut self, namespace: Option<&str>, tag: &str) -> NodeId {
		self.push(Data::Element(ElementData {
			namespace: namespace.map(ToOwned::to_owned),
			tag: tag.to_owned(),
			..ElementData::default()
		}))
	}

	fn create_text(&mut self, content: &str) -> NodeId {
		self.push(Data::Text(content.to_owned()))
	}

	fn set_text(&mut self, node: &NodeId, content: &str) {
		match self.slot_mut(*node).map(|slot| &mut slot.data) {
			Some(Data::Text(text)) => *text = content.to_owned(),
			Some(Data::Element(_)) => error!("Expected text node but found element {:?}.", node),
			None => (),
		}
	}

	fn insert_child(&mut self, parent: &NodeId, child: &NodeId, before: Option<&NodeId>) {
		if self.slot(*child).is_none() {
			return error!("Can't insert released {:?}.", child);
		}
		self.detach(*child);
		let children = match self.element_mut(*parent) {
			Some(element) => &mut element.children,
			None => return,
		};
		let position = match before {
			None => children.len(),
			Some(before) => match children.iter().position(|sibling| sibling == before) {
				Some(position) => position,
				None => {
					error!("{:?} isn't a child of {:?}. Appending {:?} instead.", before, parent, child);
					children.len()
				}
			},
		};
		children.insert(position, *child);
		self.nodes[child.index].parent = Some(*parent);
	}

	fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
		if self.parent(child) != Some(*parent) {
			return error!("Can't remove {:?} from {:?}, which isn't its parent.", child, parent);
		}
		self.detach(*child);
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.slot(*node)?.parent
	}

	fn child(&self, parent: &NodeId, index: usize) -> Option<NodeId> {
		self.child_lookups.set(self.child_lookups.get() + 1);
		self.children(*parent).get(index).copied()
	}

	fn set_property(&mut self, node: &NodeId, key: &str, value: &Value) {
		if let Some(element) = self.element_mut(*node) {
			element.properties.insert(key.to_owned(), value.clone());
		}
	}

	/// Drops the property entirely. There's no host default to fall back to.
	fn remove_property(&mut self, node: &NodeId, key: &str, _blank: &Value) {
		if let Some(element) = self.element_mut(*node) {
			element.properties.remove(key);
		}
	}

	fn set_style(&mut self, node: &NodeId, key: &str, value: Option<&str>) {
		if let Some(element) = self.element_mut(*node) {
			match value {
				Some(value) => element.styles.insert(key.to_owned(), value.to_owned()),
				None => element.styles.remove(key),
			};
		}
	}

	fn set_attribute(&mut self, node: &NodeId, key: &str, value: Option<&str>) {
		if let Some(element) = self.element_mut(*node) {
			match value {
				Some(value) => element.attributes.insert(key.to_owned(), value.to_owned()),
				None => element.attributes.remove(key),
			};
		}
	}

	fn set_attribute_ns(&mut self, node: &NodeId, namespace: &str, key: &str, value: Option<&str>) {
		if let Some(element) = self.element_mut(*node) {
			let key = (namespace.to_owned(), key.to_owned());
			match value {
				Some(value) => element.namespaced.insert(key, value.to_owned()),
				None => element.namespaced.remove(&key),
			};
		}
	}

	fn listener(&self, node: &NodeId, event: &str) -> Option<Rc<Listener>> {
		self.element(*node)?.listeners.get(event).map(|(listener, _)| listener.clone())
	}

	fn add_listener(&mut self, node: &NodeId, event: &str, listener: Rc<Listener>, options: ListenerOptions) {
		if let Some(element) = self.element_mut(*node) {
			element.listeners.insert(event.to_owned(), (listener, options));
			self.listener_registrations += 1;
		}
	}

	fn remove_listener(&mut self, node: &NodeId, event: &str) {
		if let Some(element) = self.element_mut(*node) {
			if element.listeners.remove(event).is_none() {
				trace!(event, "No listener to remove.");
			}
		}
	}

	fn event_route(&self, node: &NodeId) -> Option<Rc<EventRoute>> {
		self.slot(*node)?.route.clone()
	}

	fn set_event_route(&mut self, node: &NodeId, route: Rc<EventRoute>) {
		if let Some(slot) = self.slot_mut(*node) {
			slot.route = Some(route);
		}
	}

	/// Frees every node that isn't connected to the tree `root` is part of.
	fn release_detached(&mut self, root: &NodeId) {
		let mut top = *root;
		while let Some(parent) = self.parent(&top) {
			top = parent;
		}

		let mut connected = vec![false; self.nodes.len()];
		let mut pending = vec![top];
		while let Some(node) = pending.pop() {
			connected[node.index] = true;
			pending.extend_from_slice(self.children(node));
		}

		let mut released = 0_usize;
		for (index, slot) in self.nodes.iter_mut().enumerate() {
			if connected[index] || slot.released {
				continue;
			}
			slot.generation = slot.generation.wrapping_add(1);
			slot.released = true;
			slot.parent = None;
			slot.route = None;
			slot.data = Data::Text(String::new());
			self.free.push(index);
			released += 1;
		}
		trace!(released, free = self.free.len(), "Released detached nodes.");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn insertion_moves_attached_children() {
		let mut target = MemoryTarget::new();
		let a = target.create_element(None, "a");
		let b = target.create_element(None, "b");
		let child = target.create_text("x");

		target.insert_child(&a, &child, None);
		target.insert_child(&b, &child, None);

		assert!(target.children(a).is_empty());
		assert_eq!(target.children(b), &[child]);
		assert_eq!(target.parent(&child), Some(b));
	}

	#[test]
	fn html_is_escaped() {
		let mut target = MemoryTarget::new();
		let p = target.create_element(None, "p");
		target.set_attribute(&p, "title", Some("\"quoted\""));
		target.set_style(&p, "color", Some("red"));
		let text = target.create_text("a < b");
		target.insert_child(&p, &text, None);

		assert_eq!(target.to_html(p), r#"<p title="&quot;quoted&quot;" style="color: red;">a &lt; b</p>"#);
	}

	#[test]
	fn released_slots_are_reused_under_new_ids() {
		let mut target = MemoryTarget::new();
		let root = target.create_element(None, "div");
		let kept = target.create_text("kept");
		let dropped = target.create_element(None, "p");
		let dropped_child = target.create_text("gone");
		target.insert_child(&root, &kept, None);
		target.insert_child(&root, &dropped, None);
		target.insert_child(&dropped, &dropped_child, None);

		target.remove_child(&root, &dropped);
		target.release_detached(&kept);
		assert_eq!(target.node_count(), 2);
		assert_eq!(target.free.len(), 2);

		let fresh = target.create_text("fresh");
		assert_eq!(target.nodes.len(), 4);
		assert!(fresh.index == dropped.index || fresh.index == dropped_child.index);
		assert_ne!(fresh, dropped);
		assert_ne!(fresh, dropped_child);

		assert_eq!(target.text(fresh), Some("fresh"));
		assert_eq!(target.tag(dropped), None);
		assert_eq!(target.parent(&dropped_child), None);
		assert!(target.children(dropped).is_empty());
		assert_eq!(target.to_html(root), "<div>kept</div>");
	}

	#[test]
	fn stale_ids_leave_reused_slots_alone() {
		let mut target = MemoryTarget::new();
		let root = target.create_element(None, "div");
		let stale = target.create_text("stale");
		target.release_detached(&root);

		let reused = target.create_text("reused");
		assert_eq!(reused.index, stale.index);
		target.set_text(&stale, "changed");
		target.insert_child(&root, &stale, None);

		assert_eq!(target.text(reused), Some("reused"));
		assert!(target.children(root).is_empty());
	}
}
