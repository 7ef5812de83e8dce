//! A [`RenderTarget`] over the browser DOM, through [`web_sys`].
//!
//! # Safety
//!
//! Event listener closures are owned by the [`WebTarget`] and memory-safe,
//! including interactions with misbehaving [***JavaScript***](https://developer.mozilla.org/en-US/docs/Web/JavaScript) code.
//!
//! However, listeners that are still attached when the [`WebTarget`] is dropped
//! will start throwing errors into [***JavaScript***](https://developer.mozilla.org/en-US/docs/Web/JavaScript) when triggered.

use crate::{
	event::{EventRoute, Listener, ListenerOptions},
	facts::Value,
	target::RenderTarget,
};
use core::convert::TryFrom;
use hashbrown::HashMap;
use js_sys::Reflect;
use std::rc::Rc;
use tracing::{error, info, instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

/// The JavaScript property on live nodes that holds their binding id.
const BINDING_PROPERTY: &str = "__xylemDomBinding";

/// Properties that user input changes, which are only assigned if they differ from the live value.
const VOLATILE_PROPERTIES: [&str; 2] = ["value", "checked"];

/// Renders into a [`web_sys::Document`].
///
/// Event routes and listener closures can't be stored on DOM nodes directly,
/// so each node that has any is tagged with a numeric id that keys a side table.
#[derive(Debug)]
pub struct WebTarget {
	document: web_sys::Document,
	bindings: HashMap<u32, Binding>,
	next_binding_id: u32,
	event_listener_options_cache: [Option<web_sys::AddEventListenerOptions>; 2],
}

#[derive(Debug)]
struct Binding {
	node: web_sys::Node,
	route: Option<Rc<EventRoute>>,
	listeners: HashMap<String, WebListener>,
}

#[derive(Debug)]
struct WebListener {
	listener: Rc<Listener>,
	closure: Closure<dyn Fn(web_sys::Event)>,
}

impl WebListener {
	fn detach(&self, node: &web_sys::Node, event: &str) {
		if let Err(error) = node.remove_event_listener_with_callback(event, self.closure.as_ref().unchecked_ref()) {
			error!("Failed to remove {:?} listener: {:?}", event, error);
		}
	}
}

impl WebTarget {
	#[must_use]
	#[instrument]
	pub fn new(document: web_sys::Document) -> Self {
		Self {
			document,
			bindings: HashMap::new(),
			next_binding_id: 0,
			event_listener_options_cache: [None, None],
		}
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}

	/// How many nodes currently have an event route or listeners attached.
	#[must_use]
	pub fn binding_count(&self) -> usize {
		self.bindings.len()
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn binding_id(node: &web_sys::Node) -> Option<u32> {
		Reflect::get(node, &JsValue::from_str(BINDING_PROPERTY))
			.ok()
			.and_then(|id| id.as_f64())
			.map(|id| id as u32)
	}

	/// Ids of released bindings may be reused, so the binding must also belong to `node`.
	fn binding(&self, node: &web_sys::Node) -> Option<&Binding> {
		self.bindings.get(&Self::binding_id(node)?).filter(|binding| binding.node == *node)
	}

	fn binding_mut(&mut self, node: &web_sys::Node) -> &mut Binding {
		let id = match Self::binding_id(node) {
			Some(id) if self.bindings.get(&id).map_or(false, |binding| binding.node == *node) => id,
			_ => {
				let id = unused_id(&self.bindings, self.next_binding_id);
				self.next_binding_id = id.wrapping_add(1);
				if let Err(error) = Reflect::set(node, &JsValue::from_str(BINDING_PROPERTY), &JsValue::from(id)) {
					error!("Failed to tag node with binding id: {:?}", error);
				}
				id
			}
		};
		self.bindings.entry(id).or_insert_with(|| Binding {
			node: node.clone(),
			route: None,
			listeners: HashMap::new(),
		})
	}

	fn get_cached_add_event_listener_options(
		event_listener_options_cache: &mut [Option<web_sys::AddEventListenerOptions>; 2],
		options: ListenerOptions,
	) -> &web_sys::AddEventListenerOptions {
		let entry = &mut event_listener_options_cache[usize::from(options.passive)];
		entry.get_or_insert_with(|| {
			let mut web_options = web_sys::AddEventListenerOptions::new();
			web_options.passive(options.passive);
			web_options
		})
	}

	fn element<'a>(node: &'a web_sys::Node, operation: &str) -> Option<&'a web_sys::Element> {
		let element = node.dyn_ref::<web_sys::Element>();
		if element.is_none() {
			error!("Can't {} on non-element {:?}.", operation, node);
		}
		element
	}
}

/// The first id from `start` onwards, wrapping around, that isn't a key of `bindings`.
fn unused_id<V>(bindings: &HashMap<u32, V>, start: u32) -> u32 {
	let mut id = start;
	while bindings.contains_key(&id) {
		id = id.wrapping_add(1);
	}
	id
}

fn to_js(value: &Value) -> JsValue {
	match value {
		Value::Null => JsValue::NULL,
		Value::Bool(value) => JsValue::from_bool(*value),
		Value::Number(value) => JsValue::from_f64(*value),
		Value::String(value) => JsValue::from_str(value),
	}
}

impl RenderTarget for WebTarget {
	type Handle = web_sys::Node;

	fn create_element(&mut self, namespace: Option<&str>, tag: &str) -> web_sys::Node {
		let created = match namespace {
			Some(namespace) => self.document.create_element_ns(Some(namespace), tag),
			None => self.document.create_element(tag),
		};
		match created {
			Ok(element) => element.into(),
			Err(error) => {
				error!("Failed to create <{}>: {:?}. Substituting a comment.", tag, error);
				self.document.create_comment(tag).into()
			}
		}
	}

	fn create_text(&mut self, content: &str) -> web_sys::Node {
		self.document.create_text_node(content).into()
	}

	fn set_text(&mut self, node: &web_sys::Node, content: &str) {
		match node.dyn_ref::<web_sys::CharacterData>() {
			Some(character_data) => character_data.set_data(content),
			None => error!("Expected to update `web_sys::CharacterData` but found {:?}.", node),
		}
	}

	fn insert_child(&mut self, parent: &web_sys::Node, child: &web_sys::Node, before: Option<&web_sys::Node>) {
		if let Err(error) = parent.insert_before(child, before) {
			error!("Failed to insert {:?} into {:?}: {:?}", child, parent, error);
		}
	}

	fn remove_child(&mut self, parent: &web_sys::Node, child: &web_sys::Node) {
		if let Err(error) = parent.remove_child(child) {
			error!("Failed to remove {:?} from {:?}: {:?}", child, parent, error);
		}
	}

	fn parent(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
		node.parent_node()
	}

	fn child(&self, parent: &web_sys::Node, index: usize) -> Option<web_sys::Node> {
		parent.child_nodes().get(u32::try_from(index).ok()?)
	}

	fn set_property(&mut self, node: &web_sys::Node, key: &str, value: &Value) {
		let js_key = JsValue::from_str(key);
		let value = to_js(value);
		if VOLATILE_PROPERTIES.contains(&key) && Reflect::get(node, &js_key).map_or(false, |current| current == value) {
			return trace!(key, "Live value already matches.");
		}

		if let Err(error) = Reflect::set(node, &js_key, &value) {
			error!("Failed to set property {:?}: {:?}", key, error);
		}
	}

	fn remove_property(&mut self, node: &web_sys::Node, key: &str, blank: &Value) {
		if let Err(error) = Reflect::set(node, &JsValue::from_str(key), &to_js(blank)) {
			error!("Failed to reset property {:?}: {:?}", key, error);
		}
	}

	fn set_style(&mut self, node: &web_sys::Node, key: &str, value: Option<&str>) {
		let style = match Reflect::get(node, &JsValue::from_str("style")) {
			Ok(style) if style.is_object() => style,
			_ => return error!("Can't set style {:?} on {:?}, which has no style declaration.", key, node),
		};
		if let Err(error) = Reflect::set(&style, &JsValue::from_str(key), &JsValue::from_str(value.unwrap_or(""))) {
			error!("Failed to set style {:?}: {:?}", key, error);
		}
	}

	fn set_attribute(&mut self, node: &web_sys::Node, key: &str, value: Option<&str>) {
		let element = match Self::element(node, "set attribute") {
			Some(element) => element,
			None => return,
		};
		let result = match value {
			Some(value) => element.set_attribute(key, value),
			None => element.remove_attribute(key),
		};
		if let Err(error) = result {
			let span = trace_span!("set_attribute", key, value = ?value.map(crate::redact));
			let _enter = span.enter();
			error!("Failed to update attribute: {:?}", error);
		}
	}

	fn set_attribute_ns(&mut self, node: &web_sys::Node, namespace: &str, key: &str, value: Option<&str>) {
		let element = match Self::element(node, "set namespaced attribute") {
			Some(element) => element,
			None => return,
		};
		let result = match value {
			Some(value) => element.set_attribute_ns(Some(namespace), key, value),
			None => {
				// Removal goes by local name, without prefix.
				let local_name = key.rsplit(':').next().unwrap_or(key);
				element.remove_attribute_ns(Some(namespace), local_name)
			}
		};
		if let Err(error) = result {
			error!("Failed to update namespaced attribute {:?}: {:?}", key, error);
		}
	}

	fn listener(&self, node: &web_sys::Node, event: &str) -> Option<Rc<Listener>> {
		self.binding(node)?.listeners.get(event).map(|web_listener| web_listener.listener.clone())
	}

	fn add_listener(&mut self, node: &web_sys::Node, event: &str, listener: Rc<Listener>, options: ListenerOptions) {
		let closure = Closure::wrap(Box::new({
			let listener = listener.clone();
			move |event: web_sys::Event| {
				let outcome = listener.handle(&event);
				if outcome.stop_propagation {
					event.stop_propagation();
				}
				if outcome.prevent_default {
					event.prevent_default();
				}
			}
		}) as Box<dyn Fn(web_sys::Event)>);

		let web_options = Self::get_cached_add_event_listener_options(&mut self.event_listener_options_cache, options);
		if let Err(error) = node.add_event_listener_with_callback_and_add_event_listener_options(event, closure.as_ref().unchecked_ref(), web_options) {
			return error!("Failed to add {:?} listener: {:?}", event, error);
		}

		let previous = self.binding_mut(node).listeners.insert(event.to_owned(), WebListener { listener, closure });
		if let Some(previous) = previous {
			warn!("Replaced {:?} listener that was still registered.", event);
			previous.detach(node, event);
		}
	}

	fn remove_listener(&mut self, node: &web_sys::Node, event: &str) {
		let removed = Self::binding_id(node)
			.and_then(|id| self.bindings.get_mut(&id))
			.and_then(|binding| binding.listeners.remove(event));
		match removed {
			Some(web_listener) => web_listener.detach(node, event),
			None => trace!(event, "No listener to remove."),
		}
	}

	fn event_route(&self, node: &web_sys::Node) -> Option<Rc<EventRoute>> {
		self.binding(node)?.route.clone()
	}

	fn set_event_route(&mut self, node: &web_sys::Node, route: Rc<EventRoute>) {
		self.binding_mut(node).route = Some(route);
	}

	#[instrument(skip(self))]
	fn release_detached(&mut self, root: &web_sys::Node) {
		let before = self.bindings.len();
		self.bindings.retain(|_, binding| {
			if root.contains(Some(&binding.node)) {
				return true;
			}
			for (event, web_listener) in &binding.listeners {
				web_listener.detach(&binding.node, event);
			}
			if let Err(error) = Reflect::delete_property(&binding.node, &JsValue::from_str(BINDING_PROPERTY)) {
				error!("Failed to untag node: {:?}", error);
			}
			false
		});

		trace!("Freed {} binding(s).", before - self.bindings.len());
		info!("Binding count/cached capacity: {}/{}", self.bindings.len(), self.bindings.capacity());
		if STATIC_MAX_LEVEL >= Level::WARN && self.bindings.capacity() >= 1000 && self.bindings.len() < self.bindings.capacity() / 4 {
			warn!(
				"The binding table capacity is large ({}) compared to its use ({}).\n\
				This may point to a large subtree having been removed.",
				self.bindings.capacity(),
				self.bindings.len()
			);
		}
	}
}
