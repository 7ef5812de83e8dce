//! The primitives a live tree has to offer so that it can be rendered to and patched.

use crate::{
	event::{EventRoute, Listener, ListenerOptions},
	facts::Value,
};
use core::fmt::Debug;
use std::rc::Rc;

/// A mutable live tree, like the browser DOM.
///
/// Patching never reads content back from the target.
/// Only [`parent`](`RenderTarget::parent`) and [`child`](`RenderTarget::child`) are used to locate nodes,
/// along with the bookkeeping getters for listeners and event routes.
///
/// Implementations should log and skip primitives that fail, rather than panic.
pub trait RenderTarget: 'static {
	/// A cheap reference to one live node. Equal handles refer to the same node.
	type Handle: Clone + PartialEq + Debug + 'static;

	fn create_element(&mut self, namespace: Option<&str>, tag: &str) -> Self::Handle;
	fn create_text(&mut self, content: &str) -> Self::Handle;
	fn set_text(&mut self, node: &Self::Handle, content: &str);

	/// Inserts `child` into `parent` in front of `before`, or at the end if `before` is `None`.
	///
	/// If `child` already has a parent, it is moved.
	fn insert_child(&mut self, parent: &Self::Handle, child: &Self::Handle, before: Option<&Self::Handle>);
	fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle);

	fn parent(&self, node: &Self::Handle) -> Option<Self::Handle>;
	/// The `index`th child of `parent`, if there is one.
	fn child(&self, parent: &Self::Handle, index: usize) -> Option<Self::Handle>;

	fn set_property(&mut self, node: &Self::Handle, key: &str, value: &Value);
	/// Removes a property that was set before. `blank` is `""` if it held a string, otherwise `null`.
	fn remove_property(&mut self, node: &Self::Handle, key: &str, blank: &Value);
	fn set_style(&mut self, node: &Self::Handle, key: &str, value: Option<&str>);
	fn set_attribute(&mut self, node: &Self::Handle, key: &str, value: Option<&str>);
	fn set_attribute_ns(&mut self, node: &Self::Handle, namespace: &str, key: &str, value: Option<&str>);

	/// The listener currently registered for `event` on `node`.
	fn listener(&self, node: &Self::Handle, event: &str) -> Option<Rc<Listener>>;
	/// Registers `listener`, which must be called with the raw event as `&dyn Any`.
	fn add_listener(&mut self, node: &Self::Handle, event: &str, listener: Rc<Listener>, options: ListenerOptions);
	fn remove_listener(&mut self, node: &Self::Handle, event: &str);

	fn event_route(&self, node: &Self::Handle) -> Option<Rc<EventRoute>>;
	fn set_event_route(&mut self, node: &Self::Handle, route: Rc<EventRoute>);

	/// Called once after each update cycle with the current root.
	/// Targets that keep per-node bookkeeping can drop it here for nodes no longer below `root`.
	fn release_detached(&mut self, root: &Self::Handle) {
		let _ = root;
	}
}
