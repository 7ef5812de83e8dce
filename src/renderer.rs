use crate::{
	apply::{apply_patches, render},
	diff::diff,
	event::{EventRoute, Message},
	node::Node,
	target::RenderTarget,
};
use std::rc::Rc;
use tracing::{info, instrument};

/// Owns one live tree along with the view tree it was last patched to.
///
/// Each [`update`](`Renderer::update`) runs one complete diff-and-apply cycle.
/// Cycles can't overlap, since they require exclusive access.
#[derive(Debug)]
pub struct Renderer<T: RenderTarget> {
	target: T,
	root: T::Handle,
	tree: Rc<Node>,
	route: Rc<EventRoute>,
}

impl<T: RenderTarget> Renderer<T> {
	/// Renders `tree` and appends it to `parent`.
	///
	/// Messages produced by event handlers in the tree are passed to `dispatch`.
	#[instrument(skip(target, tree, dispatch))]
	pub fn mount(mut target: T, parent: &T::Handle, tree: Rc<Node>, dispatch: impl Fn(Message) + 'static) -> Self {
		let route = EventRoute::root(dispatch);
		let root = render(&mut target, &tree, &route);
		target.insert_child(parent, &root, None);
		Self { target, root, tree, route }
	}

	/// Takes over an existing live tree `root`, which must already match `tree`.
	///
	/// This is the case for example for markup loaded through [`load_node`](crate::load::load_node).
	/// Event listeners and routes are only attached where later updates change them.
	#[instrument(skip(target, tree, dispatch))]
	pub fn adopt(target: T, root: T::Handle, tree: Rc<Node>, dispatch: impl Fn(Message) + 'static) -> Self {
		Self {
			target,
			root,
			tree,
			route: EventRoute::root(dispatch),
		}
	}

	/// Patches the live tree to match `next`.
	#[instrument(skip(self, next))]
	pub fn update(&mut self, next: Rc<Node>) {
		let patches = diff(&self.tree, &next);
		let patch_count = patches.len();
		self.root = apply_patches(&mut self.target, self.root.clone(), &self.tree, patches, &self.route);
		self.tree = next;
		self.target.release_detached(&self.root);
		info!("Applied {} top-level patch(es).", patch_count);
	}

	#[must_use]
	pub fn target(&self) -> &T {
		&self.target
	}

	pub fn target_mut(&mut self) -> &mut T {
		&mut self.target
	}

	/// The live root, which changes if an update replaces it.
	#[must_use]
	pub fn root(&self) -> &T::Handle {
		&self.root
	}

	#[must_use]
	pub fn tree(&self) -> &Rc<Node> {
		&self.tree
	}

	#[must_use]
	pub fn route(&self) -> &Rc<EventRoute> {
		&self.route
	}

	#[must_use]
	pub fn into_target(self) -> T {
		self.target
	}
}
