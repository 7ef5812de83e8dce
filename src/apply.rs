//! Rendering [`Node`]s into a [`RenderTarget`], and applying [`Patch`]es to what was rendered.
//!
//! Patches only carry their pre-order index within the old tree.
//! Before anything is mutated, [`apply_patches`] walks the old tree and the live tree in lockstep to resolve them to live nodes,
//! descending only into subtrees whose index window contains the next pending patch.

use crate::{
	event::{EventRoute, Handler, Listener, ListenerOptions},
	facts::{diff_facts, Facts, FactsDiff, PropertyChange},
	node::Node,
	patch::{Entry, EntryState, KeyedPatch, Patch, PatchKind, Relocation, Resolved},
	target::RenderTarget,
};
use core::any::type_name;
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span, warn};

/// Renders `node` as new live tree, routing its events towards `route`.
pub fn render<T: RenderTarget>(target: &mut T, node: &Node, route: &Rc<EventRoute>) -> T::Handle {
	match node {
		Node::Text(text) => target.create_text(text),

		Node::Element(element) => {
			let handle = target.create_element(element.namespace(), element.tag());
			apply_facts(target, &handle, &initial_facts(element.facts()), route);
			for child in element.children() {
				let child = render(target, child, route);
				target.insert_child(&handle, &child, None);
			}
			handle
		}

		Node::Keyed(keyed) => {
			let handle = target.create_element(keyed.namespace(), keyed.tag());
			apply_facts(target, &handle, &initial_facts(keyed.facts()), route);
			for (_, child) in keyed.children() {
				let child = render(target, child, route);
				target.insert_child(&handle, &child, None);
			}
			handle
		}

		Node::Tagged(tagged) => {
			let (mappers, inner) = tagged.flatten();
			let route = EventRoute::mapped(mappers, route.clone());
			let handle = render(target, inner, &route);
			target.set_event_route(&handle, route);
			handle
		}

		Node::Memoized(memoized) => render(target, &memoized.content(), route),

		Node::Custom(custom) => {
			let handle = downcast_handle::<T>(custom.render(target));
			apply_facts(target, &handle, &initial_facts(custom.facts()), route);
			handle
		}
	}
}

fn initial_facts(facts: &Facts) -> FactsDiff {
	diff_facts(&Facts::default(), facts)
}

fn downcast_handle<T: RenderTarget>(handle: Box<dyn core::any::Any>) -> T::Handle {
	match handle.downcast::<T::Handle>() {
		Ok(handle) => *handle,
		Err(_) => panic!("Custom node produced a handle that isn't a `{}`.", type_name::<T::Handle>()),
	}
}

/// Applies `patches`, as returned by [`diff`](crate::diff())`(old, …)`, to the live tree `root` that currently matches `old`.
///
/// Returns the new root, which differs from `root` only if the root itself was replaced.
///
/// # Panics
///
/// Iff a patch can't be located within `old`, which means `patches` weren't calculated against `old`.
#[instrument(skip(target, old, patches, route))]
pub fn apply_patches<T: RenderTarget>(target: &mut T, root: T::Handle, old: &Rc<Node>, mut patches: Vec<Patch<T::Handle>>, route: &Rc<EventRoute>) -> T::Handle {
	if patches.is_empty() {
		trace!("Nothing to apply.");
		return root;
	}

	resolve_within(target, old, &root, &mut patches, route);
	apply_patches_help(target, root, patches)
}

fn resolve_within<T: RenderTarget>(target: &T, old: &Node, node: &T::Handle, patches: &mut [Patch<T::Handle>], route: &Rc<EventRoute>) {
	resolve_all(target, old, node, patches, 0, old.descendants(), route);
}

/// Resolves every patch in `patches` within `low..=high`.
///
/// # Panics
///
/// Iff any of them is left over.
fn resolve_all<T: RenderTarget>(target: &T, old: &Node, node: &T::Handle, patches: &mut [Patch<T::Handle>], low: usize, high: usize, route: &Rc<EventRoute>) {
	let resolved = resolve_help(target, old, node, patches, 0, low, high, route);
	assert_eq!(
		resolved,
		patches.len(),
		"xylem-dom bug: Patch index {} lies outside the old tree. Descendant counts are out of sync.",
		patches.get(resolved).map_or(0, Patch::index)
	);
}

/// Resolves patches from `i` onwards that lie within `low..=high`, where `low` is the index of `old` itself.
///
/// Returns the index of the first patch left unresolved.
#[allow(clippy::too_many_arguments)]
fn resolve_help<T: RenderTarget>(
	target: &T,
	old: &Node,
	node: &T::Handle,
	patches: &mut [Patch<T::Handle>],
	mut i: usize,
	low: usize,
	high: usize,
	route: &Rc<EventRoute>,
) -> usize {
	while let Some(patch) = patches.get_mut(i) {
		if patch.index != low {
			break;
		}

		match (&mut patch.kind, old) {
			(PatchKind::Memoized(nested), Node::Memoized(memoized)) => resolve_within(target, &memoized.content(), node, nested, route),
			(PatchKind::Keyed(keyed), _) => resolve_all(target, old, node, &mut keyed.patches, low, high, route),
			(PatchKind::Remove(Some(relocation)), _) => resolve_all(target, old, node, &mut relocation.patches, low, high, route),
			_ => (),
		}
		patch.resolved = Some(Resolved {
			node: node.clone(),
			route: route.clone(),
		});
		i += 1;
	}

	match patches.get(i) {
		Some(patch) if patch.index <= high => (),
		_ => return i,
	}

	match old {
		Node::Tagged(tagged) => {
			let route = target.event_route(node).unwrap_or_else(|| {
				warn!("Live node of a tagged subtree has no event route. Falling back to the enclosing one.");
				route.clone()
			});
			resolve_help(target, tagged.innermost(), node, patches, i, low + 1, high, &route)
		}
		Node::Element(element) => resolve_children(target, element.children().iter().map(|child| &**child), node, patches, i, low, high, route),
		Node::Keyed(keyed) => resolve_children(target, keyed.children().iter().map(|(_, child)| &**child), node, patches, i, low, high, route),
		Node::Text(_) | Node::Memoized(_) | Node::Custom(_) => i,
	}
}

#[allow(clippy::too_many_arguments)]
fn resolve_children<'a, T: RenderTarget>(
	target: &T,
	children: impl Iterator<Item = &'a Node>,
	node: &T::Handle,
	patches: &mut [Patch<T::Handle>],
	mut i: usize,
	mut low: usize,
	high: usize,
	route: &Rc<EventRoute>,
) -> usize {
	let mut index = patches[i].index;
	for (j, child) in children.enumerate() {
		low += 1;
		let next_low = low + child.descendants();
		if low <= index && index <= next_low {
			let live = target
				.child(node, j)
				.unwrap_or_else(|| panic!("xylem-dom bug: Live node {:?} has no child {}, but the old tree does.", node, j));
			i = resolve_help(target, child, &live, patches, i, low, next_low, route);
			match patches.get(i) {
				Some(patch) if patch.index <= high => index = patch.index,
				_ => return i,
			}
		}
		low = next_low;
	}
	i
}

fn apply_patches_help<T: RenderTarget>(target: &mut T, mut root: T::Handle, patches: Vec<Patch<T::Handle>>) -> T::Handle {
	for patch in patches {
		let Resolved { node, route } = take_resolved(patch.resolved, patch.index);
		let new_node = apply_patch(target, &node, patch.kind, &route);
		if node == root {
			root = new_node;
		}
	}
	root
}

fn take_resolved<H>(resolved: Option<Resolved<H>>, index: usize) -> Resolved<H> {
	resolved.unwrap_or_else(|| panic!("xylem-dom bug: Patch at index {} wasn't resolved to a live node.", index))
}

/// Returns the node that now stands where `node` was.
fn apply_patch<T: RenderTarget>(target: &mut T, node: &T::Handle, kind: PatchKind<T::Handle>, route: &Rc<EventRoute>) -> T::Handle {
	match kind {
		PatchKind::Replace(next) => {
			let span = trace_span!("Replacing", ?node);
			let _enter = span.enter();
			let rendered = render(target, &next, route);
			swap_in(target, node, rendered)
		}

		PatchKind::Facts(diff) => {
			apply_facts(target, node, &diff, route);
			node.clone()
		}

		PatchKind::Text(text) => {
			target.set_text(node, &text);
			node.clone()
		}

		PatchKind::Memoized(nested) => apply_patches_help(target, node.clone(), nested),

		PatchKind::Remap(mappers) => {
			match target.event_route(node) {
				Some(existing) => existing.remap(mappers),
				None => target.set_event_route(node, EventRoute::mapped(mappers, route.clone())),
			}
			node.clone()
		}

		PatchKind::Removals { keep, count } => {
			for _ in 0..count {
				match target.child(node, keep) {
					Some(child) => target.remove_child(node, &child),
					None => {
						error!("Expected child {} of {:?} to remove, but there is none.", keep, node);
						break;
					}
				}
			}
			node.clone()
		}

		PatchKind::Insertions { start, children } => {
			let end = target.child(node, start);
			for child in &children {
				let child = render(target, child, route);
				target.insert_child(node, &child, end.as_ref());
			}
			node.clone()
		}

		PatchKind::Keyed(keyed) => {
			apply_keyed(target, node, keyed, route);
			node.clone()
		}

		PatchKind::Remove(None) => {
			match target.parent(node) {
				Some(parent) => target.remove_child(&parent, node),
				None => warn!("Keyed child {:?} to remove is already detached.", node),
			}
			node.clone()
		}

		PatchKind::Remove(Some(_)) => panic!("xylem-dom bug: Relocation outside of a keyed patch."),

		PatchKind::Custom(update) => match update.apply(target, node) {
			None => node.clone(),
			Some(replacement) => {
				let replacement = downcast_handle::<T>(replacement);
				swap_in(target, node, replacement)
			}
		},
	}
}

/// Puts `replacement` where `node` is, carrying over its event route unless `replacement` has its own.
fn swap_in<T: RenderTarget>(target: &mut T, node: &T::Handle, replacement: T::Handle) -> T::Handle {
	if replacement == *node {
		return replacement;
	}
	if target.event_route(&replacement).is_none() {
		if let Some(route) = target.event_route(node) {
			target.set_event_route(&replacement, route);
		}
	}
	if let Some(parent) = target.parent(node) {
		target.insert_child(&parent, &replacement, Some(node));
		target.remove_child(&parent, node);
	}
	replacement
}

fn apply_keyed<T: RenderTarget>(target: &mut T, parent: &T::Handle, keyed: KeyedPatch<T::Handle>, route: &Rc<EventRoute>) {
	let KeyedPatch {
		patches,
		inserts,
		end_inserts,
		entries,
	} = keyed;
	let span = trace_span!("Applying keyed patch", patches = patches.len(), inserts = inserts.len(), end_inserts = end_inserts.len());
	let _enter = span.enter();

	// Children moving to the end leave first, so that insert positions only count children kept in place.
	for &entry in &end_inserts {
		if let EntryState::Moved { removal } = entries[entry].state {
			match patches[removal].resolved_node() {
				Some(moved) => target.remove_child(parent, moved),
				None => panic!("xylem-dom bug: Removal of moved keyed child wasn't resolved."),
			}
		}
	}

	let mut moved = vec![None; entries.len()];
	for patch in patches {
		let Resolved { node, route } = take_resolved(patch.resolved, patch.index);
		match patch.kind {
			PatchKind::Remove(Some(Relocation { patches, entry })) => {
				if entries[entry].position.is_some() {
					target.remove_child(parent, &node);
				}
				moved[entry] = Some(apply_patches_help(target, node, patches));
			}
			kind => {
				apply_patch(target, &node, kind, &route);
			}
		}
	}

	for insert in inserts {
		let child = settle(target, &entries[insert.entry], &mut moved[insert.entry], route);
		let before = target.child(parent, insert.position);
		target.insert_child(parent, &child, before.as_ref());
	}

	for entry in end_inserts {
		let child = settle(target, &entries[entry], &mut moved[entry], route);
		target.insert_child(parent, &child, None);
	}
}

/// The live node to insert for `entry`: the moved one if there is one, otherwise a freshly rendered node.
fn settle<T: RenderTarget>(target: &mut T, entry: &Entry, moved: &mut Option<T::Handle>, route: &Rc<EventRoute>) -> T::Handle {
	match (entry.state, moved.take()) {
		(EntryState::Moved { .. }, Some(node)) => node,
		(EntryState::Moved { .. }, None) => panic!("xylem-dom bug: Moved keyed child was never taken out."),
		_ => render(target, &entry.node, route),
	}
}

fn apply_facts<T: RenderTarget>(target: &mut T, node: &T::Handle, diff: &FactsDiff, route: &Rc<EventRoute>) {
	for (key, change) in &diff.properties {
		match change {
			PropertyChange::Set(value) => target.set_property(node, key, value),
			PropertyChange::Remove { blank } => target.remove_property(node, key, blank),
		}
	}
	for (key, change) in &diff.styles {
		target.set_style(node, key, change.as_set().map(|value| &**value));
	}
	for (key, change) in &diff.attributes {
		target.set_attribute(node, key, change.as_set().map(|value| &**value));
	}
	for (key, change) in &diff.namespaced {
		target.set_attribute_ns(node, &change.namespace, key, change.value.as_deref());
	}
	for (event, change) in &diff.listeners {
		apply_listener(target, node, event, change.as_set(), route);
	}
}

/// Handlers of the same kind are swapped into the existing listener, which keeps its registration options.
fn apply_listener<T: RenderTarget>(target: &mut T, node: &T::Handle, event: &str, handler: Option<&Handler>, route: &Rc<EventRoute>) {
	let existing = target.listener(node, event);
	if let (Some(existing), Some(handler)) = (&existing, handler) {
		if existing.kind() == handler.kind() {
			trace!(event, "Swapping handler in place.");
			return existing.swap_handler(handler.clone());
		}
	}

	if existing.is_some() {
		target.remove_listener(node, event);
	}
	if let Some(handler) = handler {
		let options = ListenerOptions { passive: handler.is_passive() };
		target.add_listener(node, event, Listener::new(handler.clone(), route.clone()), options);
	}
}
