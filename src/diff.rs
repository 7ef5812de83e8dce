//! The tree differ.
//!
//! [`diff`] walks the old and new tree in lockstep and emits [`Patch`]es addressed by pre-order position within the old tree.
//! Visiting a node consumes one index, and its children follow directly after it.
//! Patches are emitted in ascending index order, which [`apply_patches`](crate::apply_patches()) relies on.

use crate::{
	facts::{diff_facts, Facts},
	keyed::diff_keyed,
	node::{same_rc, KeyedElement, Node},
	patch::{Patch, PatchKind},
};
use core::cmp::Ordering;
use std::rc::Rc;
use tracing::{instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

/// Calculates the patches that turn a live tree rendered from `old` into one matching `new`.
///
/// Subtrees that are the same [`Rc`] in both trees are skipped without being looked at.
/// Elements that differ in tag or namespace, and nodes of different kinds, are replaced wholesale.
#[must_use]
#[instrument(skip(old, new))]
pub fn diff<H>(old: &Rc<Node>, new: &Rc<Node>) -> Vec<Patch<H>> {
	let mut patches = Vec::new();
	diff_help(old, new, &mut patches, 0);
	trace!("Found {} patch(es).", patches.len());
	patches
}

pub(crate) fn diff_help<H>(old: &Rc<Node>, new: &Rc<Node>, patches: &mut Vec<Patch<H>>, index: usize) {
	if Rc::ptr_eq(old, new) {
		return trace!(index, "Skipping shared subtree.");
	}

	match (&**old, &**new) {
		(Node::Text(old_text), Node::Text(new_text)) => {
			let span = trace_span!("Diffing text", index);
			let _enter = span.enter();
			if old_text != new_text {
				patches.push(Patch::new(index, PatchKind::Text(new_text.clone())));
			}
		}

		(Node::Element(x), Node::Element(y)) => {
			let span = trace_span!("Diffing element", index, tag = x.tag());
			let _enter = span.enter();
			if !x.same_kind(y.tag(), y.namespace()) {
				return replace_element(x.tag(), y.tag(), new, patches, index);
			}
			diff_facts_into(x.facts(), y.facts(), patches, index);
			diff_children(x.children(), y.children(), patches, index);
		}

		(Node::Element(x), Node::Keyed(y)) => {
			let span = trace_span!("Diffing element against keyed element", index, tag = x.tag());
			let _enter = span.enter();
			if !x.same_kind(y.tag(), y.namespace()) {
				return replace_element(x.tag(), y.tag(), new, patches, index);
			}
			diff_facts_into(x.facts(), y.facts(), patches, index);
			let children = dekey(y);
			diff_children(x.children(), &children, patches, index);
		}

		(Node::Keyed(x), Node::Keyed(y)) => {
			let span = trace_span!("Diffing keyed element", index, tag = x.tag());
			let _enter = span.enter();
			if !x.same_kind(y.tag(), y.namespace()) {
				return replace_element(x.tag(), y.tag(), new, patches, index);
			}
			diff_facts_into(x.facts(), y.facts(), patches, index);
			diff_keyed(x.children(), y.children(), patches, index);
		}

		(Node::Tagged(x), Node::Tagged(y)) => {
			let span = trace_span!("Diffing tagged node", index);
			let _enter = span.enter();
			let (x_mappers, x_inner) = x.flatten();
			let (y_mappers, y_inner) = y.flatten();
			if x_mappers.len() != y_mappers.len() {
				trace!("Tagged nesting depth changed. Replacing.");
				return patches.push(Patch::new(index, PatchKind::Replace(new.clone())));
			}
			if !x_mappers.iter().zip(&y_mappers).all(|(x, y)| same_rc(x, y)) {
				patches.push(Patch::new(index, PatchKind::Remap(y_mappers)));
			}
			diff_help(x_inner, y_inner, patches, index + 1);
		}

		(Node::Memoized(x), Node::Memoized(y)) => {
			let span = trace_span!("Diffing memoized node", index);
			let _enter = span.enter();
			if x.same_dependencies(y) {
				trace!("Dependencies unchanged. Reusing content.");
				return y.adopt(x.content());
			}
			let mut nested = Vec::new();
			diff_help(&x.content(), &y.content(), &mut nested, 0);
			if !nested.is_empty() {
				patches.push(Patch::new(index, PatchKind::Memoized(nested)));
			}
		}

		(Node::Custom(x), Node::Custom(y)) => {
			let span = trace_span!("Diffing custom node", index);
			let _enter = span.enter();
			if !x.same_renderer(y) {
				trace!("Custom renderer changed. Replacing.");
				return patches.push(Patch::new(index, PatchKind::Replace(new.clone())));
			}
			diff_facts_into(x.facts(), y.facts(), patches, index);
			if let Some(update) = y.diff_from(x) {
				patches.push(Patch::new(index, PatchKind::Custom(update)));
			}
		}

		_ => {
			trace!(index, "Node kind changed. Replacing.");
			patches.push(Patch::new(index, PatchKind::Replace(new.clone())));
		}
	}
}

fn replace_element<H>(old_tag: &str, new_tag: &str, new: &Rc<Node>, patches: &mut Vec<Patch<H>>, index: usize) {
	if STATIC_MAX_LEVEL >= Level::WARN && old_tag != new_tag && old_tag.eq_ignore_ascii_case(new_tag) {
		warn!(
			"Element tags <{}> and <{}> differ only in case, which causes the element to be recreated.\n\
			Use the same spelling consistently, e.g. the lowercase one produced by `load`.",
			old_tag,
			new_tag
		);
	}
	trace!(index, "Element kind changed. Replacing.");
	patches.push(Patch::new(index, PatchKind::Replace(new.clone())));
}

fn dekey(keyed: &KeyedElement) -> Vec<Rc<Node>> {
	keyed.children().iter().map(|(_, child)| child.clone()).collect()
}

fn diff_facts_into<H>(old: &Facts, new: &Facts, patches: &mut Vec<Patch<H>>, index: usize) {
	let diff = diff_facts(old, new);
	if !diff.is_empty() {
		patches.push(Patch::new(index, PatchKind::Facts(diff)));
	}
}

/// Truncation or appending comes first, so that both happen at the parent's own index.
fn diff_children<H>(old: &[Rc<Node>], new: &[Rc<Node>], patches: &mut Vec<Patch<H>>, root_index: usize) {
	match old.len().cmp(&new.len()) {
		Ordering::Greater => patches.push(Patch::new(
			root_index,
			PatchKind::Removals {
				keep: new.len(),
				count: old.len() - new.len(),
			},
		)),
		Ordering::Less => patches.push(Patch::new(
			root_index,
			PatchKind::Insertions {
				start: old.len(),
				children: new[old.len()..].to_vec(),
			},
		)),
		Ordering::Equal => (),
	}

	let mut index = root_index;
	for (x, y) in old.iter().zip(new) {
		index += 1;
		diff_help(x, y, patches, index);
		index += x.descendants();
	}
}
