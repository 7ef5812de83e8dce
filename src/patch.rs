//! Positioned mutation instructions, as produced by [`diff`](crate::diff()) and consumed by [`apply_patches`](crate::apply_patches()).

use crate::{
	event::{EventRoute, Mapper},
	facts::FactsDiff,
	node::{CustomUpdate, Node},
};
use core::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// A single mutation of the live tree.
///
/// `H` is the render target's [`Handle`](crate::target::RenderTarget::Handle).
/// It is only filled in while patches are being applied.
#[derive(Debug)]
pub struct Patch<H> {
	pub(crate) index: usize,
	pub(crate) kind: PatchKind<H>,
	pub(crate) resolved: Option<Resolved<H>>,
}

/// The live node a [`Patch`] applies to, along with the event route in effect there.
#[derive(Debug)]
pub(crate) struct Resolved<H> {
	pub(crate) node: H,
	pub(crate) route: Rc<EventRoute>,
}

impl<H> Patch<H> {
	pub(crate) fn new(index: usize, kind: PatchKind<H>) -> Self {
		Self { index, kind, resolved: None }
	}

	/// The pre-order position of the affected node within the old tree.
	#[must_use]
	pub fn index(&self) -> usize {
		self.index
	}

	#[must_use]
	pub fn kind(&self) -> &PatchKind<H> {
		&self.kind
	}

	/// The live node this patch was resolved to, if addressing has happened yet.
	#[must_use]
	pub fn resolved_node(&self) -> Option<&H> {
		self.resolved.as_ref().map(|resolved| &resolved.node)
	}
}

pub enum PatchKind<H> {
	/// Renders the given node and swaps it in for the live one.
	Replace(Rc<Node>),
	Facts(FactsDiff),
	Text(Rc<str>),
	/// Patches to a memoized subtree, indexed from its content's root.
	Memoized(Vec<Patch<H>>),
	/// Replaces the mapper chain of a live [`Tagged`](crate::node::Tagged) layer, outermost first.
	Remap(Vec<Mapper>),
	/// Removes `count` trailing unkeyed children, keeping the first `keep`.
	Removals { keep: usize, count: usize },
	/// Appends unkeyed children after the first `start`.
	Insertions { start: usize, children: Vec<Rc<Node>> },
	Keyed(KeyedPatch<H>),
	/// Removes a keyed child. With a [`Relocation`], the child is moved elsewhere instead of discarded.
	Remove(Option<Relocation<H>>),
	Custom(CustomUpdate),
}

impl<H: Debug> Debug for PatchKind<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Replace(node) => f.debug_tuple("Replace").field(node).finish(),
			Self::Facts(diff) => f.debug_tuple("Facts").field(diff).finish(),
			Self::Text(text) => f.debug_tuple("Text").field(&crate::redact(text)).finish(),
			Self::Memoized(patches) => f.debug_tuple("Memoized").field(patches).finish(),
			Self::Remap(mappers) => f.debug_struct("Remap").field("mappers.len()", &mappers.len()).finish(),
			Self::Removals { keep, count } => f.debug_struct("Removals").field("keep", keep).field("count", count).finish(),
			Self::Insertions { start, children } => f.debug_struct("Insertions").field("start", start).field("children.len()", &children.len()).finish(),
			Self::Keyed(keyed) => f.debug_tuple("Keyed").field(keyed).finish(),
			Self::Remove(relocation) => f.debug_tuple("Remove").field(relocation).finish(),
			Self::Custom(update) => f.debug_tuple("Custom").field(update).finish(),
		}
	}
}

/// The result of reconciling one keyed child list.
#[derive(Debug)]
pub struct KeyedPatch<H> {
	pub(crate) patches: Vec<Patch<H>>,
	pub(crate) inserts: Vec<Insert>,
	pub(crate) end_inserts: Vec<usize>,
	pub(crate) entries: Vec<Entry>,
}

impl<H> KeyedPatch<H> {
	/// Patches to matched children and removals, in old tree order.
	#[must_use]
	pub fn patches(&self) -> &[Patch<H>] {
		&self.patches
	}

	/// Final positions of children inserted or moved in front of a kept sibling, ascending.
	pub fn insert_positions(&self) -> impl Iterator<Item = usize> + '_ {
		self.inserts.iter().map(|insert| insert.position)
	}

	/// How many children are appended after all kept siblings.
	#[must_use]
	pub fn end_insert_count(&self) -> usize {
		self.end_inserts.len()
	}

	/// How many children are relocated rather than created or discarded.
	#[must_use]
	pub fn move_count(&self) -> usize {
		self.entries.iter().filter(|entry| matches!(entry.state, EntryState::Moved { .. })).count()
	}
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Insert {
	pub(crate) position: usize,
	pub(crate) entry: usize,
}

/// Change table bookkeeping for one key.
#[derive(Debug)]
pub(crate) struct Entry {
	/// The old node while only removed, otherwise the new node.
	pub(crate) node: Rc<Node>,
	pub(crate) state: EntryState,
	/// Final position, or `None` for end insertions and pure removals.
	pub(crate) position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
	Inserted,
	/// `removal` indexes the [`PatchKind::Remove`] within [`KeyedPatch::patches`].
	Removed { index: usize, removal: usize },
	Moved { removal: usize },
}

/// The far side of a keyed move.
#[derive(Debug)]
pub struct Relocation<H> {
	pub(crate) patches: Vec<Patch<H>>,
	pub(crate) entry: usize,
}

impl<H> Relocation<H> {
	/// Patches applied to the moved child, indexed like the rest of the old tree.
	#[must_use]
	pub fn patches(&self) -> &[Patch<H>] {
		&self.patches
	}
}
