//! Reconciliation of keyed child lists.
//!
//! Matching keys are diffed in place while both lists agree.
//! On a mismatch, one child of lookahead on either side detects single insertions, removals and swaps.
//! Anything else goes through a change table that pairs removals and insertions of the same key into moves,
//! so that moved children keep their live nodes.

use crate::{
	diff::diff_help,
	node::Node,
	patch::{Entry, EntryState, Insert, KeyedPatch, Patch, PatchKind, Relocation},
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{trace, trace_span, warn};

/// Appended to keys seen twice on the same side, so that duplicates pair up among themselves only.
const DUPLICATE_KEY_SUFFIX: &str = "\u{1f}duplicate";

pub(crate) fn diff_keyed<H>(old: &[(Rc<str>, Rc<Node>)], new: &[(Rc<str>, Rc<Node>)], patches: &mut Vec<Patch<H>>, root_index: usize) {
	let span = trace_span!("Reconciling keyed children", old = old.len(), new = new.len());
	let _enter = span.enter();

	let mut reconciliation = Reconciliation::new();
	let mut index = root_index;
	let (mut i, mut j) = (0, 0);

	while i < old.len() && j < new.len() {
		let (x_key, x) = &old[i];
		let (y_key, y) = &new[j];

		if x_key == y_key {
			index += 1;
			diff_help(x, y, &mut reconciliation.patches, index);
			index += x.descendants();
			i += 1;
			j += 1;
			continue;
		}

		let x_next = old.get(i + 1);
		let y_next = new.get(j + 1);
		let old_match = x_next.map_or(false, |(x_next_key, _)| x_next_key == y_key);
		let new_match = y_next.map_or(false, |(y_next_key, _)| y_next_key == x_key);

		match (x_next, y_next) {
			(Some((_, x_next)), Some((_, y_next))) if old_match && new_match => {
				trace!(i, j, "Swap");
				index += 1;
				diff_help(x, y_next, &mut reconciliation.patches, index);
				reconciliation.insert_node(y_key.clone(), y, Some(j));
				index += x.descendants();

				index += 1;
				reconciliation.remove_node(y_key.clone(), x_next, index);
				index += x_next.descendants();

				i += 2;
				j += 2;
			}

			(_, Some((_, y_next))) if new_match => {
				trace!(i, j, "Insertion");
				index += 1;
				reconciliation.insert_node(y_key.clone(), y, Some(j));
				diff_help(x, y_next, &mut reconciliation.patches, index);
				index += x.descendants();

				i += 1;
				j += 2;
			}

			(Some((_, x_next)), _) if old_match => {
				trace!(i, j, "Removal");
				index += 1;
				reconciliation.remove_node(x_key.clone(), x, index);
				index += x.descendants();

				index += 1;
				diff_help(x_next, y, &mut reconciliation.patches, index);
				index += x_next.descendants();

				i += 2;
				j += 1;
			}

			(Some((x_next_key, x_next)), Some((y_next_key, y_next))) if x_next_key == y_next_key => {
				trace!(i, j, "Removal and insertion");
				index += 1;
				reconciliation.remove_node(x_key.clone(), x, index);
				reconciliation.insert_node(y_key.clone(), y, Some(j));
				index += x.descendants();

				index += 1;
				diff_help(x_next, y_next, &mut reconciliation.patches, index);
				index += x_next.descendants();

				i += 2;
				j += 2;
			}

			_ => break,
		}
	}

	if i < old.len() || j < new.len() {
		trace!(old = old.len() - i, new = new.len() - j, "Falling back to the change table.");
	}

	for (key, x) in &old[i..] {
		index += 1;
		reconciliation.remove_node(key.clone(), x, index);
		index += x.descendants();
	}

	for (key, y) in &new[j..] {
		reconciliation.insert_node(key.clone(), y, None);
	}

	if let Some(keyed) = reconciliation.finish() {
		patches.push(Patch::new(root_index, PatchKind::Keyed(keyed)));
	}
}

struct Reconciliation<H> {
	changes: HashMap<Rc<str>, usize>,
	entries: Vec<Entry>,
	patches: Vec<Patch<H>>,
	inserts: Vec<Insert>,
	end_inserts: Vec<usize>,
}

impl<H> Reconciliation<H> {
	fn new() -> Self {
		Self {
			changes: HashMap::new(),
			entries: Vec::new(),
			patches: Vec::new(),
			inserts: Vec::new(),
			end_inserts: Vec::new(),
		}
	}

	/// `position` is `None` for end insertions.
	fn insert_node(&mut self, key: Rc<str>, node: &Rc<Node>, position: Option<usize>) {
		let entry = match self.changes.get(&key) {
			None => {
				let entry = self.entries.len();
				self.entries.push(Entry {
					node: node.clone(),
					state: EntryState::Inserted,
					position,
				});
				self.changes.insert(key, entry);
				return self.record_insert(position, entry);
			}
			Some(&entry) => entry,
		};

		match self.entries[entry].state {
			EntryState::Removed { index, removal } => {
				trace!(key = crate::redact(&key), "Pairing insertion with earlier removal.");
				self.record_insert(position, entry);

				let mut relocated = Vec::new();
				diff_help(&self.entries[entry].node, node, &mut relocated, index);

				let entry_data = &mut self.entries[entry];
				entry_data.node = node.clone();
				entry_data.state = EntryState::Moved { removal };
				entry_data.position = position;

				self.patches[removal].kind = PatchKind::Remove(Some(Relocation { patches: relocated, entry }));
			}
			EntryState::Inserted | EntryState::Moved { .. } => {
				warn!(key = crate::redact(&key), "Duplicate key among new keyed children. The duplicate won't be moved.");
				self.insert_node(disambiguate(&key), node, position);
			}
		}
	}

	fn remove_node(&mut self, key: Rc<str>, node: &Rc<Node>, index: usize) {
		let entry = match self.changes.get(&key) {
			None => {
				let removal = self.patches.len();
				self.patches.push(Patch::new(index, PatchKind::Remove(None)));
				let entry = self.entries.len();
				self.entries.push(Entry {
					node: node.clone(),
					state: EntryState::Removed { index, removal },
					position: None,
				});
				self.changes.insert(key, entry);
				return;
			}
			Some(&entry) => entry,
		};

		match self.entries[entry].state {
			EntryState::Inserted => {
				trace!(key = crate::redact(&key), "Pairing removal with earlier insertion.");
				let mut relocated = Vec::new();
				diff_help(node, &self.entries[entry].node, &mut relocated, index);

				let removal = self.patches.len();
				self.patches.push(Patch::new(index, PatchKind::Remove(Some(Relocation { patches: relocated, entry }))));
				self.entries[entry].state = EntryState::Moved { removal };
			}
			EntryState::Removed { .. } | EntryState::Moved { .. } => {
				warn!(key = crate::redact(&key), "Duplicate key among old keyed children. The duplicate won't be moved.");
				self.remove_node(disambiguate(&key), node, index);
			}
		}
	}

	fn record_insert(&mut self, position: Option<usize>, entry: usize) {
		match position {
			Some(position) => self.inserts.push(Insert { position, entry }),
			None => self.end_inserts.push(entry),
		}
	}

	fn finish(self) -> Option<KeyedPatch<H>> {
		if self.patches.is_empty() && self.inserts.is_empty() && self.end_inserts.is_empty() {
			return None;
		}
		Some(KeyedPatch {
			patches: self.patches,
			inserts: self.inserts,
			end_inserts: self.end_inserts,
			entries: self.entries,
		})
	}
}

fn disambiguate(key: &str) -> Rc<str> {
	format!("{}{}", key, DUPLICATE_KEY_SUFFIX).into()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn children(keys: &[&str]) -> Vec<(Rc<str>, Rc<Node>)> {
		keys.iter().map(|&key| (key.into(), Node::text(key))).collect()
	}

	fn reconcile(old: &[(Rc<str>, Rc<Node>)], new: &[(Rc<str>, Rc<Node>)]) -> Option<KeyedPatch<()>> {
		let mut patches = Vec::new();
		diff_keyed(old, new, &mut patches, 0);
		assert!(patches.len() <= 1);
		patches.pop().map(|patch| match patch.kind {
			PatchKind::Keyed(keyed) => keyed,
			other => panic!("Expected keyed patch, found {:?}", other),
		})
	}

	#[test]
	fn unchanged_keys_emit_nothing() {
		let old = children(&["a", "b"]);
		let new = old.clone();
		assert!(reconcile(&old, &new).is_none());
	}

	#[test]
	fn removal_then_insertion_becomes_a_move() {
		let old = children(&["a", "b", "c", "d"]);
		let new = vec![old[1].clone(), old[2].clone(), old[3].clone(), old[0].clone()];
		let keyed = reconcile(&old, &new).unwrap();
		assert_eq!(keyed.move_count(), 1);
		assert_eq!(keyed.end_inserts.len(), 1);
		assert!(matches!(keyed.patches[0].kind, PatchKind::Remove(Some(_))));
	}

	#[test]
	fn duplicate_keys_get_separate_entries() {
		let old = children(&["k", "k"]);
		let new = children(&["z"]);
		let keyed = reconcile(&old, &new).unwrap();
		assert_eq!(keyed.entries.len(), 3);
		assert_eq!(keyed.patches.len(), 2);
		assert_eq!(keyed.move_count(), 0);
	}
}
