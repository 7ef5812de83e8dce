use std::rc::Rc;
use xylem_dom::{
	apply_patches, diff,
	event::EventRoute,
	memory::{MemoryTarget, NodeId, Snapshot},
	node::Node,
	patch::PatchKind,
	render,
	target::RenderTarget,
};

fn item(text: &str) -> Rc<Node> {
	Node::element("li", vec![], vec![Node::text(text)])
}

fn list(children: &[(&str, &Rc<Node>)]) -> Rc<Node> {
	Node::keyed("ul", vec![], children.iter().map(|&(key, child)| (key, child.clone())).collect::<Vec<_>>())
}

struct Live {
	target: MemoryTarget,
	root: NodeId,
	route: Rc<EventRoute>,
	tree: Rc<Node>,
}

impl Live {
	fn new(tree: Rc<Node>) -> Self {
		let mut target = MemoryTarget::new();
		let route = EventRoute::root(|_| ());
		let root = render(&mut target, &tree, &route);
		Self { target, root, route, tree }
	}

	fn update(&mut self, next: Rc<Node>) {
		let patches = diff(&self.tree, &next);
		self.root = apply_patches(&mut self.target, self.root, &self.tree, patches, &self.route);
		self.tree = next;
	}

	fn children(&self) -> Vec<NodeId> {
		self.target.children(self.root).to_vec()
	}

	fn texts(&self) -> Vec<String> {
		self.children()
			.into_iter()
			.map(|child| match self.target.snapshot(child) {
				Snapshot::Element { children, .. } => match &children[..] {
					[Snapshot::Text(text)] => text.clone(),
					other => panic!("{:?}", other),
				},
				other => panic!("{:?}", other),
			})
			.collect()
	}
}

#[test]
fn reordering_only_moves() {
	let (x, y, z) = (item("X"), item("Y"), item("Z"));
	let old = list(&[("a", &x), ("b", &y), ("c", &z)]);
	let new = list(&[("c", &z), ("a", &x), ("b", &y)]);

	let patches = diff::<NodeId>(&old, &new);
	assert_eq!(patches.len(), 1);
	let keyed = match patches[0].kind() {
		PatchKind::Keyed(keyed) => keyed,
		other => panic!("{:?}", other),
	};
	assert_eq!(keyed.move_count(), 1);
	assert!(keyed
		.patches()
		.iter()
		.all(|patch| matches!(patch.kind(), PatchKind::Remove(Some(relocation)) if relocation.patches().is_empty())));

	let mut live = Live::new(old);
	let before = live.children();
	live.update(new);

	assert_eq!(live.children(), vec![before[2], before[0], before[1]]);
	assert_eq!(live.texts(), vec!["Z", "X", "Y"]);
}

#[test]
fn duplicate_keys_remove_exactly_one() {
	let (x, y) = (item("X"), item("Y"));
	let mut live = Live::new(list(&[("k", &x), ("k", &y)]));
	let before = live.children();

	live.update(list(&[("k", &x)]));

	assert_eq!(live.children(), vec![before[0]]);
	assert_eq!(live.texts(), vec!["X"]);
}

#[test]
fn duplicate_keys_against_unrelated_key() {
	let (x, y, z) = (item("X"), item("Y"), item("Z"));
	let mut live = Live::new(list(&[("k", &x), ("k", &y)]));

	live.update(list(&[("z", &z)]));

	assert_eq!(live.texts(), vec!["Z"]);
}

#[test]
fn adjacent_swap_keeps_nodes() {
	let items = ["A", "B", "C", "D"].iter().map(|text| item(text)).collect::<Vec<_>>();
	let mut live = Live::new(list(&[("a", &items[0]), ("b", &items[1]), ("c", &items[2]), ("d", &items[3])]));
	let before = live.children();

	live.update(list(&[("b", &items[1]), ("a", &items[0]), ("c", &items[2]), ("d", &items[3])]));

	assert_eq!(live.children(), vec![before[1], before[0], before[2], before[3]]);
	assert_eq!(live.texts(), vec!["B", "A", "C", "D"]);
}

#[test]
fn front_insertion_renders_only_the_new_child() {
	let (a, b, n) = (item("A"), item("B"), item("N"));
	let mut live = Live::new(list(&[("a", &a), ("b", &b)]));
	let before = live.children();

	live.update(list(&[("n", &n), ("a", &a), ("b", &b)]));

	let after = live.children();
	assert_eq!(&after[1..], &before[..]);
	assert!(!before.contains(&after[0]));
	assert_eq!(live.texts(), vec!["N", "A", "B"]);
}

#[test]
fn middle_removal() {
	let (a, b, c) = (item("A"), item("B"), item("C"));
	let mut live = Live::new(list(&[("a", &a), ("b", &b), ("c", &c)]));
	let before = live.children();

	live.update(list(&[("a", &a), ("c", &c)]));

	assert_eq!(live.children(), vec![before[0], before[2]]);
	assert_eq!(live.target.parent(&before[1]), None);
}

#[test]
fn reversal_goes_through_the_change_table() {
	let items = ["A", "B", "C", "D"].iter().map(|text| item(text)).collect::<Vec<_>>();
	let mut live = Live::new(list(&[("a", &items[0]), ("b", &items[1]), ("c", &items[2]), ("d", &items[3])]));
	let before = live.children();

	live.update(list(&[("d", &items[3]), ("c", &items[2]), ("b", &items[1]), ("a", &items[0])]));

	assert_eq!(live.children(), before.iter().rev().copied().collect::<Vec<_>>());
	assert_eq!(live.texts(), vec!["D", "C", "B", "A"]);
}

#[test]
fn moved_children_are_patched_too() {
	let (a, b) = (item("A"), item("B"));
	let mut live = Live::new(list(&[("a", &a), ("b", &b)]));
	let before = live.children();

	live.update(list(&[("b", &item("B2")), ("a", &a)]));

	assert_eq!(live.children(), vec![before[1], before[0]]);
	assert_eq!(live.texts(), vec!["B2", "A"]);
}

#[test]
fn rotation_with_changes_and_insertions() {
	let mut live = Live::new(list(&[("a", &item("A")), ("b", &item("B")), ("c", &item("C")), ("d", &item("D"))]));
	let before = live.children();

	live.update(list(&[
		("c", &item("C")),
		("x", &item("X")),
		("d", &item("D2")),
		("a", &item("A")),
		("y", &item("Y")),
	]));

	assert_eq!(live.texts(), vec!["C", "X", "D2", "A", "Y"]);
	let after = live.children();
	assert_eq!(after[0], before[2]);
	assert_eq!(after[2], before[3]);
	assert_eq!(after[3], before[0]);
	assert_eq!(live.target.parent(&before[1]), None);
}
