//! Immutable view trees.
//!
//! A [`Node`] tree is constructed fresh for each render cycle and never mutated afterwards.
//! Subtrees are shared through [`Rc`], and two subtrees behind the same [`Rc`] are assumed to be identical,
//! which lets [`diff`](crate::diff()) skip them without looking inside.

use crate::{
	event::{Mapper, Message},
	facts::{Fact, Facts},
};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use std::{cell::OnceCell, rc::Rc};
use tracing::trace;

/// Whether `a` and `b` point to the same allocation.
///
/// Only data pointers are compared, since vtable pointers of the same type may differ between codegen units.
pub(crate) fn same_rc<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
	Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

/// Renders a [`Custom`] node's model into the render target, which is passed as `&mut dyn Any`.
///
/// Must return a `Box` containing the render target's [`Handle`](`crate::target::RenderTarget::Handle`).
pub type CustomRender = Rc<dyn Fn(&dyn Any, &mut dyn Any) -> Box<dyn Any>>;

/// Compares an old and a new [`Custom`] model, in that order.
pub type CustomDiff = Rc<dyn Fn(&dyn Any, &dyn Any) -> Option<CustomUpdate>>;

/// One node of a view tree.
#[derive(Debug)]
pub enum Node {
	/// A text leaf.
	Text(Rc<str>),
	/// An element with positional children.
	Element(Element),
	/// An element whose children are identified by string keys.
	Keyed(KeyedElement),
	/// A subtree whose messages are post-processed by a [`Mapper`].
	Tagged(Tagged),
	/// A lazily evaluated subtree that is skipped entirely while its dependencies stay the same.
	Memoized(Memoized),
	/// An externally managed subtree.
	Custom(Custom),
}

impl Node {
	#[must_use]
	pub fn text(content: impl Into<Rc<str>>) -> Rc<Self> {
		Rc::new(Self::Text(content.into()))
	}

	#[must_use]
	pub fn element(tag: impl Into<Rc<str>>, facts: impl IntoIterator<Item = Fact>, children: impl IntoIterator<Item = Rc<Node>>) -> Rc<Self> {
		Rc::new(Self::Element(Element::new(None, tag.into(), facts.into_iter().collect(), children.into_iter().collect())))
	}

	/// Like [`Node::element`], but created in `namespace`, e.g. `"http://www.w3.org/2000/svg"`.
	#[must_use]
	pub fn element_ns(
		namespace: impl Into<Rc<str>>,
		tag: impl Into<Rc<str>>,
		facts: impl IntoIterator<Item = Fact>,
		children: impl IntoIterator<Item = Rc<Node>>,
	) -> Rc<Self> {
		Rc::new(Self::Element(Element::new(
			Some(namespace.into()),
			tag.into(),
			facts.into_iter().collect(),
			children.into_iter().collect(),
		)))
	}

	/// Creates an element with keyed children.
	///
	/// Keys should be unique among siblings.
	/// Duplicates are tolerated, but lose the ability to be moved instead of recreated.
	#[must_use]
	pub fn keyed<K: Into<Rc<str>>>(
		tag: impl Into<Rc<str>>,
		facts: impl IntoIterator<Item = Fact>,
		children: impl IntoIterator<Item = (K, Rc<Node>)>,
	) -> Rc<Self> {
		Rc::new(Self::Keyed(KeyedElement::new(
			None,
			tag.into(),
			facts.into_iter().collect(),
			children.into_iter().map(|(key, child)| (key.into(), child)).collect(),
		)))
	}

	#[must_use]
	pub fn keyed_ns<K: Into<Rc<str>>>(
		namespace: impl Into<Rc<str>>,
		tag: impl Into<Rc<str>>,
		facts: impl IntoIterator<Item = Fact>,
		children: impl IntoIterator<Item = (K, Rc<Node>)>,
	) -> Rc<Self> {
		Rc::new(Self::Keyed(KeyedElement::new(
			Some(namespace.into()),
			tag.into(),
			facts.into_iter().collect(),
			children.into_iter().map(|(key, child)| (key.into(), child)).collect(),
		)))
	}

	/// Wraps `inner` so that messages produced inside it pass through `mapper`.
	///
	/// The mapper's identity is compared across render cycles.
	/// Reuse the same [`Mapper`] through [`Node::tagged`] to avoid remapping the live tree each cycle.
	#[must_use]
	pub fn map(mapper: impl Fn(Message) -> Message + 'static, inner: Rc<Node>) -> Rc<Self> {
		let mapper: Mapper = Rc::new(mapper);
		Self::tagged(mapper, inner)
	}

	#[must_use]
	pub fn tagged(mapper: Mapper, inner: Rc<Node>) -> Rc<Self> {
		let descendants = 1 + inner.descendants();
		Rc::new(Self::Tagged(Tagged { mapper, inner, descendants }))
	}

	/// Creates a subtree that is evaluated on first use and then reused
	/// for as long as each of its `dependencies` stays the same [`Rc`].
	#[must_use]
	pub fn memoized(dependencies: Vec<Rc<dyn Any>>, thunk: impl Fn() -> Rc<Node> + 'static) -> Rc<Self> {
		Rc::new(Self::Memoized(Memoized {
			dependencies,
			thunk: Rc::new(thunk),
			content: OnceCell::new(),
		}))
	}

	/// Creates an externally managed node.
	///
	/// Changing `render` between cycles recreates the node. Otherwise, `diff` decides how to update it.
	#[must_use]
	pub fn custom(facts: impl IntoIterator<Item = Fact>, model: Rc<dyn Any>, render: CustomRender, diff: CustomDiff) -> Rc<Self> {
		Rc::new(Self::Custom(Custom {
			facts: facts.into_iter().collect(),
			model,
			render,
			diff,
		}))
	}

	/// The number of nodes below this one that take part in patch addressing.
	///
	/// [`Memoized`] and [`Custom`] nodes report 0, as their content is addressed separately.
	#[must_use]
	pub fn descendants(&self) -> usize {
		match self {
			Self::Element(element) => element.descendants,
			Self::Keyed(keyed) => keyed.descendants,
			Self::Tagged(tagged) => tagged.descendants,
			Self::Text(_) | Self::Memoized(_) | Self::Custom(_) => 0,
		}
	}
}

#[derive(Debug)]
pub struct Element {
	tag: Rc<str>,
	namespace: Option<Rc<str>>,
	facts: Facts,
	children: Vec<Rc<Node>>,
	descendants: usize,
}

impl Element {
	fn new(namespace: Option<Rc<str>>, tag: Rc<str>, facts: Facts, children: Vec<Rc<Node>>) -> Self {
		let descendants = children.iter().map(|child| 1 + child.descendants()).sum();
		Self {
			tag,
			namespace,
			facts,
			children,
			descendants,
		}
	}

	#[must_use]
	pub fn tag(&self) -> &str {
		&self.tag
	}

	#[must_use]
	pub fn namespace(&self) -> Option<&str> {
		self.namespace.as_deref()
	}

	#[must_use]
	pub fn facts(&self) -> &Facts {
		&self.facts
	}

	#[must_use]
	pub fn children(&self) -> &[Rc<Node>] {
		&self.children
	}

	pub(crate) fn same_kind(&self, tag: &str, namespace: Option<&str>) -> bool {
		*self.tag == *tag && self.namespace() == namespace
	}
}

#[derive(Debug)]
pub struct KeyedElement {
	tag: Rc<str>,
	namespace: Option<Rc<str>>,
	facts: Facts,
	children: Vec<(Rc<str>, Rc<Node>)>,
	descendants: usize,
}

impl KeyedElement {
	fn new(namespace: Option<Rc<str>>, tag: Rc<str>, facts: Facts, children: Vec<(Rc<str>, Rc<Node>)>) -> Self {
		let descendants = children.iter().map(|(_, child)| 1 + child.descendants()).sum();
		Self {
			tag,
			namespace,
			facts,
			children,
			descendants,
		}
	}

	#[must_use]
	pub fn tag(&self) -> &str {
		&self.tag
	}

	#[must_use]
	pub fn namespace(&self) -> Option<&str> {
		self.namespace.as_deref()
	}

	#[must_use]
	pub fn facts(&self) -> &Facts {
		&self.facts
	}

	#[must_use]
	pub fn children(&self) -> &[(Rc<str>, Rc<Node>)] {
		&self.children
	}

	pub(crate) fn same_kind(&self, tag: &str, namespace: Option<&str>) -> bool {
		*self.tag == *tag && self.namespace() == namespace
	}
}

pub struct Tagged {
	mapper: Mapper,
	inner: Rc<Node>,
	descendants: usize,
}

impl Tagged {
	#[must_use]
	pub fn mapper(&self) -> &Mapper {
		&self.mapper
	}

	#[must_use]
	pub fn inner(&self) -> &Rc<Node> {
		&self.inner
	}

	/// Collects the mappers of directly nested [`Tagged`] nodes, outermost first, along with the first non-[`Tagged`] node.
	pub(crate) fn flatten(&self) -> (Vec<Mapper>, &Rc<Node>) {
		let mut mappers = vec![self.mapper.clone()];
		let mut inner = &self.inner;
		while let Node::Tagged(tagged) = &**inner {
			mappers.push(tagged.mapper.clone());
			inner = &tagged.inner;
		}
		(mappers, inner)
	}

	pub(crate) fn innermost(&self) -> &Rc<Node> {
		let mut inner = &self.inner;
		while let Node::Tagged(tagged) = &**inner {
			inner = &tagged.inner;
		}
		inner
	}
}

impl Debug for Tagged {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Tagged")
			.field("inner", &self.inner)
			.field("descendants", &self.descendants)
			.finish()
	}
}

pub struct Memoized {
	dependencies: Vec<Rc<dyn Any>>,
	thunk: Rc<dyn Fn() -> Rc<Node>>,
	content: OnceCell<Rc<Node>>,
}

impl Memoized {
	/// The memoized subtree, evaluating it if that hasn't happened yet.
	#[must_use]
	pub fn content(&self) -> Rc<Node> {
		self.content.get_or_init(|| (self.thunk)()).clone()
	}

	#[must_use]
	pub fn is_evaluated(&self) -> bool {
		self.content.get().is_some()
	}

	pub(crate) fn same_dependencies(&self, other: &Self) -> bool {
		self.dependencies.len() == other.dependencies.len()
			&& self.dependencies.iter().zip(&other.dependencies).all(|(a, b)| same_rc(a, b))
	}

	/// Takes over `content` from a predecessor with the same dependencies.
	pub(crate) fn adopt(&self, content: Rc<Node>) {
		if self.content.set(content).is_err() {
			trace!("Memoized content was already evaluated. Keeping it.");
		}
	}
}

impl Debug for Memoized {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Memoized")
			.field("dependencies.len()", &self.dependencies.len())
			.field("content", &self.content.get())
			.finish()
	}
}

pub struct Custom {
	facts: Facts,
	model: Rc<dyn Any>,
	render: CustomRender,
	diff: CustomDiff,
}

impl Custom {
	#[must_use]
	pub fn facts(&self) -> &Facts {
		&self.facts
	}

	#[must_use]
	pub fn model(&self) -> &Rc<dyn Any> {
		&self.model
	}

	pub(crate) fn same_renderer(&self, other: &Self) -> bool {
		same_rc(&self.render, &other.render)
	}

	pub(crate) fn render(&self, target: &mut dyn Any) -> Box<dyn Any> {
		(self.render)(&*self.model, target)
	}

	/// Runs this node's diff function against `old`'s model.
	pub(crate) fn diff_from(&self, old: &Self) -> Option<CustomUpdate> {
		(self.diff)(&*old.model, &*self.model)
	}
}

impl Debug for Custom {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Custom").field("facts", &self.facts).finish()
	}
}

/// An update to a live [`Custom`] node, as produced by its [`CustomDiff`].
///
/// When applied, it receives the render target as `&mut dyn Any` and the live node's handle as `&dyn Any`.
/// If it returns `Some`, that `Box` must contain the handle that replaces the live node.
#[derive(Clone)]
pub struct CustomUpdate(Rc<dyn Fn(&mut dyn Any, &dyn Any) -> Option<Box<dyn Any>>>);

impl CustomUpdate {
	#[must_use]
	pub fn new(update: impl Fn(&mut dyn Any, &dyn Any) -> Option<Box<dyn Any>> + 'static) -> Self {
		Self(Rc::new(update))
	}

	pub(crate) fn apply(&self, target: &mut dyn Any, node: &dyn Any) -> Option<Box<dyn Any>> {
		(self.0)(target, node)
	}
}

impl Debug for CustomUpdate {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("CustomUpdate(..)")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn descendants_count_every_node_below() {
		let tree = Node::element(
			"div",
			vec![],
			vec![
				Node::text("a"),
				Node::element("span", vec![], vec![Node::text("b"), Node::text("c")]),
				Node::keyed("ul", vec![], vec![("x", Node::text("x"))]),
			],
		);
		// a, span, b, c, ul, x
		assert_eq!(tree.descendants(), 6);
	}

	#[test]
	fn tagged_counts_itself() {
		let tree = Node::map(|message| message, Node::map(|message| message, Node::element("p", vec![], vec![Node::text("a")])));
		assert_eq!(tree.descendants(), 3);

		let tagged = match &*tree {
			Node::Tagged(tagged) => tagged,
			_ => unreachable!(),
		};
		let (mappers, inner) = tagged.flatten();
		assert_eq!(mappers.len(), 2);
		assert!(Rc::ptr_eq(inner, tagged.innermost()));
	}

	#[test]
	fn memoized_and_custom_are_opaque() {
		let memoized = Node::memoized(vec![], || Node::element("div", vec![], vec![Node::text("a")]));
		assert_eq!(memoized.descendants(), 0);
		match &*memoized {
			Node::Memoized(memoized) => {
				assert!(!memoized.is_evaluated());
				assert_eq!(memoized.content().descendants(), 1);
				assert!(memoized.is_evaluated());
			}
			_ => unreachable!(),
		}
	}
}
