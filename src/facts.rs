//! Properties, styles, attributes and event listeners of elements, and the differ between two sets of them.

use crate::event::Handler;
use core::iter::FromIterator;
use hashbrown::HashMap;
use std::rc::Rc;

/// Properties that are always reassigned when present, since user input changes them on the live node.
const VOLATILE_PROPERTIES: [&str; 2] = ["value", "checked"];

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
}

impl Value {
	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(string) => Some(string),
			_ => None,
		}
	}

	/// What a property holding this value is reset to when it's removed: `""` for strings, otherwise `null`.
	#[must_use]
	pub fn blank(&self) -> Self {
		match self {
			Self::String(_) => Self::String("".into()),
			_ => Self::Null,
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Number(value.into())
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(value.into())
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Self::String(value)
	}
}

/// A single fact as written in a view, before organization into [`Facts`].
#[derive(Debug, Clone)]
pub enum Fact {
	Property { key: Rc<str>, value: Value },
	Style { key: Rc<str>, value: Rc<str> },
	Attribute { key: Rc<str>, value: Rc<str> },
	NamespacedAttribute { namespace: Rc<str>, key: Rc<str>, value: Rc<str> },
	Listener { event: Rc<str>, handler: Handler },
}

impl Fact {
	#[must_use]
	pub fn property(key: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
		Self::Property {
			key: key.into(),
			value: value.into(),
		}
	}

	#[must_use]
	pub fn style(key: impl Into<Rc<str>>, value: impl Into<Rc<str>>) -> Self {
		Self::Style {
			key: key.into(),
			value: value.into(),
		}
	}

	#[must_use]
	pub fn attribute(key: impl Into<Rc<str>>, value: impl Into<Rc<str>>) -> Self {
		Self::Attribute {
			key: key.into(),
			value: value.into(),
		}
	}

	#[must_use]
	pub fn attribute_ns(namespace: impl Into<Rc<str>>, key: impl Into<Rc<str>>, value: impl Into<Rc<str>>) -> Self {
		Self::NamespacedAttribute {
			namespace: namespace.into(),
			key: key.into(),
			value: value.into(),
		}
	}

	#[must_use]
	pub fn on(event: impl Into<Rc<str>>, handler: Handler) -> Self {
		Self::Listener { event: event.into(), handler }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespacedValue {
	pub namespace: Rc<str>,
	pub value: Rc<str>,
}

/// The organized facts of one element, one map per category.
///
/// Collecting [`Fact`]s lets later facts override earlier ones of the same category and key,
/// except for the `class` attribute and the `className` property, which accumulate space-separated.
#[derive(Debug, Clone, Default)]
pub struct Facts {
	properties: HashMap<Rc<str>, Value>,
	styles: HashMap<Rc<str>, Rc<str>>,
	attributes: HashMap<Rc<str>, Rc<str>>,
	namespaced: HashMap<Rc<str>, NamespacedValue>,
	listeners: HashMap<Rc<str>, Handler>,
}

impl Facts {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.properties.is_empty() && self.styles.is_empty() && self.attributes.is_empty() && self.namespaced.is_empty() && self.listeners.is_empty()
	}

	#[must_use]
	pub fn property(&self, key: &str) -> Option<&Value> {
		self.properties.get(key)
	}

	#[must_use]
	pub fn style(&self, key: &str) -> Option<&str> {
		self.styles.get(key).map(|value| &**value)
	}

	#[must_use]
	pub fn attribute(&self, key: &str) -> Option<&str> {
		self.attributes.get(key).map(|value| &**value)
	}

	#[must_use]
	pub fn namespaced_attribute(&self, key: &str) -> Option<&NamespacedValue> {
		self.namespaced.get(key)
	}

	#[must_use]
	pub fn listener(&self, event: &str) -> Option<&Handler> {
		self.listeners.get(event)
	}

	fn insert(&mut self, fact: Fact) {
		match fact {
			Fact::Property { key, value } => {
				if &*key == "className" {
					if let (Some(Value::String(classes)), Value::String(class)) = (self.properties.get_mut(&key), &value) {
						*classes = join_classes(classes, class);
						return;
					}
				}
				self.properties.insert(key, value);
			}
			Fact::Style { key, value } => {
				self.styles.insert(key, value);
			}
			Fact::Attribute { key, value } => {
				if &*key == "class" {
					if let Some(classes) = self.attributes.get_mut(&key) {
						*classes = join_classes(classes, &value);
						return;
					}
				}
				self.attributes.insert(key, value);
			}
			Fact::NamespacedAttribute { namespace, key, value } => {
				self.namespaced.insert(key, NamespacedValue { namespace, value });
			}
			Fact::Listener { event, handler } => {
				self.listeners.insert(event, handler);
			}
		}
	}
}

impl FromIterator<Fact> for Facts {
	fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
		let mut facts = Self::new();
		for fact in iter {
			facts.insert(fact);
		}
		facts
	}
}

fn join_classes(classes: &str, class: &str) -> Rc<str> {
	format!("{} {}", classes, class).into()
}

/// A change to one fact.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
	Set(T),
	Remove,
}

impl<T> Change<T> {
	#[must_use]
	pub fn as_set(&self) -> Option<&T> {
		match self {
			Self::Set(value) => Some(value),
			Self::Remove => None,
		}
	}
}

/// A change to a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyChange {
	Set(Value),
	/// Resets the property to the [blank](`Value::blank`) value of what it held before.
	Remove { blank: Value },
}

/// A change to a namespaced attribute. Removals still need to know the namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespacedChange {
	pub namespace: Rc<str>,
	pub value: Option<Rc<str>>,
}

/// The sparse difference between two [`Facts`]. Absent keys are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactsDiff {
	pub properties: HashMap<Rc<str>, PropertyChange>,
	pub styles: HashMap<Rc<str>, Change<Rc<str>>>,
	pub attributes: HashMap<Rc<str>, Change<Rc<str>>>,
	pub namespaced: HashMap<Rc<str>, NamespacedChange>,
	pub listeners: HashMap<Rc<str>, Change<Handler>>,
}

impl FactsDiff {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.properties.is_empty() && self.styles.is_empty() && self.attributes.is_empty() && self.namespaced.is_empty() && self.listeners.is_empty()
	}
}

/// Diffs each fact category of `old` and `new` independently.
///
/// Values are compared by equality, except that [`VOLATILE_PROPERTIES`] are always reassigned
/// and listeners are only unchanged if both [`Handler::kind`] and handler identity match.
#[must_use]
pub fn diff_facts(old: &Facts, new: &Facts) -> FactsDiff {
	let namespaced = diff_category(&old.namespaced, &new.namespaced, |_, a, b| a == b)
		.into_iter()
		.map(|(key, change)| {
			let change = match change {
				Change::Set(NamespacedValue { namespace, value }) => NamespacedChange { namespace, value: Some(value) },
				Change::Remove => NamespacedChange {
					namespace: old.namespaced[&key].namespace.clone(),
					value: None,
				},
			};
			(key, change)
		})
		.collect();

	let properties = diff_category(&old.properties, &new.properties, |key, a, b| a == b && !VOLATILE_PROPERTIES.contains(&key))
		.into_iter()
		.map(|(key, change)| {
			let change = match change {
				Change::Set(value) => PropertyChange::Set(value),
				Change::Remove => PropertyChange::Remove {
					blank: old.properties[&key].blank(),
				},
			};
			(key, change)
		})
		.collect();

	FactsDiff {
		properties,
		styles: diff_category(&old.styles, &new.styles, |_, a, b| a == b),
		attributes: diff_category(&old.attributes, &new.attributes, |_, a, b| a == b),
		namespaced,
		listeners: diff_category(&old.listeners, &new.listeners, |_, a, b| a.same(b)),
	}
}

fn diff_category<V: Clone>(
	old: &HashMap<Rc<str>, V>,
	new: &HashMap<Rc<str>, V>,
	unchanged: impl Fn(&str, &V, &V) -> bool,
) -> HashMap<Rc<str>, Change<V>> {
	let mut diff = HashMap::new();
	for (key, old_value) in old {
		match new.get(key) {
			None => {
				diff.insert(key.clone(), Change::Remove);
			}
			Some(new_value) if unchanged(&**key, old_value, new_value) => (),
			Some(new_value) => {
				diff.insert(key.clone(), Change::Set(new_value.clone()));
			}
		}
	}
	for (key, new_value) in new {
		if !old.contains_key(key) {
			diff.insert(key.clone(), Change::Set(new_value.clone()));
		}
	}
	diff
}
