//! Event routing from live listeners through [`Tagged`](crate::node::Tagged) mappers to the application.
//!
//! Each live node rendered from a [`Tagged`](crate::node::Tagged) node carries an [`EventRoute`] layer.
//! [`Listener`]s capture the route that was current when they were registered,
//! so remapping a layer in place redirects all listeners below it without touching them.

use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use std::{cell::RefCell, rc::Rc};
use tracing::{error, trace, trace_span};

/// A type-erased application message.
pub type Message = Box<dyn Any>;

/// Post-processes messages produced below a [`Tagged`](crate::node::Tagged) node.
pub type Mapper = Rc<dyn Fn(Message) -> Message>;

/// Receives fully mapped messages at the root of an [`EventRoute`] chain.
pub type Dispatch = Rc<dyn Fn(Message)>;

/// Turns a raw event, as passed by the render target, into a response.
pub type Decoder<T> = Rc<dyn Fn(&dyn Any) -> Option<T>>;

pub struct EventRoute(Route);

enum Route {
	Root(Dispatch),
	Mapped { mappers: RefCell<Vec<Mapper>>, parent: Rc<EventRoute> },
}

impl EventRoute {
	#[must_use]
	pub fn root(dispatch: impl Fn(Message) + 'static) -> Rc<Self> {
		let dispatch: Dispatch = Rc::new(dispatch);
		Rc::new(Self(Route::Root(dispatch)))
	}

	/// `mappers` are ordered outermost first.
	#[must_use]
	pub fn mapped(mappers: Vec<Mapper>, parent: Rc<Self>) -> Rc<Self> {
		Rc::new(Self(Route::Mapped {
			mappers: RefCell::new(mappers),
			parent,
		}))
	}

	pub(crate) fn remap(&self, new_mappers: Vec<Mapper>) {
		match &self.0 {
			Route::Mapped { mappers, .. } => *mappers.borrow_mut() = new_mappers,
			Route::Root(_) => error!("Tried to remap a root event route. Ignoring."),
		}
	}

	/// Maps `message` through each layer, innermost mapper first, and dispatches it at the root.
	pub fn send(&self, mut message: Message) {
		let mut route = self;
		loop {
			match &route.0 {
				Route::Root(dispatch) => return dispatch(message),
				Route::Mapped { mappers, parent } => {
					// Cloned so that mappers may cause re-renders.
					let mappers = mappers.borrow().clone();
					for mapper in mappers.iter().rev() {
						message = mapper(message);
					}
					route = parent;
				}
			}
		}
	}
}

impl Debug for EventRoute {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.0 {
			Route::Root(_) => f.write_str("EventRoute::Root"),
			Route::Mapped { mappers, parent } => f
				.debug_struct("EventRoute::Mapped")
				.field("mappers.len()", &mappers.borrow().len())
				.field("parent", parent)
				.finish(),
		}
	}
}

/// A [`Handler::Custom`] response.
pub struct CustomResponse {
	pub message: Message,
	pub stop_propagation: bool,
	pub prevent_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
	Normal,
	MayStopPropagation,
	MayPreventDefault,
	Custom,
}

/// An event handler fact.
///
/// Two handlers are the same if they share both kind and decoder allocation.
/// Between handlers of the same kind, a live listener is updated in place instead of being re-registered.
#[derive(Clone)]
pub enum Handler {
	Normal(Decoder<Message>),
	/// The flag requests `stopPropagation`.
	MayStopPropagation(Decoder<(Message, bool)>),
	/// The flag requests `preventDefault`.
	MayPreventDefault(Decoder<(Message, bool)>),
	Custom(Decoder<CustomResponse>),
}

impl Handler {
	#[must_use]
	pub fn normal(decode: impl Fn(&dyn Any) -> Option<Message> + 'static) -> Self {
		Self::Normal(Rc::new(decode))
	}

	#[must_use]
	pub fn may_stop_propagation(decode: impl Fn(&dyn Any) -> Option<(Message, bool)> + 'static) -> Self {
		Self::MayStopPropagation(Rc::new(decode))
	}

	#[must_use]
	pub fn may_prevent_default(decode: impl Fn(&dyn Any) -> Option<(Message, bool)> + 'static) -> Self {
		Self::MayPreventDefault(Rc::new(decode))
	}

	#[must_use]
	pub fn custom(decode: impl Fn(&dyn Any) -> Option<CustomResponse> + 'static) -> Self {
		Self::Custom(Rc::new(decode))
	}

	#[must_use]
	pub fn kind(&self) -> HandlerKind {
		match self {
			Self::Normal(_) => HandlerKind::Normal,
			Self::MayStopPropagation(_) => HandlerKind::MayStopPropagation,
			Self::MayPreventDefault(_) => HandlerKind::MayPreventDefault,
			Self::Custom(_) => HandlerKind::Custom,
		}
	}

	/// Whether listeners for this handler can be registered as passive, i.e. never prevent the default action.
	#[must_use]
	pub fn is_passive(&self) -> bool {
		matches!(self.kind(), HandlerKind::Normal | HandlerKind::MayStopPropagation)
	}

	fn decoder_ptr(&self) -> *const () {
		match self {
			Self::Normal(decode) => Rc::as_ptr(decode).cast(),
			Self::MayStopPropagation(decode) | Self::MayPreventDefault(decode) => Rc::as_ptr(decode).cast(),
			Self::Custom(decode) => Rc::as_ptr(decode).cast(),
		}
	}

	#[must_use]
	pub fn same(&self, other: &Self) -> bool {
		self.kind() == other.kind() && self.decoder_ptr() == other.decoder_ptr()
	}

	fn run(&self, event: &dyn Any) -> Option<CustomResponse> {
		match self {
			Self::Normal(decode) => decode(event).map(|message| CustomResponse {
				message,
				stop_propagation: false,
				prevent_default: false,
			}),
			Self::MayStopPropagation(decode) => decode(event).map(|(message, stop_propagation)| CustomResponse {
				message,
				stop_propagation,
				prevent_default: false,
			}),
			Self::MayPreventDefault(decode) => decode(event).map(|(message, prevent_default)| CustomResponse {
				message,
				stop_propagation: false,
				prevent_default,
			}),
			Self::Custom(decode) => decode(event),
		}
	}
}

impl PartialEq for Handler {
	fn eq(&self, other: &Self) -> bool {
		self.same(other)
	}
}

impl Debug for Handler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Handler::{:?}(..)", self.kind())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerOptions {
	pub passive: bool,
}

/// What the render target should do with the event after a [`Listener`] handled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventOutcome {
	pub stop_propagation: bool,
	pub prevent_default: bool,
}

/// The callback registered with the render target for one event on one live node.
pub struct Listener {
	handler: RefCell<Handler>,
	route: Rc<EventRoute>,
}

impl Listener {
	#[must_use]
	pub fn new(handler: Handler, route: Rc<EventRoute>) -> Rc<Self> {
		Rc::new(Self {
			handler: RefCell::new(handler),
			route,
		})
	}

	#[must_use]
	pub fn kind(&self) -> HandlerKind {
		self.handler.borrow().kind()
	}

	/// Swaps in a handler of the same kind, keeping the registration (and its passive flag) as is.
	pub(crate) fn swap_handler(&self, handler: Handler) {
		debug_assert_eq!(self.kind(), handler.kind());
		*self.handler.borrow_mut() = handler;
	}

	/// Runs the current handler on `event` and routes the resulting message, if any.
	pub fn handle(&self, event: &dyn Any) -> EventOutcome {
		let handler = self.handler.borrow().clone();
		let span = trace_span!("Handling event", kind = ?handler.kind());
		let _enter = span.enter();
		match handler.run(event) {
			None => {
				trace!("Handler produced no message.");
				EventOutcome::default()
			}
			Some(CustomResponse {
				message,
				stop_propagation,
				prevent_default,
			}) => {
				self.route.send(message);
				EventOutcome {
					stop_propagation,
					prevent_default,
				}
			}
		}
	}
}

impl Debug for Listener {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener")
			.field("handler", &*self.handler.borrow())
			.field("route", &self.route)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn recording_root() -> (Rc<EventRoute>, Rc<RefCell<Vec<String>>>) {
		let received = Rc::new(RefCell::new(Vec::new()));
		let route = EventRoute::root({
			let received = received.clone();
			move |message: Message| received.borrow_mut().push(*message.downcast::<String>().unwrap())
		});
		(route, received)
	}

	fn suffix(suffix: &'static str) -> Mapper {
		Rc::new(move |message: Message| Box::new(format!("{}{}", message.downcast::<String>().unwrap(), suffix)) as Message)
	}

	#[test]
	fn innermost_mapper_runs_first() {
		let (root, received) = recording_root();
		let outer = EventRoute::mapped(vec![suffix("-a"), suffix("-b")], root);
		let inner = EventRoute::mapped(vec![suffix("-c")], outer);

		inner.send(Box::new("m".to_string()));
		assert_eq!(*received.borrow(), vec!["m-c-b-a".to_string()]);
	}

	#[test]
	fn remapping_redirects_existing_listeners() {
		let (root, received) = recording_root();
		let layer = EventRoute::mapped(vec![suffix("-old")], root);
		let listener = Listener::new(Handler::normal(|_| Some(Box::new("click".to_string()) as Message)), layer.clone());

		listener.handle(&());
		layer.remap(vec![suffix("-new")]);
		listener.handle(&());

		assert_eq!(*received.borrow(), vec!["click-old".to_string(), "click-new".to_string()]);
	}

	#[test]
	fn outcome_reflects_handler_response() {
		let (root, _) = recording_root();
		let listener = Listener::new(
			Handler::may_prevent_default(|_| Some((Box::new("submit".to_string()) as Message, true))),
			root,
		);
		assert_eq!(
			listener.handle(&()),
			EventOutcome {
				stop_propagation: false,
				prevent_default: true,
			}
		);
	}

	#[test]
	fn passivity_follows_kind() {
		assert!(Handler::normal(|_| None).is_passive());
		assert!(Handler::may_stop_propagation(|_| None).is_passive());
		assert!(!Handler::may_prevent_default(|_| None).is_passive());
		assert!(!Handler::custom(|_| None).is_passive());
	}
}
