#![cfg(target_arch = "wasm32")]

use std::{cell::Cell, rc::Rc, sync::Once};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlElement};
use xylem_dom::{
	event::{Handler, Message},
	facts::Fact,
	node::Node,
	web::WebTarget,
	Renderer,
};

wasm_bindgen_test_configure!(run_in_browser);

static LOG_INIT: Once = Once::new();

fn button(handler: Handler) -> Rc<Node> {
	Node::element("button", vec![Fact::attribute("id", "test-button"), Fact::on("click", handler)], vec![])
}

fn counted(amount: u32) -> Handler {
	Handler::normal(move |event| {
		assert!(event.downcast_ref::<web_sys::Event>().is_some(), "Expected `web_sys::Event` but received something else.");
		Some(Box::new(amount) as Message)
	})
}

#[wasm_bindgen_test]
fn click() {
	//TODO: Fail on warnings and errors.
	LOG_INIT.call_once(tracing_wasm::set_as_global_default);

	let document = window().unwrap().document().unwrap();
	let body: web_sys::Node = document.body().unwrap().into();

	let click_count = Rc::new(Cell::new(0));
	let mut renderer = Renderer::mount(WebTarget::new(document.clone()), &body, button(counted(1)), {
		let click_count = click_count.clone();
		move |message: Message| click_count.set(click_count.get() + *message.downcast::<u32>().unwrap())
	});
	assert_eq!(click_count.get(), 0);

	let live_button: HtmlElement = document.get_element_by_id("test-button").unwrap().dyn_into().unwrap();
	live_button.click();
	assert_eq!(click_count.get(), 1);

	renderer.update(button(counted(10)));
	live_button.click();
	assert_eq!(click_count.get(), 11);
	assert_eq!(renderer.target().binding_count(), 1);

	renderer.update(Node::element("button", vec![Fact::attribute("id", "test-button")], vec![]));
	live_button.click();
	assert_eq!(click_count.get(), 11);

	live_button.remove();
}
