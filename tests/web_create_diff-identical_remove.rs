#![cfg(target_arch = "wasm32")]

use std::{rc::Rc, sync::Once};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::window;
use xylem_dom::{
	event::{Handler, Message},
	facts::Fact,
	node::Node,
	web::WebTarget,
	Renderer,
};

wasm_bindgen_test_configure!(run_in_browser);

static LOG_INIT: Once = Once::new();

#[wasm_bindgen_test]
fn text() {
	test_create_diff_identical_remove(Node::text("Hello xylem-dom text!"), 0);
}

#[wasm_bindgen_test]
fn keyed() {
	test_create_diff_identical_remove(
		Node::keyed(
			"ul",
			vec![],
			vec![
				("a", Node::text("Hello xylem-dom")),
				("a", Node::text(" keyed ")), // Intentionally the same as above.
				("b", Node::text("nodes.")),
			],
		),
		0,
	);
}

#[wasm_bindgen_test]
fn memoized() {
	test_create_diff_identical_remove(Node::memoized(vec![], || Node::text("Hello memoized!")), 0);
}

#[wasm_bindgen_test]
fn minimal_div() {
	test_create_diff_identical_remove(Node::element("div", vec![], vec![]), 0);
}

#[wasm_bindgen_test]
fn clickable_div() {
	test_create_diff_identical_remove(Node::element("div", vec![Fact::on("click", Handler::normal(|_| None))], vec![]), 1);
}

#[wasm_bindgen_test]
fn mapped_clickable_div() {
	test_create_diff_identical_remove(
		Node::map(|message: Message| message, Node::element("div", vec![Fact::on("click", Handler::normal(|_| None))], vec![])),
		1,
	);
}

#[wasm_bindgen_test]
fn minimal_svg() {
	test_create_diff_identical_remove(Node::element_ns("http://www.w3.org/2000/svg", "svg", vec![], vec![]), 0);
}

fn test_create_diff_identical_remove(vdom: Rc<Node>, binding_count: usize) {
	//TODO: Fail on warnings and errors.
	LOG_INIT.call_once(tracing_wasm::set_as_global_default);

	let document = window().unwrap().document().unwrap();
	let body: web_sys::Node = document.body().unwrap().into();

	let wrap = |content: Option<&Rc<Node>>| Node::element("section", vec![], content.cloned());

	let mut renderer = Renderer::mount(WebTarget::new(document), &body, wrap(Some(&vdom)), |_| ());
	let root = renderer.root().clone();
	assert_eq!(renderer.target().binding_count(), binding_count);

	let content = root.first_child().unwrap();
	renderer.update(wrap(Some(&vdom)));
	assert_eq!(root.first_child(), Some(content));
	assert_eq!(renderer.target().binding_count(), binding_count);

	renderer.update(wrap(None));
	assert!(!root.has_child_nodes());
	assert_eq!(renderer.target().binding_count(), 0);

	body.remove_child(&root).unwrap();
}
