#![cfg(target_arch = "wasm32")]

use js_sys::Reflect;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::window;
use xylem_dom::{facts::Fact, node::Node, web::WebTarget, Renderer};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn text() {
	let markup = test_create(Node::text("Hello xylem-dom!"));
	assert_eq!(markup, "Hello xylem-dom!");
}

#[wasm_bindgen_test]
fn element() {
	let markup = test_create(Node::element(
		"p",
		vec![Fact::attribute("title", "greeting"), Fact::style("color", "red")],
		vec![Node::text("Hello xylem-dom!")],
	));
	assert_eq!(markup, r#"<p style="color: red;" title="greeting">Hello xylem-dom!</p>"#);
}

#[wasm_bindgen_test]
fn svg() {
	let markup = test_create(Node::element_ns("http://www.w3.org/2000/svg", "svg", vec![Fact::attribute("viewBox", "0 0 1 1")], vec![]));
	assert_eq!(markup, r#"<svg viewBox="0 0 1 1"></svg>"#);
}

#[wasm_bindgen_test]
fn removed_properties_are_blanked() {
	let document = window().unwrap().document().unwrap();
	let container = document.create_element("div").unwrap();
	let parent: web_sys::Node = container.clone().into();

	let mut renderer = Renderer::mount(
		WebTarget::new(document),
		&parent,
		Node::element("div", vec![Fact::property("xylemLabel", "x"), Fact::property("xylemFlag", true)], vec![]),
		|_| (),
	);
	renderer.update(Node::element("div", vec![], vec![]));

	let root = renderer.root().clone();
	let label = Reflect::get(&root, &JsValue::from_str("xylemLabel")).unwrap();
	assert_eq!(label.as_string().as_deref(), Some(""));
	assert!(Reflect::get(&root, &JsValue::from_str("xylemFlag")).unwrap().is_null());
}

/// Mounts `vdom` into a fresh container and returns the container's inner markup.
fn test_create(vdom: std::rc::Rc<Node>) -> String {
	let document = window().unwrap().document().unwrap();
	let container = document.create_element("div").unwrap();
	document.body().unwrap().append_child(&container).unwrap();

	let parent: web_sys::Node = container.clone().into();
	let renderer = Renderer::mount(WebTarget::new(document), &parent, vdom, |_| ());
	assert_eq!(renderer.target().binding_count(), 0);

	let markup = container.inner_html();
	container.remove();
	markup
}
