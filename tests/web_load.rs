#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::window;
use xylem_dom::{diff, facts::Fact, load::load_node, node::Node, web::WebTarget, Renderer};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn load_then_adopt() {
	let document = window().unwrap().document().unwrap();
	let container = document.create_element("div").unwrap();
	container.set_inner_html(r#"<p title="x">Hello <b>loaded</b><!-- comment --></p>"#);
	document.body().unwrap().append_child(&container).unwrap();

	let live: web_sys::Node = container.first_child().unwrap();
	let loaded = load_node(&live);

	let expected = Node::element(
		"p",
		vec![Fact::attribute("title", "x")],
		vec![Node::text("Hello "), Node::element("b", vec![], vec![Node::text("loaded")]), Node::text("")],
	);
	assert!(diff::<web_sys::Node>(&loaded, &expected).is_empty());

	let mut renderer = Renderer::adopt(WebTarget::new(document), live.clone(), loaded, |_| ());
	renderer.update(Node::element(
		"p",
		vec![Fact::attribute("title", "y")],
		vec![Node::text("Hello "), Node::element("b", vec![], vec![Node::text("adopted")]), Node::text("")],
	));

	assert_eq!(renderer.root(), &live);
	assert_eq!(container.inner_html(), r#"<p title="y">Hello <b>adopted</b><!-- comment --></p>"#);
	container.remove();
}
