#[test]
fn changelog() {
	version_sync::assert_contains_regex!("CHANGELOG.md", "^## {version}$");
}

#[test]
fn html_root_url() {
	version_sync::assert_html_root_url_updated!("src/lib.rs");
}

#[test]
fn readme_deps() {
	version_sync::assert_markdown_deps_updated!("README.md");
}

#[test]
fn readme_links_resolve() {
	let readme = std::fs::read_to_string("README.md").unwrap();
	for link in readme.split("](").skip(1) {
		let target = &link[..link.find(')').unwrap()];
		if target.contains("://") || target.starts_with('#') {
			continue;
		}
		assert!(std::path::Path::new(target).exists(), "README.md links to missing {:?}.", target);
	}
}
