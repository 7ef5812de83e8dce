#![doc(html_root_url = "https://docs.rs/xylem-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod apply;
pub mod diff;
pub mod event;
pub mod facts;
mod keyed;
pub mod load;
pub mod memory;
pub mod node;
pub mod patch;
pub mod renderer;
pub mod target;
pub mod web;

pub use apply::{apply_patches, render};
pub use diff::diff;
pub use renderer::Renderer;

#[cfg(feature = "dangerous-logging")]
pub(crate) fn redact(text: &str) -> &str {
	text
}

/// Keeps page content out of log messages unless the `"dangerous-logging"` feature is enabled.
#[cfg(not(feature = "dangerous-logging"))]
pub(crate) fn redact(_text: &str) -> &str {
	"<redacted>"
}
