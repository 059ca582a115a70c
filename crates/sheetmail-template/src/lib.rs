//! # Sheetmail Template
//!
//! `((placeholder))` templating against spreadsheet rows.
//!
//! - [`matcher`] — fuzzy placeholder → column resolution, suggestions, pre-flight validation
//! - [`render`] — extraction and single-pass substitution
//! - [`signature`] — HTML signature → text, signature append
//! - [`store`] — saved template records

pub mod matcher;
pub mod render;
pub mod signature;
pub mod store;

pub use matcher::{MatchRule, Resolution, ResolvePlaceholder, resolve, suggest, validate};
pub use render::{RenderedTemplate, extract_placeholders, render, render_template};
pub use signature::{append_signature, append_signature_html, html_to_text};
pub use store::{TemplateRecord, TemplateStore};
