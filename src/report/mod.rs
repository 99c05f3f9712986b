//! Agreement report rendering.

pub mod generator;

pub use generator::{render_text_report, write_json_report, write_text_report};
