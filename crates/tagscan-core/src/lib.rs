//! Scan orchestration for tagscan: file enumeration, the worker pool,
//! report assembly, rule verification, and text rendering.

pub mod render;
pub mod scan;
pub mod verify;

pub use render::{render_scan_text, render_verify_text};
pub use scan::{ScanError, ScanRequest, Scanner};
pub use verify::verify_rules;
