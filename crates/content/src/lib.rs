//! Content segmentation for Forgeloop.
//!
//! Assistant text interleaves markdown, code fences, `<thinking>` /
//! `<reasoning>` sections, and textual tool reports. [`segment`] turns that
//! text into typed [`ContentBlock`]s. It is a pure function of its input, so
//! the UI can re-run it on every content change while streaming.
//!
//! [`ContentBlock`]: forgeloop_core::ContentBlock

pub mod diff;
pub mod scan;
pub mod segmenter;
pub mod tool_report;

pub use diff::{DiffStats, extract_file_path, parse_diff, render_unified_diff};
pub use segmenter::segment;
pub use tool_report::{format_report, format_report_with_detail};
