//! Normalization shared by every plugin: path-parameter conversion, operation-ID
//! synthesis and tag inference.

pub mod operation;
pub mod path;
pub mod tags;

pub use operation::{deduplicate, synthesize, synthesize_with_suffix};
pub use path::{convert, extract_path_params, join, split_query};
pub use tags::{infer_tags, infer_tags_from_handler};
