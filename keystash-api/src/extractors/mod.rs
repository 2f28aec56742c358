//! Custom extractors.

mod json_body;

pub use json_body::ApiJson;
