pub mod json;

pub use json::{DirectoryStore, write_json_atomic};
