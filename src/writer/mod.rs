//! Serializes the class file model back into the binary format read by `parser`.

pub mod class_file;

pub use self::class_file::{to_bytes, write_class_file};
