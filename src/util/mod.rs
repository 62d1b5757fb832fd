//! Small data structures and codecs used by the reader, writer and VM.

pub mod class_builder;
pub mod modified_utf8;
pub mod one_indexed_vec;
pub mod runtime_stubs;
