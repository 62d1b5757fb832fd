//! Contains a parser for a Java class file.
//!
//! # Examples
//!
//! ```
//! use jvm_engine::parser::class_file::parse_class_file;
//!
//! // Too short to hold even the magic number.
//! assert!(parse_class_file(&[0xCA, 0xFE]).is_err());
//! ```

pub mod class_file;

pub use self::class_file::parse_class_file;
pub use self::class_file::Error as ClassFormatError;
