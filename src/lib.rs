#![doc(html_root_url = "https://maxmcc.github.io/rust-jvm/")]

//! A Java class-file virtual machine: a class-file reader and writer, class loaders with parent
//! delegation, lazily resolved constant pools and a cooperative bytecode interpreter.

#[macro_use]
extern crate log;

#[macro_use]
pub mod logging;

pub mod model;
pub mod parser;
pub mod util;
pub mod vm;
pub mod writer;
