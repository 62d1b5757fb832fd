//! The host the VM runs on. The core reads class files and writes console output only through
//! this trait.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};

use crate::model::class_file::ClassFile;
use crate::writer;

pub trait System {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
    fn stdout(&self, text: &str);
    fn stderr(&self, text: &str);
}

/// The real file system and console.
#[derive(Debug, Default)]
pub struct NativeSystem;

impl System for NativeSystem {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn stdout(&self, text: &str) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        with_warn!(lock.write_all(text.as_bytes()).and_then(|_| lock.flush()));
    }

    fn stderr(&self, text: &str) {
        with_warn!(io::stderr().write_all(text.as_bytes()));
    }
}

/// An in-memory file system that captures console output.
#[derive(Debug, Default)]
pub struct MemorySystem {
    files: RefCell<HashMap<String, Vec<u8>>>,
    stdout: RefCell<String>,
    stderr: RefCell<String>,
}

impl MemorySystem {
    pub fn new() -> Self {
        MemorySystem::default()
    }

    pub fn add_file(&self, path: &str, bytes: Vec<u8>) {
        self.files.borrow_mut().insert(path.to_owned(), bytes);
    }

    /// Serializes `class` to `directory/<name>.class`.
    pub fn add_class(&self, directory: &str, class: &ClassFile) {
        let name = class.this_class_name().unwrap_or("<invalid>");
        let path = format!("{}/{}.class", directory, name);
        match writer::to_bytes(class) {
            Ok(bytes) => self.add_file(&path, bytes),
            Err(error) => warn!("cannot serialize {}: {}", path, error),
        }
    }

    pub fn stdout_text(&self) -> String {
        self.stdout.borrow().clone()
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.borrow().clone()
    }
}

impl System for MemorySystem {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files.borrow().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, path.to_owned())
        })
    }

    fn stdout(&self, text: &str) {
        self.stdout.borrow_mut().push_str(text);
    }

    fn stderr(&self, text: &str) {
        self.stderr.borrow_mut().push_str(text);
    }
}
