//! `classdump`: prints a class file, with its methods disassembled, or runs a class.
//!
//! ```text
//! classdump Foo.class
//! classdump --run Main [class_path] [user_dir]
//! ```

#[macro_use]
extern crate log;

use std::process;
use std::rc::Rc;

use jvm_engine::logging::SimpleLogger;
use jvm_engine::model::class_file::{AttributeInfo, ClassFile};
use jvm_engine::parser::parse_class_file;
use jvm_engine::with_warn;
use jvm_engine::vm::bytecode::{instruction_length, mnemonic};
use jvm_engine::vm::{Jvm, JvmOptions, NativeSystem};

fn disassemble(code: &[u8]) {
    let mut pc = 0;
    while pc < code.len() {
        let length = instruction_length(code, pc).unwrap_or(code.len() - pc);
        let operands: Vec<String> = code[pc + 1..pc + length].iter()
            .map(|byte| format!("{:02x}", byte))
            .collect();
        println!("    {:>5}: {:<16} {}", pc, mnemonic(code[pc]).unwrap_or("???"),
                 operands.join(" "));
        pc += length;
    }
}

fn dump(class: &ClassFile) {
    println!("{:#?}", class);
    for method in &class.methods {
        let name = class.constant_pool.get(method.name_index as usize);
        let descriptor = class.constant_pool.get(method.descriptor_index as usize);
        println!("{:?} {:?}", name, descriptor);
        for attribute in &method.attributes {
            if let AttributeInfo::Code { ref code, .. } = *attribute {
                disassemble(code);
            }
        }
    }
}

fn run(class_name: &str, class_path: Option<String>, user_dir: Option<String>) -> i32 {
    let mut options = JvmOptions::default();
    if let Some(class_path) = class_path {
        options.class_path = class_path;
    }
    if let Some(user_dir) = user_dir {
        options.user_dir = user_dir;
    }
    let jvm = Jvm::new(Rc::new(NativeSystem), options);
    match jvm.run_main(class_name) {
        Ok(ref thread) if thread.uncaught_exception().is_some() => 1,
        Ok(_) => 0,
        Err(error) => {
            error!("{}", error);
            2
        },
    }
}

fn main() {
    with_warn!(SimpleLogger::init(log::Level::Warn));
    let mut args = std::env::args().skip(1);
    let status = match args.next() {
        Some(ref flag) if flag == "--run" => match args.next() {
            Some(class_name) => run(&class_name, args.next(), args.next()),
            None => {
                eprintln!("usage: classdump --run <class> [class_path] [user_dir]");
                64
            },
        },
        Some(path) => match std::fs::read(&path) {
            Ok(bytes) => match parse_class_file(&bytes) {
                Ok(class) => {
                    dump(&class);
                    0
                },
                Err(error) => {
                    eprintln!("{}: {}", path, error);
                    1
                },
            },
            Err(error) => {
                eprintln!("{}: {}", path, error);
                1
            },
        },
        None => {
            eprintln!("usage: classdump <file.class>");
            64
        },
    };
    process::exit(status);
}
