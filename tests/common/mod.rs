#![allow(dead_code)]

use std::rc::Rc;

use jvm_engine::model::class_file::attributes::ExceptionTableEntry;
use jvm_engine::model::class_file::method_access_flags::{ACC_PUBLIC, ACC_STATIC};
use jvm_engine::model::class_file::ClassFile;
use jvm_engine::util::class_builder::{code_attribute, ClassBuilder};
use jvm_engine::util::runtime_stubs::minimal_runtime;
use jvm_engine::vm::{Jvm, JvmOptions, MemorySystem, Thread, Value};

pub const OBJECT: &str = "java/lang/Object";
pub const MAIN: &str = "([Ljava/lang/String;)V";

pub fn high(index: u16) -> u8 {
    (index >> 8) as u8
}

pub fn low(index: u16) -> u8 {
    index as u8
}

pub struct TestVm {
    pub system: Rc<MemorySystem>,
    pub jvm: Rc<Jvm>,
}

/// A VM whose bootstrap class path holds the stub runtime and whose user directory holds
/// `classes`.
pub fn vm(classes: Vec<ClassFile>) -> TestVm {
    vm_with_options(classes, JvmOptions::default())
}

pub fn vm_with_options(classes: Vec<ClassFile>, options: JvmOptions) -> TestVm {
    let system = Rc::new(MemorySystem::new());
    for class in minimal_runtime() {
        system.add_class(&options.class_path, &class);
    }
    for class in &classes {
        system.add_class(&options.user_dir, class);
    }
    let jvm = Jvm::new(system.clone(), options);
    TestVm { system, jvm }
}

/// Adds `public static` method with the given code.
pub fn static_method(builder: &mut ClassBuilder, name: &str, descriptor: &str, max_stack: u16,
                     max_locals: u16, code: Vec<u8>) {
    builder.method(ACC_PUBLIC | ACC_STATIC, name, descriptor,
                   vec![code_attribute(max_stack, max_locals, code, vec![])]);
}

pub fn static_method_with_handlers(builder: &mut ClassBuilder, name: &str, descriptor: &str,
                                   max_stack: u16, max_locals: u16, code: Vec<u8>,
                                   handlers: Vec<ExceptionTableEntry>) {
    builder.method(ACC_PUBLIC | ACC_STATIC, name, descriptor,
                   vec![code_attribute(max_stack, max_locals, code, handlers)]);
}

/// Adds `public <init>()V` calling the superclass constructor.
pub fn default_constructor(builder: &mut ClassBuilder, super_name: &str) {
    use jvm_engine::vm::bytecode::opcode::{ALOAD_0, INVOKESPECIAL, RETURN};
    let init = builder.method_ref(super_name, "<init>", "()V");
    builder.method(ACC_PUBLIC, "<init>", "()V", vec![code_attribute(1, 1, vec![
        ALOAD_0,
        INVOKESPECIAL, high(init), low(init),
        RETURN,
    ], vec![])]);
}

pub fn handler(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16)
               -> ExceptionTableEntry {
    ExceptionTableEntry { start_pc, end_pc, handler_pc, catch_type }
}

/// Runs `Main.main` to completion.
pub fn run_main(vm: &TestVm) -> Thread {
    match vm.jvm.run_main("Main") {
        Ok(thread) => thread,
        Err(error) => panic!("fatal error: {}", error),
    }
}

/// Runs a thread whose only frame is the static method `name` of `class`, returning its
/// result.
pub fn call_static(vm: &TestVm, class: &str, name: &str, descriptor: &str, args: Vec<Value>)
                   -> Thread {
    let class = vm.jvm.resolve_class(class).expect("class loads");
    let method = class.get_method(name, descriptor).expect("method exists");
    let mut thread = vm.jvm.new_thread();
    thread.invoke_method(method, args, 0).expect("frame pushed");
    thread.run().expect("no fatal error");
    thread
}

pub fn uncaught_class(thread: &Thread) -> Option<String> {
    thread.uncaught_exception().map(|exception| exception.borrow().class().name.clone())
}

pub fn int_result(thread: &Thread) -> i32 {
    thread.return_value().expect("a result").as_int().expect("an int")
}
