mod common;

use std::rc::Rc;

use jvm_engine::util::class_builder::ClassBuilder;
use jvm_engine::vm::bytecode::opcode::*;
use jvm_engine::vm::{JvmObject, Value};

use crate::common::*;

const T_BYTE: u8 = 8;
const T_INT: u8 = 10;

fn point() -> jvm_engine::model::class_file::ClassFile {
    let mut point = ClassBuilder::new("Point", Some(OBJECT));
    default_constructor(&mut point, OBJECT);
    point.build()
}

#[test]
fn float_bits() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let to_bits = builder.method_ref("java/lang/Float", "floatToRawIntBits", "(F)I");
    let from_bits = builder.method_ref("java/lang/Float", "intBitsToFloat", "(I)F");
    static_method(&mut builder, "bits", "(F)I", 1, 1, vec![
        FLOAD_0, INVOKESTATIC, high(to_bits), low(to_bits), IRETURN,
    ]);
    static_method(&mut builder, "back", "(I)F", 1, 1, vec![
        ILOAD_0, INVOKESTATIC, high(from_bits), low(from_bits), FRETURN,
    ]);
    let vm = vm(vec![builder.build()]);

    let thread = call_static(&vm, "Main", "bits", "(F)I", vec![Value::Float(1.0)]);
    assert_eq!(int_result(&thread), 0x3f80_0000);

    let thread = call_static(&vm, "Main", "back", "(I)F", vec![Value::Int(0x4020_0000)]);
    assert_eq!(thread.return_value().unwrap().as_float().unwrap(), 2.5);
}

#[test]
fn clone_arrays_but_not_plain_objects() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let clone = builder.method_ref(OBJECT, "clone", "()Ljava/lang/Object;");
    let ints = builder.class("[I");
    let point_class = builder.class("Point");
    static_method(&mut builder, "cloneArray", "()I", 4, 1, vec![
        ICONST_3, NEWARRAY, T_INT, ASTORE_0,
        ALOAD_0, ICONST_0, BIPUSH, 5, IASTORE,
        ALOAD_0, INVOKEVIRTUAL, high(clone), low(clone),
        CHECKCAST, high(ints), low(ints),
        DUP, ICONST_0, IALOAD,              // copied element
        SWAP, ALOAD_0, IF_ACMPEQ, 0, 4,     // a new array
        IRETURN,
        POP, ICONST_M1, IRETURN,
    ]);
    static_method(&mut builder, "clonePoint", "()V", 1, 0, vec![
        NEW, high(point_class), low(point_class),
        INVOKEVIRTUAL, high(clone), low(clone),
        POP, RETURN,
    ]);
    let vm = vm(vec![builder.build(), point()]);

    let thread = call_static(&vm, "Main", "cloneArray", "()I", vec![]);
    assert_eq!(int_result(&thread), 5);

    let thread = call_static(&vm, "Main", "clonePoint", "()V", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(),
               Some("java/lang/CloneNotSupportedException"));
}

#[test]
fn hash_codes_agree() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let point_class = builder.class("Point");
    let hash_code = builder.method_ref(OBJECT, "hashCode", "()I");
    let identity = builder.method_ref("java/lang/System", "identityHashCode",
                                      "(Ljava/lang/Object;)I");
    static_method(&mut builder, "difference", "()I", 2, 0, vec![
        NEW, high(point_class), low(point_class),
        DUP,
        INVOKEVIRTUAL, high(hash_code), low(hash_code),
        SWAP,
        INVOKESTATIC, high(identity), low(identity),
        ISUB,
        IRETURN,
    ]);
    let vm = vm(vec![builder.build(), point()]);
    let thread = call_static(&vm, "Main", "difference", "()I", vec![]);
    assert_eq!(int_result(&thread), 0);
}

#[test]
fn string_intern() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let intern = builder.method_ref("java/lang/String", "intern", "()Ljava/lang/String;");
    static_method(&mut builder, "intern", "(Ljava/lang/String;)Ljava/lang/String;", 1, 1, vec![
        ALOAD_0, INVOKEVIRTUAL, high(intern), low(intern), ARETURN,
    ]);
    let vm = vm(vec![builder.build()]);
    let fresh = vm.jvm.new_string("café").unwrap();
    let thread = call_static(&vm, "Main", "intern", "(Ljava/lang/String;)Ljava/lang/String;",
                             vec![Value::Reference(fresh.clone())]);
    let interned = thread.return_value().unwrap().as_reference().unwrap().unwrap();
    assert!(!Rc::ptr_eq(&fresh, &interned));
    assert!(Rc::ptr_eq(&interned, &vm.jvm.intern("café").unwrap()));
    assert_eq!(vm.jvm.string_value(&interned).unwrap(), "café");
}

#[test]
fn write_bytes_to_stdout() {
    const STREAM: &str = "java/io/FileOutputStream";
    const DESCRIPTOR: &str = "java/io/FileDescriptor";
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let stream = builder.class(STREAM);
    let descriptor = builder.class(DESCRIPTOR);
    let fd = builder.field_ref(DESCRIPTOR, "fd", "I");
    let stream_fd = builder.field_ref(STREAM, "fd", "Ljava/io/FileDescriptor;");
    let write = builder.method_ref(STREAM, "writeBytes", "([BIIZ)V");
    static_method(&mut builder, "write", "(I)V", 5, 4, vec![
        NEW, high(stream), low(stream), ASTORE_1,
        NEW, high(descriptor), low(descriptor), ASTORE_2,
        ALOAD_2, ILOAD_0, PUTFIELD, high(fd), low(fd),
        ALOAD_1, ALOAD_2, PUTFIELD, high(stream_fd), low(stream_fd),
        ICONST_2, NEWARRAY, T_BYTE, ASTORE_3,
        ALOAD_3, ICONST_0, BIPUSH, b'h', BASTORE,
        ALOAD_3, ICONST_1, BIPUSH, b'i', BASTORE,
        ALOAD_1, ALOAD_3, ICONST_0, ICONST_2, ICONST_0,
        INVOKEVIRTUAL, high(write), low(write),
        RETURN,
    ]);
    let vm = vm(vec![builder.build()]);

    let thread = call_static(&vm, "Main", "write", "(I)V", vec![Value::Int(1)]);
    assert!(thread.uncaught_exception().is_none());
    assert_eq!(vm.system.stdout_text(), "hi");

    let thread = call_static(&vm, "Main", "write", "(I)V", vec![Value::Int(2)]);
    assert!(thread.uncaught_exception().is_none());
    assert_eq!(vm.system.stderr_text(), "hi");

    let thread = call_static(&vm, "Main", "write", "(I)V", vec![Value::Int(7)]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/io/IOException"));
}

#[test]
fn native_fields_survive_clone() {
    let vm = vm(vec![point()]);
    let mut object = JvmObject::new(vm.jvm.resolve_class("Point").unwrap());
    assert!(object.native_field("handle").is_none());
    object.set_native_field("handle", Value::Long(42));
    let copy = object.shallow_clone();
    assert_eq!(copy.native_field("handle"), Some(&Value::Long(42)));
}
