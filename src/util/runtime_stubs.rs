//! A minimal `java.lang` runtime assembled in memory.
//!
//! The VM needs a handful of core classes to exist: `Object`, `String`, `Class`, the array
//! interfaces, and every exception class it raises on its own. These stubs declare just the
//! fields and methods the VM touches, so that programs can run without a JDK class library.

use crate::model::class_file::{class_access_flags, field_access_flags, ClassFile};
use crate::model::class_file::method_access_flags::{ACC_FINAL, ACC_NATIVE, ACC_PRIVATE,
                                                     ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC};
use crate::util::class_builder::{code_attribute, ClassBuilder};
use crate::vm::bytecode::opcode::*;

const OBJECT: &str = "java/lang/Object";
const STRING_DESCRIPTOR: &str = "Ljava/lang/String;";

/// The exception hierarchy, parents before children.
const THROWABLES: &[(&str, &str)] = &[
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/ArrayStoreException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/IllegalMonitorStateException", "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/ArrayIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/ClassNotFoundException", "java/lang/Exception"),
    ("java/lang/CloneNotSupportedException", "java/lang/Exception"),
    ("java/lang/InterruptedException", "java/lang/Exception"),
    ("java/io/IOException", "java/lang/Exception"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/ClassCircularityError", "java/lang/LinkageError"),
    ("java/lang/ClassFormatError", "java/lang/LinkageError"),
    ("java/lang/UnsupportedClassVersionError", "java/lang/ClassFormatError"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/AbstractMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/InstantiationError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
    ("java/lang/UnsatisfiedLinkError", "java/lang/LinkageError"),
    ("java/lang/VirtualMachineError", "java/lang/Error"),
    ("java/lang/StackOverflowError", "java/lang/VirtualMachineError"),
];

fn high(index: u16) -> u8 {
    (index >> 8) as u8
}

fn low(index: u16) -> u8 {
    index as u8
}

fn native(builder: &mut ClassBuilder, access_flags: u16, name: &str, descriptor: &str) {
    builder.method(access_flags | ACC_NATIVE, name, descriptor, vec![]);
}

/// `<init>()V` and `<init>(Ljava/lang/String;)V`, both delegating to the same constructor of
/// `super_name`.
fn constructors(builder: &mut ClassBuilder, super_name: &str) {
    let super_init = builder.method_ref(super_name, "<init>", "()V");
    builder.method(ACC_PUBLIC, "<init>", "()V", vec![code_attribute(1, 1, vec![
        ALOAD_0,
        INVOKESPECIAL, high(super_init), low(super_init),
        RETURN,
    ], vec![])]);
    let super_init = builder.method_ref(super_name, "<init>", "(Ljava/lang/String;)V");
    builder.method(ACC_PUBLIC, "<init>", "(Ljava/lang/String;)V", vec![code_attribute(2, 2, vec![
        ALOAD_0,
        ALOAD_1,
        INVOKESPECIAL, high(super_init), low(super_init),
        RETURN,
    ], vec![])]);
}

fn interface(name: &str) -> ClassFile {
    let mut builder = ClassBuilder::new(name, Some(OBJECT));
    builder.access_flags(class_access_flags::ACC_PUBLIC | class_access_flags::ACC_INTERFACE
                         | class_access_flags::ACC_ABSTRACT);
    builder.build()
}

fn object() -> ClassFile {
    let mut builder = ClassBuilder::new(OBJECT, None);
    builder.method(ACC_PUBLIC, "<init>", "()V", vec![code_attribute(0, 1, vec![RETURN], vec![])]);
    // return this == other
    builder.method(ACC_PUBLIC, "equals", "(Ljava/lang/Object;)Z", vec![code_attribute(2, 2, vec![
        ALOAD_0,
        ALOAD_1,
        IF_ACMPNE, 0, 5,
        ICONST_1,
        IRETURN,
        ICONST_0,
        IRETURN,
    ], vec![])]);
    native(&mut builder, ACC_PRIVATE | ACC_STATIC, "registerNatives", "()V");
    native(&mut builder, ACC_PUBLIC, "hashCode", "()I");
    native(&mut builder, ACC_PUBLIC | ACC_FINAL, "getClass", "()Ljava/lang/Class;");
    native(&mut builder, ACC_PROTECTED, "clone", "()Ljava/lang/Object;");
    native(&mut builder, ACC_PUBLIC | ACC_FINAL, "wait", "()V");
    native(&mut builder, ACC_PUBLIC | ACC_FINAL, "wait", "(J)V");
    native(&mut builder, ACC_PUBLIC | ACC_FINAL, "notify", "()V");
    native(&mut builder, ACC_PUBLIC | ACC_FINAL, "notifyAll", "()V");
    builder.build()
}

fn string() -> ClassFile {
    let mut builder = ClassBuilder::new("java/lang/String", Some(OBJECT));
    builder.access_flags(class_access_flags::ACC_PUBLIC | class_access_flags::ACC_FINAL
                         | class_access_flags::ACC_SUPER);
    builder.interface("java/io/Serializable");
    builder.field(field_access_flags::ACC_PRIVATE | field_access_flags::ACC_FINAL, "value", "[C");
    let value = builder.field_ref("java/lang/String", "value", "[C");
    builder.method(ACC_PUBLIC, "length", "()I", vec![code_attribute(1, 1, vec![
        ALOAD_0,
        GETFIELD, high(value), low(value),
        ARRAYLENGTH,
        IRETURN,
    ], vec![])]);
    builder.method(ACC_PUBLIC, "charAt", "(I)C", vec![code_attribute(2, 2, vec![
        ALOAD_0,
        GETFIELD, high(value), low(value),
        ILOAD_1,
        CALOAD,
        IRETURN,
    ], vec![])]);
    native(&mut builder, ACC_PUBLIC, "intern", "()Ljava/lang/String;");
    builder.build()
}

fn class() -> ClassFile {
    let mut builder = ClassBuilder::new("java/lang/Class", Some(OBJECT));
    builder.field(field_access_flags::ACC_PRIVATE, "name", STRING_DESCRIPTOR);
    let name = builder.field_ref("java/lang/Class", "name", STRING_DESCRIPTOR);
    builder.method(ACC_PUBLIC, "getName", "()Ljava/lang/String;", vec![code_attribute(1, 1, vec![
        ALOAD_0,
        GETFIELD, high(name), low(name),
        ARETURN,
    ], vec![])]);
    builder.build()
}

fn throwable() -> ClassFile {
    const THROWABLE: &str = "java/lang/Throwable";
    let mut builder = ClassBuilder::new(THROWABLE, Some(OBJECT));
    builder.interface("java/io/Serializable");
    builder.field(field_access_flags::ACC_PRIVATE, "detailMessage", STRING_DESCRIPTOR);
    let message = builder.field_ref(THROWABLE, "detailMessage", STRING_DESCRIPTOR);
    let object_init = builder.method_ref(OBJECT, "<init>", "()V");
    builder.method(ACC_PUBLIC, "<init>", "()V", vec![code_attribute(1, 1, vec![
        ALOAD_0,
        INVOKESPECIAL, high(object_init), low(object_init),
        RETURN,
    ], vec![])]);
    builder.method(ACC_PUBLIC, "<init>", "(Ljava/lang/String;)V", vec![code_attribute(2, 2, vec![
        ALOAD_0,
        INVOKESPECIAL, high(object_init), low(object_init),
        ALOAD_0,
        ALOAD_1,
        PUTFIELD, high(message), low(message),
        RETURN,
    ], vec![])]);
    builder.method(ACC_PUBLIC, "getMessage", "()Ljava/lang/String;",
                   vec![code_attribute(1, 1, vec![
        ALOAD_0,
        GETFIELD, high(message), low(message),
        ARETURN,
    ], vec![])]);
    native(&mut builder, ACC_PRIVATE, "fillInStackTrace", "(I)Ljava/lang/Throwable;");
    native(&mut builder, ACC_PRIVATE, "getStackTraceDepth", "()I");
    builder.build()
}

fn exception(name: &str, super_name: &str) -> ClassFile {
    let mut builder = ClassBuilder::new(name, Some(super_name));
    constructors(&mut builder, super_name);
    builder.build()
}

fn system() -> ClassFile {
    let mut builder = ClassBuilder::new("java/lang/System", Some(OBJECT));
    builder.access_flags(class_access_flags::ACC_PUBLIC | class_access_flags::ACC_FINAL
                         | class_access_flags::ACC_SUPER);
    native(&mut builder, ACC_PRIVATE | ACC_STATIC, "registerNatives", "()V");
    native(&mut builder, ACC_PUBLIC | ACC_STATIC, "arraycopy",
           "(Ljava/lang/Object;ILjava/lang/Object;II)V");
    native(&mut builder, ACC_PUBLIC | ACC_STATIC, "identityHashCode", "(Ljava/lang/Object;)I");
    builder.build()
}

fn boxes() -> Vec<ClassFile> {
    let mut float = ClassBuilder::new("java/lang/Float", Some(OBJECT));
    native(&mut float, ACC_PUBLIC | ACC_STATIC, "floatToRawIntBits", "(F)I");
    native(&mut float, ACC_PUBLIC | ACC_STATIC, "intBitsToFloat", "(I)F");
    let mut double = ClassBuilder::new("java/lang/Double", Some(OBJECT));
    native(&mut double, ACC_PUBLIC | ACC_STATIC, "doubleToRawLongBits", "(D)J");
    native(&mut double, ACC_PUBLIC | ACC_STATIC, "longBitsToDouble", "(J)D");
    vec![float.build(), double.build()]
}

fn io() -> Vec<ClassFile> {
    let mut descriptor = ClassBuilder::new("java/io/FileDescriptor", Some(OBJECT));
    descriptor.field(field_access_flags::ACC_PRIVATE, "fd", "I");
    let mut stream = ClassBuilder::new("java/io/FileOutputStream", Some(OBJECT));
    stream.field(field_access_flags::ACC_PRIVATE, "fd", "Ljava/io/FileDescriptor;");
    native(&mut stream, ACC_PRIVATE, "writeBytes", "([BIIZ)V");
    vec![descriptor.build(), stream.build()]
}

/// Every core class, ready to be written under the bootstrap class path.
pub fn minimal_runtime() -> Vec<ClassFile> {
    let mut classes = vec![
        object(),
        interface("java/lang/Cloneable"),
        interface("java/io/Serializable"),
        string(),
        class(),
        throwable(),
        system(),
    ];
    classes.extend(THROWABLES.iter().map(|&(name, super_name)| exception(name, super_name)));
    classes.extend(boxes());
    classes.extend(io());
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::error::names;

    #[test]
    fn every_raised_exception_has_a_stub() {
        let classes = minimal_runtime();
        let defined: Vec<&str> = classes.iter().filter_map(|class| class.this_class_name())
            .collect();
        for name in &[names::ABSTRACT_METHOD_ERROR, names::ARITHMETIC_EXCEPTION,
                      names::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION, names::ARRAY_STORE_EXCEPTION,
                      names::CLASS_CAST_EXCEPTION, names::CLASS_CIRCULARITY_ERROR,
                      names::CLASS_FORMAT_ERROR, names::CLASS_NOT_FOUND_EXCEPTION,
                      names::CLONE_NOT_SUPPORTED_EXCEPTION,
                      names::ILLEGAL_MONITOR_STATE_EXCEPTION,
                      names::INCOMPATIBLE_CLASS_CHANGE_ERROR, names::INSTANTIATION_ERROR,
                      names::LINKAGE_ERROR, names::NEGATIVE_ARRAY_SIZE_EXCEPTION,
                      names::NO_CLASS_DEF_FOUND_ERROR, names::NO_SUCH_FIELD_ERROR,
                      names::NO_SUCH_METHOD_ERROR, names::NULL_POINTER_EXCEPTION,
                      names::STACK_OVERFLOW_ERROR, names::UNSATISFIED_LINK_ERROR,
                      names::UNSUPPORTED_CLASS_VERSION_ERROR] {
            assert!(defined.contains(name), "{} has no stub", name);
        }
    }

    #[test]
    fn parents_come_first() {
        let classes = minimal_runtime();
        let position = |name: &str| {
            classes.iter().position(|class| class.this_class_name() == Some(name)).unwrap()
        };
        for class in &classes {
            if let Some(super_name) = class.super_class_name() {
                assert!(position(super_name) < position(class.this_class_name().unwrap()));
            }
        }
    }
}
