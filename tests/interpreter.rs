mod common;

use std::cell::Cell;
use std::rc::Rc;

use jvm_engine::model::class_file::field_access_flags;
use jvm_engine::model::class_file::method_access_flags::{ACC_ABSTRACT, ACC_NATIVE, ACC_PUBLIC,
                                                          ACC_STATIC};
use jvm_engine::model::class_file::{class_access_flags, ClassFile};
use jvm_engine::util::class_builder::{code_attribute, ClassBuilder};
use jvm_engine::vm::bytecode::opcode::*;
use jvm_engine::vm::{ClassStatus, JvmOptions, ThreadStatus, Value};

use crate::common::*;

const T_INT: u8 = 10;

fn main_class<F: FnOnce(&mut ClassBuilder)>(build: F) -> ClassFile {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    build(&mut builder);
    builder.build()
}

fn exception_message(vm: &TestVm, thread: &jvm_engine::vm::Thread) -> Option<String> {
    let exception = thread.uncaught_exception().expect("an uncaught exception");
    vm.jvm.throwable_message(exception).expect("a readable message")
}

#[test]
fn integer_arguments() {
    let main = main_class(|builder| {
        static_method(builder, "add", "(II)I", 2, 2, vec![ILOAD_0, ILOAD_1, IADD, IRETURN]);
    });
    let vm = vm(vec![main]);
    let thread = call_static(&vm, "Main", "add", "(II)I", vec![Value::Int(2), Value::Int(40)]);
    assert_eq!(int_result(&thread), 42);
    assert_eq!(thread.status(), ThreadStatus::Terminated);
    assert_eq!(thread.frame_count(), 0);
}

#[test]
fn long_arguments_take_two_slots() {
    let main = main_class(|builder| {
        static_method(builder, "mul", "(JJ)J", 4, 4, vec![LLOAD_0, LLOAD_2, LMUL, LRETURN]);
        static_method(builder, "twice", "()J", 4, 0, vec![LCONST_1, DUP2, LADD, LRETURN]);
    });
    let vm = vm(vec![main]);
    let thread = call_static(&vm, "Main", "mul", "(JJ)J",
                             vec![Value::Long(6), Value::Long(6), Value::Long(7), Value::Long(7)]);
    assert_eq!(thread.return_value().unwrap().as_long().unwrap(), 42);

    let thread = call_static(&vm, "Main", "twice", "()J", vec![]);
    assert_eq!(thread.return_value().unwrap().as_long().unwrap(), 2);
}

#[test]
fn store_to_local_zero() {
    let main = main_class(|builder| {
        static_method(builder, "five", "()I", 1, 1, vec![ICONST_5, ISTORE_0, ILOAD_0, IRETURN]);
    });
    let vm = vm(vec![main]);
    let thread = call_static(&vm, "Main", "five", "()I", vec![]);
    assert_eq!(int_result(&thread), 5);
}

#[test]
fn wide_store_to_local_zero() {
    let main = main_class(|builder| {
        static_method(builder, "two", "()I", 1, 1, vec![ICONST_2, ISTORE, 0, ILOAD_0, IRETURN]);
    });
    let vm = vm(vec![main]);
    let class = vm.jvm.resolve_class("Main").unwrap();
    let mut thread = vm.jvm.new_thread();
    thread.invoke_method(class.get_method("two", "()I").unwrap(), vec![], 0).unwrap();

    thread.run_for(1).unwrap();
    assert_eq!(thread.current_frame().unwrap().pc, 1);
    assert_eq!(thread.current_frame().unwrap().operand_stack().len(), 1);

    thread.run_for(1).unwrap();
    let frame = thread.current_frame().unwrap();
    assert_eq!(frame.pc, 3);
    assert!(frame.operand_stack().is_empty());
    assert_eq!(frame.locals[0], Some(Value::Int(2)));

    thread.run().unwrap();
    assert_eq!(int_result(&thread), 2);
}

#[test]
fn operand_stack_is_bounded_by_max_stack() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let overflow = builder.class("java/lang/StackOverflowError");
    static_method_with_handlers(&mut builder, "push", "()I", 1, 0, vec![
        ICONST_1, ICONST_1, IRETURN,    // 0
        POP, BIPUSH, 9, IRETURN,        // 3
    ], vec![handler(0, 3, 3, overflow)]);
    static_method(&mut builder, "unguarded", "()I", 1, 0, vec![ICONST_1, ICONST_1, IRETURN]);
    let vm = vm(vec![builder.build()]);

    let thread = call_static(&vm, "Main", "push", "()I", vec![]);
    assert!(thread.uncaught_exception().is_none());
    assert_eq!(int_result(&thread), 9);

    let thread = call_static(&vm, "Main", "unguarded", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/StackOverflowError"));
}

#[test]
fn loop_with_iinc() {
    let main = main_class(|builder| {
        static_method(builder, "sum", "()I", 2, 2, vec![
            ICONST_0, ISTORE_0,                 // 0
            ICONST_1, ISTORE_1,                 // 2
            ILOAD_1, BIPUSH, 10,                // 4
            IF_ICMPGT, 0, 13,                   // 7: to 20
            ILOAD_0, ILOAD_1, IADD, ISTORE_0,   // 10
            IINC, 1, 1,                         // 14
            GOTO, 0xff, 0xf3,                   // 17: to 4
            ILOAD_0, IRETURN,                   // 20
        ]);
    });
    let vm = vm(vec![main]);
    let thread = call_static(&vm, "Main", "sum", "()I", vec![]);
    assert_eq!(int_result(&thread), 55);
}

#[test]
fn tableswitch() {
    let main = main_class(|builder| {
        static_method(builder, "pick", "(I)I", 1, 1, vec![
            ILOAD_0,
            TABLESWITCH, 0, 0,
            0, 0, 0, 29,    // default
            0, 0, 0, 0,     // low
            0, 0, 0, 1,     // high
            0, 0, 0, 23,
            0, 0, 0, 26,
            BIPUSH, 10, IRETURN,
            BIPUSH, 20, IRETURN,
            ICONST_M1, IRETURN,
        ]);
    });
    let vm = vm(vec![main]);
    for &(key, expected) in &[(0, 10), (1, 20), (7, -1), (-3, -1)] {
        let thread = call_static(&vm, "Main", "pick", "(I)I", vec![Value::Int(key)]);
        assert_eq!(int_result(&thread), expected, "key {}", key);
    }
}

#[test]
fn division_by_zero_is_reported() {
    let main = main_class(|builder| {
        static_method(builder, "divide", "()I", 2, 0, vec![ICONST_1, ICONST_0, IDIV, IRETURN]);
    });
    let vm = vm(vec![main]);
    let thread = call_static(&vm, "Main", "divide", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/ArithmeticException"));
    assert_eq!(thread.status(), ThreadStatus::Terminated);
    assert_eq!(vm.system.stderr_text(),
               "Exception in thread \"1\" java.lang.ArithmeticException: / by zero\n");
}

#[test]
fn handler_in_same_frame() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let arithmetic = builder.class("java/lang/ArithmeticException");
    static_method_with_handlers(&mut builder, "safe", "()I", 2, 0, vec![
        ICONST_1, ICONST_0, IDIV, IRETURN,  // 0
        POP, BIPUSH, 0xff, IRETURN,         // 4
    ], vec![handler(0, 4, 4, arithmetic)]);
    let vm = vm(vec![builder.build()]);
    let thread = call_static(&vm, "Main", "safe", "()I", vec![]);
    assert_eq!(int_result(&thread), -1);
    assert!(thread.uncaught_exception().is_none());
    assert_eq!(vm.system.stderr_text(), "");
}

#[test]
fn handler_in_caller_frame() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let thrower = builder.method_ref("Main", "thrower", "()V");
    let unrelated = builder.class("java/lang/ClassCastException");
    static_method(&mut builder, "thrower", "()V", 1, 0, vec![ACONST_NULL, ATHROW]);
    static_method_with_handlers(&mut builder, "outer", "()I", 1, 0, vec![
        INVOKESTATIC, high(thrower), low(thrower),  // 0
        ICONST_0, IRETURN,                          // 3
        POP, ICONST_1, IRETURN,                     // 5
    ], vec![handler(0, 3, 3, unrelated), handler(0, 3, 5, 0)]);
    let vm = vm(vec![builder.build()]);
    let thread = call_static(&vm, "Main", "outer", "()I", vec![]);
    assert_eq!(int_result(&thread), 1);
}

#[test]
fn arrays() {
    let main = main_class(|builder| {
        static_method(builder, "store", "()I", 3, 1, vec![
            ICONST_3, NEWARRAY, T_INT, ASTORE_0,
            ALOAD_0, ICONST_1, BIPUSH, 7, IASTORE,
            ALOAD_0, ICONST_1, IALOAD, ALOAD_0, ARRAYLENGTH, IADD,
            IRETURN,
        ]);
        static_method(builder, "outOfBounds", "()I", 2, 0, vec![
            ICONST_2, NEWARRAY, T_INT, ICONST_5, IALOAD, IRETURN,
        ]);
        static_method(builder, "nullStore", "()V", 3, 0, vec![
            ACONST_NULL, ICONST_0, ICONST_1, IASTORE, RETURN,
        ]);
        static_method(builder, "negative", "()V", 1, 0, vec![
            ICONST_M1, NEWARRAY, T_INT, RETURN,
        ]);
    });
    let vm = vm(vec![main]);

    let thread = call_static(&vm, "Main", "store", "()I", vec![]);
    assert_eq!(int_result(&thread), 10);

    let thread = call_static(&vm, "Main", "outOfBounds", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(),
               Some("java/lang/ArrayIndexOutOfBoundsException"));
    assert_eq!(exception_message(&vm, &thread).as_deref(),
               Some("Index 5 out of bounds for length 2"));

    let thread = call_static(&vm, "Main", "nullStore", "()V", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/NullPointerException"));

    let thread = call_static(&vm, "Main", "negative", "()V", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(),
               Some("java/lang/NegativeArraySizeException"));
}

#[test]
fn failed_array_stores_leave_the_array_unchanged() {
    let main = main_class(|builder| {
        static_method(builder, "make", "()[I", 4, 0, vec![
            ICONST_2, NEWARRAY, T_INT,
            DUP, ICONST_0, BIPUSH, 7, IASTORE,
            ARETURN,
        ]);
        static_method(builder, "store", "([II)V", 3, 2, vec![
            ALOAD_0, ILOAD_1, BIPUSH, 9, IASTORE, RETURN,
        ]);
    });
    let vm = vm(vec![main]);
    let thread = call_static(&vm, "Main", "make", "()[I", vec![]);
    let array = thread.return_value().unwrap().as_reference().unwrap().unwrap();
    let contents = || array.borrow().array().unwrap().elements().to_vec();
    assert_eq!(contents(), vec![Value::Int(7), Value::Int(0)]);

    for index in &[2, -1] {
        let thread = call_static(&vm, "Main", "store", "([II)V",
                                 vec![Value::Reference(array.clone()), Value::Int(*index)]);
        assert_eq!(uncaught_class(&thread).as_deref(),
                   Some("java/lang/ArrayIndexOutOfBoundsException"));
        assert_eq!(contents(), vec![Value::Int(7), Value::Int(0)]);
    }

    let thread = call_static(&vm, "Main", "store", "([II)V",
                             vec![Value::NullReference, Value::Int(0)]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/NullPointerException"));
    assert_eq!(contents(), vec![Value::Int(7), Value::Int(0)]);

    let thread = call_static(&vm, "Main", "store", "([II)V",
                             vec![Value::Reference(array.clone()), Value::Int(1)]);
    assert!(thread.uncaught_exception().is_none());
    assert_eq!(contents(), vec![Value::Int(7), Value::Int(9)]);
}

#[test]
fn system_arraycopy() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let arraycopy = builder.method_ref("java/lang/System", "arraycopy",
                                       "(Ljava/lang/Object;ILjava/lang/Object;II)V");
    static_method(&mut builder, "copy", "()I", 5, 2, vec![
        ICONST_3, NEWARRAY, T_INT, ASTORE_0,
        ALOAD_0, ICONST_0, ICONST_1, IASTORE,
        ALOAD_0, ICONST_1, ICONST_2, IASTORE,
        ALOAD_0, ICONST_2, ICONST_3, IASTORE,
        ICONST_3, NEWARRAY, T_INT, ASTORE_1,
        ALOAD_0, ICONST_0, ALOAD_1, ICONST_1, ICONST_2,
        INVOKESTATIC, high(arraycopy), low(arraycopy),
        ALOAD_1, ICONST_2, IALOAD, IRETURN,
    ]);
    static_method(&mut builder, "overrun", "()V", 5, 1, vec![
        ICONST_2, NEWARRAY, T_INT, ASTORE_0,
        ALOAD_0, ICONST_0, ALOAD_0, ICONST_1, ICONST_2,
        INVOKESTATIC, high(arraycopy), low(arraycopy),
        RETURN,
    ]);
    let vm = vm(vec![builder.build()]);

    let thread = call_static(&vm, "Main", "copy", "()I", vec![]);
    assert_eq!(int_result(&thread), 2);

    let thread = call_static(&vm, "Main", "overrun", "()V", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(),
               Some("java/lang/ArrayIndexOutOfBoundsException"));
}

fn animals() -> Vec<ClassFile> {
    let mut animal = ClassBuilder::new("Animal", Some(OBJECT));
    default_constructor(&mut animal, OBJECT);
    animal.method(ACC_PUBLIC, "sound", "()I",
                  vec![code_attribute(1, 1, vec![ICONST_1, IRETURN], vec![])]);

    let mut dog = ClassBuilder::new("Dog", Some("Animal"));
    default_constructor(&mut dog, "Animal");
    dog.method(ACC_PUBLIC, "sound", "()I",
               vec![code_attribute(1, 1, vec![ICONST_2, IRETURN], vec![])]);

    let mut shape = ClassBuilder::new("Shape", Some(OBJECT));
    shape.access_flags(class_access_flags::ACC_PUBLIC | class_access_flags::ACC_INTERFACE
                       | class_access_flags::ACC_ABSTRACT);
    shape.method(ACC_PUBLIC | ACC_ABSTRACT, "area", "()I", vec![]);

    let mut square = ClassBuilder::new("Square", Some(OBJECT));
    square.interface("Shape");
    default_constructor(&mut square, OBJECT);
    square.method(ACC_PUBLIC, "area", "()I",
                  vec![code_attribute(1, 1, vec![BIPUSH, 16, IRETURN], vec![])]);

    vec![animal.build(), dog.build(), shape.build(), square.build()]
}

#[test]
fn virtual_and_interface_dispatch() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let dog = builder.class("Dog");
    let dog_init = builder.method_ref("Dog", "<init>", "()V");
    let sound = builder.method_ref("Animal", "sound", "()I");
    let square = builder.class("Square");
    let square_init = builder.method_ref("Square", "<init>", "()V");
    let area = builder.interface_method_ref("Shape", "area", "()I");
    static_method(&mut builder, "bark", "()I", 2, 0, vec![
        NEW, high(dog), low(dog),
        DUP,
        INVOKESPECIAL, high(dog_init), low(dog_init),
        INVOKEVIRTUAL, high(sound), low(sound),
        IRETURN,
    ]);
    static_method(&mut builder, "area", "()I", 2, 0, vec![
        NEW, high(square), low(square),
        DUP,
        INVOKESPECIAL, high(square_init), low(square_init),
        INVOKEINTERFACE, high(area), low(area), 1, 0,
        IRETURN,
    ]);
    static_method(&mut builder, "nullReceiver", "()I", 1, 0, vec![
        ACONST_NULL,
        INVOKEVIRTUAL, high(sound), low(sound),
        IRETURN,
    ]);
    let mut classes = animals();
    classes.push(builder.build());
    let vm = vm(classes);

    let thread = call_static(&vm, "Main", "bark", "()I", vec![]);
    assert_eq!(int_result(&thread), 2);

    let thread = call_static(&vm, "Main", "area", "()I", vec![]);
    assert_eq!(int_result(&thread), 16);

    let thread = call_static(&vm, "Main", "nullReceiver", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/NullPointerException"));
    assert_eq!(exception_message(&vm, &thread).as_deref(),
               Some("Cannot invoke \"Animal.sound()\" because value is null"));
}

fn point() -> ClassFile {
    let mut point = ClassBuilder::new("Point", Some(OBJECT));
    point.field(field_access_flags::ACC_PUBLIC, "x", "I");
    default_constructor(&mut point, OBJECT);
    point.build()
}

#[test]
fn instance_fields() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let point_class = builder.class("Point");
    let init = builder.method_ref("Point", "<init>", "()V");
    let x = builder.field_ref("Point", "x", "I");
    static_method(&mut builder, "field", "()I", 2, 1, vec![
        NEW, high(point_class), low(point_class),
        DUP,
        INVOKESPECIAL, high(init), low(init),
        ASTORE_0,
        ALOAD_0, BIPUSH, 9, PUTFIELD, high(x), low(x),
        ALOAD_0, GETFIELD, high(x), low(x),
        IRETURN,
    ]);
    static_method(&mut builder, "fresh", "()I", 2, 0, vec![
        NEW, high(point_class), low(point_class),
        GETFIELD, high(x), low(x),
        IRETURN,
    ]);
    let vm = vm(vec![builder.build(), point()]);

    let thread = call_static(&vm, "Main", "field", "()I", vec![]);
    assert_eq!(int_result(&thread), 9);

    let thread = call_static(&vm, "Main", "fresh", "()I", vec![]);
    assert_eq!(int_result(&thread), 0);
}

#[test]
fn type_checks() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let point_class = builder.class("Point");
    let string = builder.class("java/lang/String");
    let object = builder.class(OBJECT);
    static_method(&mut builder, "isObject", "()I", 1, 0, vec![
        NEW, high(point_class), low(point_class),
        INSTANCEOF, high(object), low(object),
        IRETURN,
    ]);
    static_method(&mut builder, "badCast", "()V", 1, 0, vec![
        NEW, high(point_class), low(point_class),
        CHECKCAST, high(string), low(string),
        POP,
        RETURN,
    ]);
    let vm = vm(vec![builder.build(), point()]);

    let thread = call_static(&vm, "Main", "isObject", "()I", vec![]);
    assert_eq!(int_result(&thread), 1);

    let thread = call_static(&vm, "Main", "badCast", "()V", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/ClassCastException"));
    assert_eq!(exception_message(&vm, &thread).as_deref(),
               Some("class Point cannot be cast to class java.lang.String"));
}

#[test]
fn get_class_name() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let point_class = builder.class("Point");
    let get_class = builder.method_ref(OBJECT, "getClass", "()Ljava/lang/Class;");
    let get_name = builder.method_ref("java/lang/Class", "getName", "()Ljava/lang/String;");
    static_method(&mut builder, "name", "()Ljava/lang/String;", 1, 0, vec![
        NEW, high(point_class), low(point_class),
        INVOKEVIRTUAL, high(get_class), low(get_class),
        INVOKEVIRTUAL, high(get_name), low(get_name),
        ARETURN,
    ]);
    let vm = vm(vec![builder.build(), point()]);
    let thread = call_static(&vm, "Main", "name", "()Ljava/lang/String;", vec![]);
    let name = thread.return_value().unwrap().as_reference().unwrap().unwrap();
    assert_eq!(vm.jvm.string_value(&name).unwrap(), "Point");
}

#[test]
fn string_constants_are_interned() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let hi = builder.string("hi");
    builder.static_constant("GREETING", "Ljava/lang/String;", hi);
    let greeting = builder.field_ref("Main", "GREETING", "Ljava/lang/String;");
    static_method(&mut builder, "same", "()I", 2, 0, vec![
        GETSTATIC, high(greeting), low(greeting),   // 0
        LDC, hi as u8,                              // 3
        IF_ACMPNE, 0, 5,                            // 5: to 10
        ICONST_1, IRETURN,                          // 8
        ICONST_0, IRETURN,                          // 10
    ]);
    let vm = vm(vec![builder.build()]);
    let thread = call_static(&vm, "Main", "same", "()I", vec![]);
    assert_eq!(int_result(&thread), 1);

    let interned = vm.jvm.intern("hi").unwrap();
    assert!(Rc::ptr_eq(&interned, &vm.jvm.intern("hi").unwrap()));
    assert!(!Rc::ptr_eq(&interned, &vm.jvm.new_string("hi").unwrap()));
}

#[test]
fn superclass_initialized_first() {
    let mut parent = ClassBuilder::new("Parent", Some(OBJECT));
    parent.field(field_access_flags::ACC_STATIC, "a", "I");
    let a = parent.field_ref("Parent", "a", "I");
    parent.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(1, 0, vec![
        ICONST_1, PUTSTATIC, high(a), low(a), RETURN,
    ], vec![])]);

    let mut child = ClassBuilder::new("Child", Some("Parent"));
    child.field(field_access_flags::ACC_STATIC, "b", "I");
    let a = child.field_ref("Parent", "a", "I");
    let b = child.field_ref("Child", "b", "I");
    child.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(2, 0, vec![
        GETSTATIC, high(a), low(a),
        ICONST_1, IADD,
        PUTSTATIC, high(b), low(b),
        RETURN,
    ], vec![])]);

    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let b = builder.field_ref("Child", "b", "I");
    static_method(&mut builder, "read", "()I", 1, 0, vec![
        GETSTATIC, high(b), low(b), IRETURN,
    ]);

    let vm = vm(vec![parent.build(), child.build(), builder.build()]);
    let thread = call_static(&vm, "Main", "read", "()I", vec![]);
    assert_eq!(int_result(&thread), 2);
    for name in &["Parent", "Child"] {
        let class = vm.jvm.resolve_class(name).unwrap();
        assert_eq!(class.status(), ClassStatus::Initialized, "{}", name);
    }
}

#[test]
fn failed_initialization_is_remembered() {
    let mut broken = ClassBuilder::new("Broken", Some(OBJECT));
    broken.field(field_access_flags::ACC_STATIC, "x", "I");
    broken.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(2, 0, vec![
        ICONST_1, ICONST_0, IDIV, POP, RETURN,
    ], vec![])]);

    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let x = builder.field_ref("Broken", "x", "I");
    static_method(&mut builder, "read", "()I", 1, 0, vec![GETSTATIC, high(x), low(x), IRETURN]);

    let vm = vm(vec![broken.build(), builder.build()]);
    let thread = call_static(&vm, "Main", "read", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/ArithmeticException"));
    assert_eq!(vm.jvm.resolve_class("Broken").unwrap().status(), ClassStatus::Error);

    let thread = call_static(&vm, "Main", "read", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/NoClassDefFoundError"));
    assert_eq!(exception_message(&vm, &thread).as_deref(),
               Some("Could not initialize class Broken"));
}

#[test]
fn subclass_fails_with_its_superclass() {
    let mut base = ClassBuilder::new("Base", Some(OBJECT));
    base.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(2, 0, vec![
        ICONST_1, ICONST_0, IDIV, POP, RETURN,
    ], vec![])]);
    let mut sub = ClassBuilder::new("Sub", Some("Base"));
    sub.field(field_access_flags::ACC_STATIC, "x", "I");

    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let x = builder.field_ref("Sub", "x", "I");
    static_method(&mut builder, "read", "()I", 1, 0, vec![GETSTATIC, high(x), low(x), IRETURN]);

    let vm = vm(vec![base.build(), sub.build(), builder.build()]);
    let thread = call_static(&vm, "Main", "read", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/ArithmeticException"));
    for name in &["Base", "Sub"] {
        assert_eq!(vm.jvm.resolve_class(name).unwrap().status(), ClassStatus::Error, "{}", name);
    }

    let thread = call_static(&vm, "Main", "read", "()I", vec![]);
    assert!(thread.return_value().is_none());
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/NoClassDefFoundError"));
    assert_eq!(exception_message(&vm, &thread).as_deref(), Some("Could not initialize class Sub"));
}

#[test]
fn subclass_waits_for_its_superclass() {
    let mut base = ClassBuilder::new("Base", Some(OBJECT));
    base.field(field_access_flags::ACC_STATIC, "a", "I");
    let a = base.field_ref("Base", "a", "I");
    base.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(1, 0, vec![
        BIPUSH, 7, PUTSTATIC, high(a), low(a), RETURN,
    ], vec![])]);
    let mut sub = ClassBuilder::new("Sub", Some("Base"));
    sub.field(field_access_flags::ACC_STATIC, "x", "I");

    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let x = builder.field_ref("Sub", "x", "I");
    let a = builder.field_ref("Base", "a", "I");
    static_method(&mut builder, "read", "()I", 2, 0, vec![
        GETSTATIC, high(x), low(x),
        GETSTATIC, high(a), low(a),
        IADD, IRETURN,
    ]);

    let vm = vm(vec![base.build(), sub.build(), builder.build()]);
    let thread = call_static(&vm, "Main", "read", "()I", vec![]);
    assert_eq!(int_result(&thread), 7);
    for name in &["Base", "Sub"] {
        let class = vm.jvm.resolve_class(name).unwrap();
        assert_eq!(class.status(), ClassStatus::Initialized, "{}", name);
    }
}

#[test]
fn native_method_runs_once() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    builder.method(ACC_PUBLIC | ACC_STATIC | ACC_NATIVE, "answer", "()I", vec![]);
    builder.method(ACC_PUBLIC | ACC_STATIC | ACC_NATIVE, "unbound", "()I", vec![]);
    let answer = builder.method_ref("Main", "answer", "()I");
    let unbound = builder.method_ref("Main", "unbound", "()I");
    static_method(&mut builder, "ask", "()I", 1, 0, vec![
        INVOKESTATIC, high(answer), low(answer), IRETURN,
    ]);
    static_method(&mut builder, "askUnbound", "()I", 1, 0, vec![
        INVOKESTATIC, high(unbound), low(unbound), IRETURN,
    ]);
    let vm = vm(vec![builder.build()]);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    vm.jvm.register_native("Main", "answer()I", move |thread, _| {
        counter.set(counter.get() + 1);
        thread.return_stack_frame(Some(Value::Int(42)))
    });

    let thread = call_static(&vm, "Main", "ask", "()I", vec![]);
    assert_eq!(int_result(&thread), 42);
    assert_eq!(calls.get(), 1);

    let thread = call_static(&vm, "Main", "askUnbound", "()I", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/UnsatisfiedLinkError"));
}

#[test]
fn deep_recursion_overflows() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    let recurse = builder.method_ref("Main", "recurse", "()V");
    static_method(&mut builder, "recurse", "()V", 0, 0, vec![
        INVOKESTATIC, high(recurse), low(recurse), RETURN,
    ]);
    let options = JvmOptions { max_stack_frames: 16, ..JvmOptions::default() };
    let vm = vm_with_options(vec![builder.build()], options);
    let thread = call_static(&vm, "Main", "recurse", "()V", vec![]);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/StackOverflowError"));
    assert_eq!(thread.frame_count(), 0);
}

#[test]
fn run_for_stops_after_the_budget() {
    let main = main_class(|builder| {
        static_method(builder, "spin", "()V", 0, 0, vec![GOTO, 0, 0]);
    });
    let vm = vm(vec![main]);
    let class = vm.jvm.resolve_class("Main").unwrap();
    let mut thread = vm.jvm.new_thread();
    thread.invoke_method(class.get_method("spin", "()V").unwrap(), vec![], 0).unwrap();
    assert_eq!(thread.run_for(10).unwrap(), 10);
    assert_eq!(thread.executed_instructions(), 10);
    assert!(thread.is_runnable());
    assert_eq!(thread.pc().unwrap(), 0);
}

#[test]
fn run_main_initializes_and_runs() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    builder.field(field_access_flags::ACC_STATIC, "ran", "I");
    let ran = builder.field_ref("Main", "ran", "I");
    builder.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(1, 0, vec![
        BIPUSH, 3, PUTSTATIC, high(ran), low(ran), RETURN,
    ], vec![])]);
    static_method(&mut builder, "main", MAIN, 2, 1, vec![
        GETSTATIC, high(ran), low(ran),
        ICONST_1, IADD,
        PUTSTATIC, high(ran), low(ran),
        RETURN,
    ]);
    let vm = vm(vec![builder.build()]);
    let thread = run_main(&vm);
    assert!(thread.uncaught_exception().is_none());
    let class = vm.jvm.resolve_class("Main").unwrap();
    assert_eq!(class.status(), ClassStatus::Initialized);
    assert_eq!(class.resolve_field("ran", "I").unwrap().get().as_int().unwrap(), 4);
}

#[test]
fn main_does_not_catch_its_own_initialization_failure() {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    builder.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(2, 0, vec![
        ICONST_1, ICONST_0, IDIV, POP, RETURN,
    ], vec![])]);
    static_method_with_handlers(&mut builder, "main", MAIN, 1, 1, vec![
        RETURN,         // 0
        POP, RETURN,    // 1
    ], vec![handler(0, 1, 1, 0)]);
    let vm = vm(vec![builder.build()]);

    let thread = run_main(&vm);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/ArithmeticException"));
    assert_eq!(thread.status(), ThreadStatus::Terminated);
    assert!(thread.frames().is_empty());
    assert_eq!(vm.jvm.resolve_class("Main").unwrap().status(), ClassStatus::Error);
    assert_eq!(vm.system.stderr_text(),
               "Exception in thread \"1\" java.lang.ArithmeticException: / by zero\n");
}

#[test]
fn run_main_without_main() {
    let vm = vm(vec![main_class(|_| ())]);
    let thread = run_main(&vm);
    assert_eq!(uncaught_class(&thread).as_deref(), Some("java/lang/NoSuchMethodError"));
}
