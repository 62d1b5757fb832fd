//! Failures raised while executing bytecode.
//!
//! There are two very different kinds. A `JavaException` is an exception in the guest program:
//! it is raised at the faulting instruction and unwinds through exception tables like any
//! `athrow`. A `VmError` means the interpreter itself has gone wrong (a popped empty stack, a
//! missing field key). It is never visible to the guest and stops the thread.

use thiserror::Error;

use crate::vm::class_loader::LoadError;
use crate::vm::heap::ObjectRef;

/// Binary names of the exception classes the VM raises on its own.
pub mod names {
    pub const ABSTRACT_METHOD_ERROR: &str = "java/lang/AbstractMethodError";
    pub const ARITHMETIC_EXCEPTION: &str = "java/lang/ArithmeticException";
    pub const ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION: &str =
        "java/lang/ArrayIndexOutOfBoundsException";
    pub const ARRAY_STORE_EXCEPTION: &str = "java/lang/ArrayStoreException";
    pub const CLASS_CAST_EXCEPTION: &str = "java/lang/ClassCastException";
    pub const CLASS_CIRCULARITY_ERROR: &str = "java/lang/ClassCircularityError";
    pub const CLASS_FORMAT_ERROR: &str = "java/lang/ClassFormatError";
    pub const CLASS_NOT_FOUND_EXCEPTION: &str = "java/lang/ClassNotFoundException";
    pub const CLONE_NOT_SUPPORTED_EXCEPTION: &str = "java/lang/CloneNotSupportedException";
    pub const ILLEGAL_MONITOR_STATE_EXCEPTION: &str = "java/lang/IllegalMonitorStateException";
    pub const INCOMPATIBLE_CLASS_CHANGE_ERROR: &str = "java/lang/IncompatibleClassChangeError";
    pub const INSTANTIATION_ERROR: &str = "java/lang/InstantiationError";
    pub const LINKAGE_ERROR: &str = "java/lang/LinkageError";
    pub const NEGATIVE_ARRAY_SIZE_EXCEPTION: &str = "java/lang/NegativeArraySizeException";
    pub const NO_CLASS_DEF_FOUND_ERROR: &str = "java/lang/NoClassDefFoundError";
    pub const NO_SUCH_FIELD_ERROR: &str = "java/lang/NoSuchFieldError";
    pub const NO_SUCH_METHOD_ERROR: &str = "java/lang/NoSuchMethodError";
    pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
    pub const STACK_OVERFLOW_ERROR: &str = "java/lang/StackOverflowError";
    pub const UNSATISFIED_LINK_ERROR: &str = "java/lang/UnsatisfiedLinkError";
    pub const UNSUPPORTED_CLASS_VERSION_ERROR: &str = "java/lang/UnsupportedClassVersionError";
}

/// An interpreter bug or misuse of the thread API. Never catchable by the guest.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("thread has no stack frames")]
    NoFrame,
    #[error("operand stack underflow in {method}")]
    StackUnderflow { method: String },
    #[error("{operation} used on a value of the wrong width: {value}")]
    WidthMismatch { operation: &'static str, value: String },
    #[error("expected {expected} but found {found}")]
    TypeMismatch { expected: &'static str, found: String },
    #[error("local variable {index} has not been written")]
    UninitializedLocal { index: usize },
    #[error("local variable {index} is out of range for max_locals {max_locals}")]
    LocalOutOfRange { index: usize, max_locals: usize },
    #[error("no field {key} in instance of {class}")]
    UnknownField { class: String, key: String },
    #[error("instance of {class} is not an array")]
    NotAnArray { class: String },
    #[error("pc {pc} runs past the end of the code of {method}")]
    CodeOverrun { pc: usize, method: String },
    #[error("unsupported opcode {opcode:#04x} at pc {pc}")]
    UnsupportedOpcode { opcode: u8, pc: usize },
    #[error("illegal constant pool access at index {index}: {reason}")]
    ConstantPool { index: u16, reason: String },
    #[error("malformed descriptor {descriptor}")]
    Descriptor { descriptor: String },
    #[error("native method {key} returned without popping its frame")]
    NativeDidNotReturn { key: String },
    #[error("class {name} was dropped while still in use")]
    ClassDropped { name: String },
    #[error("required class {class} cannot be loaded: {source}")]
    MissingCoreClass {
        class: String,
        #[source]
        source: LoadError,
    },
}

/// A guest-visible exception waiting to be raised in the executing thread.
#[derive(Debug, Clone)]
pub enum JavaException {
    /// An exception the VM creates itself, such as `NullPointerException`.
    New { class_name: String, message: String },
    /// An existing Throwable, as thrown by `athrow`.
    Thrown(ObjectRef),
}

impl JavaException {
    pub fn new<S: Into<String>, M: Into<String>>(class_name: S, message: M) -> Self {
        JavaException::New { class_name: class_name.into(), message: message.into() }
    }

    pub fn null_pointer() -> Self {
        JavaException::new(names::NULL_POINTER_EXCEPTION, "")
    }

    /// The exception for an array access at `index` into an array of `length` elements.
    pub fn array_index(index: i32, length: usize) -> Self {
        JavaException::new(names::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
                           format!("Index {} out of bounds for length {}", index, length))
    }

    pub fn stack_overflow() -> Self {
        JavaException::new(names::STACK_OVERFLOW_ERROR, "")
    }
}

impl From<LoadError> for JavaException {
    fn from(error: LoadError) -> Self {
        JavaException::new(error.exception_class(), error.to_string())
    }
}

/// Why an instruction did not complete normally.
#[derive(Debug)]
pub enum Trap {
    Throw(JavaException),
    Fatal(VmError),
}

impl From<VmError> for Trap {
    fn from(error: VmError) -> Self {
        Trap::Fatal(error)
    }
}

impl From<JavaException> for Trap {
    fn from(exception: JavaException) -> Self {
        Trap::Throw(exception)
    }
}

impl From<LoadError> for Trap {
    fn from(error: LoadError) -> Self {
        Trap::Throw(JavaException::from(error))
    }
}

/// The result of executing (part of) an instruction.
pub type ExecResult<T = ()> = Result<T, Trap>;
