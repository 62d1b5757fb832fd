//! Runtime representations of fields and methods.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::model::class_file::attributes::ExceptionTableEntry;
use crate::model::class_file::{constant_pool_index, field_access_flags, method_access_flags,
                               AttributeInfo};
use crate::vm::class::Class;
use crate::vm::error::VmError;
use crate::vm::sig::{MethodDescriptor, Type};
use crate::vm::value::Value;

/// A field declared by a class.
///
/// For a `static` field, `value` is the storage of the field itself. For an instance field, it
/// holds the default value copied into every new instance.
#[derive(Debug)]
pub struct Field {
    pub access_flags: field_access_flags::t,
    pub name: String,
    pub descriptor: String,
    pub ty: Type,
    /// The binary name of the declaring class.
    pub class_name: String,
    /// The `ConstantValue` initialiser of a `static` field, if any.
    pub constant_value: Option<constant_pool_index>,
    pub value: RefCell<Value>,
}

impl Field {
    pub fn new(access_flags: field_access_flags::t, name: String, descriptor: String, ty: Type,
               class_name: String, constant_value: Option<constant_pool_index>) -> Self {
        let value = RefCell::new(ty.default_value());
        Field { access_flags, name, descriptor, ty, class_name, constant_value, value }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & field_access_flags::ACC_STATIC != 0
    }

    /// The key of this field in an instance. Qualifying by the declaring class keeps a field
    /// apart from a field of the same name in a superclass.
    pub fn key(&self) -> String {
        field_key(&self.class_name, &self.name, &self.descriptor)
    }

    pub fn get(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.value.borrow_mut() = value;
    }
}

pub fn field_key(class_name: &str, name: &str, descriptor: &str) -> String {
    format!("{}.{}{}", class_name, name, descriptor)
}

/// The decoded `Code` attribute of a method.
#[derive(Debug, Clone)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo>,
}

/// A method declared by a class.
#[derive(Debug)]
pub struct Method {
    pub access_flags: method_access_flags::t,
    pub name: String,
    pub descriptor: String,
    pub signature: MethodDescriptor,
    pub class_name: String,
    pub class: Weak<Class>,
    /// `None` for `native` and `abstract` methods.
    pub code: Option<Code>,
}

impl Method {
    pub fn is_static(&self) -> bool {
        self.access_flags & method_access_flags::ACC_STATIC != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & method_access_flags::ACC_NATIVE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & method_access_flags::ACC_ABSTRACT != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & method_access_flags::ACC_PRIVATE != 0
    }

    pub fn is_initializer(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }

    /// `name + descriptor`, the key of this method in its class.
    pub fn key(&self) -> String {
        method_key(&self.name, &self.descriptor)
    }

    /// `class.name + descriptor`, the key of this method in the native table.
    pub fn native_key(&self) -> String {
        format!("{}.{}{}", self.class_name, self.name, self.descriptor)
    }

    pub fn class(&self) -> Result<Rc<Class>, VmError> {
        self.class.upgrade().ok_or_else(|| VmError::ClassDropped { name: self.class_name.clone() })
    }

    /// Local variable slots taken by the arguments, including `this` for instance methods.
    pub fn arg_slots(&self) -> usize {
        self.signature.arg_slots() + if self.is_static() { 0 } else { 1 }
    }
}

pub fn method_key(name: &str, descriptor: &str) -> String {
    format!("{}{}", name, descriptor)
}
