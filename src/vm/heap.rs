//! Objects and arrays living in the Java heap.
//!
//! Every heap value is a `JvmObject` behind an `ObjectRef`. Arrays are objects that also carry a
//! `JvmArray`. Memory is reclaimed by reference counting when the last `ObjectRef` goes away.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::vm::class::Class;
use crate::vm::error::VmError;
use crate::vm::monitor::Monitor;
use crate::vm::value::Value;

/// A shared, mutable handle to a heap object.
pub type ObjectRef = Rc<RefCell<JvmObject>>;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayType {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
    Reference,
}

impl ArrayType {
    /// Derives the element type from an array class name such as `[I` or `[Ljava/lang/String;`.
    pub fn from_class_name(name: &str) -> ArrayType {
        match name.as_bytes().get(1) {
            Some(b'Z') => ArrayType::Boolean,
            Some(b'C') => ArrayType::Char,
            Some(b'F') => ArrayType::Float,
            Some(b'D') => ArrayType::Double,
            Some(b'B') => ArrayType::Byte,
            Some(b'S') => ArrayType::Short,
            Some(b'I') => ArrayType::Int,
            Some(b'J') => ArrayType::Long,
            _ => ArrayType::Reference,
        }
    }

    /// Decodes the `atype` operand of `newarray`. §6.5.newarray
    pub fn from_atype(atype: u8) -> Option<ArrayType> {
        match atype {
            4 => Some(ArrayType::Boolean),
            5 => Some(ArrayType::Char),
            6 => Some(ArrayType::Float),
            7 => Some(ArrayType::Double),
            8 => Some(ArrayType::Byte),
            9 => Some(ArrayType::Short),
            10 => Some(ArrayType::Int),
            11 => Some(ArrayType::Long),
            _ => None,
        }
    }

    /// The name of the array class with this primitive element type.
    pub fn primitive_array_class(&self) -> Option<&'static str> {
        match *self {
            ArrayType::Boolean => Some("[Z"),
            ArrayType::Char => Some("[C"),
            ArrayType::Float => Some("[F"),
            ArrayType::Double => Some("[D"),
            ArrayType::Byte => Some("[B"),
            ArrayType::Short => Some("[S"),
            ArrayType::Int => Some("[I"),
            ArrayType::Long => Some("[J"),
            ArrayType::Reference => None,
        }
    }

    pub fn default_value(&self) -> Value {
        match *self {
            ArrayType::Float => Value::Float(0.0),
            ArrayType::Double => Value::Double(0.0),
            ArrayType::Long => Value::Long(0),
            ArrayType::Reference => Value::NullReference,
            _ => Value::Int(0),
        }
    }
}

/// The element storage of an array object.
///
/// Indices are not checked here: the interpreter has already raised
/// `ArrayIndexOutOfBoundsException` for any index outside `0..len()`.
#[derive(Debug, Clone)]
pub struct JvmArray {
    element_type: ArrayType,
    elements: Vec<Value>,
}

impl JvmArray {
    pub fn new(element_type: ArrayType, length: usize) -> Self {
        JvmArray { element_type, elements: vec![element_type.default_value(); length] }
    }

    pub fn element_type(&self) -> ArrayType {
        self.element_type
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Checks `index` against the length, returning it as a `usize` when it is in range.
    pub fn check_index(&self, index: i32) -> Option<usize> {
        if index >= 0 && (index as usize) < self.elements.len() {
            Some(index as usize)
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Value {
        self.elements[index].clone()
    }

    pub fn set(&mut self, index: usize, value: Value) {
        self.elements[index] = value;
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [Value] {
        &mut self.elements
    }
}

/// An instance of a class, or an array.
pub struct JvmObject {
    id: u64,
    class: Rc<Class>,
    /// One value per declared and inherited instance field, keyed by `Field::key`.
    fields: HashMap<String, Value>,
    /// State the VM attaches to an object outside of its Java fields.
    native_fields: HashMap<String, Value>,
    monitor: Option<Monitor>,
    array: Option<JvmArray>,
}

impl JvmObject {
    /// Creates an instance of `class` with every instance field at its default value.
    pub fn new(class: Rc<Class>) -> Self {
        let fields = class.instance_fields.iter()
            .map(|field| (field.key(), field.ty.default_value()))
            .collect();
        JvmObject {
            id: next_object_id(),
            class,
            fields,
            native_fields: HashMap::new(),
            monitor: None,
            array: None,
        }
    }

    /// Creates an array of `length` default elements. The element type comes from the name of
    /// the array class.
    pub fn new_array(class: Rc<Class>, length: usize) -> Self {
        let element_type = ArrayType::from_class_name(&class.name);
        JvmObject {
            id: next_object_id(),
            class,
            fields: HashMap::new(),
            native_fields: HashMap::new(),
            monitor: None,
            array: Some(JvmArray::new(element_type, length)),
        }
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// The identity hash code returned by `Object.hashCode`.
    pub fn hash_code(&self) -> i32 {
        self.id as i32
    }

    pub fn get_field(&self, key: &str) -> Result<Value, VmError> {
        self.fields.get(key).cloned().ok_or_else(|| self.unknown_field(key))
    }

    pub fn put_field(&mut self, key: &str, value: Value) -> Result<(), VmError> {
        match self.fields.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            },
            None => Err(self.unknown_field(key)),
        }
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    fn unknown_field(&self, key: &str) -> VmError {
        VmError::UnknownField { class: self.class.name.clone(), key: key.to_owned() }
    }

    pub fn native_field(&self, name: &str) -> Option<&Value> {
        self.native_fields.get(name)
    }

    pub fn set_native_field(&mut self, name: &str, value: Value) {
        self.native_fields.insert(name.to_owned(), value);
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    pub fn array(&self) -> Result<&JvmArray, VmError> {
        match self.array {
            Some(ref array) => Ok(array),
            None => Err(VmError::NotAnArray { class: self.class.name.clone() }),
        }
    }

    pub fn array_mut(&mut self) -> Result<&mut JvmArray, VmError> {
        match self.array {
            Some(ref mut array) => Ok(array),
            None => Err(VmError::NotAnArray { class: self.class.name.clone() }),
        }
    }

    /// The monitor of this object, created on first use.
    pub fn monitor_mut(&mut self) -> &mut Monitor {
        self.monitor.get_or_insert_with(Monitor::new)
    }

    pub fn monitor(&self) -> Option<&Monitor> {
        self.monitor.as_ref()
    }

    /// The copy made by `Object.clone`: same class and field values, a new identity and no
    /// monitor.
    pub fn shallow_clone(&self) -> JvmObject {
        JvmObject {
            id: next_object_id(),
            class: self.class.clone(),
            fields: self.fields.clone(),
            native_fields: self.native_fields.clone(),
            monitor: None,
            array: self.array.clone(),
        }
    }
}

impl fmt::Debug for JvmObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut debug = f.debug_struct("JvmObject");
        debug.field("id", &self.id).field("class", &self.class.name);
        match self.array {
            Some(ref array) => debug.field("length", &array.len()),
            None => debug.field("fields", &self.fields),
        };
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_types() {
        assert_eq!(ArrayType::from_class_name("[I"), ArrayType::Int);
        assert_eq!(ArrayType::from_class_name("[Z"), ArrayType::Boolean);
        assert_eq!(ArrayType::from_class_name("[[I"), ArrayType::Reference);
        assert_eq!(ArrayType::from_class_name("[Ljava/lang/Object;"), ArrayType::Reference);
        assert_eq!(ArrayType::from_atype(10), Some(ArrayType::Int));
        assert_eq!(ArrayType::from_atype(3), None);
    }

    #[test]
    fn array_defaults_and_access() {
        let mut array = JvmArray::new(ArrayType::Double, 3);
        assert_eq!(array.get(2), Value::Double(0.0));
        array.set(1, Value::Double(2.5));
        assert_eq!(array.get(1), Value::Double(2.5));
        assert_eq!(array.check_index(3), None);
        assert_eq!(array.check_index(-1), None);
        assert_eq!(array.check_index(0), Some(0));
        assert_eq!(JvmArray::new(ArrayType::Reference, 1).get(0), Value::NullReference);
        assert_eq!(JvmArray::new(ArrayType::Boolean, 1).get(0), Value::Int(0));
    }
}
