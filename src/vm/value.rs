//! Internal JVM representations of Java values.

use std::fmt;
use std::rc::Rc;

use crate::vm::error::VmError;
use crate::vm::heap::ObjectRef;

/// A value in the Java virtual machine.
#[derive(Clone)]
pub enum Value {
    /// A 32-bit signed integral type, representing the Java types `byte`, `char`, `short`, `int`,
    /// and `boolean`.
    Int(i32),
    /// A 32-bit floating-point type, representing the Java type `float`.
    Float(f32),
    /// A 64-bit signed integral type, representing the Java type `long`.
    Long(i64),
    /// A 64-bit floating-point type, representing the Java type `double`.
    Double(f64),
    /// A reference to a Java object or array in the heap.
    Reference(ObjectRef),
    /// A reference to a Java object which is `null`.
    NullReference,
    /// The `returnAddress` pushed by `jsr` and consumed by `ret`.
    ReturnAddress(usize),
}

impl Value {
    /// `long` and `double` take up two operand stack slots and two local variables.
    pub fn is_category_2(&self) -> bool {
        matches!(*self, Value::Long(_) | Value::Double(_))
    }

    pub fn from_bool(value: bool) -> Value {
        Value::Int(value as i32)
    }

    /// Wraps an optional heap reference, mapping `None` to `null`.
    pub fn from_reference(reference: Option<ObjectRef>) -> Value {
        match reference {
            Some(object) => Value::Reference(object),
            None => Value::NullReference,
        }
    }

    pub fn as_int(&self) -> Result<i32, VmError> {
        match *self {
            Value::Int(value) => Ok(value),
            ref other => Err(mismatch("int", other)),
        }
    }

    pub fn as_float(&self) -> Result<f32, VmError> {
        match *self {
            Value::Float(value) => Ok(value),
            ref other => Err(mismatch("float", other)),
        }
    }

    pub fn as_long(&self) -> Result<i64, VmError> {
        match *self {
            Value::Long(value) => Ok(value),
            ref other => Err(mismatch("long", other)),
        }
    }

    pub fn as_double(&self) -> Result<f64, VmError> {
        match *self {
            Value::Double(value) => Ok(value),
            ref other => Err(mismatch("double", other)),
        }
    }

    /// Returns the referenced object, or `None` for `null`.
    pub fn as_reference(&self) -> Result<Option<ObjectRef>, VmError> {
        match *self {
            Value::Reference(ref object) => Ok(Some(object.clone())),
            Value::NullReference => Ok(None),
            ref other => Err(mismatch("reference", other)),
        }
    }

    pub fn as_return_address(&self) -> Result<usize, VmError> {
        match *self {
            Value::ReturnAddress(address) => Ok(address),
            ref other => Err(mismatch("returnAddress", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> VmError {
    VmError::TypeMismatch { expected, found: format!("{:?}", found) }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(value) => write!(f, "Int({})", value),
            Value::Float(value) => write!(f, "Float({})", value),
            Value::Long(value) => write!(f, "Long({})", value),
            Value::Double(value) => write!(f, "Double({})", value),
            // only the class name, objects can reach themselves through their fields
            Value::Reference(ref object) => match object.try_borrow() {
                Ok(object) => write!(f, "Reference({}@{})", object.class().name, object.id()),
                Err(_) => write!(f, "Reference(<borrowed>)"),
            },
            Value::NullReference => write!(f, "NullReference"),
            Value::ReturnAddress(address) => write!(f, "ReturnAddress({})", address),
        }
    }
}

/// References compare by identity. Floating-point values compare by bits, so `NaN == NaN`.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (&Value::Int(a), &Value::Int(b)) => a == b,
            (&Value::Float(a), &Value::Float(b)) => a.to_bits() == b.to_bits(),
            (&Value::Long(a), &Value::Long(b)) => a == b,
            (&Value::Double(a), &Value::Double(b)) => a.to_bits() == b.to_bits(),
            (&Value::Reference(ref a), &Value::Reference(ref b)) => Rc::ptr_eq(a, b),
            (&Value::NullReference, &Value::NullReference) => true,
            (&Value::ReturnAddress(a), &Value::ReturnAddress(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_2() {
        assert!(Value::Long(1).is_category_2());
        assert!(Value::Double(1.0).is_category_2());
        assert!(!Value::Int(1).is_category_2());
        assert!(!Value::NullReference.is_category_2());
    }

    #[test]
    fn typed_accessors_reject_other_kinds() {
        assert_eq!(Value::Int(7).as_int().unwrap(), 7);
        assert!(Value::Float(1.0).as_int().is_err());
        assert!(Value::Int(0).as_reference().is_err());
        assert!(Value::NullReference.as_reference().unwrap().is_none());
    }

    #[test]
    fn nan_equals_itself() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }
}
