//! Field and method descriptors. §4.3.

use crate::vm::value::Value;

/// The type of a field, parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// An instance of the named class or interface.
    Object(String),
    /// An array with the given component type.
    Array(Box<Type>),
}

impl Type {
    /// Parses a complete field descriptor such as `[Ljava/lang/String;`.
    pub fn parse(descriptor: &str) -> Option<Type> {
        match Type::parse_prefix(descriptor) {
            Some((ty, "")) => Some(ty),
            _ => None,
        }
    }

    /// Parses one field type off the front of `input`, returning the rest.
    fn parse_prefix(input: &str) -> Option<(Type, &str)> {
        let mut chars = input.chars();
        let ty = match chars.next()? {
            'B' => Type::Byte,
            'C' => Type::Char,
            'D' => Type::Double,
            'F' => Type::Float,
            'I' => Type::Int,
            'J' => Type::Long,
            'S' => Type::Short,
            'Z' => Type::Boolean,
            'L' => {
                let rest = chars.as_str();
                let end = rest.find(';')?;
                if end == 0 {
                    return None;
                }
                return Some((Type::Object(rest[..end].to_owned()), &rest[end + 1..]));
            },
            '[' => {
                let (component, rest) = Type::parse_prefix(chars.as_str())?;
                return Some((Type::Array(Box::new(component)), rest));
            },
            _ => return None,
        };
        Some((ty, chars.as_str()))
    }

    /// The value a field of this type holds before it is first assigned.
    pub fn default_value(&self) -> Value {
        match *self {
            Type::Byte | Type::Char | Type::Int | Type::Short | Type::Boolean => Value::Int(0),
            Type::Double => Value::Double(0.0),
            Type::Float => Value::Float(0.0),
            Type::Long => Value::Long(0),
            Type::Object(_) | Type::Array(_) => Value::NullReference,
        }
    }

    pub fn is_category_2(&self) -> bool {
        matches!(*self, Type::Long | Type::Double)
    }

    /// The number of local variable slots a value of this type takes.
    pub fn slots(&self) -> usize {
        if self.is_category_2() { 2 } else { 1 }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(*self, Type::Object(_) | Type::Array(_))
    }

    /// The field descriptor of this type.
    pub fn descriptor(&self) -> String {
        match *self {
            Type::Byte => "B".to_owned(),
            Type::Char => "C".to_owned(),
            Type::Double => "D".to_owned(),
            Type::Float => "F".to_owned(),
            Type::Int => "I".to_owned(),
            Type::Long => "J".to_owned(),
            Type::Short => "S".to_owned(),
            Type::Boolean => "Z".to_owned(),
            Type::Object(ref name) => format!("L{};", name),
            Type::Array(ref component) => format!("[{}", component.descriptor()),
        }
    }

    /// The name the class loader knows this type by: the binary name for classes, the
    /// descriptor for arrays and the keyword for primitives.
    pub fn class_name(&self) -> String {
        match *self {
            Type::Byte => "byte".to_owned(),
            Type::Char => "char".to_owned(),
            Type::Double => "double".to_owned(),
            Type::Float => "float".to_owned(),
            Type::Int => "int".to_owned(),
            Type::Long => "long".to_owned(),
            Type::Short => "short".to_owned(),
            Type::Boolean => "boolean".to_owned(),
            Type::Object(ref name) => name.clone(),
            Type::Array(_) => self.descriptor(),
        }
    }
}

/// The names of the primitive classes created by the bootstrap loader.
pub const PRIMITIVE_CLASS_NAMES: [&str; 9] =
    ["byte", "char", "double", "float", "int", "long", "short", "boolean", "void"];

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<Type>,
    /// `None` for `void`.
    pub ret: Option<Type>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Option<MethodDescriptor> {
        let mut rest = descriptor.strip_prefix('(')?;
        let mut params = vec![];
        while !rest.starts_with(')') {
            let (ty, tail) = Type::parse_prefix(rest)?;
            params.push(ty);
            rest = tail;
        }
        let ret = match &rest[1..] {
            "V" => None,
            ret => Some(Type::parse(ret)?),
        };
        Some(MethodDescriptor { params, ret })
    }

    /// The number of local variable slots taken by the arguments, not counting `this`.
    pub fn arg_slots(&self) -> usize {
        self.params.iter().map(Type::slots).sum()
    }
}
