use super::u1;
use super::u2;
use super::u4;

use crate::util::one_indexed_vec::OneIndexedVec;

#[allow(non_camel_case_types)]
pub type constant_pool_index = u2;

/// The constant pool of a class file. Index 0 is never valid.
pub type ConstantPool = OneIndexedVec<ConstantPoolInfo>;

pub mod tags {
    use super::super::u1;
    pub const CLASS: u1 = 7;
    pub const FIELD_REF: u1 = 9;
    pub const METHOD_REF: u1 = 10;
    pub const INTERFACE_METHOD_REF: u1 = 11;
    pub const STRING: u1 = 8;
    pub const INTEGER: u1 = 3;
    pub const FLOAT: u1 = 4;
    pub const LONG: u1 = 5;
    pub const DOUBLE: u1 = 6;
    pub const NAME_AND_TYPE: u1 = 12;
    pub const UTF_8: u1 = 1;
    pub const METHOD_HANDLE: u1 = 15;
    pub const METHOD_TYPE: u1 = 16;
    pub const INVOKE_DYNAMIC: u1 = 18;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Class,
    FieldRef,
    MethodRef,
    InterfaceMethodRef,
    String,
    Integer,
    Float,
    Long,
    Double,
    NameAndType,
    Utf8,
    MethodHandle,
    MethodType,
    InvokeDynamic,
    Unusable,
    Unknown(u1),
}

impl From<u1> for Tag {
    fn from(tag: u1) -> Self {
        match tag {
            tags::CLASS => Tag::Class,
            tags::FIELD_REF => Tag::FieldRef,
            tags::METHOD_REF => Tag::MethodRef,
            tags::INTERFACE_METHOD_REF => Tag::InterfaceMethodRef,
            tags::STRING => Tag::String,
            tags::INTEGER => Tag::Integer,
            tags::FLOAT => Tag::Float,
            tags::LONG => Tag::Long,
            tags::DOUBLE => Tag::Double,
            tags::NAME_AND_TYPE => Tag::NameAndType,
            tags::UTF_8 => Tag::Utf8,
            tags::METHOD_HANDLE => Tag::MethodHandle,
            tags::METHOD_TYPE => Tag::MethodType,
            tags::INVOKE_DYNAMIC => Tag::InvokeDynamic,
            _ => Tag::Unknown(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantPoolInfo {
    Class { name_index: constant_pool_index },
    FieldRef { class_index: constant_pool_index, name_and_type_index: constant_pool_index },
    MethodRef { class_index: constant_pool_index, name_and_type_index: constant_pool_index },
    InterfaceMethodRef {
        class_index: constant_pool_index,
        name_and_type_index: constant_pool_index
    },
    String { string_index: constant_pool_index },
    Integer { bytes: u4 },
    Float { bytes: u4 },
    Long { high_bytes: u4, low_bytes: u4 },
    Double { high_bytes: u4, low_bytes: u4 },
    NameAndType {
        name_index: constant_pool_index,
        descriptor_index: constant_pool_index,
    },
    /// Holds the decoded form of a modified UTF-8 string.
    Utf8 { value: String },
    MethodHandle { reference_kind: u1, reference_index: constant_pool_index },
    MethodType { descriptor_index: constant_pool_index },
    InvokeDynamic {
        bootstrap_method_attr_index: u2,
        name_and_type_index: constant_pool_index,
    },
    /// The slot following a `Long` or `Double` entry. It is never referenced.
    Unusable,
}

impl ConstantPoolInfo {
    pub fn tag(&self) -> Tag {
        match *self {
            ConstantPoolInfo::Class { .. } => Tag::Class,
            ConstantPoolInfo::FieldRef { .. } => Tag::FieldRef,
            ConstantPoolInfo::MethodRef { .. } => Tag::MethodRef,
            ConstantPoolInfo::InterfaceMethodRef { .. } => Tag::InterfaceMethodRef,
            ConstantPoolInfo::String { .. } => Tag::String,
            ConstantPoolInfo::Integer { .. } => Tag::Integer,
            ConstantPoolInfo::Float { .. } => Tag::Float,
            ConstantPoolInfo::Long { .. } => Tag::Long,
            ConstantPoolInfo::Double { .. } => Tag::Double,
            ConstantPoolInfo::NameAndType { .. } => Tag::NameAndType,
            ConstantPoolInfo::Utf8 { .. } => Tag::Utf8,
            ConstantPoolInfo::MethodHandle { .. } => Tag::MethodHandle,
            ConstantPoolInfo::MethodType { .. } => Tag::MethodType,
            ConstantPoolInfo::InvokeDynamic { .. } => Tag::InvokeDynamic,
            ConstantPoolInfo::Unusable => Tag::Unusable,
        }
    }

    /// Returns true for the entries which take up two slots in the constant pool.
    pub fn is_wide(&self) -> bool {
        match *self {
            ConstantPoolInfo::Long { .. } | ConstantPoolInfo::Double { .. } => true,
            _ => false,
        }
    }
}

impl OneIndexedVec<ConstantPoolInfo> {
    /// Returns the string held by the `Utf8` entry at `index`.
    pub fn utf8(&self, index: constant_pool_index) -> Option<&str> {
        match self.get(index as usize) {
            Some(ConstantPoolInfo::Utf8 { value }) => Some(value),
            _ => None,
        }
    }

    /// Returns the name referenced by the `Class` entry at `index`.
    pub fn class_name(&self, index: constant_pool_index) -> Option<&str> {
        match self.get(index as usize) {
            Some(&ConstantPoolInfo::Class { name_index }) => self.utf8(name_index),
            _ => None,
        }
    }

    /// Returns the index of the first `Utf8` entry equal to `value`.
    pub fn find_utf8(&self, value: &str) -> Option<constant_pool_index> {
        self.iter().position(|info| match info {
            ConstantPoolInfo::Utf8 { value: v } => v == value,
            _ => false,
        }).map(|position| (position + 1) as constant_pool_index)
    }
}
