//! Structures for the [Java SE 8 JVM class file
//! format](https://docs.oracle.com/javase/specs/jvms/se8/html/jvms-4.html).
//!
//! These are the shapes shared between the binary reader, the writer and anything that
//! produces class files. The loader consumes a `ClassFile` and then discards it.

pub mod access_flags;
pub mod attributes;
pub mod constant_pool;

pub use self::access_flags::class_access_flags;
pub use self::access_flags::field_access_flags;
pub use self::access_flags::method_access_flags;
pub use self::attributes::AttributeInfo;
pub use self::constant_pool::ConstantPool;
pub use self::constant_pool::ConstantPoolInfo;

/// The magic number identifying the class file format.
pub const MAGIC: u4 = 0xCAFE_BABE;

/// Represents an unsigned one-byte quantity.
#[allow(non_camel_case_types)]
pub type u1 = u8;

/// Represents an unsigned two-byte quantity.
#[allow(non_camel_case_types)]
pub type u2 = u16;

/// Represents an unsigned four-byte quantity.
#[allow(non_camel_case_types)]
pub type u4 = u32;

/// Represents an index into the constant pool.
#[allow(non_camel_case_types)]
pub type constant_pool_index = constant_pool::constant_pool_index;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Mask of flags used to denote access permissions to and properties of
    /// this field.
    pub access_flags: field_access_flags::t,
    /// A valid index into the `constant_pool` table. The `constant_pool` entry
    /// at that index must be a `ConstantPoolInfo::Utf8` structure representing
    /// a valid unqualified name denoting a field.
    pub name_index: constant_pool_index,
    /// A valid index into the `constant_pool` table. The `constant_pool` entry
    /// at that index must be a `ConstantPoolInfo::Utf8` structure representing
    /// a valid field descriptor.
    pub descriptor_index: constant_pool_index,
    /// The attributes associated with this field.
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Mask of flags used to denote access permissions to and properties of
    /// this method.
    pub access_flags: method_access_flags::t,
    /// A valid index into the `constant_pool` table. The `constant_pool` entry
    /// at that index must be a `ConstantPoolInfo::Utf8` structure representing
    /// a valid unqualified name denoting a method.
    pub name_index: constant_pool_index,
    /// A valid index into the `constant_pool` table. The `constant_pool` entry
    /// at that index must be a `ConstantPoolInfo::Utf8` structure representing
    /// a valid method descriptor.
    pub descriptor_index: constant_pool_index,
    /// The attributes associated with this method.
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// Minor version number
    pub minor_version: u2,
    /// Major version number
    pub major_version: u2,
    /// Table of structures representing various string constants, class and
    /// interface names, field names, and other constants. The `constant_pool`
    /// table is indexed from 1 to `constant_pool_count - 1`.
    pub constant_pool: ConstantPool,
    /// Mask of flags used to denote access permissions to and properties of
    /// this class or interface.
    pub access_flags: class_access_flags::t,
    /// A valid index into the `constant_pool` table. The `constant_pool` entry
    /// at that index must be a `ConstantPoolInfo::Class` structure representing
    /// the class or interface defined by this class file.
    pub this_class: constant_pool_index,
    /// For a class, must be either zero or a valid index into the
    /// `constant_pool` table. If the value of `super_class` is non-zero, then
    /// the `constant_pool` entry at that index must be a `ConstantPoolInfo::Class`
    /// structure denoting the direct superclass of the class defined by this
    /// class file.
    pub super_class: constant_pool_index,
    /// Each value in `interfaces` must be a valid index into the `constant_pool`
    /// table. The `constant_pool` entry at each value of `interfaces[i]` must be
    /// a `ConstantPoolInfo::Class` structure representing a direct
    /// superinterface of this class or interface type.
    pub interfaces: Vec<constant_pool_index>,
    /// Contains only those fields declared by this class or interface. Does not
    /// include items representing fields that are inherited from superclasses
    /// or superinterfaces.
    pub fields: Vec<FieldInfo>,
    /// Contains only those methods declared by this class or interface. Does
    /// not include items representing methods that are inherited from
    /// superclasses or superinterfaces.
    pub methods: Vec<MethodInfo>,
    /// Contains the attributes of this class.
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Returns the string held by the `Utf8` entry at `index`, if there is one.
    pub fn utf8(&self, index: constant_pool_index) -> Option<&str> {
        self.constant_pool.utf8(index)
    }

    /// Returns the binary name of the class referenced by the `Class` entry at `index`.
    pub fn class_name(&self, index: constant_pool_index) -> Option<&str> {
        self.constant_pool.class_name(index)
    }

    /// The binary name of the class defined by this class file.
    pub fn this_class_name(&self) -> Option<&str> {
        self.class_name(self.this_class)
    }

    /// The binary name of the direct superclass, or `None` for `java/lang/Object`.
    pub fn super_class_name(&self) -> Option<&str> {
        if self.super_class == 0 {
            None
        } else {
            self.class_name(self.super_class)
        }
    }
}
