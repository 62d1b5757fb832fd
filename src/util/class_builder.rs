//! Assembles a `ClassFile` in memory, deduplicating constant pool entries as they are added.
//!
//! ```
//! use jvm_engine::model::class_file::method_access_flags::{ACC_PUBLIC, ACC_STATIC};
//! use jvm_engine::util::class_builder::{code_attribute, ClassBuilder};
//!
//! let mut builder = ClassBuilder::new("Answer", Some("java/lang/Object"));
//! let answer = builder.integer(42);
//! builder.method(ACC_PUBLIC | ACC_STATIC, "get", "()I",
//!                vec![code_attribute(1, 0, vec![0x12, answer as u8, 0xac], vec![])]);
//! let class = builder.build();
//! assert_eq!(class.this_class_name(), Some("Answer"));
//! ```

use crate::model::class_file::attributes::ExceptionTableEntry;
use crate::model::class_file::{class_access_flags, constant_pool_index, field_access_flags,
                               u1, u2, AttributeInfo, ClassFile, ConstantPool, ConstantPoolInfo,
                               FieldInfo, MethodInfo};

/// The class file version written by the builder (Java SE 8).
pub const MAJOR_VERSION: u2 = 52;

pub struct ClassBuilder {
    constant_pool: ConstantPool,
    access_flags: class_access_flags::t,
    this_class: constant_pool_index,
    super_class: constant_pool_index,
    interfaces: Vec<constant_pool_index>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    attributes: Vec<AttributeInfo>,
}

/// Builds a `Code` attribute.
pub fn code_attribute(max_stack: u2, max_locals: u2, code: Vec<u1>,
                      exception_table: Vec<ExceptionTableEntry>) -> AttributeInfo {
    AttributeInfo::Code { max_stack, max_locals, code, exception_table, attributes: vec![] }
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut builder = ClassBuilder {
            constant_pool: ConstantPool::new(),
            access_flags: class_access_flags::ACC_PUBLIC | class_access_flags::ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        };
        builder.this_class = builder.class(name);
        if let Some(super_name) = super_name {
            builder.super_class = builder.class(super_name);
        }
        builder
    }

    fn add(&mut self, info: ConstantPoolInfo) -> constant_pool_index {
        if let Some(position) = self.constant_pool.iter().position(|existing| *existing == info) {
            return (position + 1) as constant_pool_index;
        }
        let wide = info.is_wide();
        let index = self.constant_pool.push(info);
        if wide {
            self.constant_pool.push(ConstantPoolInfo::Unusable);
        }
        index as constant_pool_index
    }

    pub fn access_flags(&mut self, access_flags: class_access_flags::t) -> &mut Self {
        self.access_flags = access_flags;
        self
    }

    pub fn utf8(&mut self, value: &str) -> constant_pool_index {
        self.add(ConstantPoolInfo::Utf8 { value: value.to_owned() })
    }

    pub fn class(&mut self, name: &str) -> constant_pool_index {
        let name_index = self.utf8(name);
        self.add(ConstantPoolInfo::Class { name_index })
    }

    pub fn string(&mut self, value: &str) -> constant_pool_index {
        let string_index = self.utf8(value);
        self.add(ConstantPoolInfo::String { string_index })
    }

    pub fn integer(&mut self, value: i32) -> constant_pool_index {
        self.add(ConstantPoolInfo::Integer { bytes: value as u32 })
    }

    pub fn float(&mut self, value: f32) -> constant_pool_index {
        self.add(ConstantPoolInfo::Float { bytes: value.to_bits() })
    }

    pub fn long(&mut self, value: i64) -> constant_pool_index {
        let bits = value as u64;
        self.add(ConstantPoolInfo::Long { high_bytes: (bits >> 32) as u32, low_bytes: bits as u32 })
    }

    pub fn double(&mut self, value: f64) -> constant_pool_index {
        let bits = value.to_bits();
        self.add(ConstantPoolInfo::Double {
            high_bytes: (bits >> 32) as u32,
            low_bytes: bits as u32,
        })
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> constant_pool_index {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.add(ConstantPoolInfo::NameAndType { name_index, descriptor_index })
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str)
                     -> constant_pool_index {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.add(ConstantPoolInfo::FieldRef { class_index, name_and_type_index })
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str)
                      -> constant_pool_index {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.add(ConstantPoolInfo::MethodRef { class_index, name_and_type_index })
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str)
                                -> constant_pool_index {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.add(ConstantPoolInfo::InterfaceMethodRef { class_index, name_and_type_index })
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    fn register_attribute_names(&mut self, attributes: &[AttributeInfo]) {
        for attribute in attributes {
            if let Some(name) = attribute.name() {
                self.utf8(name);
            }
            if let AttributeInfo::Code { ref attributes, .. } = *attribute {
                self.register_attribute_names(attributes);
            }
        }
    }

    pub fn field(&mut self, access_flags: field_access_flags::t, name: &str, descriptor: &str)
                 -> &mut Self {
        self.field_with_attributes(access_flags, name, descriptor, vec![])
    }

    pub fn field_with_attributes(&mut self, access_flags: field_access_flags::t, name: &str,
                                 descriptor: &str, attributes: Vec<AttributeInfo>) -> &mut Self {
        self.register_attribute_names(&attributes);
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.push(FieldInfo { access_flags, name_index, descriptor_index, attributes });
        self
    }

    /// Adds a `static final` field initialised from the constant at `constant_value_index`.
    pub fn static_constant(&mut self, name: &str, descriptor: &str,
                           constant_value_index: constant_pool_index) -> &mut Self {
        self.field_with_attributes(field_access_flags::ACC_STATIC | field_access_flags::ACC_FINAL,
                                   name, descriptor,
                                   vec![AttributeInfo::ConstantValue { constant_value_index }])
    }

    pub fn method(&mut self, access_flags: u2, name: &str, descriptor: &str,
                  attributes: Vec<AttributeInfo>) -> &mut Self {
        self.register_attribute_names(&attributes);
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.methods.push(MethodInfo { access_flags, name_index, descriptor_index, attributes });
        self
    }

    pub fn attribute(&mut self, attribute: AttributeInfo) -> &mut Self {
        self.register_attribute_names(std::slice::from_ref(&attribute));
        self.attributes.push(attribute);
        self
    }

    pub fn build(self) -> ClassFile {
        ClassFile {
            minor_version: 0,
            major_version: MAJOR_VERSION,
            constant_pool: self.constant_pool,
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            attributes: self.attributes,
        }
    }
}
