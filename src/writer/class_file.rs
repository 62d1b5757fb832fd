use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::model::class_file::attributes::ExceptionTableEntry;
use crate::model::class_file::constant_pool::{tags, ConstantPool, ConstantPoolInfo};
use crate::model::class_file::{self, AttributeInfo, ClassFile, FieldInfo, MethodInfo};
use crate::util::modified_utf8;

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

fn write_length<W: Write>(out: &mut W, length: usize) -> io::Result<()> {
    if length > u16::MAX as usize {
        return Err(invalid(format!("table of {} entries does not fit a u2 count", length)));
    }
    out.write_u16::<BigEndian>(length as u16)
}

fn write_cp_info<W: Write>(out: &mut W, info: &ConstantPoolInfo) -> io::Result<()> {
    match *info {
        ConstantPoolInfo::Class { name_index } => {
            out.write_u8(tags::CLASS)?;
            out.write_u16::<BigEndian>(name_index)
        }
        ConstantPoolInfo::FieldRef { class_index, name_and_type_index } => {
            out.write_u8(tags::FIELD_REF)?;
            out.write_u16::<BigEndian>(class_index)?;
            out.write_u16::<BigEndian>(name_and_type_index)
        }
        ConstantPoolInfo::MethodRef { class_index, name_and_type_index } => {
            out.write_u8(tags::METHOD_REF)?;
            out.write_u16::<BigEndian>(class_index)?;
            out.write_u16::<BigEndian>(name_and_type_index)
        }
        ConstantPoolInfo::InterfaceMethodRef { class_index, name_and_type_index } => {
            out.write_u8(tags::INTERFACE_METHOD_REF)?;
            out.write_u16::<BigEndian>(class_index)?;
            out.write_u16::<BigEndian>(name_and_type_index)
        }
        ConstantPoolInfo::String { string_index } => {
            out.write_u8(tags::STRING)?;
            out.write_u16::<BigEndian>(string_index)
        }
        ConstantPoolInfo::Integer { bytes } => {
            out.write_u8(tags::INTEGER)?;
            out.write_u32::<BigEndian>(bytes)
        }
        ConstantPoolInfo::Float { bytes } => {
            out.write_u8(tags::FLOAT)?;
            out.write_u32::<BigEndian>(bytes)
        }
        ConstantPoolInfo::Long { high_bytes, low_bytes } => {
            out.write_u8(tags::LONG)?;
            out.write_u32::<BigEndian>(high_bytes)?;
            out.write_u32::<BigEndian>(low_bytes)
        }
        ConstantPoolInfo::Double { high_bytes, low_bytes } => {
            out.write_u8(tags::DOUBLE)?;
            out.write_u32::<BigEndian>(high_bytes)?;
            out.write_u32::<BigEndian>(low_bytes)
        }
        ConstantPoolInfo::NameAndType { name_index, descriptor_index } => {
            out.write_u8(tags::NAME_AND_TYPE)?;
            out.write_u16::<BigEndian>(name_index)?;
            out.write_u16::<BigEndian>(descriptor_index)
        }
        ConstantPoolInfo::Utf8 { ref value } => {
            let bytes = modified_utf8::encode(value);
            out.write_u8(tags::UTF_8)?;
            write_length(out, bytes.len())?;
            out.write_all(&bytes)
        }
        ConstantPoolInfo::MethodHandle { reference_kind, reference_index } => {
            out.write_u8(tags::METHOD_HANDLE)?;
            out.write_u8(reference_kind)?;
            out.write_u16::<BigEndian>(reference_index)
        }
        ConstantPoolInfo::MethodType { descriptor_index } => {
            out.write_u8(tags::METHOD_TYPE)?;
            out.write_u16::<BigEndian>(descriptor_index)
        }
        ConstantPoolInfo::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
            out.write_u8(tags::INVOKE_DYNAMIC)?;
            out.write_u16::<BigEndian>(bootstrap_method_attr_index)?;
            out.write_u16::<BigEndian>(name_and_type_index)
        }
        // Occupies an index but has no bytes of its own.
        ConstantPoolInfo::Unusable => Ok(()),
    }
}

fn write_exception_table_entry<W: Write>(out: &mut W, entry: &ExceptionTableEntry)
                                         -> io::Result<()> {
    out.write_u16::<BigEndian>(entry.start_pc)?;
    out.write_u16::<BigEndian>(entry.end_pc)?;
    out.write_u16::<BigEndian>(entry.handler_pc)?;
    out.write_u16::<BigEndian>(entry.catch_type)
}

fn write_attribute_info(info: &mut Vec<u8>, attribute: &AttributeInfo,
                        constant_pool: &ConstantPool) -> io::Result<()> {
    match *attribute {
        AttributeInfo::ConstantValue { constant_value_index } =>
            info.write_u16::<BigEndian>(constant_value_index),
        AttributeInfo::Code { max_stack, max_locals, ref code, ref exception_table,
                              ref attributes } => {
            info.write_u16::<BigEndian>(max_stack)?;
            info.write_u16::<BigEndian>(max_locals)?;
            info.write_u32::<BigEndian>(code.len() as u32)?;
            info.write_all(code)?;
            write_length(info, exception_table.len())?;
            for entry in exception_table {
                write_exception_table_entry(info, entry)?;
            }
            write_attributes(info, attributes, constant_pool)
        }
        AttributeInfo::Exceptions { ref exception_index_table } => {
            write_length(info, exception_index_table.len())?;
            for &index in exception_index_table {
                info.write_u16::<BigEndian>(index)?;
            }
            Ok(())
        }
        AttributeInfo::SourceFile { sourcefile_index } =>
            info.write_u16::<BigEndian>(sourcefile_index),
        AttributeInfo::LineNumberTable { ref line_number_table } => {
            write_length(info, line_number_table.len())?;
            for line in line_number_table {
                info.write_u16::<BigEndian>(line.start_pc)?;
                info.write_u16::<BigEndian>(line.line_number)?;
            }
            Ok(())
        }
        AttributeInfo::BootstrapMethods { ref bootstrap_methods } => {
            write_length(info, bootstrap_methods.len())?;
            for method in bootstrap_methods {
                info.write_u16::<BigEndian>(method.bootstrap_method_ref)?;
                write_length(info, method.bootstrap_arguments.len())?;
                for &argument in &method.bootstrap_arguments {
                    info.write_u16::<BigEndian>(argument)?;
                }
            }
            Ok(())
        }
        AttributeInfo::Unknown { info: ref bytes, .. } => info.write_all(bytes),
    }
}

fn write_attribute<W: Write>(out: &mut W, attribute: &AttributeInfo,
                             constant_pool: &ConstantPool) -> io::Result<()> {
    let attribute_name_index = match *attribute {
        AttributeInfo::Unknown { attribute_name_index, .. } => attribute_name_index,
        ref known => {
            let name = known.name().unwrap_or_default();
            constant_pool.find_utf8(name).ok_or_else(|| {
                invalid(format!("constant pool has no entry for attribute name {}", name))
            })?
        }
    };
    let mut info = vec![];
    write_attribute_info(&mut info, attribute, constant_pool)?;
    out.write_u16::<BigEndian>(attribute_name_index)?;
    out.write_u32::<BigEndian>(info.len() as u32)?;
    out.write_all(&info)
}

fn write_attributes<W: Write>(out: &mut W, attributes: &[AttributeInfo],
                              constant_pool: &ConstantPool) -> io::Result<()> {
    write_length(out, attributes.len())?;
    for attribute in attributes {
        write_attribute(out, attribute, constant_pool)?;
    }
    Ok(())
}

fn write_field<W: Write>(out: &mut W, field: &FieldInfo, constant_pool: &ConstantPool)
                         -> io::Result<()> {
    out.write_u16::<BigEndian>(field.access_flags)?;
    out.write_u16::<BigEndian>(field.name_index)?;
    out.write_u16::<BigEndian>(field.descriptor_index)?;
    write_attributes(out, &field.attributes, constant_pool)
}

fn write_method<W: Write>(out: &mut W, method: &MethodInfo, constant_pool: &ConstantPool)
                          -> io::Result<()> {
    out.write_u16::<BigEndian>(method.access_flags)?;
    out.write_u16::<BigEndian>(method.name_index)?;
    out.write_u16::<BigEndian>(method.descriptor_index)?;
    write_attributes(out, &method.attributes, constant_pool)
}

/// Writes `class` in the class file format.
///
/// Known attributes are written under the first `Utf8` entry holding their name, which must
/// already be present in the constant pool.
pub fn write_class_file<W: Write>(out: &mut W, class: &ClassFile) -> io::Result<()> {
    let constant_pool = &class.constant_pool;
    out.write_u32::<BigEndian>(class_file::MAGIC)?;
    out.write_u16::<BigEndian>(class.minor_version)?;
    out.write_u16::<BigEndian>(class.major_version)?;
    write_length(out, constant_pool.len() + 1)?;
    for info in constant_pool {
        write_cp_info(out, info)?;
    }
    out.write_u16::<BigEndian>(class.access_flags)?;
    out.write_u16::<BigEndian>(class.this_class)?;
    out.write_u16::<BigEndian>(class.super_class)?;
    write_length(out, class.interfaces.len())?;
    for &interface in &class.interfaces {
        out.write_u16::<BigEndian>(interface)?;
    }
    write_length(out, class.fields.len())?;
    for field in &class.fields {
        write_field(out, field, constant_pool)?;
    }
    write_length(out, class.methods.len())?;
    for method in &class.methods {
        write_method(out, method, constant_pool)?;
    }
    write_attributes(out, &class.attributes, constant_pool)
}

/// Serializes `class` into a fresh buffer.
pub fn to_bytes(class: &ClassFile) -> io::Result<Vec<u8>> {
    let mut bytes = vec![];
    write_class_file(&mut bytes, class)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::to_bytes;
    use crate::model::class_file::{field_access_flags, method_access_flags, AttributeInfo};
    use crate::parser::class_file::parse_class_file;
    use crate::util::class_builder::{code_attribute, ClassBuilder};

    #[test]
    fn header_is_big_endian() {
        let class = ClassBuilder::new("A", None).build();
        let bytes = to_bytes(&class).unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(&bytes[6..8], &[0x00, 52]);
    }

    #[test]
    fn parse_then_write_reproduces_the_bytes() {
        let mut builder = ClassBuilder::new("Point", Some("java/lang/Object"));
        builder.interface("java/lang/Cloneable");
        builder.field(field_access_flags::ACC_PRIVATE, "x", "I");
        let seven = builder.integer(7);
        let origin = builder.long(-1);
        builder.static_constant("ORIGIN", "J", origin);
        builder.method(method_access_flags::ACC_PUBLIC, "x", "()I",
                       vec![code_attribute(1, 1, vec![0x13, (seven >> 8) as u8, seven as u8, 0xac],
                                           vec![])]);
        let source = builder.utf8("Point.java");
        builder.attribute(AttributeInfo::SourceFile { sourcefile_index: source });
        let bytes = to_bytes(&builder.build()).unwrap();

        let class = parse_class_file(&bytes).unwrap();
        assert_eq!(to_bytes(&class).unwrap(), bytes);
        assert_eq!(parse_class_file(&to_bytes(&class).unwrap()).unwrap(), class);
    }
}
