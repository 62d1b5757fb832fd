use nom::bytes::complete::take;
use nom::error::{ErrorKind, ParseError};
use nom::multi::count;
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::IResult;
use thiserror::Error;

use crate::model::class_file;
use crate::model::class_file::attributes::{names, BootstrapMethod, ExceptionTableEntry,
                                           LineNumberInfo};
use crate::model::class_file::constant_pool::{self, ConstantPool, ConstantPoolInfo};
use crate::model::class_file::{AttributeInfo, ClassFile, FieldInfo, MethodInfo};
use crate::util::modified_utf8;

pub type Input<'a> = &'a [u8];
pub type ParseResult<'a, O> = IResult<Input<'a>, O, Error>;
pub type ConstantPoolIndex = class_file::constant_pool_index;

/// Code arrays must be non-empty and shorter than this many bytes (JVMS §4.7.3).
const MAX_CODE_LENGTH: u32 = 65536;

/// The reasons a byte buffer is rejected as a class file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("bad magic number")]
    Magic,
    #[error("class file is truncated")]
    Truncated,
    #[error("{count} unexpected bytes after the end of the class file")]
    TrailingBytes { count: usize },
    #[error("unknown constant pool tag {tag}")]
    UnknownConstantPoolTag { tag: u8 },
    #[error("constant pool index {index} is out of bounds")]
    ConstantPoolIndexOutOfBounds { index: usize },
    #[error("constant pool entry {index} should be {expected:?} but is {actual:?}")]
    UnexpectedConstantPoolType {
        index: usize,
        expected: constant_pool::Tag,
        actual: constant_pool::Tag,
    },
    #[error("illegal modified UTF-8 in constant pool entry {index}: {source}")]
    ModifiedUtf8 { index: usize, source: modified_utf8::Error },
    #[error("illegal method handle reference kind {kind}")]
    ReferenceKind { kind: u8 },
    #[error("illegal code length {length}")]
    CodeLength { length: u32 },
    #[error("attribute {attribute_name} declares {attribute_length} bytes but uses {used}")]
    AttributeLength { attribute_name: String, attribute_length: usize, used: usize },
    #[error("parser error: {0:?}")]
    Nom(ErrorKind),
}

impl<'a> ParseError<Input<'a>> for Error {
    fn from_error_kind(_: Input<'a>, kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Eof => Error::Truncated,
            kind => Error::Nom(kind),
        }
    }

    fn append(_: Input<'a>, _: ErrorKind, other: Self) -> Self {
        other
    }
}

fn fail<'a, O>(error: Error) -> ParseResult<'a, O> {
    Err(nom::Err::Failure(error))
}

fn u1(input: Input) -> ParseResult<u8> {
    be_u8(input)
}

fn u2(input: Input) -> ParseResult<u16> {
    be_u16(input)
}

fn u4(input: Input) -> ParseResult<u32> {
    be_u32(input)
}

fn bytes(input: Input, length: usize) -> ParseResult<Input> {
    take(length)(input)
}

fn check_cp_index_tag(constant_pool: &ConstantPool, index: ConstantPoolIndex,
                      tag: constant_pool::Tag) -> Result<(), Error> {
    match constant_pool.get(index as usize) {
        None => Err(Error::ConstantPoolIndexOutOfBounds { index: index as usize }),
        Some(info) if info.tag() == tag => Ok(()),
        Some(info) => Err(Error::UnexpectedConstantPoolType {
            index: index as usize,
            expected: tag,
            actual: info.tag(),
        }),
    }
}

/// Parses for a constant pool index and verifies that the entry in the
/// constant pool matches the specified tag.
fn cp_index_tag<'a>(input: Input<'a>, constant_pool: &ConstantPool, tag: constant_pool::Tag)
                    -> ParseResult<'a, ConstantPoolIndex> {
    let (input, index) = u2(input)?;
    match check_cp_index_tag(constant_pool, index, tag) {
        Ok(()) => Ok((input, index)),
        Err(e) => fail(e),
    }
}

/// Parses for a constant pool index that might be zero and verifies that
/// the entry in the constant pool matches the specified tag.
fn maybe_cp_index_tag<'a>(input: Input<'a>, constant_pool: &ConstantPool, tag: constant_pool::Tag)
                          -> ParseResult<'a, ConstantPoolIndex> {
    let (rest, index) = u2(input)?;
    if index == 0 {
        Ok((rest, 0))
    } else {
        cp_index_tag(input, constant_pool, tag)
    }
}

fn cp_info(input: Input, index: usize) -> ParseResult<ConstantPoolInfo> {
    let (input, tag) = u1(input)?;
    match constant_pool::Tag::from(tag) {
        constant_pool::Tag::Class => {
            let (input, name_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::Class { name_index }))
        }
        constant_pool::Tag::FieldRef => {
            let (input, class_index) = u2(input)?;
            let (input, name_and_type_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::FieldRef { class_index, name_and_type_index }))
        }
        constant_pool::Tag::MethodRef => {
            let (input, class_index) = u2(input)?;
            let (input, name_and_type_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::MethodRef { class_index, name_and_type_index }))
        }
        constant_pool::Tag::InterfaceMethodRef => {
            let (input, class_index) = u2(input)?;
            let (input, name_and_type_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::InterfaceMethodRef { class_index, name_and_type_index }))
        }
        constant_pool::Tag::String => {
            let (input, string_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::String { string_index }))
        }
        constant_pool::Tag::Integer => {
            let (input, bytes) = u4(input)?;
            Ok((input, ConstantPoolInfo::Integer { bytes }))
        }
        constant_pool::Tag::Float => {
            let (input, bytes) = u4(input)?;
            Ok((input, ConstantPoolInfo::Float { bytes }))
        }
        constant_pool::Tag::Long => {
            let (input, high_bytes) = u4(input)?;
            let (input, low_bytes) = u4(input)?;
            Ok((input, ConstantPoolInfo::Long { high_bytes, low_bytes }))
        }
        constant_pool::Tag::Double => {
            let (input, high_bytes) = u4(input)?;
            let (input, low_bytes) = u4(input)?;
            Ok((input, ConstantPoolInfo::Double { high_bytes, low_bytes }))
        }
        constant_pool::Tag::NameAndType => {
            let (input, name_index) = u2(input)?;
            let (input, descriptor_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::NameAndType { name_index, descriptor_index }))
        }
        constant_pool::Tag::Utf8 => {
            let (input, length) = u2(input)?;
            let (input, raw) = bytes(input, length as usize)?;
            match modified_utf8::decode(raw) {
                Ok(value) => Ok((input, ConstantPoolInfo::Utf8 { value })),
                Err(source) => fail(Error::ModifiedUtf8 { index, source }),
            }
        }
        constant_pool::Tag::MethodHandle => {
            let (input, reference_kind) = u1(input)?;
            if !(1..=9).contains(&reference_kind) {
                return fail(Error::ReferenceKind { kind: reference_kind });
            }
            let (input, reference_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::MethodHandle { reference_kind, reference_index }))
        }
        constant_pool::Tag::MethodType => {
            let (input, descriptor_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::MethodType { descriptor_index }))
        }
        constant_pool::Tag::InvokeDynamic => {
            let (input, bootstrap_method_attr_index) = u2(input)?;
            let (input, name_and_type_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }))
        }
        constant_pool::Tag::Unusable | constant_pool::Tag::Unknown(_) =>
            fail(Error::UnknownConstantPoolTag { tag }),
    }
}

/// Reads `constant_pool_count - 1` slots. `Long` and `Double` entries are followed by an
/// `Unusable` placeholder so that every later index still lines up.
fn constant_pool(input: Input) -> ParseResult<ConstantPool> {
    let (mut input, constant_pool_count) = u2(input)?;
    let mut constant_pool = ConstantPool::new();
    let mut index = 1;
    while index < constant_pool_count as usize {
        let (rest, info) = cp_info(input, index)?;
        input = rest;
        let wide = info.is_wide();
        constant_pool.push(info);
        index += 1;
        if wide {
            constant_pool.push(ConstantPoolInfo::Unusable);
            index += 1;
        }
    }
    Ok((input, constant_pool))
}

/// Checks the references between constant pool entries, which may point forwards and so can only
/// be checked once the whole pool has been read.
fn verify_constant_pool(constant_pool: &ConstantPool) -> Result<(), Error> {
    use crate::model::class_file::constant_pool::Tag;

    for info in constant_pool {
        match *info {
            ConstantPoolInfo::Class { name_index } =>
                check_cp_index_tag(constant_pool, name_index, Tag::Utf8)?,
            ConstantPoolInfo::FieldRef { class_index, name_and_type_index } |
            ConstantPoolInfo::MethodRef { class_index, name_and_type_index } |
            ConstantPoolInfo::InterfaceMethodRef { class_index, name_and_type_index } => {
                check_cp_index_tag(constant_pool, class_index, Tag::Class)?;
                check_cp_index_tag(constant_pool, name_and_type_index, Tag::NameAndType)?;
            }
            ConstantPoolInfo::String { string_index } =>
                check_cp_index_tag(constant_pool, string_index, Tag::Utf8)?,
            ConstantPoolInfo::NameAndType { name_index, descriptor_index } => {
                check_cp_index_tag(constant_pool, name_index, Tag::Utf8)?;
                check_cp_index_tag(constant_pool, descriptor_index, Tag::Utf8)?;
            }
            ConstantPoolInfo::MethodType { descriptor_index } =>
                check_cp_index_tag(constant_pool, descriptor_index, Tag::Utf8)?,
            ConstantPoolInfo::InvokeDynamic { name_and_type_index, .. } =>
                check_cp_index_tag(constant_pool, name_and_type_index, Tag::NameAndType)?,
            ConstantPoolInfo::MethodHandle { reference_index, .. } => {
                if constant_pool.get(reference_index as usize).is_none() {
                    return Err(Error::ConstantPoolIndexOutOfBounds {
                        index: reference_index as usize,
                    });
                }
            }
            _ => (),
        }
    }
    Ok(())
}

fn exception_table_entry<'a>(input: Input<'a>, constant_pool: &ConstantPool)
                             -> ParseResult<'a, ExceptionTableEntry> {
    let (input, start_pc) = u2(input)?;
    let (input, end_pc) = u2(input)?;
    let (input, handler_pc) = u2(input)?;
    let (input, catch_type) =
        maybe_cp_index_tag(input, constant_pool, constant_pool::Tag::Class)?;
    Ok((input, ExceptionTableEntry { start_pc, end_pc, handler_pc, catch_type }))
}

fn code<'a>(input: Input<'a>, constant_pool: &ConstantPool) -> ParseResult<'a, AttributeInfo> {
    let (input, max_stack) = u2(input)?;
    let (input, max_locals) = u2(input)?;
    let (input, code_length) = u4(input)?;
    if code_length == 0 || code_length >= MAX_CODE_LENGTH {
        return fail(Error::CodeLength { length: code_length });
    }
    let (input, code) = bytes(input, code_length as usize)?;
    let (input, exception_table_length) = u2(input)?;
    let (input, exception_table) = count(|i| exception_table_entry(i, constant_pool),
                                         exception_table_length as usize)(input)?;
    let (input, attributes) = attributes(input, constant_pool)?;
    Ok((input, AttributeInfo::Code {
        max_stack,
        max_locals,
        code: code.to_vec(),
        exception_table,
        attributes,
    }))
}

fn line_number_info(input: Input) -> ParseResult<LineNumberInfo> {
    let (input, start_pc) = u2(input)?;
    let (input, line_number) = u2(input)?;
    Ok((input, LineNumberInfo { start_pc, line_number }))
}

fn bootstrap_method<'a>(input: Input<'a>, constant_pool: &ConstantPool)
                        -> ParseResult<'a, BootstrapMethod> {
    let (input, bootstrap_method_ref) =
        cp_index_tag(input, constant_pool, constant_pool::Tag::MethodHandle)?;
    let (input, num_bootstrap_arguments) = u2(input)?;
    let (input, bootstrap_arguments) = count(u2, num_bootstrap_arguments as usize)(input)?;
    Ok((input, BootstrapMethod { bootstrap_method_ref, bootstrap_arguments }))
}

/// Decodes the body of a known attribute. Unknown names are preserved as opaque bytes.
fn attribute_info<'a>(info: Input<'a>, attribute_name: &str,
                      attribute_name_index: ConstantPoolIndex, constant_pool: &ConstantPool)
                      -> ParseResult<'a, AttributeInfo> {
    match attribute_name {
        names::CONSTANT_VALUE => {
            let (input, constant_value_index) = u2(info)?;
            if constant_pool.get(constant_value_index as usize).is_none() {
                return fail(Error::ConstantPoolIndexOutOfBounds {
                    index: constant_value_index as usize,
                });
            }
            Ok((input, AttributeInfo::ConstantValue { constant_value_index }))
        }
        names::CODE => code(info, constant_pool),
        names::EXCEPTIONS => {
            let (input, number_of_exceptions) = u2(info)?;
            let (input, exception_index_table) = count(
                |i| cp_index_tag(i, constant_pool, constant_pool::Tag::Class),
                number_of_exceptions as usize)(input)?;
            Ok((input, AttributeInfo::Exceptions { exception_index_table }))
        }
        names::SOURCE_FILE => {
            let (input, sourcefile_index) =
                cp_index_tag(info, constant_pool, constant_pool::Tag::Utf8)?;
            Ok((input, AttributeInfo::SourceFile { sourcefile_index }))
        }
        names::LINE_NUMBER_TABLE => {
            let (input, table_length) = u2(info)?;
            let (input, line_number_table) =
                count(line_number_info, table_length as usize)(input)?;
            Ok((input, AttributeInfo::LineNumberTable { line_number_table }))
        }
        names::BOOTSTRAP_METHODS => {
            let (input, num_bootstrap_methods) = u2(info)?;
            let (input, bootstrap_methods) = count(|i| bootstrap_method(i, constant_pool),
                                                   num_bootstrap_methods as usize)(input)?;
            Ok((input, AttributeInfo::BootstrapMethods { bootstrap_methods }))
        }
        _ => Ok((&info[info.len()..], AttributeInfo::Unknown {
            attribute_name_index,
            info: info.to_vec(),
        })),
    }
}

fn attribute<'a>(input: Input<'a>, constant_pool: &ConstantPool)
                 -> ParseResult<'a, AttributeInfo> {
    let (input, attribute_name_index) =
        cp_index_tag(input, constant_pool, constant_pool::Tag::Utf8)?;
    let (input, attribute_length) = u4(input)?;
    let (input, info) = bytes(input, attribute_length as usize)?;
    let attribute_name = constant_pool.utf8(attribute_name_index).unwrap_or_default();
    let (rest, attribute) = attribute_info(info, attribute_name, attribute_name_index,
                                           constant_pool)?;
    if !rest.is_empty() {
        return fail(Error::AttributeLength {
            attribute_name: attribute_name.to_owned(),
            attribute_length: attribute_length as usize,
            used: info.len() - rest.len(),
        });
    }
    Ok((input, attribute))
}

fn attributes<'a>(input: Input<'a>, constant_pool: &ConstantPool)
                  -> ParseResult<'a, Vec<AttributeInfo>> {
    let (input, attributes_count) = u2(input)?;
    count(|i| attribute(i, constant_pool), attributes_count as usize)(input)
}

fn field<'a>(input: Input<'a>, constant_pool: &ConstantPool) -> ParseResult<'a, FieldInfo> {
    let (input, access_flags) = u2(input)?;
    let (input, name_index) = cp_index_tag(input, constant_pool, constant_pool::Tag::Utf8)?;
    let (input, descriptor_index) =
        cp_index_tag(input, constant_pool, constant_pool::Tag::Utf8)?;
    let (input, attributes) = attributes(input, constant_pool)?;
    Ok((input, FieldInfo { access_flags, name_index, descriptor_index, attributes }))
}

fn method<'a>(input: Input<'a>, constant_pool: &ConstantPool) -> ParseResult<'a, MethodInfo> {
    let (input, access_flags) = u2(input)?;
    let (input, name_index) = cp_index_tag(input, constant_pool, constant_pool::Tag::Utf8)?;
    let (input, descriptor_index) =
        cp_index_tag(input, constant_pool, constant_pool::Tag::Utf8)?;
    let (input, attributes) = attributes(input, constant_pool)?;
    Ok((input, MethodInfo { access_flags, name_index, descriptor_index, attributes }))
}

fn class_file(input: Input) -> ParseResult<ClassFile> {
    let (input, magic) = u4(input)?;
    if magic != class_file::MAGIC {
        return fail(Error::Magic);
    }
    let (input, minor_version) = u2(input)?;
    let (input, major_version) = u2(input)?;
    let (input, constant_pool) = constant_pool(input)?;
    if let Err(e) = verify_constant_pool(&constant_pool) {
        return fail(e);
    }
    let (input, access_flags) = u2(input)?;
    let (input, this_class) = cp_index_tag(input, &constant_pool, constant_pool::Tag::Class)?;
    let (input, super_class) =
        maybe_cp_index_tag(input, &constant_pool, constant_pool::Tag::Class)?;
    let (input, interfaces_count) = u2(input)?;
    let (input, interfaces) =
        count(|i| cp_index_tag(i, &constant_pool, constant_pool::Tag::Class),
              interfaces_count as usize)(input)?;
    let (input, fields_count) = u2(input)?;
    let (input, fields) = count(|i| field(i, &constant_pool), fields_count as usize)(input)?;
    let (input, methods_count) = u2(input)?;
    let (input, methods) = count(|i| method(i, &constant_pool), methods_count as usize)(input)?;
    let (input, attributes) = attributes(input, &constant_pool)?;
    Ok((input, ClassFile {
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    }))
}

/// Parses a complete class file. Any bytes after the last attribute are an error.
pub fn parse_class_file(input: &[u8]) -> Result<ClassFile, Error> {
    match class_file(input) {
        Ok((rest, class)) if rest.is_empty() => Ok(class),
        Ok((rest, _)) => Err(Error::TrailingBytes { count: rest.len() }),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(Error::Truncated),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::class_file::method_access_flags;
    use crate::util::class_builder::{code_attribute, ClassBuilder};
    use crate::writer::class_file::to_bytes;

    fn hello_world() -> ClassFile {
        let mut builder = ClassBuilder::new("HelloWorld", Some("java/lang/Object"));
        let code = code_attribute(1, 1, vec![0x04, 0x3b, 0xb1], vec![]);
        builder.method(method_access_flags::ACC_PUBLIC | method_access_flags::ACC_STATIC,
                       "main", "([Ljava/lang/String;)V", vec![code]);
        builder.build()
    }

    #[test]
    fn test_hello_world() {
        let bytes = to_bytes(&hello_world()).unwrap();
        let class = parse_class_file(&bytes).unwrap();
        assert_eq!(class.this_class_name(), Some("HelloWorld"));
        assert_eq!(class.super_class_name(), Some("java/lang/Object"));
        assert_eq!(class.methods.len(), 1);
        match class.methods[0].attributes[0] {
            AttributeInfo::Code { ref code, max_stack, .. } => {
                assert_eq!(code, &vec![0x04, 0x3b, 0xb1]);
                assert_eq!(max_stack, 1);
            }
            ref other => panic!("expected Code, found {:?}", other),
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = to_bytes(&hello_world()).unwrap();
        bytes[0] = 0xCB;
        assert_eq!(parse_class_file(&bytes), Err(Error::Magic));
    }

    #[test]
    fn test_truncated() {
        let bytes = to_bytes(&hello_world()).unwrap();
        for length in [0, 3, 9, bytes.len() / 2, bytes.len() - 1] {
            assert_eq!(parse_class_file(&bytes[..length]), Err(Error::Truncated),
                       "length {}", length);
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = to_bytes(&hello_world()).unwrap();
        bytes.push(0);
        assert_eq!(parse_class_file(&bytes), Err(Error::TrailingBytes { count: 1 }));
    }

    #[test]
    fn test_empty_code_is_rejected() {
        let mut builder = ClassBuilder::new("Empty", Some("java/lang/Object"));
        builder.method(method_access_flags::ACC_STATIC, "f", "()V",
                       vec![code_attribute(0, 0, vec![], vec![])]);
        let bytes = to_bytes(&builder.build()).unwrap();
        assert_eq!(parse_class_file(&bytes), Err(Error::CodeLength { length: 0 }));
    }

    #[test]
    fn test_oversized_code_is_rejected() {
        let mut builder = ClassBuilder::new("Huge", Some("java/lang/Object"));
        builder.method(method_access_flags::ACC_STATIC, "f", "()V",
                       vec![code_attribute(0, 0, vec![0; 65536], vec![])]);
        let bytes = to_bytes(&builder.build()).unwrap();
        assert_eq!(parse_class_file(&bytes), Err(Error::CodeLength { length: 65536 }));
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut builder = ClassBuilder::new("Wide", Some("java/lang/Object"));
        let long_index = builder.long(1 << 40);
        let double_index = builder.double(2.5);
        let after = builder.utf8("after");
        assert_eq!(double_index, long_index + 2);
        assert_eq!(after, double_index + 2);
        let bytes = to_bytes(&builder.build()).unwrap();
        let class = parse_class_file(&bytes).unwrap();
        assert_eq!(class.constant_pool.get(long_index as usize + 1),
                   Some(&ConstantPoolInfo::Unusable));
        assert_eq!(class.utf8(after), Some("after"));
    }

    #[test]
    fn test_unknown_attribute_is_preserved() {
        let mut builder = ClassBuilder::new("Annotated", Some("java/lang/Object"));
        let name = builder.utf8("Deprecated");
        builder.attribute(AttributeInfo::Unknown { attribute_name_index: name, info: vec![1, 2, 3] });
        let bytes = to_bytes(&builder.build()).unwrap();
        let class = parse_class_file(&bytes).unwrap();
        assert_eq!(class.attributes,
                   vec![AttributeInfo::Unknown { attribute_name_index: name, info: vec![1, 2, 3] }]);
    }

    #[test]
    fn test_illegal_modified_utf8() {
        let mut builder = ClassBuilder::new("Bad", Some("java/lang/Object"));
        let index = builder.utf8("XY");
        let mut bytes = to_bytes(&builder.build()).unwrap();
        let position = bytes.windows(2).position(|w| w == b"XY").unwrap();
        bytes[position] = 0xF8;
        match parse_class_file(&bytes) {
            Err(Error::ModifiedUtf8 { index: i, .. }) => assert_eq!(i, index as usize),
            other => panic!("expected a modified UTF-8 error, found {:?}", other),
        }
    }

    #[test]
    fn test_constant_pool_reference_of_wrong_kind() {
        let mut class = hello_world();
        let name_index = class.methods[0].name_index;
        class.this_class = name_index;
        let bytes = to_bytes(&class).unwrap();
        match parse_class_file(&bytes) {
            Err(Error::UnexpectedConstantPoolType { expected, .. }) =>
                assert_eq!(expected, constant_pool::Tag::Class),
            other => panic!("expected a constant pool type error, found {:?}", other),
        }
    }
}
