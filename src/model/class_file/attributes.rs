use super::u1;
use super::u2;
use super::constant_pool_index;

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionTableEntry {
    /// Indicates the (inclusive) start of the range in the `code` array at
    /// which the exception handler is active. The exception handler is active
    /// in the range `[start_pc, end_pc)`.
    pub start_pc: u2,
    /// Indicates the (exclusive) end of the range in the `code` array at which
    /// the exception handler is active.
    pub end_pc: u2,
    /// The start of the exception handler.
    pub handler_pc: u2,
    /// Zero, or an index of a `ConstantPoolInfo::Class` naming the class of
    /// exceptions this handler catches. Zero catches everything (`finally`).
    pub catch_type: constant_pool_index,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineNumberInfo {
    pub start_pc: u2,
    pub line_number: u2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    pub bootstrap_method_ref: constant_pool_index,
    pub bootstrap_arguments: Vec<constant_pool_index>,
}

/// The attribute names the reader decodes. Every other name is kept as `AttributeInfo::Unknown`.
pub mod names {
    pub const CONSTANT_VALUE: &str = "ConstantValue";
    pub const CODE: &str = "Code";
    pub const EXCEPTIONS: &str = "Exceptions";
    pub const SOURCE_FILE: &str = "SourceFile";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeInfo {
    ConstantValue { constant_value_index: constant_pool_index },
    Code {
        max_stack: u2,
        max_locals: u2,
        code: Vec<u1>,
        exception_table: Vec<ExceptionTableEntry>,
        attributes: Vec<AttributeInfo>,
    },
    Exceptions {
        /// Each entry is an index of a `ConstantPoolInfo::Class` naming a class
        /// this method is declared to throw.
        exception_index_table: Vec<constant_pool_index>,
    },
    SourceFile {
        sourcefile_index: constant_pool_index,
    },
    LineNumberTable {
        line_number_table: Vec<LineNumberInfo>,
    },
    BootstrapMethods {
        bootstrap_methods: Vec<BootstrapMethod>,
    },
    /// An attribute this reader does not interpret. The bytes are preserved as they were read.
    Unknown {
        attribute_name_index: constant_pool_index,
        info: Vec<u1>,
    },
}

impl AttributeInfo {
    /// The name under which this attribute is stored in a class file, when it is a known one.
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            AttributeInfo::ConstantValue { .. } => Some(names::CONSTANT_VALUE),
            AttributeInfo::Code { .. } => Some(names::CODE),
            AttributeInfo::Exceptions { .. } => Some(names::EXCEPTIONS),
            AttributeInfo::SourceFile { .. } => Some(names::SOURCE_FILE),
            AttributeInfo::LineNumberTable { .. } => Some(names::LINE_NUMBER_TABLE),
            AttributeInfo::BootstrapMethods { .. } => Some(names::BOOTSTRAP_METHODS),
            AttributeInfo::Unknown { .. } => None,
        }
    }
}
