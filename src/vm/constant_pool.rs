//! The runtime constant pool of a loaded class. §5.1
//!
//! Every entry starts out `Unresolved`, holding the constant exactly as it was read from the
//! class file. Resolving a symbolic reference replaces the entry with its `Resolved` form, so
//! each slot is resolved at most once and later lookups return the same `Rc`. Failed resolutions
//! leave the entry untouched.

use std::cell::RefCell;
use std::rc::Rc;

use crate::model::class_file::constant_pool::Tag;
use crate::model::class_file::{ConstantPool, ConstantPoolInfo};
use crate::util::one_indexed_vec::OneIndexedVec;
use crate::vm::class::Class;
use crate::vm::error::{names, ExecResult, JavaException, VmError};
use crate::vm::heap::ObjectRef;
use crate::vm::member::{Field, Method};
use crate::vm::value::Value;
use crate::vm::Jvm;

/// A direct reference produced by resolution.
#[derive(Debug, Clone)]
pub enum Resolved {
    Class(Rc<Class>),
    Field(Rc<Field>),
    Method(Rc<Method>),
    /// The interned `java/lang/String` for a `String` constant.
    String(ObjectRef),
}

#[derive(Debug, Clone)]
pub enum ConstantEntry {
    Unresolved(ConstantPoolInfo),
    Resolved(Resolved),
}

#[derive(Debug)]
pub struct RuntimeConstantPool {
    entries: RefCell<OneIndexedVec<ConstantEntry>>,
}

fn long_bits(high_bytes: u32, low_bytes: u32) -> u64 {
    ((high_bytes as u64) << 32) | low_bytes as u64
}

impl RuntimeConstantPool {
    pub fn new(constant_pool: &ConstantPool) -> Self {
        RuntimeConstantPool {
            entries: RefCell::new(constant_pool.map(|info| ConstantEntry::Unresolved(info.clone()))),
        }
    }

    pub fn empty() -> Self {
        RuntimeConstantPool { entries: RefCell::new(OneIndexedVec::new()) }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// The single checked accessor: index 0, indices past the end and the unusable slot after a
    /// `Long` or `Double` are all rejected.
    pub fn entry(&self, index: u16) -> Result<ConstantEntry, VmError> {
        match self.entries.borrow().get(index as usize) {
            None => Err(VmError::ConstantPool {
                index,
                reason: "index out of bounds".to_owned(),
            }),
            Some(&ConstantEntry::Unresolved(ConstantPoolInfo::Unusable)) => Err(VmError::ConstantPool {
                index,
                reason: "slot after a Long or Double".to_owned(),
            }),
            Some(entry) => Ok(entry.clone()),
        }
    }

    pub fn is_resolved(&self, index: u16) -> bool {
        matches!(self.entries.borrow().get(index as usize), Some(&ConstantEntry::Resolved(_)))
    }

    fn wrong_kind(index: u16, expected: Tag, found: &ConstantEntry) -> VmError {
        VmError::ConstantPool {
            index,
            reason: format!("expected {:?} but found {:?}", expected, found),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<String, VmError> {
        match self.entry(index)? {
            ConstantEntry::Unresolved(ConstantPoolInfo::Utf8 { value }) => Ok(value),
            other => Err(Self::wrong_kind(index, Tag::Utf8, &other)),
        }
    }

    /// The name a `Class` entry refers to, resolved or not.
    pub fn class_name(&self, index: u16) -> Result<String, VmError> {
        match self.entry(index)? {
            ConstantEntry::Unresolved(ConstantPoolInfo::Class { name_index }) => self.utf8(name_index),
            ConstantEntry::Resolved(Resolved::Class(class)) => Ok(class.name.clone()),
            other => Err(Self::wrong_kind(index, Tag::Class, &other)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(String, String), VmError> {
        match self.entry(index)? {
            ConstantEntry::Unresolved(ConstantPoolInfo::NameAndType { name_index,
                                                                      descriptor_index }) =>
                Ok((self.utf8(name_index)?, self.utf8(descriptor_index)?)),
            other => Err(Self::wrong_kind(index, Tag::NameAndType, &other)),
        }
    }

    /// The value of an `Integer`, `Float`, `Long` or `Double` entry.
    pub fn numeric(&self, index: u16) -> Result<Value, VmError> {
        match self.entry(index)? {
            ConstantEntry::Unresolved(ConstantPoolInfo::Integer { bytes }) =>
                Ok(Value::Int(bytes as i32)),
            ConstantEntry::Unresolved(ConstantPoolInfo::Float { bytes }) =>
                Ok(Value::Float(f32::from_bits(bytes))),
            ConstantEntry::Unresolved(ConstantPoolInfo::Long { high_bytes, low_bytes }) =>
                Ok(Value::Long(long_bits(high_bytes, low_bytes) as i64)),
            ConstantEntry::Unresolved(ConstantPoolInfo::Double { high_bytes, low_bytes }) =>
                Ok(Value::Double(f64::from_bits(long_bits(high_bytes, low_bytes)))),
            other => Err(VmError::ConstantPool {
                index,
                reason: format!("expected a numeric constant but found {:?}", other),
            }),
        }
    }

    /// Resolves the entry at `index` on behalf of `owner`, the class this pool belongs to.
    /// §5.4.3
    pub fn resolve(&self, owner: &Class, jvm: &Jvm, index: u16) -> ExecResult<Resolved> {
        let raw = match self.entry(index)? {
            ConstantEntry::Resolved(resolved) => return Ok(resolved),
            ConstantEntry::Unresolved(raw) => raw,
        };
        // no borrow of `entries` may be held from here on: resolving can load classes, and
        // loading `owner`'s own superclass chain reads this pool again
        let resolved = match raw {
            ConstantPoolInfo::Class { name_index } => {
                let name = self.utf8(name_index)?;
                let class = owner.loader()?.resolve_class(&name)?;
                if class.is_array() {
                    // array classes are cached by the loader, the entry stays symbolic
                    return Ok(Resolved::Class(class));
                }
                Resolved::Class(class)
            },
            ConstantPoolInfo::FieldRef { class_index, name_and_type_index } => {
                let class = self.resolve_class(owner, jvm, class_index)?;
                let (name, descriptor) = self.name_and_type(name_and_type_index)?;
                let field = class.resolve_field(&name, &descriptor).ok_or_else(|| {
                    JavaException::new(names::NO_SUCH_FIELD_ERROR,
                                       format!("{}.{} {}", class.name, name, descriptor))
                })?;
                Resolved::Field(field)
            },
            ConstantPoolInfo::MethodRef { class_index, name_and_type_index } => {
                let class = self.resolve_class(owner, jvm, class_index)?;
                if class.is_interface() {
                    return Err(JavaException::new(
                        names::INCOMPATIBLE_CLASS_CHANGE_ERROR,
                        format!("Found interface {}, but class was expected", class.name)).into());
                }
                Resolved::Method(self.resolve_method(&class, name_and_type_index)?)
            },
            ConstantPoolInfo::InterfaceMethodRef { class_index, name_and_type_index } => {
                let class = self.resolve_class(owner, jvm, class_index)?;
                if !class.is_interface() {
                    return Err(JavaException::new(
                        names::INCOMPATIBLE_CLASS_CHANGE_ERROR,
                        format!("Found class {}, but interface was expected", class.name)).into());
                }
                Resolved::Method(self.resolve_method(&class, name_and_type_index)?)
            },
            ConstantPoolInfo::String { string_index } => {
                let value = self.utf8(string_index)?;
                Resolved::String(jvm.intern(&value)?)
            },
            ConstantPoolInfo::MethodHandle { .. } | ConstantPoolInfo::MethodType { .. }
                    | ConstantPoolInfo::InvokeDynamic { .. } => {
                return Err(JavaException::new(
                    names::LINKAGE_ERROR,
                    format!("{:?} constants are not supported", raw.tag())).into());
            },
            other => {
                return Err(VmError::ConstantPool {
                    index,
                    reason: format!("{:?} is not a symbolic reference", other.tag()),
                }.into());
            },
        };
        trace!("{}: resolved #{} to {:?}", owner.name, index, resolved);
        if let Some(slot) = self.entries.borrow_mut().get_mut(index as usize) {
            *slot = ConstantEntry::Resolved(resolved.clone());
        }
        Ok(resolved)
    }

    fn resolve_class(&self, owner: &Class, jvm: &Jvm, index: u16) -> ExecResult<Rc<Class>> {
        match self.resolve(owner, jvm, index)? {
            Resolved::Class(class) => Ok(class),
            other => Err(VmError::ConstantPool {
                index,
                reason: format!("expected Class but found {:?}", other),
            }.into()),
        }
    }

    fn resolve_method(&self, class: &Class, name_and_type_index: u16) -> ExecResult<Rc<Method>> {
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        class.resolve_method(&name, &descriptor).ok_or_else(|| {
            JavaException::new(names::NO_SUCH_METHOD_ERROR,
                               format!("{}.{}{}", class.name, name, descriptor)).into()
        })
    }
}
