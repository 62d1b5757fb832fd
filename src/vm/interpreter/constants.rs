//! Constants: `nop` through `ldc2_w`.

use crate::model::class_file::ConstantPoolInfo;
use crate::vm::constant_pool::{ConstantEntry, Resolved};
use crate::vm::error::{ExecResult, VmError};
use crate::vm::interpreter::advance;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

pub fn nop(thread: &mut Thread) -> ExecResult {
    advance(thread, 1)
}

pub fn aconst_null(thread: &mut Thread) -> ExecResult {
    thread.push_stack(Value::NullReference)?;
    advance(thread, 1)
}

macro_rules! push_constant {
    ($($name: ident => $push: ident($value: expr),)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                thread.$push($value)?;
                advance(thread, 1)
            }
        )*
    }
}

push_constant! {
    iconst_m1 => push_stack(Value::Int(-1)),
    iconst_0 => push_stack(Value::Int(0)),
    iconst_1 => push_stack(Value::Int(1)),
    iconst_2 => push_stack(Value::Int(2)),
    iconst_3 => push_stack(Value::Int(3)),
    iconst_4 => push_stack(Value::Int(4)),
    iconst_5 => push_stack(Value::Int(5)),
    lconst_0 => push_stack64(Value::Long(0)),
    lconst_1 => push_stack64(Value::Long(1)),
    fconst_0 => push_stack(Value::Float(0.0)),
    fconst_1 => push_stack(Value::Float(1.0)),
    fconst_2 => push_stack(Value::Float(2.0)),
    dconst_0 => push_stack64(Value::Double(0.0)),
    dconst_1 => push_stack64(Value::Double(1.0)),
}

pub fn bipush(thread: &mut Thread) -> ExecResult {
    let value = thread.read_i8(1)?;
    thread.push_stack(Value::Int(value as i32))?;
    advance(thread, 2)
}

pub fn sipush(thread: &mut Thread) -> ExecResult {
    let value = thread.read_i16(1)?;
    thread.push_stack(Value::Int(value as i32))?;
    advance(thread, 3)
}

pub fn ldc(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u8(1)? as u16;
    load_constant(thread, index)?;
    advance(thread, 2)
}

pub fn ldc_w(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u16(1)?;
    load_constant(thread, index)?;
    advance(thread, 3)
}

pub fn ldc2_w(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u16(1)?;
    let value = thread.current_class()?.constant_pool.numeric(index)?;
    thread.push_stack64(value)?;
    advance(thread, 3)
}

/// Pushes an `int`, `float`, `String` or `Class` constant.
fn load_constant(thread: &mut Thread, index: u16) -> ExecResult {
    let class = thread.current_class()?;
    let value = match class.constant_pool.entry(index)? {
        ConstantEntry::Unresolved(ConstantPoolInfo::Integer { .. })
                | ConstantEntry::Unresolved(ConstantPoolInfo::Float { .. }) =>
            class.constant_pool.numeric(index)?,
        _ => match class.resolve_reference(thread, index)? {
            Resolved::String(string) => Value::Reference(string),
            Resolved::Class(loaded) => Value::Reference(thread.jvm().class_mirror(&loaded)?),
            other => return Err(VmError::ConstantPool {
                index,
                reason: format!("ldc of {:?}", other),
            }.into()),
        },
    };
    thread.push_stack(value)
}
