//! `wide`, `multianewarray`, null branches and the 32-bit offset branches.

use std::rc::Rc;

use crate::vm::bytecode::opcode;
use crate::vm::class::Class;
use crate::vm::error::{names, ExecResult, JavaException, VmError};
use crate::vm::heap::{JvmObject, ObjectRef};
use crate::vm::interpreter::comparisons::branch_if;
use crate::vm::interpreter::{advance, control, loads, math, stores};
use crate::vm::thread::Thread;
use crate::vm::value::Value;

/// Executes the following instruction with a 16-bit local variable index (and, for `iinc`, a
/// 16-bit constant).
pub fn wide(thread: &mut Thread) -> ExecResult {
    let modified = thread.read_u8(1)?;
    let index = thread.read_u16(2)? as usize;
    match modified {
        opcode::ILOAD | opcode::LLOAD | opcode::FLOAD | opcode::DLOAD | opcode::ALOAD =>
            loads::load_local(thread, index)?,
        opcode::ISTORE | opcode::FSTORE | opcode::ASTORE => stores::store_local(thread, index)?,
        opcode::LSTORE | opcode::DSTORE => stores::store_local64(thread, index)?,
        opcode::IINC => {
            let constant = thread.read_i16(4)? as i32;
            math::increment(thread, index, constant)?;
            return advance(thread, 6);
        },
        opcode::RET => return control::return_from_subroutine(thread, index),
        _ => return Err(VmError::UnsupportedOpcode { opcode: modified, pc: thread.pc()? }.into()),
    }
    advance(thread, 4)
}

pub fn multianewarray(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u16(1)?;
    let dimensions = thread.read_u8(3)? as usize;
    let class = thread.current_class()?.resolve_class_ref(thread, index)?;

    let mut counts = vec![0; dimensions];
    for count in counts.iter_mut().rev() {
        *count = thread.pop_int()?;
    }
    if let Some(&negative) = counts.iter().find(|&&count| count < 0) {
        return Err(JavaException::new(names::NEGATIVE_ARRAY_SIZE_EXCEPTION,
                                      negative.to_string()).into());
    }
    let counts: Vec<usize> = counts.into_iter().map(|count| count as usize).collect();
    let array = new_multi_array(&class, &counts)?;
    thread.push_stack(Value::Reference(array))?;
    advance(thread, 4)
}

/// Creates an array of `counts[0]` elements, each an array built from the remaining counts.
/// Dimensions without a count are left `null`.
fn new_multi_array(class: &Rc<Class>, counts: &[usize]) -> Result<ObjectRef, VmError> {
    let (&length, rest) = match counts.split_first() {
        Some(split) => split,
        None => return Err(VmError::TypeMismatch {
            expected: "at least one dimension",
            found: class.name.clone(),
        }),
    };
    let mut array = JvmObject::new_array(class.clone(), length);
    if let (false, Some(component)) = (rest.is_empty(), class.component()) {
        let elements = array.array_mut()?.elements_mut();
        for element in elements.iter_mut() {
            *element = Value::Reference(new_multi_array(component, rest)?);
        }
    }
    Ok(array.into_ref())
}

pub fn ifnull(thread: &mut Thread) -> ExecResult {
    let value = thread.pop_reference()?;
    branch_if(thread, value.is_none())
}

pub fn ifnonnull(thread: &mut Thread) -> ExecResult {
    let value = thread.pop_reference()?;
    branch_if(thread, value.is_some())
}

pub fn goto_w(thread: &mut Thread) -> ExecResult {
    let offset = thread.read_i32(1)?;
    thread.offset_pc(offset)?;
    Ok(())
}

pub fn jsr_w(thread: &mut Thread) -> ExecResult {
    let offset = thread.read_i32(1)?;
    control::jump_subroutine(thread, offset, 5)
}
