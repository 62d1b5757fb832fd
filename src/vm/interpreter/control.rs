//! Unconditional branches, subroutines, switches and method returns.

use crate::vm::error::ExecResult;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

pub fn goto(thread: &mut Thread) -> ExecResult {
    let offset = thread.read_i16(1)? as i32;
    thread.offset_pc(offset)?;
    Ok(())
}

/// Pushes the address of the next instruction and branches. Shared with `jsr_w`.
pub fn jump_subroutine(thread: &mut Thread, offset: i32, length: usize) -> ExecResult {
    let next = thread.pc()? + length;
    thread.push_stack(Value::ReturnAddress(next))?;
    thread.offset_pc(offset)?;
    Ok(())
}

pub fn jsr(thread: &mut Thread) -> ExecResult {
    let offset = thread.read_i16(1)? as i32;
    jump_subroutine(thread, offset, 3)
}

/// Continues at the address held by a local variable. Shared with `wide ret`.
pub fn return_from_subroutine(thread: &mut Thread, index: usize) -> ExecResult {
    let address = thread.load_local(index)?.as_return_address()?;
    thread.set_pc(address)?;
    Ok(())
}

pub fn ret(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u8(1)? as usize;
    return_from_subroutine(thread, index)
}

/// The operands of a switch start at the next multiple of four after the opcode.
fn padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}

pub fn tableswitch(thread: &mut Thread) -> ExecResult {
    let operands = 1 + padding(thread.pc()?);
    let key = thread.pop_int()?;
    let default = thread.read_i32(operands)?;
    let low = thread.read_i32(operands + 4)?;
    let high = thread.read_i32(operands + 8)?;
    let offset = if key < low || key > high {
        default
    } else {
        thread.read_i32(operands + 12 + 4 * (key as i64 - low as i64) as usize)?
    };
    thread.offset_pc(offset)?;
    Ok(())
}

pub fn lookupswitch(thread: &mut Thread) -> ExecResult {
    let operands = 1 + padding(thread.pc()?);
    let key = thread.pop_int()?;
    let default = thread.read_i32(operands)?;
    let pairs = thread.read_i32(operands + 4)?.max(0) as usize;
    let mut offset = default;
    for pair in 0..pairs {
        let at = operands + 8 + pair * 8;
        if thread.read_i32(at)? == key {
            offset = thread.read_i32(at + 4)?;
            break;
        }
    }
    thread.offset_pc(offset)?;
    Ok(())
}

pub fn ireturn(thread: &mut Thread) -> ExecResult {
    let value = thread.pop_int()?;
    thread.return_stack_frame(Some(Value::Int(value)))
}

pub fn lreturn(thread: &mut Thread) -> ExecResult {
    let value = thread.pop_long()?;
    thread.return_stack_frame64(Value::Long(value))
}

pub fn freturn(thread: &mut Thread) -> ExecResult {
    let value = thread.pop_float()?;
    thread.return_stack_frame(Some(Value::Float(value)))
}

pub fn dreturn(thread: &mut Thread) -> ExecResult {
    let value = thread.pop_double()?;
    thread.return_stack_frame64(Value::Double(value))
}

pub fn areturn(thread: &mut Thread) -> ExecResult {
    let value = thread.pop_reference()?;
    thread.return_stack_frame(Some(Value::from_reference(value)))
}

pub fn return_void(thread: &mut Thread) -> ExecResult {
    thread.return_stack_frame(None)
}

#[cfg(test)]
mod tests {
    use super::padding;

    #[test]
    fn switch_operands_are_aligned() {
        assert_eq!(padding(0), 3);
        assert_eq!(padding(1), 2);
        assert_eq!(padding(2), 1);
        assert_eq!(padding(3), 0);
        assert_eq!(padding(7), 0);
    }
}
