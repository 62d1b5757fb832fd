//! Arithmetic, bitwise operations and `iinc`.
//!
//! Integer arithmetic wraps on overflow. Shift distances are masked to the low 5 (`int`) or 6
//! (`long`) bits. Integer division by zero raises `ArithmeticException`.

use crate::vm::error::{names, ExecResult, JavaException};
use crate::vm::interpreter::advance;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

fn divide_by_zero() -> JavaException {
    JavaException::new(names::ARITHMETIC_EXCEPTION, "/ by zero")
}

macro_rules! binary {
    ($($name: ident: $pop: ident, $push: ident, $variant: ident, |$a: ident, $b: ident| $body: expr;)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let $b = thread.$pop()?;
                let $a = thread.$pop()?;
                thread.$push(Value::$variant($body))?;
                advance(thread, 1)
            }
        )*
    }
}

binary! {
    iadd: pop_int, push_stack, Int, |a, b| a.wrapping_add(b);
    ladd: pop_long, push_stack64, Long, |a, b| a.wrapping_add(b);
    fadd: pop_float, push_stack, Float, |a, b| a + b;
    dadd: pop_double, push_stack64, Double, |a, b| a + b;
    isub: pop_int, push_stack, Int, |a, b| a.wrapping_sub(b);
    lsub: pop_long, push_stack64, Long, |a, b| a.wrapping_sub(b);
    fsub: pop_float, push_stack, Float, |a, b| a - b;
    dsub: pop_double, push_stack64, Double, |a, b| a - b;
    imul: pop_int, push_stack, Int, |a, b| a.wrapping_mul(b);
    lmul: pop_long, push_stack64, Long, |a, b| a.wrapping_mul(b);
    fmul: pop_float, push_stack, Float, |a, b| a * b;
    dmul: pop_double, push_stack64, Double, |a, b| a * b;
    fdiv: pop_float, push_stack, Float, |a, b| a / b;
    ddiv: pop_double, push_stack64, Double, |a, b| a / b;
    frem: pop_float, push_stack, Float, |a, b| a % b;
    drem: pop_double, push_stack64, Double, |a, b| a % b;
    iand: pop_int, push_stack, Int, |a, b| a & b;
    land: pop_long, push_stack64, Long, |a, b| a & b;
    ior: pop_int, push_stack, Int, |a, b| a | b;
    lor: pop_long, push_stack64, Long, |a, b| a | b;
    ixor: pop_int, push_stack, Int, |a, b| a ^ b;
    lxor: pop_long, push_stack64, Long, |a, b| a ^ b;
}

macro_rules! checked_division {
    ($($name: ident: $pop: ident, $push: ident, $variant: ident, $op: ident;)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let divisor = thread.$pop()?;
                let dividend = thread.$pop()?;
                if divisor == 0 {
                    return Err(divide_by_zero().into());
                }
                thread.$push(Value::$variant(dividend.$op(divisor)))?;
                advance(thread, 1)
            }
        )*
    }
}

checked_division! {
    idiv: pop_int, push_stack, Int, wrapping_div;
    ldiv: pop_long, push_stack64, Long, wrapping_div;
    irem: pop_int, push_stack, Int, wrapping_rem;
    lrem: pop_long, push_stack64, Long, wrapping_rem;
}

macro_rules! unary {
    ($($name: ident: $pop: ident, $push: ident, $variant: ident, |$a: ident| $body: expr;)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let $a = thread.$pop()?;
                thread.$push(Value::$variant($body))?;
                advance(thread, 1)
            }
        )*
    }
}

unary! {
    ineg: pop_int, push_stack, Int, |a| a.wrapping_neg();
    lneg: pop_long, push_stack64, Long, |a| a.wrapping_neg();
    fneg: pop_float, push_stack, Float, |a| -a;
    dneg: pop_double, push_stack64, Double, |a| -a;
}

macro_rules! shift {
    ($($name: ident: $pop: ident, $push: ident, $variant: ident, |$a: ident, $s: ident| $body: expr;)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let $s = thread.pop_int()? as u32;
                let $a = thread.$pop()?;
                thread.$push(Value::$variant($body))?;
                advance(thread, 1)
            }
        )*
    }
}

shift! {
    ishl: pop_int, push_stack, Int, |a, s| a.wrapping_shl(s);
    lshl: pop_long, push_stack64, Long, |a, s| a.wrapping_shl(s);
    ishr: pop_int, push_stack, Int, |a, s| a.wrapping_shr(s);
    lshr: pop_long, push_stack64, Long, |a, s| a.wrapping_shr(s);
    iushr: pop_int, push_stack, Int, |a, s| (a as u32).wrapping_shr(s) as i32;
    lushr: pop_long, push_stack64, Long, |a, s| (a as u64).wrapping_shr(s) as i64;
}

/// Increments an `int` local variable by a signed 8-bit constant.
pub fn iinc(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u8(1)? as usize;
    let constant = thread.read_i8(2)? as i32;
    increment(thread, index, constant)?;
    advance(thread, 3)
}

/// Shared with `wide iinc`.
pub fn increment(thread: &mut Thread, index: usize, constant: i32) -> ExecResult {
    let value = thread.load_local(index)?.as_int()?;
    thread.store_local(index, Value::Int(value.wrapping_add(constant)))?;
    Ok(())
}
