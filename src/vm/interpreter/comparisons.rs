//! Comparisons and conditional branches.

use std::rc::Rc;

use crate::vm::error::ExecResult;
use crate::vm::interpreter::advance;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

/// Takes the branch at the signed 16-bit offset following the opcode, or falls through.
pub fn branch_if(thread: &mut Thread, condition: bool) -> ExecResult {
    if condition {
        let offset = thread.read_i16(1)? as i32;
        thread.offset_pc(offset)?;
        Ok(())
    } else {
        advance(thread, 3)
    }
}

pub fn lcmp(thread: &mut Thread) -> ExecResult {
    let b = thread.pop_long()?;
    let a = thread.pop_long()?;
    thread.push_stack(Value::Int(a.cmp(&b) as i32))?;
    advance(thread, 1)
}

/// `nan` is pushed when either operand is NaN: -1 for the `l` variants, 1 for the `g` ones.
fn compare<T: PartialOrd>(a: T, b: T, nan: i32) -> i32 {
    match a.partial_cmp(&b) {
        Some(ordering) => ordering as i32,
        None => nan,
    }
}

macro_rules! float_compare {
    ($($name: ident: $pop: ident, $nan: expr;)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let b = thread.$pop()?;
                let a = thread.$pop()?;
                thread.push_stack(Value::Int(compare(a, b, $nan)))?;
                advance(thread, 1)
            }
        )*
    }
}

float_compare! {
    fcmpl: pop_float, -1;
    fcmpg: pop_float, 1;
    dcmpl: pop_double, -1;
    dcmpg: pop_double, 1;
}

macro_rules! if_zero {
    ($($name: ident: $op: tt;)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let value = thread.pop_int()?;
                branch_if(thread, value $op 0)
            }
        )*
    }
}

if_zero! {
    ifeq: ==;
    ifne: !=;
    iflt: <;
    ifge: >=;
    ifgt: >;
    ifle: <=;
}

macro_rules! if_icmp {
    ($($name: ident: $op: tt;)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let b = thread.pop_int()?;
                let a = thread.pop_int()?;
                branch_if(thread, a $op b)
            }
        )*
    }
}

if_icmp! {
    if_icmpeq: ==;
    if_icmpne: !=;
    if_icmplt: <;
    if_icmpge: >=;
    if_icmpgt: >;
    if_icmple: <=;
}

fn same_reference(thread: &mut Thread) -> ExecResult<bool> {
    let b = thread.pop_reference()?;
    let a = thread.pop_reference()?;
    Ok(match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
        (None, None) => true,
        _ => false,
    })
}

pub fn if_acmpeq(thread: &mut Thread) -> ExecResult {
    let same = same_reference(thread)?;
    branch_if(thread, same)
}

pub fn if_acmpne(thread: &mut Thread) -> ExecResult {
    let same = same_reference(thread)?;
    branch_if(thread, !same)
}
