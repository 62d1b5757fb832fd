//! Operand stack manipulation.
//!
//! These instructions are type-agnostic and move raw slots. Because both slots of a `long` or
//! `double` hold the value, the "form 2" variants of §6.5 need no special casing: `dup2` copies
//! two slots whether they are two `int`s or one `long`.

use crate::vm::error::ExecResult;
use crate::vm::interpreter::advance;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

fn pop_slots(thread: &mut Thread, count: usize) -> ExecResult<Vec<Value>> {
    let mut slots = Vec::with_capacity(count);
    for _ in 0..count {
        slots.push(thread.pop_slot()?);
    }
    slots.reverse();
    Ok(slots)
}

fn push_slots(thread: &mut Thread, slots: &[Value]) -> ExecResult {
    for slot in slots {
        thread.push_slot(slot.clone())?;
    }
    Ok(())
}

/// Duplicates the top `count` slots and inserts the copies `depth` slots further down.
fn dup_n(thread: &mut Thread, count: usize, depth: usize) -> ExecResult {
    let top = pop_slots(thread, count)?;
    let below = pop_slots(thread, depth)?;
    push_slots(thread, &top)?;
    push_slots(thread, &below)?;
    push_slots(thread, &top)?;
    advance(thread, 1)
}

pub fn pop(thread: &mut Thread) -> ExecResult {
    thread.pop_slot()?;
    advance(thread, 1)
}

pub fn pop2(thread: &mut Thread) -> ExecResult {
    pop_slots(thread, 2)?;
    advance(thread, 1)
}

pub fn dup(thread: &mut Thread) -> ExecResult {
    dup_n(thread, 1, 0)
}

pub fn dup_x1(thread: &mut Thread) -> ExecResult {
    dup_n(thread, 1, 1)
}

pub fn dup_x2(thread: &mut Thread) -> ExecResult {
    dup_n(thread, 1, 2)
}

pub fn dup2(thread: &mut Thread) -> ExecResult {
    dup_n(thread, 2, 0)
}

pub fn dup2_x1(thread: &mut Thread) -> ExecResult {
    dup_n(thread, 2, 1)
}

pub fn dup2_x2(thread: &mut Thread) -> ExecResult {
    dup_n(thread, 2, 2)
}

pub fn swap(thread: &mut Thread) -> ExecResult {
    let top = thread.pop_slot()?;
    let below = thread.pop_slot()?;
    thread.push_slot(top)?;
    thread.push_slot(below)?;
    advance(thread, 1)
}
