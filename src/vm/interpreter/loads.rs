//! Loads: local variables and array elements onto the operand stack.

use crate::vm::error::{ExecResult, JavaException};
use crate::vm::interpreter::advance;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

/// Pushes local variable `index`. Shared with `wide`.
pub fn load_local(thread: &mut Thread, index: usize) -> ExecResult {
    let value = thread.load_local(index)?;
    thread.push_value(value)
}

macro_rules! load {
    ($($name: ident,)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let index = thread.read_u8(1)? as usize;
                load_local(thread, index)?;
                advance(thread, 2)
            }
        )*
    }
}

load! { iload, lload, fload, dload, aload, }

macro_rules! load_n {
    ($($name: ident = $index: expr,)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                load_local(thread, $index)?;
                advance(thread, 1)
            }
        )*
    }
}

load_n! {
    iload_0 = 0, iload_1 = 1, iload_2 = 2, iload_3 = 3,
    lload_0 = 0, lload_1 = 1, lload_2 = 2, lload_3 = 3,
    fload_0 = 0, fload_1 = 1, fload_2 = 2, fload_3 = 3,
    dload_0 = 0, dload_1 = 1, dload_2 = 2, dload_3 = 3,
    aload_0 = 0, aload_1 = 1, aload_2 = 2, aload_3 = 3,
}

/// Pops an index and an array reference and reads the element.
fn array_element(thread: &mut Thread) -> ExecResult<Value> {
    let index = thread.pop_int()?;
    let array_ref = thread.pop_object()?;
    let object = array_ref.borrow();
    let array = object.array()?;
    match array.check_index(index) {
        Some(index) => Ok(array.get(index)),
        None => Err(JavaException::array_index(index, array.len()).into()),
    }
}

macro_rules! array_load {
    ($($name: ident,)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let value = array_element(thread)?;
                thread.push_value(value)?;
                advance(thread, 1)
            }
        )*
    }
}

array_load! { iaload, laload, faload, daload, aaload, baload, caload, saload, }
