//! Stores: operand stack values into local variables and array elements.

use crate::vm::error::{names, ExecResult, JavaException};
use crate::vm::heap::ArrayType;
use crate::vm::interpreter::advance;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

/// Pops a one-slot value into local variable `index`. Shared with `wide`.
pub fn store_local(thread: &mut Thread, index: usize) -> ExecResult {
    let value = thread.pop_stack()?;
    thread.store_local(index, value)?;
    Ok(())
}

/// Pops a `long` or `double` into local variables `index` and `index + 1`.
pub fn store_local64(thread: &mut Thread, index: usize) -> ExecResult {
    let value = thread.pop_stack64()?;
    thread.store_local64(index, value)?;
    Ok(())
}

macro_rules! store {
    ($($name: ident => $store: ident,)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let index = thread.read_u8(1)? as usize;
                $store(thread, index)?;
                advance(thread, 2)
            }
        )*
    }
}

store! {
    istore => store_local,
    lstore => store_local64,
    fstore => store_local,
    dstore => store_local64,
    astore => store_local,
}

macro_rules! store_n {
    ($($name: ident => $store: ident($index: expr),)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                $store(thread, $index)?;
                advance(thread, 1)
            }
        )*
    }
}

store_n! {
    istore_0 => store_local(0), istore_1 => store_local(1),
    istore_2 => store_local(2), istore_3 => store_local(3),
    lstore_0 => store_local64(0), lstore_1 => store_local64(1),
    lstore_2 => store_local64(2), lstore_3 => store_local64(3),
    fstore_0 => store_local(0), fstore_1 => store_local(1),
    fstore_2 => store_local(2), fstore_3 => store_local(3),
    dstore_0 => store_local64(0), dstore_1 => store_local64(1),
    dstore_2 => store_local64(2), dstore_3 => store_local64(3),
    astore_0 => store_local(0), astore_1 => store_local(1),
    astore_2 => store_local(2), astore_3 => store_local(3),
}

/// Stores `value` at the popped index of the popped array. `int` values are narrowed to the
/// element type of `byte`, `boolean`, `char` and `short` arrays.
fn store_element(thread: &mut Thread, value: Value) -> ExecResult {
    let index = thread.pop_int()?;
    let array_ref = thread.pop_object()?;

    let (slot, element_type, component) = {
        let object = array_ref.borrow();
        let array = object.array()?;
        match array.check_index(index) {
            Some(slot) => (slot, array.element_type(), object.class().component().cloned()),
            None => return Err(JavaException::array_index(index, array.len()).into()),
        }
    };
    if let (Value::Reference(ref element), Some(ref component)) = (&value, &component) {
        let element_class = element.borrow().class().clone();
        if !element_class.check_cast(component) {
            return Err(JavaException::new(names::ARRAY_STORE_EXCEPTION,
                                          element_class.name.replace('/', ".")).into());
        }
    }

    let value = match (element_type, value) {
        (ArrayType::Boolean, Value::Int(value)) => Value::Int(value & 1),
        (ArrayType::Byte, Value::Int(value)) => Value::Int(value as i8 as i32),
        (ArrayType::Char, Value::Int(value)) => Value::Int(value as u16 as i32),
        (ArrayType::Short, Value::Int(value)) => Value::Int(value as i16 as i32),
        (_, value) => value,
    };
    array_ref.borrow_mut().array_mut()?.set(slot, value);
    Ok(())
}

macro_rules! array_store {
    ($($name: ident => $pop: ident,)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let value = thread.$pop()?;
                store_element(thread, value)?;
                advance(thread, 1)
            }
        )*
    }
}

array_store! {
    iastore => pop_stack,
    lastore => pop_stack64,
    fastore => pop_stack,
    dastore => pop_stack64,
    aastore => pop_stack,
    bastore => pop_stack,
    castore => pop_stack,
    sastore => pop_stack,
}
