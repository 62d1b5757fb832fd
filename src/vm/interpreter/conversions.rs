//! Primitive conversions. Floating-point to integer conversions round towards zero, saturate at
//! the bounds of the target type and map NaN to 0, which is what `as` does.

use crate::vm::error::ExecResult;
use crate::vm::interpreter::advance;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

macro_rules! convert {
    ($($name: ident: $pop: ident => $push: ident, |$a: ident| $variant: ident($body: expr);)*) => {
        $(
            pub fn $name(thread: &mut Thread) -> ExecResult {
                let $a = thread.$pop()?;
                thread.$push(Value::$variant($body))?;
                advance(thread, 1)
            }
        )*
    }
}

convert! {
    i2l: pop_int => push_stack64, |a| Long(a as i64);
    i2f: pop_int => push_stack, |a| Float(a as f32);
    i2d: pop_int => push_stack64, |a| Double(a as f64);
    l2i: pop_long => push_stack, |a| Int(a as i32);
    l2f: pop_long => push_stack, |a| Float(a as f32);
    l2d: pop_long => push_stack64, |a| Double(a as f64);
    f2i: pop_float => push_stack, |a| Int(a as i32);
    f2l: pop_float => push_stack64, |a| Long(a as i64);
    f2d: pop_float => push_stack64, |a| Double(a as f64);
    d2i: pop_double => push_stack, |a| Int(a as i32);
    d2l: pop_double => push_stack64, |a| Long(a as i64);
    d2f: pop_double => push_stack, |a| Float(a as f32);
    i2b: pop_int => push_stack, |a| Int(a as i8 as i32);
    i2c: pop_int => push_stack, |a| Int(a as u16 as i32);
    i2s: pop_int => push_stack, |a| Int(a as i16 as i32);
}
