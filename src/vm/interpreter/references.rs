//! Field access, method invocation, object creation, type checks and monitors.

use std::rc::Rc;

use crate::vm::class::Class;
use crate::vm::error::{names, ExecResult, JavaException, VmError};
use crate::vm::heap::{ArrayType, JvmObject};
use crate::vm::interpreter::advance;
use crate::vm::member::{Field, Method};
use crate::vm::sig::Type;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

fn incompatible_class_change<S: Into<String>>(message: S) -> JavaException {
    JavaException::new(names::INCOMPATIBLE_CLASS_CHANGE_ERROR, message)
}

fn resolve_field(thread: &mut Thread, want_static: bool) -> ExecResult<Rc<Field>> {
    let index = thread.read_u16(1)?;
    let field = thread.current_class()?.resolve_field_ref(thread, index)?;
    if field.is_static() != want_static {
        return Err(incompatible_class_change(format!(
            "Expected {} field {}.{}", if want_static { "static" } else { "non-static" },
            field.class_name, field.name)).into());
    }
    Ok(field)
}

/// The declaring class of a member, as seen from the executing class.
fn declaring_class(thread: &Thread, class_name: &str) -> ExecResult<Rc<Class>> {
    Ok(thread.current_class()?.loader()?.resolve_class(class_name)?)
}

/// Pops a value of the field's width and narrows `int`s for `boolean`, `byte`, `char` and
/// `short` fields.
fn pop_field_value(thread: &mut Thread, field: &Field) -> ExecResult<Value> {
    let value = if field.ty.is_category_2() { thread.pop_stack64()? } else { thread.pop_stack()? };
    Ok(match (&field.ty, value) {
        (&Type::Boolean, Value::Int(value)) => Value::Int(value & 1),
        (&Type::Byte, Value::Int(value)) => Value::Int(value as i8 as i32),
        (&Type::Char, Value::Int(value)) => Value::Int(value as u16 as i32),
        (&Type::Short, Value::Int(value)) => Value::Int(value as i16 as i32),
        (_, value) => value,
    })
}

pub fn getstatic(thread: &mut Thread) -> ExecResult {
    let field = resolve_field(thread, true)?;
    let class = declaring_class(thread, &field.class_name)?;
    if !thread.initialize_class(&class)? {
        return Ok(());
    }
    thread.push_value(field.get())?;
    advance(thread, 3)
}

pub fn putstatic(thread: &mut Thread) -> ExecResult {
    let field = resolve_field(thread, true)?;
    let class = declaring_class(thread, &field.class_name)?;
    if !thread.initialize_class(&class)? {
        return Ok(());
    }
    let value = pop_field_value(thread, &field)?;
    field.set(value);
    advance(thread, 3)
}

pub fn getfield(thread: &mut Thread) -> ExecResult {
    let field = resolve_field(thread, false)?;
    let object = thread.pop_object()?;
    let value = object.borrow().get_field(&field.key())?;
    thread.push_value(value)?;
    advance(thread, 3)
}

pub fn putfield(thread: &mut Thread) -> ExecResult {
    let field = resolve_field(thread, false)?;
    let value = pop_field_value(thread, &field)?;
    let object = thread.pop_object()?;
    object.borrow_mut().put_field(&field.key(), value)?;
    advance(thread, 3)
}

fn resolve_method(thread: &mut Thread) -> ExecResult<Rc<Method>> {
    let index = thread.read_u16(1)?;
    Ok(thread.current_class()?.resolve_method_ref(thread, index)?)
}

/// The runtime class of the receiver in `args`, raising `NullPointerException` for `null`.
fn receiver_class(args: &[Value], method: &Method) -> ExecResult<Rc<Class>> {
    match args.first() {
        Some(&Value::Reference(ref receiver)) => Ok(receiver.borrow().class().clone()),
        Some(&Value::NullReference) => Err(JavaException::new(
            names::NULL_POINTER_EXCEPTION,
            format!("Cannot invoke \"{}.{}()\" because value is null",
                    method.class_name.replace('/', "."), method.name)).into()),
        other => Err(VmError::TypeMismatch {
            expected: "reference",
            found: format!("{:?}", other),
        }.into()),
    }
}

/// Selects the method to run for a receiver of class `receiver`. §5.4.6
fn select_method(receiver: &Class, method: &Rc<Method>) -> ExecResult<Rc<Method>> {
    match receiver.dispatch_method(&method.name, &method.descriptor) {
        Some(selected) => Ok(selected),
        None => Err(JavaException::new(names::ABSTRACT_METHOD_ERROR,
                                       format!("{}.{}{}", receiver.name, method.name,
                                               method.descriptor)).into()),
    }
}

pub fn invokestatic(thread: &mut Thread) -> ExecResult {
    let method = resolve_method(thread)?;
    if !method.is_static() {
        return Err(incompatible_class_change(format!(
            "Expected static method {}", method.native_key())).into());
    }
    let class = method.class()?;
    if !thread.initialize_class(&class)? {
        return Ok(());
    }
    let args = thread.pop_args(&method)?;
    thread.invoke_method(method, args, 3)
}

pub fn invokespecial(thread: &mut Thread) -> ExecResult {
    let method = resolve_method(thread)?;
    if method.is_static() {
        return Err(incompatible_class_change(format!(
            "Expected non-static method {}", method.native_key())).into());
    }
    let current = thread.current_class()?;
    let resolved_class = method.class()?;
    // `super.m()`: look up from the direct superclass of the executing class
    let target = if !method.is_initializer() && !resolved_class.is_interface()
            && !Rc::ptr_eq(&current, &resolved_class)
            && current.is_descendant(&resolved_class) {
        current.superclass()
            .and_then(|superclass| superclass.dispatch_method(&method.name, &method.descriptor))
            .unwrap_or_else(|| method.clone())
    } else {
        method.clone()
    };
    let args = thread.pop_args(&method)?;
    receiver_class(&args, &method)?;
    thread.invoke_method(target, args, 3)
}

pub fn invokevirtual(thread: &mut Thread) -> ExecResult {
    let method = resolve_method(thread)?;
    if method.is_static() {
        return Err(incompatible_class_change(format!(
            "Expected non-static method {}", method.native_key())).into());
    }
    let args = thread.pop_args(&method)?;
    let receiver = receiver_class(&args, &method)?;
    let target = if method.is_private() { method } else { select_method(&receiver, &method)? };
    thread.invoke_method(target, args, 3)
}

pub fn invokeinterface(thread: &mut Thread) -> ExecResult {
    let method = resolve_method(thread)?;
    if method.is_static() {
        return Err(incompatible_class_change(format!(
            "Expected non-static method {}", method.native_key())).into());
    }
    let interface = method.class()?;
    let args = thread.pop_args(&method)?;
    let receiver = receiver_class(&args, &method)?;
    if !receiver.check_cast(&interface) {
        return Err(incompatible_class_change(format!(
            "Class {} does not implement the requested interface {}",
            receiver.name.replace('/', "."), interface.name.replace('/', "."))).into());
    }
    let target = select_method(&receiver, &method)?;
    thread.invoke_method(target, args, 5)
}

pub fn new(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u16(1)?;
    let class = thread.current_class()?.resolve_class_ref(thread, index)?;
    if class.is_interface() || class.is_abstract() || class.is_array() {
        return Err(JavaException::new(names::INSTANTIATION_ERROR,
                                      class.name.replace('/', ".")).into());
    }
    if !thread.initialize_class(&class)? {
        return Ok(());
    }
    thread.push_stack(Value::Reference(JvmObject::new(class).into_ref()))?;
    advance(thread, 3)
}

/// Pops an array length, raising `NegativeArraySizeException` below zero.
pub fn pop_count(thread: &mut Thread) -> ExecResult<usize> {
    let count = thread.pop_int()?;
    if count < 0 {
        return Err(JavaException::new(names::NEGATIVE_ARRAY_SIZE_EXCEPTION,
                                      count.to_string()).into());
    }
    Ok(count as usize)
}

/// The name of the array class whose elements are instances of `component`.
pub fn array_class_name(component: &Class) -> String {
    if component.is_array() {
        format!("[{}", component.name)
    } else {
        format!("[L{};", component.name)
    }
}

pub fn newarray(thread: &mut Thread) -> ExecResult {
    let atype = thread.read_u8(1)?;
    let class_name = ArrayType::from_atype(atype)
        .and_then(|element_type| element_type.primitive_array_class())
        .ok_or_else(|| VmError::TypeMismatch {
            expected: "primitive array type code",
            found: atype.to_string(),
        })?;
    let count = pop_count(thread)?;
    let class = thread.current_class()?.loader()?.resolve_class(class_name)?;
    thread.push_stack(Value::Reference(JvmObject::new_array(class, count).into_ref()))?;
    advance(thread, 2)
}

pub fn anewarray(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u16(1)?;
    let component = thread.current_class()?.resolve_class_ref(thread, index)?;
    let count = pop_count(thread)?;
    let class = component.loader()?.resolve_class(&array_class_name(&component))?;
    thread.push_stack(Value::Reference(JvmObject::new_array(class, count).into_ref()))?;
    advance(thread, 3)
}

pub fn arraylength(thread: &mut Thread) -> ExecResult {
    let array = thread.pop_object()?;
    let length = array.borrow().array()?.len();
    thread.push_stack(Value::Int(length as i32))?;
    advance(thread, 1)
}

pub fn athrow(thread: &mut Thread) -> ExecResult {
    let exception = thread.pop_object()?;
    Err(JavaException::Thrown(exception).into())
}

pub fn checkcast(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u16(1)?;
    let object = match thread.pop_reference()? {
        Some(object) => object,
        None => {
            thread.push_stack(Value::NullReference)?;
            return advance(thread, 3);
        },
    };
    let target = thread.current_class()?.resolve_class_ref(thread, index)?;
    let class = object.borrow().class().clone();
    if !class.check_cast(&target) {
        return Err(JavaException::new(
            names::CLASS_CAST_EXCEPTION,
            format!("class {} cannot be cast to class {}",
                    class.name.replace('/', "."), target.name.replace('/', "."))).into());
    }
    thread.push_stack(Value::Reference(object))?;
    advance(thread, 3)
}

pub fn instanceof(thread: &mut Thread) -> ExecResult {
    let index = thread.read_u16(1)?;
    let result = match thread.pop_reference()? {
        Some(object) => {
            let target = thread.current_class()?.resolve_class_ref(thread, index)?;
            let class = object.borrow().class().clone();
            class.check_cast(&target)
        },
        None => false,
    };
    thread.push_stack(Value::from_bool(result))?;
    advance(thread, 3)
}

/// Acquires the monitor of the popped object. If another thread owns it, this thread blocks;
/// the pc still moves on, since the monitor hands over ownership before waking the thread.
pub fn monitorenter(thread: &mut Thread) -> ExecResult {
    let object = thread.pop_object()?;
    let status = thread.status_cell().clone();
    let entered = object.borrow_mut().monitor_mut().enter(thread.id(), &status);
    if !entered {
        debug!("thread {} blocked on monitor of {:?}", thread.id(), object.borrow());
    }
    advance(thread, 1)
}

pub fn monitorexit(thread: &mut Thread) -> ExecResult {
    let object = thread.pop_object()?;
    object.borrow_mut().monitor_mut().exit(thread.id())?;
    advance(thread, 1)
}
