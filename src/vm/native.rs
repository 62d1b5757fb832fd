//! Host implementations of `native` methods.
//!
//! A native runs when the interpreter reaches a frame whose method has no code. It receives the
//! frame's local variables (`this` first) and must complete the frame itself, either by calling
//! `return_stack_frame` or by returning a `Trap::Throw`.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::vm::error::{names, ExecResult, JavaException};
use crate::vm::heap::{ArrayType, ObjectRef};
use crate::vm::member::field_key;
use crate::vm::thread::Thread;
use crate::vm::value::Value;

pub type NativeMethod = Rc<dyn Fn(&mut Thread, Vec<Value>) -> ExecResult>;

/// The key natives are registered under: `class.name` followed by the method descriptor, e.g.
/// `java/lang/Object.hashCode()I`.
pub fn key(class_name: &str, name: &str, descriptor: &str) -> String {
    format!("{}.{}{}", class_name, name, descriptor)
}

pub struct NativeTable {
    methods: HashMap<String, NativeMethod>,
}

impl fmt::Debug for NativeTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut keys: Vec<_> = self.methods.keys().collect();
        keys.sort();
        f.debug_struct("NativeTable").field("methods", &keys).finish()
    }
}

impl NativeTable {
    pub fn new() -> Self {
        NativeTable { methods: HashMap::new() }
    }

    /// A table holding the natives of the core classes.
    pub fn with_defaults() -> Self {
        let mut table = NativeTable::new();
        register_object(&mut table);
        register_system(&mut table);
        register_boxes(&mut table);
        register_throwable(&mut table);
        register_io(&mut table);
        table.register("java/lang/String", "intern()Ljava/lang/String;", |thread, locals| {
            let string = this(&locals)?;
            let value = thread.jvm().string_value(&string)?;
            let interned = thread.jvm().intern(&value)?;
            thread.return_stack_frame(Some(Value::Reference(interned)))
        });
        table
    }

    /// Registers `f` for the method `name_and_descriptor` (e.g. `hashCode()I`) of `class_name`,
    /// replacing any earlier binding.
    pub fn register<F>(&mut self, class_name: &str, name_and_descriptor: &str, f: F)
        where F: Fn(&mut Thread, Vec<Value>) -> ExecResult + 'static
    {
        self.methods.insert(format!("{}.{}", class_name, name_and_descriptor), Rc::new(f));
    }

    pub fn lookup(&self, key: &str) -> Option<NativeMethod> {
        self.methods.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for NativeTable {
    fn default() -> Self {
        NativeTable::with_defaults()
    }
}

fn arg(locals: &[Value], index: usize) -> Value {
    locals.get(index).cloned().unwrap_or(Value::NullReference)
}

/// The receiver of an instance native. It is never `null`, `invokevirtual` checks first.
fn this(locals: &[Value]) -> ExecResult<ObjectRef> {
    match arg(locals, 0).as_reference()? {
        Some(object) => Ok(object),
        None => Err(JavaException::null_pointer().into()),
    }
}

fn register_object(table: &mut NativeTable) {
    const OBJECT: &str = "java/lang/Object";
    table.register(OBJECT, "registerNatives()V", |thread, _| thread.return_stack_frame(None));
    table.register(OBJECT, "hashCode()I", |thread, locals| {
        let hash = this(&locals)?.borrow().hash_code();
        thread.return_stack_frame(Some(Value::Int(hash)))
    });
    table.register(OBJECT, "getClass()Ljava/lang/Class;", |thread, locals| {
        let class = this(&locals)?.borrow().class().clone();
        let mirror = thread.jvm().class_mirror(&class)?;
        thread.return_stack_frame(Some(Value::Reference(mirror)))
    });
    table.register(OBJECT, "clone()Ljava/lang/Object;", |thread, locals| {
        let object = this(&locals)?;
        let copy = {
            let object = object.borrow();
            let class = object.class();
            if !object.is_array() && !class.implements("java/lang/Cloneable") {
                return Err(JavaException::new(names::CLONE_NOT_SUPPORTED_EXCEPTION,
                                              class.name.replace('/', ".")).into());
            }
            object.shallow_clone()
        };
        thread.return_stack_frame(Some(Value::Reference(copy.into_ref())))
    });
    table.register(OBJECT, "wait()V", |thread, locals| object_wait(thread, &locals, 0));
    table.register(OBJECT, "wait(J)V", |thread, locals| {
        let timeout = arg(&locals, 1).as_long()?;
        object_wait(thread, &locals, timeout)
    });
    table.register(OBJECT, "notify()V", |thread, locals| {
        this(&locals)?.borrow_mut().monitor_mut().notify(thread.id())?;
        thread.return_stack_frame(None)
    });
    table.register(OBJECT, "notifyAll()V", |thread, locals| {
        this(&locals)?.borrow_mut().monitor_mut().notify_all(thread.id())?;
        thread.return_stack_frame(None)
    });
}

/// The frame completes before the thread parks, so that it resumes after the call once the
/// monitor hands it back.
fn object_wait(thread: &mut Thread, locals: &[Value], timeout: i64) -> ExecResult {
    let object = this(locals)?;
    let status = thread.status_cell().clone();
    object.borrow_mut().monitor_mut().wait(thread.id(), &status, timeout)?;
    thread.return_stack_frame(None)
}

fn register_system(table: &mut NativeTable) {
    const SYSTEM: &str = "java/lang/System";
    table.register(SYSTEM, "registerNatives()V", |thread, _| thread.return_stack_frame(None));
    table.register(SYSTEM, "arraycopy(Ljava/lang/Object;ILjava/lang/Object;II)V",
                   |thread, locals| {
        let source = arg(&locals, 0).as_reference()?;
        let source_pos = arg(&locals, 1).as_int()?;
        let dest = arg(&locals, 2).as_reference()?;
        let dest_pos = arg(&locals, 3).as_int()?;
        let length = arg(&locals, 4).as_int()?;
        match (source, dest) {
            (Some(source), Some(dest)) =>
                array_copy(&source, source_pos, &dest, dest_pos, length)?,
            _ => return Err(JavaException::null_pointer().into()),
        }
        thread.return_stack_frame(None)
    });
    table.register(SYSTEM, "identityHashCode(Ljava/lang/Object;)I", |thread, locals| {
        let hash = match arg(&locals, 0).as_reference()? {
            Some(object) => object.borrow().hash_code(),
            None => 0,
        };
        thread.return_stack_frame(Some(Value::Int(hash)))
    });
}

fn array_store_error(message: &str) -> JavaException {
    JavaException::new(names::ARRAY_STORE_EXCEPTION, message)
}

/// `System.arraycopy`. Overlapping copies within one array behave as if the source range was
/// first copied to a temporary buffer.
fn array_copy(source: &ObjectRef, source_pos: i32, dest: &ObjectRef, dest_pos: i32, length: i32)
              -> Result<(), JavaException> {
    let (buffer, source_type) = {
        let source = source.borrow();
        let array = match source.array() {
            Ok(array) => array,
            Err(_) => return Err(array_store_error("arraycopy: source type is not an array")),
        };
        if source_pos < 0 || length < 0 || source_pos as i64 + length as i64 > array.len() as i64 {
            return Err(JavaException::new(
                names::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
                format!("arraycopy: last source index {} out of bounds for length {}",
                        source_pos as i64 + length as i64, array.len())));
        }
        let start = source_pos as usize;
        (array.elements()[start..start + length as usize].to_vec(), array.element_type())
    };

    let mut dest = dest.borrow_mut();
    let component = dest.class().component().cloned();
    let array = match dest.array_mut() {
        Ok(array) => array,
        Err(_) => return Err(array_store_error("arraycopy: destination type is not an array")),
    };
    if source_type != array.element_type() {
        return Err(array_store_error("arraycopy: type mismatch"));
    }
    if dest_pos < 0 || dest_pos as i64 + length as i64 > array.len() as i64 {
        return Err(JavaException::new(
            names::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
            format!("arraycopy: last destination index {} out of bounds for length {}",
                    dest_pos as i64 + length as i64, array.len())));
    }
    for (offset, value) in buffer.into_iter().enumerate() {
        if let (ArrayType::Reference, Value::Reference(ref element), Some(ref component)) =
                (source_type, &value, &component) {
            if !element.borrow().class().check_cast(component) {
                return Err(array_store_error("arraycopy: element type mismatch"));
            }
        }
        array.set(dest_pos as usize + offset, value);
    }
    Ok(())
}

fn register_boxes(table: &mut NativeTable) {
    table.register("java/lang/Float", "floatToRawIntBits(F)I", |thread, locals| {
        let bits = arg(&locals, 0).as_float()?.to_bits() as i32;
        thread.return_stack_frame(Some(Value::Int(bits)))
    });
    table.register("java/lang/Float", "intBitsToFloat(I)F", |thread, locals| {
        let value = f32::from_bits(arg(&locals, 0).as_int()? as u32);
        thread.return_stack_frame(Some(Value::Float(value)))
    });
    table.register("java/lang/Double", "doubleToRawLongBits(D)J", |thread, locals| {
        let bits = arg(&locals, 0).as_double()?.to_bits() as i64;
        thread.return_stack_frame64(Value::Long(bits))
    });
    table.register("java/lang/Double", "longBitsToDouble(J)D", |thread, locals| {
        let value = f64::from_bits(arg(&locals, 0).as_long()? as u64);
        thread.return_stack_frame64(Value::Double(value))
    });
}

fn register_throwable(table: &mut NativeTable) {
    const THROWABLE: &str = "java/lang/Throwable";
    table.register(THROWABLE, "fillInStackTrace(I)Ljava/lang/Throwable;", |thread, locals| {
        let this = this(&locals)?;
        thread.return_stack_frame(Some(Value::Reference(this)))
    });
    table.register(THROWABLE, "getStackTraceDepth()I", |thread, _| {
        thread.return_stack_frame(Some(Value::Int(0)))
    });
}

fn register_io(table: &mut NativeTable) {
    table.register("java/io/FileOutputStream", "writeBytes([BIIZ)V", |thread, locals| {
        let stream = this(&locals)?;
        let bytes = match arg(&locals, 1).as_reference()? {
            Some(bytes) => bytes,
            None => return Err(JavaException::null_pointer().into()),
        };
        let offset = arg(&locals, 2).as_int()?;
        let length = arg(&locals, 3).as_int()?;

        let descriptor = stream.borrow().get_field(
            &field_key("java/io/FileOutputStream", "fd", "Ljava/io/FileDescriptor;"))?;
        let fd = match descriptor.as_reference()? {
            Some(descriptor) => descriptor.borrow()
                .get_field(&field_key("java/io/FileDescriptor", "fd", "I"))?.as_int()?,
            None => -1,
        };

        let text = {
            let bytes = bytes.borrow();
            let array = bytes.array()?;
            if offset < 0 || length < 0 || offset as i64 + length as i64 > array.len() as i64 {
                let end = offset.saturating_add(length);
                return Err(JavaException::array_index(end, array.len()).into());
            }
            let start = offset as usize;
            let raw = array.elements()[start..start + length as usize].iter()
                .map(|value| value.as_int().map(|byte| byte as u8))
                .collect::<Result<Vec<u8>, _>>()?;
            String::from_utf8_lossy(&raw).into_owned()
        };
        match fd {
            1 => thread.jvm().system().stdout(&text),
            2 => thread.jvm().system().stderr(&text),
            _ => return Err(JavaException::new("java/io/IOException",
                                               "Bad file descriptor").into()),
        }
        thread.return_stack_frame(None)
    });
}
