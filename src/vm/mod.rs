//! The Java virtual machine: class loading, linking and a cooperative bytecode interpreter.

pub mod bytecode;
pub mod class;
pub mod class_loader;
pub mod constant_pool;
pub mod error;
pub mod frame;
pub mod heap;
pub mod interpreter;
pub mod member;
pub mod monitor;
pub mod native;
pub mod sig;
pub mod system;
pub mod thread;
pub mod thread_pool;
pub mod value;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub use crate::vm::class::{Class, ClassStatus};
pub use crate::vm::class_loader::{ClassLoader, LoadError};
pub use crate::vm::error::{ExecResult, JavaException, Trap, VmError};
pub use crate::vm::heap::{JvmObject, ObjectRef};
pub use crate::vm::system::{MemorySystem, NativeSystem, System};
pub use crate::vm::thread::{Thread, ThreadStatus};
pub use crate::vm::thread_pool::ThreadPool;
pub use crate::vm::value::Value;

use crate::vm::error::names;
use crate::vm::member::field_key;
use crate::vm::native::{NativeMethod, NativeTable};

const STRING_VALUE: (&str, &str, &str) = ("java/lang/String", "value", "[C");
const THROWABLE_MESSAGE: (&str, &str, &str) =
    ("java/lang/Throwable", "detailMessage", "Ljava/lang/String;");
const CLASS_NAME: (&str, &str, &str) = ("java/lang/Class", "name", "Ljava/lang/String;");

/// Settings fixed when the VM is created.
#[derive(Debug, Clone)]
pub struct JvmOptions {
    /// Directory the bootstrap loader reads the core classes from.
    pub class_path: String,
    /// Directory the application loader reads user classes from.
    pub user_dir: String,
    /// Frames a thread may hold before `StackOverflowError`.
    pub max_stack_frames: usize,
}

impl Default for JvmOptions {
    fn default() -> Self {
        JvmOptions {
            class_path: String::from("lib"),
            user_dir: String::from("."),
            max_stack_frames: 1024,
        }
    }
}

/// State shared by every thread of one VM instance.
pub struct Jvm {
    pub options: JvmOptions,
    system: Rc<dyn System>,
    bootstrap: Rc<ClassLoader>,
    application: Rc<ClassLoader>,
    natives: RefCell<NativeTable>,
    /// Interned `java/lang/String` instances by value.
    strings: RefCell<HashMap<String, ObjectRef>>,
    next_thread_id: Cell<u64>,
}

impl Jvm {
    pub fn new(system: Rc<dyn System>, options: JvmOptions) -> Rc<Jvm> {
        let bootstrap = ClassLoader::bootstrap(&options.class_path, system.clone());
        let application = ClassLoader::application(&options.user_dir, system.clone(),
                                                   bootstrap.clone());
        info!("jvm: class path {}, user dir {}", options.class_path, options.user_dir);
        Rc::new(Jvm {
            options,
            system,
            bootstrap,
            application,
            natives: RefCell::new(NativeTable::with_defaults()),
            strings: RefCell::new(HashMap::new()),
            next_thread_id: Cell::new(1),
        })
    }

    pub fn system(&self) -> &Rc<dyn System> {
        &self.system
    }

    pub fn bootstrap_loader(&self) -> &Rc<ClassLoader> {
        &self.bootstrap
    }

    pub fn application_loader(&self) -> &Rc<ClassLoader> {
        &self.application
    }

    /// Binds a native implementation for `name_and_descriptor` of `class_name`.
    pub fn register_native<F>(&self, class_name: &str, name_and_descriptor: &str, f: F)
        where F: Fn(&mut Thread, Vec<Value>) -> ExecResult + 'static
    {
        self.natives.borrow_mut().register(class_name, name_and_descriptor, f);
    }

    pub fn native(&self, key: &str) -> Option<NativeMethod> {
        self.natives.borrow().lookup(key)
    }

    /// Resolves a class through the application loader, which delegates to the bootstrap
    /// loader first.
    pub fn resolve_class(&self, name: &str) -> Result<Rc<Class>, LoadError> {
        self.application.resolve_class(name)
    }

    /// A class the VM itself depends on. Failing to load one is fatal.
    fn core_class(&self, name: &str) -> Result<Rc<Class>, VmError> {
        self.resolve_class(name).map_err(|source| {
            VmError::MissingCoreClass { class: name.to_owned(), source }
        })
    }

    /// Returns the unique `java/lang/String` instance holding `value`.
    pub fn intern(&self, value: &str) -> Result<ObjectRef, VmError> {
        if let Some(string) = self.strings.borrow().get(value) {
            return Ok(string.clone());
        }
        let string = self.new_string(value)?;
        self.strings.borrow_mut().insert(value.to_owned(), string.clone());
        Ok(string)
    }

    /// Creates a `java/lang/String` whose `value` array holds the UTF-16 units of `value`.
    pub fn new_string(&self, value: &str) -> Result<ObjectRef, VmError> {
        let units: Vec<Value> = value.encode_utf16().map(|unit| Value::Int(unit as i32)).collect();
        let mut array = JvmObject::new_array(self.core_class("[C")?, units.len());
        array.array_mut()?.elements_mut().clone_from_slice(&units);

        let mut string = JvmObject::new(self.core_class(STRING_VALUE.0)?);
        let (class_name, name, descriptor) = STRING_VALUE;
        string.put_field(&field_key(class_name, name, descriptor),
                         Value::Reference(array.into_ref()))?;
        Ok(string.into_ref())
    }

    /// The contents of a `java/lang/String` instance.
    pub fn string_value(&self, string: &ObjectRef) -> Result<String, VmError> {
        let (class_name, name, descriptor) = STRING_VALUE;
        let value = string.borrow().get_field(&field_key(class_name, name, descriptor))?;
        let chars = match value.as_reference()? {
            Some(chars) => chars,
            None => return Ok(String::new()),
        };
        let chars = chars.borrow();
        let units = chars.array()?.elements().iter()
            .map(|unit| unit.as_int().map(|unit| unit as u16))
            .collect::<Result<Vec<u16>, _>>()?;
        Ok(String::from_utf16_lossy(&units))
    }

    /// Instantiates a Throwable without running its constructor. `detailMessage` is set when
    /// the class declares it and `message` is not empty.
    pub fn new_throwable(&self, class_name: &str, message: &str) -> Result<ObjectRef, VmError> {
        let class = self.core_class(class_name)?;
        let mut throwable = JvmObject::new(class);
        let (owner, name, descriptor) = THROWABLE_MESSAGE;
        let key = field_key(owner, name, descriptor);
        if !message.is_empty() && throwable.has_field(&key) {
            throwable.put_field(&key, Value::Reference(self.new_string(message)?))?;
        }
        Ok(throwable.into_ref())
    }

    /// The `detailMessage` of a Throwable, if set.
    pub fn throwable_message(&self, throwable: &ObjectRef) -> Result<Option<String>, VmError> {
        let (owner, name, descriptor) = THROWABLE_MESSAGE;
        let key = field_key(owner, name, descriptor);
        let message = {
            let throwable = throwable.borrow();
            if !throwable.has_field(&key) {
                return Ok(None);
            }
            throwable.get_field(&key)?.as_reference()?
        };
        match message {
            Some(message) => Ok(Some(self.string_value(&message)?)),
            None => Ok(None),
        }
    }

    /// The `java/lang/Class` instance representing `class`, created on first request.
    pub fn class_mirror(&self, class: &Rc<Class>) -> Result<ObjectRef, VmError> {
        if let Some(mirror) = class.mirror() {
            return Ok(mirror);
        }
        let mut mirror = JvmObject::new(self.core_class(CLASS_NAME.0)?);
        let (owner, name, descriptor) = CLASS_NAME;
        let key = field_key(owner, name, descriptor);
        if mirror.has_field(&key) {
            let name = self.intern(&class.name.replace('/', "."))?;
            mirror.put_field(&key, Value::Reference(name))?;
        }
        let mirror = mirror.into_ref();
        class.set_mirror(mirror.clone());
        Ok(mirror)
    }

    pub fn new_thread(self: &Rc<Self>) -> Thread {
        let id = self.next_thread_id.get();
        self.next_thread_id.set(id + 1);
        Thread::new(id, self.clone())
    }

    /// Creates a thread about to run `public static void main(String[])` of `class_name`, with
    /// the class initialised first. A class that cannot be loaded, or has no `main`, leaves the
    /// thread terminated with the matching exception.
    pub fn spawn_main(self: &Rc<Self>, class_name: &str) -> Result<Thread, VmError> {
        let mut thread = self.new_thread();
        let result = self.start_main(&mut thread, class_name);
        match result {
            Ok(()) => (),
            Err(Trap::Throw(exception)) => thread.raise(exception)?,
            Err(Trap::Fatal(error)) => return Err(error),
        }
        Ok(thread)
    }

    fn start_main(&self, thread: &mut Thread, class_name: &str) -> ExecResult {
        let class = self.resolve_class(class_name)?;
        let main = match class.get_method("main", "([Ljava/lang/String;)V") {
            Some(ref main) if main.is_static() => main.clone(),
            _ => return Err(JavaException::new(names::NO_SUCH_METHOD_ERROR,
                                               format!("{}.main", class_name)).into()),
        };
        let args = JvmObject::new_array(self.resolve_class("[Ljava/lang/String;")?, 0);
        thread.start_in(&class, main, vec![Value::Reference(args.into_ref())])
    }

    /// Runs `main` of `class_name` to completion on a single thread.
    pub fn run_main(self: &Rc<Self>, class_name: &str) -> Result<Thread, VmError> {
        let mut thread = self.spawn_main(class_name)?;
        thread.run()?;
        Ok(thread)
    }
}
