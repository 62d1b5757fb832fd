//! Internal JVM representations of classes.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ptr;
use std::rc::{Rc, Weak};

use crate::model::class_file::attributes::BootstrapMethod;
use crate::model::class_file::{class_access_flags, field_access_flags, AttributeInfo, ClassFile,
                               ConstantPoolInfo};
use crate::vm::class_loader::{ClassLoader, LoadError};
use crate::vm::constant_pool::{Resolved, RuntimeConstantPool};
use crate::vm::error::{names, ExecResult, JavaException, VmError};
use crate::vm::heap::ObjectRef;
use crate::vm::member::{method_key, Code, Field, Method};
use crate::vm::sig::{MethodDescriptor, Type};
use crate::vm::thread::Thread;
use crate::vm::value::Value;

/// Where a class is in its lifecycle. §5.5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassStatus {
    /// Loaded and prepared. Static fields hold their default values.
    Linked,
    /// `<clinit>` is running, or is about to run, on some thread.
    Initializing,
    Initialized,
    /// `<clinit>` completed abruptly. Every later use raises `NoClassDefFoundError`.
    Error,
}

#[derive(Debug)]
pub enum ClassKind {
    /// Defined by a class file.
    Ordinary,
    /// Created by the loader for a name starting with `[`.
    Array { component: Rc<Class> },
    /// `int`, `long`, ..., and `void`.
    Primitive,
}

/// A JVM representation of a class that has been loaded.
pub struct Class {
    /// The binary name of the class, e.g. `java/lang/Object`, `[I` or `int`.
    pub name: String,
    pub access_flags: class_access_flags::t,
    pub kind: ClassKind,
    /// The defining loader. It owns this class through its class table.
    loader: Weak<ClassLoader>,
    /// The superclass extended by the class. If the class is `java/lang/Object`, an interface's
    /// missing superclass or a primitive, this is `None`.
    superclass: Option<Weak<Class>>,
    /// The direct superinterfaces, in declaration order.
    interfaces: Vec<Weak<Class>>,
    /// The runtime constant pool, created from the constant pool of the class file.
    pub constant_pool: RuntimeConstantPool,
    /// The fields declared by this class, both `static` and instance, keyed by name and
    /// descriptor.
    pub fields: HashMap<String, Rc<Field>>,
    /// The methods declared by this class, keyed by name and descriptor.
    pub methods: HashMap<String, Rc<Method>>,
    /// Every instance field of an object of this class, including inherited ones, superclass
    /// fields first.
    pub instance_fields: Vec<Rc<Field>>,
    pub bootstrap_methods: Vec<BootstrapMethod>,
    /// The remaining class-level attributes, such as `SourceFile` and unknown ones.
    pub attributes: Vec<AttributeInfo>,
    /// The `java/lang/Class` instance representing this class, created on first use.
    mirror: RefCell<Option<ObjectRef>>,
    status: Cell<ClassStatus>,
}

/// The declaration-level parts of a method, gathered before the class itself exists.
struct MethodParts {
    access_flags: u16,
    name: String,
    descriptor: String,
    signature: MethodDescriptor,
    code: Option<Code>,
}

fn malformed(name: &str, reason: String) -> LoadError {
    LoadError::Malformed { name: name.to_owned(), reason }
}

impl Class {
    /// Creates and prepares a class from its class file. Static fields get their default
    /// values, or the value of a numeric `ConstantValue` attribute; `String` constants are
    /// assigned when the class is initialised.
    ///
    /// No symbolic reference in the constant pool is resolved here.
    pub fn define(name: &str, class_file: &ClassFile, loader: Weak<ClassLoader>,
                  superclass: Option<&Rc<Class>>, interfaces: &[Rc<Class>])
                  -> Result<Rc<Class>, LoadError> {
        let pool = &class_file.constant_pool;

        let mut fields = HashMap::new();
        let mut instance_fields = superclass.map(|superclass| superclass.instance_fields.clone())
            .unwrap_or_default();
        for field_info in &class_file.fields {
            let field_name = pool.utf8(field_info.name_index)
                .ok_or_else(|| malformed(name, "field name is not a Utf8 constant".to_owned()))?;
            let descriptor = pool.utf8(field_info.descriptor_index)
                .ok_or_else(|| malformed(name, "field descriptor is not a Utf8 constant".to_owned()))?;
            let ty = Type::parse(descriptor).ok_or_else(|| LoadError::BadDescriptor {
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
            })?;
            let constant_value = field_info.attributes.iter().filter_map(|attribute| {
                match *attribute {
                    AttributeInfo::ConstantValue { constant_value_index } =>
                        Some(constant_value_index),
                    _ => None,
                }
            }).next();
            let field = Field::new(field_info.access_flags, field_name.to_owned(),
                                   descriptor.to_owned(), ty, name.to_owned(), constant_value);
            if field.is_static() {
                if let Some(value) = constant_value.and_then(|index| numeric_constant(class_file, index)) {
                    field.set(value);
                }
            }
            let field = Rc::new(field);
            if field_info.access_flags & field_access_flags::ACC_STATIC == 0 {
                instance_fields.push(field.clone());
            }
            fields.insert(method_key(&field.name, &field.descriptor), field);
        }

        let mut method_parts = vec![];
        for method_info in &class_file.methods {
            let method_name = pool.utf8(method_info.name_index)
                .ok_or_else(|| malformed(name, "method name is not a Utf8 constant".to_owned()))?;
            let descriptor = pool.utf8(method_info.descriptor_index)
                .ok_or_else(|| malformed(name, "method descriptor is not a Utf8 constant".to_owned()))?;
            let signature = MethodDescriptor::parse(descriptor).ok_or_else(|| {
                LoadError::BadDescriptor { name: name.to_owned(), descriptor: descriptor.to_owned() }
            })?;
            let code = method_info.attributes.iter().filter_map(|attribute| match *attribute {
                AttributeInfo::Code { max_stack, max_locals, ref code, ref exception_table,
                                      ref attributes } =>
                    Some(Code {
                        max_stack,
                        max_locals,
                        code: code.clone(),
                        exception_table: exception_table.clone(),
                        attributes: attributes.clone(),
                    }),
                _ => None,
            }).next();
            method_parts.push(MethodParts {
                access_flags: method_info.access_flags,
                name: method_name.to_owned(),
                descriptor: descriptor.to_owned(),
                signature,
                code,
            });
        }

        let mut bootstrap_methods = vec![];
        let mut attributes = vec![];
        for attribute in &class_file.attributes {
            match *attribute {
                AttributeInfo::BootstrapMethods { bootstrap_methods: ref methods } =>
                    bootstrap_methods.extend(methods.iter().cloned()),
                ref other => attributes.push(other.clone()),
            }
        }

        let class = Rc::new_cyclic(|me: &Weak<Class>| {
            let methods = method_parts.into_iter().map(|parts| {
                let method = Method {
                    access_flags: parts.access_flags,
                    name: parts.name,
                    descriptor: parts.descriptor,
                    signature: parts.signature,
                    class_name: name.to_owned(),
                    class: me.clone(),
                    code: parts.code,
                };
                (method.key(), Rc::new(method))
            }).collect();
            Class {
                name: name.to_owned(),
                access_flags: class_file.access_flags,
                kind: ClassKind::Ordinary,
                loader,
                superclass: superclass.map(Rc::downgrade),
                interfaces: interfaces.iter().map(Rc::downgrade).collect(),
                constant_pool: RuntimeConstantPool::new(&class_file.constant_pool),
                fields,
                methods,
                instance_fields,
                bootstrap_methods,
                attributes,
                mirror: RefCell::new(None),
                status: Cell::new(ClassStatus::Linked),
            }
        });
        Ok(class)
    }

    /// Creates an array class. Arrays extend `java/lang/Object`, implement `Cloneable` and
    /// `Serializable` and have nothing to initialise. §5.3.3
    pub fn new_array(name: &str, component: Rc<Class>, loader: Weak<ClassLoader>,
                     object_class: &Rc<Class>, interfaces: &[Rc<Class>]) -> Rc<Class> {
        let access_flags = (component.access_flags & class_access_flags::ACC_PUBLIC)
            | class_access_flags::ACC_FINAL | class_access_flags::ACC_ABSTRACT;
        Rc::new(Class {
            name: name.to_owned(),
            access_flags,
            kind: ClassKind::Array { component },
            loader,
            superclass: Some(Rc::downgrade(object_class)),
            interfaces: interfaces.iter().map(Rc::downgrade).collect(),
            constant_pool: RuntimeConstantPool::empty(),
            fields: HashMap::new(),
            methods: HashMap::new(),
            instance_fields: vec![],
            bootstrap_methods: vec![],
            attributes: vec![],
            mirror: RefCell::new(None),
            status: Cell::new(ClassStatus::Initialized),
        })
    }

    pub fn new_primitive(name: &str, loader: Weak<ClassLoader>) -> Rc<Class> {
        Rc::new(Class {
            name: name.to_owned(),
            access_flags: class_access_flags::ACC_PUBLIC | class_access_flags::ACC_FINAL
                | class_access_flags::ACC_ABSTRACT,
            kind: ClassKind::Primitive,
            loader,
            superclass: None,
            interfaces: vec![],
            constant_pool: RuntimeConstantPool::empty(),
            fields: HashMap::new(),
            methods: HashMap::new(),
            instance_fields: vec![],
            bootstrap_methods: vec![],
            attributes: vec![],
            mirror: RefCell::new(None),
            status: Cell::new(ClassStatus::Initialized),
        })
    }

    pub fn superclass(&self) -> Option<Rc<Class>> {
        self.superclass.as_ref().and_then(Weak::upgrade)
    }

    pub fn interfaces(&self) -> Vec<Rc<Class>> {
        self.interfaces.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn loader(&self) -> Result<Rc<ClassLoader>, VmError> {
        self.loader.upgrade().ok_or_else(|| VmError::ClassDropped { name: self.name.clone() })
    }

    pub fn status(&self) -> ClassStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: ClassStatus) {
        self.status.set(status);
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & class_access_flags::ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & class_access_flags::ACC_ABSTRACT != 0
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ClassKind::Array { .. })
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ClassKind::Primitive)
    }

    /// The component class of an array class.
    pub fn component(&self) -> Option<&Rc<Class>> {
        match self.kind {
            ClassKind::Array { ref component } => Some(component),
            _ => None,
        }
    }

    pub fn mirror(&self) -> Option<ObjectRef> {
        self.mirror.borrow().clone()
    }

    pub fn set_mirror(&self, mirror: ObjectRef) {
        *self.mirror.borrow_mut() = Some(mirror);
    }

    /// The method declared by this class with the given name and descriptor.
    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        self.methods.get(&method_key(name, descriptor)).cloned()
    }

    pub fn clinit(&self) -> Option<Rc<Method>> {
        self.get_method("<clinit>", "()V")
    }

    /// Searches this class and then its superclasses for a method. Superinterfaces are not
    /// searched.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        self.get_method(name, descriptor).or_else(|| {
            self.superclass().and_then(|superclass| superclass.find_method(name, descriptor))
        })
    }

    /// Searches the superinterfaces, depth first.
    fn find_interface_method(&self, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        for interface in self.interfaces() {
            let found = interface.get_method(name, descriptor)
                .or_else(|| interface.find_interface_method(name, descriptor));
            if found.is_some() {
                return found;
            }
        }
        self.superclass().and_then(|superclass| superclass.find_interface_method(name, descriptor))
    }

    /// Method resolution: this class, its superclasses, then its superinterfaces. §5.4.3.3
    pub fn resolve_method(&self, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        self.find_method(name, descriptor)
            .or_else(|| self.find_interface_method(name, descriptor))
    }

    /// Selects the method run by `invokevirtual` or `invokeinterface` on an instance of this
    /// class. An overriding method in the class chain wins; otherwise a default method from a
    /// superinterface. Returns the abstract declaration when there is no implementation, so that
    /// the caller can raise `AbstractMethodError`.
    pub fn dispatch_method(&self, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        let declared = self.find_method(name, descriptor)
            .filter(|method| !method.is_static());
        match declared {
            Some(ref method) if !method.is_abstract() => declared,
            _ => {
                let default = self.find_interface_method(name, descriptor)
                    .filter(|method| !method.is_abstract() && !method.is_static());
                default.or(declared)
            },
        }
    }

    /// Field resolution: declared fields, superinterfaces, then the superclass. §5.4.3.2
    pub fn resolve_field(&self, name: &str, descriptor: &str) -> Option<Rc<Field>> {
        if let Some(field) = self.fields.get(&method_key(name, descriptor)) {
            return Some(field.clone());
        }
        for interface in self.interfaces() {
            if let Some(field) = interface.resolve_field(name, descriptor) {
                return Some(field);
            }
        }
        self.superclass().and_then(|superclass| superclass.resolve_field(name, descriptor))
    }

    /// Returns true if this class is `other` or a direct or indirect subclass of it. Classes are
    /// compared by identity: two loaders may define different classes with the same name.
    pub fn is_descendant(&self, other: &Class) -> bool {
        if ptr::eq(self, other) {
            true
        } else {
            self.superclass().map_or(false, |superclass| superclass.is_descendant(other))
        }
    }

    /// Returns true if this class or one of its superclasses implements the named interface,
    /// directly or through another interface.
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces().iter().any(|direct| {
            direct.name == interface || direct.implements(interface)
        }) || self.superclass().map_or(false, |superclass| superclass.implements(interface))
    }

    /// Returns true if this class or one of its superclasses implements `interface`, directly or
    /// through another interface.
    pub fn is_implementation_of(&self, interface: &Class) -> bool {
        self.interfaces().iter().any(|direct| {
            ptr::eq(&**direct, interface) || direct.is_implementation_of(interface)
        }) || self.superclass()
            .map_or(false, |superclass| superclass.is_implementation_of(interface))
    }

    /// The assignment rule used by `checkcast`, `instanceof`, `aastore` and exception handler
    /// matching: can a value of this class be stored in a variable of type `target`?
    /// §6.5.checkcast
    pub fn check_cast(&self, target: &Class) -> bool {
        match (self.component(), target.component()) {
            (Some(component), Some(target_component)) => {
                if component.is_primitive() || target_component.is_primitive() {
                    component.name == target_component.name
                } else {
                    component.check_cast(target_component)
                }
            },
            (Some(_), None) => matches!(target.name.as_str(),
                                        "java/lang/Object" | "java/lang/Cloneable"
                                        | "java/io/Serializable"),
            (None, Some(_)) => false,
            (None, None) => {
                if target.is_interface() {
                    ptr::eq(self, target) || self.is_implementation_of(target)
                } else if self.is_interface() {
                    target.name == "java/lang/Object"
                } else {
                    self.is_descendant(target)
                }
            },
        }
    }

    /// Resolves the constant pool entry at `index`, replacing it in place on success.
    pub fn resolve_reference(&self, thread: &Thread, index: u16) -> ExecResult<Resolved> {
        self.constant_pool.resolve(self, thread.jvm(), index)
    }

    pub fn resolve_class_ref(&self, thread: &Thread, index: u16) -> ExecResult<Rc<Class>> {
        match self.resolve_reference(thread, index)? {
            Resolved::Class(class) => Ok(class),
            other => Err(self.unexpected(index, "Class", &other).into()),
        }
    }

    pub fn resolve_field_ref(&self, thread: &Thread, index: u16) -> ExecResult<Rc<Field>> {
        match self.resolve_reference(thread, index)? {
            Resolved::Field(field) => Ok(field),
            other => Err(self.unexpected(index, "Fieldref", &other).into()),
        }
    }

    pub fn resolve_method_ref(&self, thread: &Thread, index: u16) -> ExecResult<Rc<Method>> {
        match self.resolve_reference(thread, index)? {
            Resolved::Method(method) => Ok(method),
            other => Err(self.unexpected(index, "Methodref", &other).into()),
        }
    }

    pub fn resolve_string(&self, thread: &Thread, index: u16) -> ExecResult<ObjectRef> {
        match self.resolve_reference(thread, index)? {
            Resolved::String(string) => Ok(string),
            other => Err(self.unexpected(index, "String", &other).into()),
        }
    }

    fn unexpected(&self, index: u16, expected: &str, found: &Resolved) -> VmError {
        VmError::ConstantPool {
            index,
            reason: format!("expected {} in {} but found {:?}", expected, self.name, found),
        }
    }

    /// Raises `NoClassDefFoundError` if an earlier initialisation of this class failed.
    pub fn check_not_erroneous(&self) -> Result<(), JavaException> {
        if self.status() == ClassStatus::Error {
            Err(JavaException::new(names::NO_CLASS_DEF_FOUND_ERROR,
                                   format!("Could not initialize class {}", self.name)))
        } else {
            Ok(())
        }
    }
}

/// The value of a numeric `ConstantValue` initialiser. `String` constants need the heap and
/// are left to initialisation.
fn numeric_constant(class_file: &ClassFile, index: u16) -> Option<Value> {
    match *class_file.constant_pool.get(index as usize)? {
        ConstantPoolInfo::Integer { bytes } => Some(Value::Int(bytes as i32)),
        ConstantPoolInfo::Float { bytes } => Some(Value::Float(f32::from_bits(bytes))),
        ConstantPoolInfo::Long { high_bytes, low_bytes } =>
            Some(Value::Long((((high_bytes as u64) << 32) | low_bytes as u64) as i64)),
        ConstantPoolInfo::Double { high_bytes, low_bytes } =>
            Some(Value::Double(f64::from_bits(((high_bytes as u64) << 32) | low_bytes as u64))),
        _ => None,
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("access_flags", &format_args!("{:#06x}", self.access_flags))
            .field("status", &self.status.get())
            .field("superclass", &self.superclass().map(|superclass| superclass.name.clone()))
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}
