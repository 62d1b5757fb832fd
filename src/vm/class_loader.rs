//! Loading, linking and caching of classes. §5.3
//!
//! The VM has two loaders. The bootstrap loader reads the runtime library and is the only
//! loader that creates primitive classes; the application loader reads user classes and asks
//! its parent first.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::model::class_file::ClassFile;
use crate::parser::{self, ClassFormatError};
use crate::vm::class::Class;
use crate::vm::error::names;
use crate::vm::sig::{self, Type};
use crate::vm::system::System;

/// The newest class file version the loader accepts (Java SE 8).
pub const MAX_MAJOR_VERSION: u16 = 52;

#[derive(Debug, Error)]
pub enum LoadError {
    /// If no "purported representation" of the class is found. §5.3.1.
    #[error("{name}")]
    ClassNotFound { name: String },
    /// The "purported representation" does not follow the class file format. §5.3.5.
    #[error("{name}: {source}")]
    ClassFormat {
        name: String,
        #[source]
        source: ClassFormatError,
    },
    /// The class file parses, but its contents cannot be turned into a class.
    #[error("{name}: {reason}")]
    Malformed { name: String, reason: String },
    #[error("{name}: illegal descriptor {descriptor}")]
    BadDescriptor { name: String, descriptor: String },
    /// The "purported representation" is not of a supported version. §5.3.5.
    #[error("{name} has unsupported class file version {major}.{minor}")]
    UnsupportedVersion { name: String, major: u16, minor: u16 },
    /// The "purported representation" does not actually represent the requested class. §5.3.5.
    #[error("{name} (wrong name: {found})")]
    NoClassDefFound { name: String, found: String },
    /// (A subtlety here is that recursive class loading to load superclasses is performed as part
    /// of resolution (§5.3.5, step 3). Therefore, a ClassNotFoundException that results from a
    /// class loader failing to load a superclass must be wrapped in a NoClassDefFoundError.) §5.3
    #[error("{name}: {cause}")]
    NoClassDefFoundCause {
        name: String,
        #[source]
        cause: Box<LoadError>,
    },
    /// The declared superclass (superinterface) is actually an interface (class).
    #[error("{name}: {reason}")]
    IncompatibleClassChange { name: String, reason: String },
    /// The class is its own superclass or superinterface. §5.3.5.
    #[error("{name}")]
    ClassCircularity { name: String },
}

impl LoadError {
    /// The guest exception this failure turns into when it happens inside a thread.
    pub fn exception_class(&self) -> &'static str {
        match *self {
            LoadError::ClassNotFound { .. } => names::CLASS_NOT_FOUND_EXCEPTION,
            LoadError::ClassFormat { .. } | LoadError::Malformed { .. }
                | LoadError::BadDescriptor { .. } => names::CLASS_FORMAT_ERROR,
            LoadError::UnsupportedVersion { .. } => names::UNSUPPORTED_CLASS_VERSION_ERROR,
            LoadError::NoClassDefFound { .. } | LoadError::NoClassDefFoundCause { .. } =>
                names::NO_CLASS_DEF_FOUND_ERROR,
            LoadError::IncompatibleClassChange { .. } => names::INCOMPATIBLE_CLASS_CHANGE_ERROR,
            LoadError::ClassCircularity { .. } => names::CLASS_CIRCULARITY_ERROR,
        }
    }
}

pub struct ClassLoader {
    /// `bootstrap` or `application`, for log messages.
    name: &'static str,
    class_path: String,
    parent: Option<Rc<ClassLoader>>,
    system: Rc<dyn System>,
    /// Every class this loader defined. The loader owns them; classes only hold weak references
    /// to each other.
    classes: RefCell<HashMap<String, Rc<Class>>>,
    /// Classes whose superclasses are being loaded right now.
    pending: RefCell<HashSet<String>>,
    me: Weak<ClassLoader>,
}

impl ClassLoader {
    pub fn bootstrap(class_path: &str, system: Rc<dyn System>) -> Rc<ClassLoader> {
        ClassLoader::new("bootstrap", class_path, None, system)
    }

    pub fn application(class_path: &str, system: Rc<dyn System>, parent: Rc<ClassLoader>)
                       -> Rc<ClassLoader> {
        ClassLoader::new("application", class_path, Some(parent), system)
    }

    fn new(name: &'static str, class_path: &str, parent: Option<Rc<ClassLoader>>,
           system: Rc<dyn System>) -> Rc<ClassLoader> {
        Rc::new_cyclic(|me| ClassLoader {
            name,
            class_path: class_path.to_owned(),
            parent,
            system,
            classes: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashSet::new()),
            me: me.clone(),
        })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn parent(&self) -> Option<&Rc<ClassLoader>> {
        self.parent.as_ref()
    }

    /// The class with this name, if this loader has defined it.
    pub fn find_loaded_class(&self, name: &str) -> Option<Rc<Class>> {
        self.classes.borrow().get(name).cloned()
    }

    pub fn loaded_class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Finds or loads a class. The parent loader is asked first; this loader only tries itself
    /// when the parent reports the class as not found.
    pub fn resolve_class(&self, name: &str) -> Result<Rc<Class>, LoadError> {
        if let Some(class) = self.find_loaded_class(name) {
            return Ok(class);
        }
        match self.parent {
            None => {
                if sig::PRIMITIVE_CLASS_NAMES.contains(&name) {
                    let class = Class::new_primitive(name, self.me.clone());
                    self.classes.borrow_mut().insert(name.to_owned(), class.clone());
                    return Ok(class);
                }
            },
            Some(ref parent) => match parent.resolve_class(name) {
                Err(LoadError::ClassNotFound { .. }) => (),
                result => return result,
            },
        }
        if name.starts_with('[') {
            self.load_array_class(name)
        } else {
            self.load(name)
        }
    }

    /// Creates, loads and prepares the named class from `class_path/name.class`.
    ///
    /// This implementation lazily resolves symbolic references, so no resolution of references
    /// within the loaded class is performed by this function other than its superclass and
    /// superinterfaces.
    ///
    /// This implementation does not attempt to perform bytecode verification; we assume that any
    /// class files we attempt to load are valid.
    pub fn load(&self, name: &str) -> Result<Rc<Class>, LoadError> {
        if let Some(class) = self.find_loaded_class(name) {
            return Ok(class);
        }
        if self.pending.borrow().contains(name) {
            // we're already loading the superclasses of this name
            return Err(LoadError::ClassCircularity { name: name.to_owned() });
        }

        let path = format!("{}/{}.class", self.class_path, name);
        let bytes = self.system.read_file(&path).map_err(|error| {
            trace!("{} loader: cannot read {}: {}", self.name, path, error);
            LoadError::ClassNotFound { name: name.to_owned() }
        })?;
        let class_file = parser::parse_class_file(&bytes).map_err(|source| {
            LoadError::ClassFormat { name: name.to_owned(), source }
        })?;

        self.pending.borrow_mut().insert(name.to_owned());
        let result = self.define_class(name, &class_file);
        self.pending.borrow_mut().remove(name);

        let class = result?;
        self.classes.borrow_mut().insert(name.to_owned(), class.clone());
        debug!("{} loader: loaded {}", self.name, name);
        Ok(class)
    }

    /// Checks the class file against the requested name and version, loads the superclass and
    /// superinterfaces and builds the class.
    fn define_class(&self, name: &str, class_file: &ClassFile) -> Result<Rc<Class>, LoadError> {
        match class_file.this_class_name() {
            Some(found) if found == name => (),
            found => return Err(LoadError::NoClassDefFound {
                name: name.to_owned(),
                found: found.unwrap_or("<invalid>").to_owned(),
            }),
        }
        if class_file.major_version > MAX_MAJOR_VERSION {
            return Err(LoadError::UnsupportedVersion {
                name: name.to_owned(),
                major: class_file.major_version,
                minor: class_file.minor_version,
            });
        }

        let superclass = match class_file.super_class_name() {
            None => None,
            Some(super_name) => {
                let superclass = self.resolve_superclass(name, super_name)?;
                if superclass.is_interface() {
                    return Err(LoadError::IncompatibleClassChange {
                        name: name.to_owned(),
                        reason: format!("class {} has interface {} as super class",
                                        name, super_name),
                    });
                }
                Some(superclass)
            },
        };

        let mut interfaces = vec![];
        for &index in &class_file.interfaces {
            let interface_name = class_file.class_name(index).ok_or_else(|| {
                LoadError::Malformed {
                    name: name.to_owned(),
                    reason: format!("interface #{} is not a Class constant", index),
                }
            })?;
            let interface = self.resolve_superclass(name, interface_name)?;
            if !interface.is_interface() {
                return Err(LoadError::IncompatibleClassChange {
                    name: name.to_owned(),
                    reason: format!("class {} can not implement {}, because it is not an \
                                     interface", name, interface_name),
                });
            }
            interfaces.push(interface);
        }

        Class::define(name, class_file, self.me.clone(), superclass.as_ref(), &interfaces)
    }

    /// Loads a superclass or superinterface of `name`. A missing one means `name` itself has no
    /// usable definition.
    fn resolve_superclass(&self, name: &str, super_name: &str) -> Result<Rc<Class>, LoadError> {
        self.resolve_class(super_name).map_err(|error| match error {
            LoadError::ClassNotFound { .. } => LoadError::NoClassDefFoundCause {
                name: name.to_owned(),
                cause: Box::new(error),
            },
            other => other,
        })
    }

    /// Creates an array class. Its component class is loaded first, so an array of a missing
    /// class is itself missing. §5.3.3
    fn load_array_class(&self, name: &str) -> Result<Rc<Class>, LoadError> {
        let component_name = match Type::parse(name) {
            Some(Type::Array(component)) => component.class_name(),
            _ => return Err(LoadError::ClassNotFound { name: name.to_owned() }),
        };
        let component = self.resolve_class(&component_name)?;
        let object_class = self.resolve_class("java/lang/Object")?;
        let interfaces = vec![
            self.resolve_class("java/lang/Cloneable")?,
            self.resolve_class("java/io/Serializable")?,
        ];
        let class = Class::new_array(name, component, self.me.clone(), &object_class, &interfaces);
        self.classes.borrow_mut().insert(name.to_owned(), class.clone());
        trace!("{} loader: created array class {}", self.name, name);
        Ok(class)
    }
}
