//! Class hierarchy tracking
//!
//! The frame-state analysis never loads classes itself; callers describe the hierarchy up front
//! and then hand out ids into it. Nodes live in arenas so ids are plain references: equality is
//! pointer equality, and a finished node is immutable and can be read from any worker thread.

use crate::code::InvokeType;
use crate::descriptors::{FieldType, MethodDescriptor, RenderDescriptor};
use crate::names::{BinaryName, UnqualifiedName};
use crate::util::RefId;
use elsa::map::FrozenMap;
use std::fmt;
use std::fmt::Debug;
use typed_arena::Arena;

mod assignable;
mod java_classes;

pub use assignable::{verifier_assignable, Assignable};
pub use java_classes::{IoClasses, JavaClasses, LangClasses};

pub type ClassId<'g> = RefId<'g, ClassData<'g>>;
pub type MethodId<'g> = RefId<'g, MethodData<'g>>;
pub type FieldId<'g> = RefId<'g, FieldData<'g>>;

pub struct ClassGraphArenas<'g> {
    class_arena: Arena<ClassData<'g>>,
    method_arena: Arena<MethodData<'g>>,
    field_arena: Arena<FieldData<'g>>,
}

impl<'g> ClassGraphArenas<'g> {
    pub fn new() -> Self {
        ClassGraphArenas {
            class_arena: Arena::new(),
            method_arena: Arena::new(),
            field_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassGraphArenas<'g> {
    fn default() -> Self {
        ClassGraphArenas::new()
    }
}

/// Tracks the relationships between classes/interfaces and the members on those classes
///
/// The graph itself is only touched while the hierarchy is being described (it holds the arenas
/// and the name index); the ids it hands out stay valid for `'g` and are what instructions and
/// frame types carry around.
pub struct ClassGraph<'g> {
    arenas: &'g ClassGraphArenas<'g>,
    classes: FrozenMap<&'g BinaryName, ClassId<'g>>,
}

impl<'g> ClassGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g ClassGraphArenas<'g>) -> Self {
        ClassGraph {
            arenas,
            classes: FrozenMap::new(),
        }
    }

    /// Find an already-added class by its binary name
    pub fn lookup_class(&'g self, name: &BinaryName) -> Option<ClassId<'g>> {
        self.classes.get(name).map(RefId)
    }

    /// Add a new class to the class graph
    ///
    /// If a class of the same name was already added, the previous entry is shadowed in the name
    /// index but ids referring to it stay valid.
    pub fn add_class(&self, data: ClassData<'g>) -> ClassId<'g> {
        let data = &*self.arenas.class_arena.alloc(data);
        self.classes.insert(&data.name, RefId(data));
        RefId(data)
    }

    /// Add a method to the class graph
    pub fn add_method(&self, method: MethodData<'g>) -> MethodId<'g> {
        RefId(&*self.arenas.method_arena.alloc(method))
    }

    /// Add a field to the class graph
    pub fn add_field(&self, field: FieldData<'g>) -> FieldId<'g> {
        RefId(&*self.arenas.field_arena.alloc(field))
    }

    /// Add the standard library types the analysis relies on to the class graph
    pub fn insert_java_library_types(&self) -> JavaClasses<'g> {
        JavaClasses::add_to_graph(self)
    }
}

pub struct ClassData<'g> {
    /// Name of the class
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<ClassId<'g>>,

    /// Interfaces implemented (or super-interfaces for an interface)
    pub interfaces: Vec<ClassId<'g>>,

    /// Is this an interface?
    pub is_interface: bool,
}

impl<'g> ClassData<'g> {
    pub fn new(name: BinaryName, superclass: ClassId<'g>, is_interface: bool) -> ClassData<'g> {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: vec![],
            is_interface,
        }
    }
}

impl<'g> PartialEq for ClassData<'g> {
    fn eq(&self, other: &ClassData<'g>) -> bool {
        self.name == other.name
    }
}

impl<'g> Eq for ClassData<'g> {}

impl<'g> RenderDescriptor for ClassData<'g> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.name.as_ref());
        write_to.push(';');
    }
}

impl<'g> Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_ref())
    }
}

#[derive(PartialEq, Eq)]
pub struct MethodData<'g> {
    /// Class
    pub class: ClassId<'g>,

    /// Name of the method
    pub name: UnqualifiedName,

    /// Type of the method
    pub descriptor: MethodDescriptor<ClassId<'g>>,

    /// Is this a static method?
    pub is_static: bool,
}

impl<'g> MethodData<'g> {
    /// With the exception of `invokespecial` vs. `invokevirtual`, there is usually only one valid
    /// way to invoke a method. This function finds it.
    pub fn infer_invoke_type(&self) -> InvokeType {
        if self.is_static {
            InvokeType::Static
        } else if self.name == UnqualifiedName::INIT || self.name == UnqualifiedName::CLINIT {
            InvokeType::Special
        } else if self.class.is_interface {
            InvokeType::Interface
        } else {
            InvokeType::Virtual
        }
    }

    /// Is this an instance constructor?
    pub fn is_constructor(&self) -> bool {
        !self.is_static && self.name == UnqualifiedName::INIT
    }
}

impl<'g> Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}.{:?}:{}",
            self.class.name.as_ref(),
            self.name,
            self.descriptor.render(),
        ))
    }
}

#[derive(PartialEq, Eq)]
pub struct FieldData<'g> {
    /// Class
    pub class: ClassId<'g>,

    /// Name of the field
    pub name: UnqualifiedName,

    /// Type of the field
    pub descriptor: FieldType<ClassId<'g>>,

    /// Is this a static field?
    pub is_static: bool,
}

impl<'g> Debug for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}.{:?}:{}",
            self.class.name.as_ref(),
            self.name,
            self.descriptor.render(),
        ))
    }
}
