use super::{ClassData, ClassGraph, ClassId};
use crate::names::BinaryName;

/// Standard library classes the analysis needs to know about
///
/// Only the hierarchy matters here (superclasses and interfaces); members of these classes are
/// added by callers as needed.
pub struct JavaClasses<'g> {
    pub lang: LangClasses<'g>,
    pub io: IoClasses<'g>,
}

/// Classes in the `java.lang` package
pub struct LangClasses<'g> {
    pub object: ClassId<'g>,
    pub class: ClassId<'g>,
    pub cloneable: ClassId<'g>,
    pub string: ClassId<'g>,
    pub throwable: ClassId<'g>,
    pub error: ClassId<'g>,
    pub exception: ClassId<'g>,
    pub runtime_exception: ClassId<'g>,
}

/// Classes in the `java.io` package
pub struct IoClasses<'g> {
    pub serializable: ClassId<'g>,
}

impl<'g> JavaClasses<'g> {
    pub fn add_to_graph(class_graph: &ClassGraph<'g>) -> JavaClasses<'g> {
        let object = class_graph.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: vec![],
            is_interface: false,
        });
        let cloneable = class_graph.add_class(ClassData::new(BinaryName::CLONEABLE, object, true));
        let serializable =
            class_graph.add_class(ClassData::new(BinaryName::SERIALIZABLE, object, true));
        let class = class_graph.add_class(ClassData::new(BinaryName::CLASS, object, false));
        let string = class_graph.add_class(ClassData {
            name: BinaryName::STRING,
            superclass: Some(object),
            interfaces: vec![serializable],
            is_interface: false,
        });
        let throwable = class_graph.add_class(ClassData {
            name: BinaryName::THROWABLE,
            superclass: Some(object),
            interfaces: vec![serializable],
            is_interface: false,
        });
        let error = class_graph.add_class(ClassData::new(BinaryName::ERROR, throwable, false));
        let exception =
            class_graph.add_class(ClassData::new(BinaryName::EXCEPTION, throwable, false));
        let runtime_exception = class_graph.add_class(ClassData::new(
            BinaryName::RUNTIMEEXCEPTION,
            exception,
            false,
        ));

        JavaClasses {
            lang: LangClasses {
                object,
                class,
                cloneable,
                string,
                throwable,
                error,
                exception,
                runtime_exception,
            },
            io: IoClasses { serializable },
        }
    }
}
