use crate::class_graph::{ClassId, MethodId};
use crate::descriptors::{BaseType, FieldType, RefType};
use crate::util::{Offset, Width};

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum FrameType<'g> {
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In a constructor, the `this` parameter starts with this type then turns into an object
    /// type after another constructor is called on it
    UninitializedThis,

    /// Object type
    Object(RefType<ClassId<'g>>),

    /// State of an object after `new` has been called but `<init>` has not been called
    Uninitialized(AllocationSite<'g>),

    /// Slot whose contents can no longer be used, produced only by merging locals that disagree
    ///
    /// Carries a width because a merge can wipe out a full two-slot value as easily as a
    /// one-slot one, and the width invariant must survive the merge.
    Top { wide: bool },
}

impl<'g> FrameType<'g> {
    /// Is this type a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            FrameType::Integer
            | FrameType::Float
            | FrameType::Double
            | FrameType::Long
            | FrameType::Top { .. } => false,

            FrameType::Null
            | FrameType::UninitializedThis
            | FrameType::Object(_)
            | FrameType::Uninitialized(_) => true,
        }
    }

    /// Check if one frame type is assignable to another, the way the verifier would
    ///
    /// Reference pairs follow [`verifier_assignable`], so interface targets accept any class
    /// reference. Uninitialized types are assignable only to themselves (same allocation site),
    /// since nothing can be assumed about an object whose constructor has not yet run.
    ///
    /// [`verifier_assignable`]: crate::class_graph::verifier_assignable
    pub fn is_assignable(sub_type: &FrameType<'g>, super_type: &FrameType<'g>) -> bool {
        use crate::class_graph::verifier_assignable;

        match (sub_type, super_type) {
            (_, FrameType::Top { .. }) => sub_type.width() == super_type.width(),
            (FrameType::Integer, FrameType::Integer) => true,
            (FrameType::Float, FrameType::Float) => true,
            (FrameType::Long, FrameType::Long) => true,
            (FrameType::Double, FrameType::Double) => true,
            (FrameType::Null, FrameType::Null) => true,
            (FrameType::Null, FrameType::Object(_)) => true,
            (FrameType::Object(t1), FrameType::Object(t2)) => verifier_assignable(t1, t2),
            (FrameType::UninitializedThis, FrameType::UninitializedThis) => true,
            (FrameType::Uninitialized(site1), FrameType::Uninitialized(site2)) => site1 == site2,
            _ => false,
        }
    }
}

impl<'g> From<FieldType<ClassId<'g>>> for FrameType<'g> {
    fn from(field_type: FieldType<ClassId<'g>>) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => FrameType::Integer,
            FieldType::Base(BaseType::Float) => FrameType::Float,
            FieldType::Base(BaseType::Long) => FrameType::Long,
            FieldType::Base(BaseType::Double) => FrameType::Double,
            FieldType::Ref(ref_type) => FrameType::Object(ref_type),
        }
    }
}

impl<'g> Width for FrameType<'g> {
    fn width(&self) -> usize {
        match self {
            FrameType::Double | FrameType::Long | FrameType::Top { wide: true } => 2,
            _ => 1,
        }
    }
}

/// Identity of the allocation that produced an uninitialized value
///
/// Until its constructor runs, an object is known only by where it was allocated. Two
/// allocations of the same class live at once (eg. one in a local, one on the stack) must not be
/// confused, so the position of the allocating instruction is part of the identity.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct AllocationSite<'g> {
    /// Type the value will have once a constructor has run
    pub class: ClassId<'g>,

    /// Position of the allocating instruction within the method
    pub at: Offset,
}

/// Facts about the enclosing method that frame operations consult
///
/// The state itself owns none of this: limits and the method identity come from class-file
/// metadata and stay fixed for the whole analysis of one method body.
#[derive(Copy, Clone, Debug)]
pub struct MethodContext<'g> {
    pub method: MethodId<'g>,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl<'g> MethodContext<'g> {
    pub fn this_class(&self) -> ClassId<'g> {
        self.method.class
    }
}

/// Frame contents as declared in a method's stack map metadata
///
/// Entries are logical values: a two-slot type appears once and implicitly covers the following
/// slot, while an unusable slot appears as a single-width [`FrameType::Top`]. This matches how
/// class files spell out their `StackMapTable` entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeclaredFrame<'g> {
    pub locals: Vec<FrameType<'g>>,
    pub stack: Vec<FrameType<'g>>,
}
