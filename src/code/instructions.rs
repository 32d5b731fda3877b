use crate::class_graph::{ClassId, FieldId, MethodId};
use crate::descriptors::{BaseType, MethodDescriptor, RefType};
use crate::frame::DeclaredFrame;

/// JVM bytecode instruction, at the level of detail the verifier cares about
///
/// The representation is slightly different from the usual presentation:
///
///   - The "wide" instruction doesn't show up at all, but instead gets merged into the
///     instructions it is allowed to modify
///
///   - Constants are merged by the type they push, so `iconst_2` and `bipush 7` are both just
///     [`Instruction::ConstInteger`]
///
///   - Constant pool references are already resolved to class graph ids
///
///   - Branching instructions carry no targets. Where control goes next is recorded on the
///     enclosing [`BasicBlock`][crate::code::BasicBlock], and the branch variants only keep
///     whatever the frame transfer needs (which comparison, so we know what gets popped)
#[derive(Clone, Debug)]
pub enum Instruction<'g> {
    Nop,
    ConstNull,
    ConstInteger(i32), // covers `iconst_*`, `bipush`, `sipush`, and integer `ldc`
    ConstLong(i64),    // covers `lconst_*` and long `ldc2_w`
    ConstFloat(f32),
    ConstDouble(f64),
    ConstString(String),
    ConstClass(RefType<ClassId<'g>>),
    ILoad(u16), // covers `iload`, `iload_{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore_{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishl`, `ishr`, and `iushr`
    LSh(ShiftType), // covers `lshl`, `lshr`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    GetStatic(FieldId<'g>),
    PutStatic(FieldId<'g>),
    GetField(FieldId<'g>),
    PutField(FieldId<'g>),
    Invoke(InvokeType, MethodId<'g>),
    InvokeDynamic(MethodDescriptor<ClassId<'g>>),
    New(ClassId<'g>),
    NewArray(BaseType),
    ANewArray(RefType<ClassId<'g>>), // component type, so `anewarray String` makes a `String[]`
    MultiANewArray(RefType<ClassId<'g>>, u8),
    ArrayLength,
    CheckCast(RefType<ClassId<'g>>),
    InstanceOf(RefType<ClassId<'g>>),
    MonitorEnter,
    MonitorExit,
    If(OrdComparison), // covers `ifeq` through `ifle`, comparing against zero
    IfICmp(OrdComparison),
    IfACmp(EqComparison),
    IfNull(EqComparison), // covers `ifnull` and `ifnonnull`
    Goto,
    Switch, // covers `tableswitch` and `lookupswitch`
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
    Frame(DeclaredFrame<'g>),
}

impl<'g> Instruction<'g> {
    /// Can executing this instruction transfer control to an exception handler?
    ///
    /// Anything that resolves, allocates, divides, touches the heap, or calls out can raise a
    /// run-time exception or error (and `athrow` always does). Handler entry states get seeded
    /// from exactly these instructions.
    pub fn can_throw(&self) -> bool {
        matches!(
            self,
            Instruction::ConstString(_)
                | Instruction::ConstClass(_)
                | Instruction::IALoad
                | Instruction::LALoad
                | Instruction::FALoad
                | Instruction::DALoad
                | Instruction::AALoad
                | Instruction::BALoad
                | Instruction::CALoad
                | Instruction::SALoad
                | Instruction::IAStore
                | Instruction::LAStore
                | Instruction::FAStore
                | Instruction::DAStore
                | Instruction::AAStore
                | Instruction::BAStore
                | Instruction::CAStore
                | Instruction::SAStore
                | Instruction::IDiv
                | Instruction::LDiv
                | Instruction::IRem
                | Instruction::LRem
                | Instruction::GetStatic(_)
                | Instruction::PutStatic(_)
                | Instruction::GetField(_)
                | Instruction::PutField(_)
                | Instruction::Invoke(_, _)
                | Instruction::InvokeDynamic(_)
                | Instruction::New(_)
                | Instruction::NewArray(_)
                | Instruction::ANewArray(_)
                | Instruction::MultiANewArray(_, _)
                | Instruction::ArrayLength
                | Instruction::CheckCast(_)
                | Instruction::InstanceOf(_)
                | Instruction::MonitorEnter
                | Instruction::MonitorExit
                | Instruction::AThrow
        )
    }
}

/// Type of shift
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Binary comparison operators available for reference branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}
