//! Decoded method bodies and their frame semantics
//!
//! Callers hand the analysis methods in an already decoded form: a flat sequence of
//! [`Instruction`]s plus the control flow over it ([`BasicBlock`]s covering contiguous
//! instruction ranges, with explicit successor and handler edges). Class file parsing stays
//! outside this crate, so the instruction model carries class graph ids wherever the binary
//! format would carry constant pool indices.
//!
//! [`Instruction::evaluate`] is the transfer function mapping a frame state through one
//! instruction, following the rules of [JVMS 4.10.1][0].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

mod body;
mod instructions;
mod transfer;

pub use body::*;
pub use instructions::*;
