//! Frame states and the lattice they form
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. In other
//! words: although the values on the stack and in the locals may obviously be different, the
//! types and order of the stack and local variables cannot. This information is referred to as
//! the _stack map frame_ (represented using [`Frame`]) and the "types" used in it (represented
//! using [`FrameType`]) are slightly augmented to take into account initialization and null.
//!
//! Knowing the stack map frame at a point in the code makes it possible to verify that the next
//! instruction makes sense (eg. `dadd` only makes sense if the top two elements on the stack are
//! of type `double`). This is the core of [verification by type-checking][0], which the JVM
//! itself performs when loading a class.
//!
//! A [`FrameState`] wraps a frame into a small lattice: [`FrameState::Bottom`] stands for
//! program points no analyzed path has reached, and [`FrameState::Error`] records a verification
//! failure and absorbs every operation applied after it. Operations consume their input state
//! and return the successor state, so straight-line transfer code can be chained without
//! checking for failure at each step. When an instruction can be reached from multiple locations
//! (eg. it is the target of jumps), the frames from the different source locations are unified
//! with [`FrameState::join`], and the whole analysis becomes a fix-point computation which
//! converges towards the right answer (if there is one).
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

mod join;
mod state;
mod types;

pub use state::*;
pub use types::*;
