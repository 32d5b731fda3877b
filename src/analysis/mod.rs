//! Dataflow analysis over decoded method bodies
//!
//! [`MethodFlow`] runs one method's instructions to a fixpoint, producing the frame state on
//! entry to every basic block. [`OpenInterfaces`] layers a scan over those states to find
//! interfaces that some consumer relies on through the verifier's leniency (a value reaching an
//! interface-typed destination without a provable subtyping path), along with diagnostics for
//! any method whose code does not verify at all.

mod fixpoint;
mod open_interfaces;

pub use fixpoint::*;
pub use open_interfaces::*;
