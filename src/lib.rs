//! Track JVM verification frame states
//!
//! This crate models the type states that [verification by type-checking][0] pushes through a
//! method body: the operand stack and local variables at each instruction, abstracted to types
//! and wrapped in a lattice that also represents unreached code and verification failure
//! ([`frame::FrameState`]). [`code::Instruction::evaluate`] is the transfer function through one
//! instruction, [`analysis::MethodFlow`] runs a whole method to a fixpoint, and
//! [`analysis::OpenInterfaces`] scans the resulting states for interfaces that some method
//! assigns into without a provable subtyping path. The verifier accepts such assignments
//! unchecked, so those interfaces cannot be reasoned about closed-world.
//!
//! ### Simple example
//!
//! Consider the following Java classes:
//!
//! ```java,ignore,no_run
//! public interface Shape { }
//!
//! public class Square { // does not implement Shape
//!     public static Square INSTANCE;
//!
//!     static void main() {
//!         Shape[] shapes = new Shape[1];
//!         shapes[0] = (Shape) (Object) INSTANCE;
//!     }
//! }
//! ```
//!
//! The double cast erases to nothing in bytecode, so `main` stores a value into a `Shape[]`
//! that nothing proves to be a `Shape` (the verifier defers that check to run time). Detecting
//! this can be done as follows:
//!
//! ```
//! use classframe::analysis::OpenInterfaces;
//! use classframe::class_graph::*;
//! use classframe::code::{BasicBlock, Instruction, MethodBody};
//! use classframe::frame::MethodContext;
//! use classframe::*;
//!
//! // Setup the class graph, add in Java standard library types
//! let class_graph_arenas = ClassGraphArenas::new();
//! let class_graph = ClassGraph::new(&class_graph_arenas);
//! let java = class_graph.insert_java_library_types();
//!
//! // Declare the classes and their members in the class graph
//! let shape = class_graph.add_class(ClassData::new(
//!     BinaryName::from_string(String::from("me/alec/Shape")).unwrap(),
//!     java.lang.object,
//!     true,
//! ));
//! let square = class_graph.add_class(ClassData::new(
//!     BinaryName::from_string(String::from("me/alec/Square")).unwrap(),
//!     java.lang.object,
//!     false,
//! ));
//! let instance = class_graph.add_field(FieldData {
//!     class: square,
//!     name: UnqualifiedName::from_string(String::from("INSTANCE")).unwrap(),
//!     descriptor: FieldType::object(square),
//!     is_static: true,
//! });
//! let main = class_graph.add_method(MethodData {
//!     class: square,
//!     name: UnqualifiedName::from_string(String::from("main")).unwrap(),
//!     descriptor: MethodDescriptor {
//!         parameters: vec![],
//!         return_type: None,
//!     },
//!     is_static: true,
//! });
//!
//! // Describe the body of `main` (instructions plus control flow)
//! let body = MethodBody {
//!     context: MethodContext {
//!         method: main,
//!         max_stack: 3,
//!         max_locals: 1,
//!     },
//!     instructions: vec![
//!         Instruction::ConstInteger(1),
//!         Instruction::ANewArray(RefType::Object(shape)),
//!         Instruction::AStore(0),
//!         Instruction::ALoad(0),
//!         Instruction::ConstInteger(0),
//!         Instruction::GetStatic(instance),
//!         Instruction::AAStore,
//!         Instruction::Return,
//!     ],
//!     blocks: vec![BasicBlock {
//!         range: 0..8,
//!         successors: vec![],
//!         handlers: vec![],
//!     }],
//! };
//!
//! // The store verifies, but nothing proves the value implements `Shape`
//! let open_interfaces = OpenInterfaces::compute(&[body], &java);
//! assert!(open_interfaces.is_open(shape));
//! ```
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

pub mod analysis;
pub mod class_graph;
pub mod code;
mod descriptors;
pub mod frame;
mod names;
pub mod util;

pub use descriptors::*;
pub use names::*;
