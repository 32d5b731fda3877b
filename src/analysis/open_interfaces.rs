use crate::analysis::MethodFlow;
use crate::class_graph::{Assignable, ClassId, JavaClasses, MethodId};
use crate::code::{BlockId, Instruction, InvokeType, MethodBody};
use crate::descriptors::{FieldType, RefType};
use crate::frame::{Frame, FrameState, FrameType, MethodContext};
use crate::util::Offset;
use rayon::prelude::*;
use std::collections::HashSet;

/// Method whose bytecode failed verification
///
/// Analysis stopped at `instruction` (an index into the method's instruction sequence) and the
/// method's other findings were dropped. Callers should not optimize the method further.
#[derive(Clone, Debug)]
pub struct UnverifiableCode<'g> {
    pub method: MethodId<'g>,
    pub instruction: usize,
    pub message: String,
}

/// Interfaces whose consumers lean on the verifier's leniency
///
/// The verifier lets any reference flow into an interface-typed destination without proof, so
/// "a value reaches a `Shape`-typed slot" does not imply the value implements `Shape`. This
/// records every interface for which such an unproven assignment was witnessed (closed over
/// the interfaces they extend); whole-program reasoning may treat the rest as closed.
#[derive(Debug)]
pub struct OpenInterfaces<'g> {
    open: HashSet<ClassId<'g>>,

    /// Methods excluded from the scan because their code does not verify
    pub diagnostics: Vec<UnverifiableCode<'g>>,
}

impl<'g> OpenInterfaces<'g> {
    /// Scan a set of method bodies for unproven interface assignments
    ///
    /// Methods are scanned in parallel and their witness sets merged afterwards; the merged
    /// set is then closed over super-interfaces. The result does not depend on scheduling:
    /// witnesses are unioned, and diagnostics come out sorted by method identity (each one is
    /// also logged as a warning).
    pub fn compute(bodies: &[MethodBody<'g>], java: &JavaClasses<'g>) -> OpenInterfaces<'g> {
        let scans: Vec<MethodScan<'g>> = bodies
            .par_iter()
            .map(|body| scan_method(body, java))
            .collect();

        let mut open = HashSet::new();
        let mut diagnostics = vec![];
        for scan in scans {
            match scan {
                MethodScan::Clean(witnessed) => open.extend(witnessed),
                MethodScan::Unverifiable(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        // An open interface also opens everything it extends: a value that was never proven
        // to be a `Shape` was never proven to be anything `Shape` extends either
        let mut worklist: Vec<ClassId<'g>> = open.iter().copied().collect();
        while let Some(interface) = worklist.pop() {
            for &extended in &interface.interfaces {
                if open.insert(extended) {
                    worklist.push(extended);
                }
            }
        }

        diagnostics.sort_by_cached_key(|diagnostic| format!("{:?}", diagnostic.method));
        for diagnostic in &diagnostics {
            log::warn!(
                "{:?} does not verify at instruction {}: {}",
                diagnostic.method,
                diagnostic.instruction,
                diagnostic.message
            );
        }

        OpenInterfaces { open, diagnostics }
    }

    /// Was an unproven assignment into this interface witnessed somewhere?
    pub fn is_open(&self, interface: ClassId<'g>) -> bool {
        self.open.contains(&interface)
    }

    /// May the interface be treated as closed-world?
    pub fn is_closed(&self, interface: ClassId<'g>) -> bool {
        !self.is_open(interface)
    }

    /// Open interfaces, in no particular order
    pub fn iter_open(&self) -> impl Iterator<Item = ClassId<'g>> + '_ {
        self.open.iter().copied()
    }
}

/// What scanning one method produced
enum MethodScan<'g> {
    /// Interfaces with a witnessed unproven assignment in this method, before closure
    Clean(HashSet<ClassId<'g>>),

    /// The method does not verify; any witnesses found before the failure are dropped
    Unverifiable(UnverifiableCode<'g>),
}

/// Scan one method for unproven interface assignments
///
/// Replays every reachable block against its fixpoint entry state, inspecting the frame right
/// before each assignment-shaped instruction. Dead blocks contribute nothing, and a method
/// that reaches a verification error contributes nothing but the diagnostic.
fn scan_method<'g>(body: &MethodBody<'g>, java: &JavaClasses<'g>) -> MethodScan<'g> {
    let cx = &body.context;
    let flow = MethodFlow::compute(body, java);
    let mut open = HashSet::new();

    for (index, block) in body.blocks.iter().enumerate() {
        let mut state = match flow.block_entries[index].clone() {
            FrameState::Bottom => continue,
            FrameState::Error(message) => {
                return MethodScan::Unverifiable(UnverifiableCode {
                    method: cx.method,
                    instruction: block.range.start,
                    message: message.as_str().to_owned(),
                });
            }
            concrete => concrete,
        };

        for (position, instruction) in body.block_instructions(BlockId(index)).iter().enumerate() {
            let at = block.range.start + position;
            if let Some(frame) = state.frame() {
                interface_witnesses(instruction, frame, cx, &mut open);
            }
            state = instruction.evaluate(state, Offset(at), cx, java);
            if let FrameState::Error(message) = &state {
                return MethodScan::Unverifiable(UnverifiableCode {
                    method: cx.method,
                    instruction: at,
                    message: message.as_str().to_owned(),
                });
            }
        }
    }

    MethodScan::Clean(open)
}

/// Record the interfaces an instruction assigns into without a provable subtyping path
///
/// The destinations with declared types are array stores (the element type), field writes (the
/// field type), invocations (the receiver's holder type and each parameter type), and reference
/// returns (the declared return type). A source only counts when the frame tracks it as an
/// initialized, non-null reference: `null` is assignable to everything, and anything else would
/// already fail to verify.
fn interface_witnesses<'g>(
    instruction: &Instruction<'g>,
    frame: &Frame<'g>,
    cx: &MethodContext<'g>,
    open: &mut HashSet<ClassId<'g>>,
) {
    let mut witness = |source: Option<&FrameType<'g>>, target: ClassId<'g>| {
        if !target.is_interface {
            return;
        }
        if let Some(FrameType::Object(source_type)) = source {
            if !source_type.is_assignable(&RefType::Object(target)) {
                open.insert(target);
            }
        }
    };

    match instruction {
        Instruction::AAStore => {
            if let Some(FrameType::Object(RefType::ObjectArray(array))) =
                frame.stack.get_from_end(2)
            {
                if array.additional_dimensions == 0 {
                    witness(frame.stack.get_from_end(0), array.element_type);
                }
            }
        }
        Instruction::PutField(field) | Instruction::PutStatic(field) => {
            if let FieldType::Ref(RefType::Object(target)) = field.descriptor {
                witness(frame.stack.get_from_end(0), target);
            }
        }
        Instruction::Invoke(invoke_type, method) => {
            let parameters = &method.descriptor.parameters;
            if *invoke_type != InvokeType::Static {
                // The receiver is an assignment into the holder type (an uninitialized
                // receiver of a constructor call is not an object source, so it never counts)
                witness(frame.stack.get_from_end(parameters.len()), method.class);
            }
            for (position, parameter) in parameters.iter().enumerate() {
                if let FieldType::Ref(RefType::Object(target)) = parameter {
                    witness(
                        frame.stack.get_from_end(parameters.len() - 1 - position),
                        *target,
                    );
                }
            }
        }
        Instruction::InvokeDynamic(descriptor) => {
            let parameters = &descriptor.parameters;
            for (position, parameter) in parameters.iter().enumerate() {
                if let FieldType::Ref(RefType::Object(target)) = parameter {
                    witness(
                        frame.stack.get_from_end(parameters.len() - 1 - position),
                        *target,
                    );
                }
            }
        }
        Instruction::AReturn => {
            if let Some(FieldType::Ref(RefType::Object(target))) =
                cx.method.descriptor.return_type
            {
                witness(frame.stack.get_from_end(0), target);
            }
        }
        _ => {}
    }
}
