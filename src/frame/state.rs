use super::{DeclaredFrame, FrameType, MethodContext};
use crate::class_graph::{ClassId, JavaClasses, MethodId};
use crate::descriptors::{FieldType, RefType, RenderDescriptor};
use crate::util::{OffsetVec, Width};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Snapshot of the stack and local variables at a point in the bytecode
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame<'g> {
    /// Local variables in scope
    ///
    /// Indices absent from the map hold nothing usable. A two-slot value occupies two
    /// consecutive indices, with both entries carrying the same type; every mutation below
    /// re-establishes that pairing.
    pub locals: BTreeMap<u16, FrameType<'g>>,

    /// Types of values on the stack
    ///
    /// Each value is one entry, with two-slot values contributing 2 to the offset length. That
    /// makes the stack height available in constant time as [`OffsetVec::offset_len`].
    pub stack: OffsetVec<FrameType<'g>>,
}

impl<'g> Frame<'g> {
    /// Logical value starting at `index`
    ///
    /// Returns `None` for an empty slot and for the second slot of a two-slot pair: a wide
    /// value can only be read from its first slot.
    pub fn local_value(&self, index: u16) -> Option<FrameType<'g>> {
        let ty = *self.locals.get(&index)?;
        if ty.width() == 2 && self.is_high_half(index) {
            return None;
        }
        Some(ty)
    }

    /// Is `index` the second slot of a two-slot pair?
    ///
    /// Adjacent pairs of the same type are told apart by counting the run of identical entries
    /// ending at `index`: pairs fill a run from its lowest index up, so the second halves sit at
    /// even positions in the run.
    fn is_high_half(&self, index: u16) -> bool {
        let ty = match self.locals.get(&index) {
            Some(ty) if ty.width() == 2 => *ty,
            _ => return false,
        };
        let mut run_length: usize = 0;
        let mut cursor = index;
        loop {
            match self.locals.get(&cursor) {
                Some(other) if *other == ty => {
                    run_length += 1;
                    match cursor.checked_sub(1) {
                        Some(next) => cursor = next,
                        None => break,
                    }
                }
                _ => break,
            }
        }
        run_length % 2 == 0
    }

    /// Write a value at `index`, tearing apart any pairs the write overlaps
    ///
    /// When a write lands on half of an existing pair, the other half of that pair is no longer
    /// meaningful and its slot is emptied.
    fn store_local_slots(&mut self, index: u16, ty: FrameType<'g>) {
        let last_written = index + (ty.width() as u16) - 1;
        let tears_pair_below = self.is_high_half(index);
        let tears_pair_above = {
            let at_last = self.locals.get(&last_written);
            matches!(at_last, Some(t) if t.width() == 2) && !self.is_high_half(last_written)
        };

        if tears_pair_below {
            self.locals.remove(&(index - 1));
        }
        if tears_pair_above {
            self.locals.remove(&(last_written + 1));
        }

        self.locals.insert(index, ty);
        if ty.width() == 2 {
            self.locals.insert(index + 1, ty);
        }
    }
}

/// Everything the analysis knows at one program point
///
/// This is a lattice with [`FrameState::Bottom`] below every concrete frame and
/// [`FrameState::Error`] absorbing everything. Operations consume the state and return the
/// successor state; applying any operation to an error returns that same error unchanged, so a
/// chain of operations never needs intermediate failure checks.
///
/// Two errors are never equal, even when their messages coincide: each error value records a
/// distinct failure occurrence, and equality is identity on that occurrence.
#[derive(Debug, Clone)]
pub enum FrameState<'g> {
    /// No analyzed path has reached this program point yet
    Bottom,

    /// Reachable, with this frame shape
    Concrete(Frame<'g>),

    /// The method does not verify, with a message saying what went wrong first
    Error(Arc<String>),
}

impl<'g> PartialEq for FrameState<'g> {
    fn eq(&self, other: &FrameState<'g>) -> bool {
        match (self, other) {
            (FrameState::Bottom, FrameState::Bottom) => true,
            (FrameState::Concrete(frame1), FrameState::Concrete(frame2)) => frame1 == frame2,
            (FrameState::Error(err1), FrameState::Error(err2)) => Arc::ptr_eq(err1, err2),
            _ => false,
        }
    }
}

impl<'g> Eq for FrameState<'g> {}

impl<'g> FrameState<'g> {
    /// Fresh error state
    pub fn error(message: impl Into<String>) -> FrameState<'g> {
        FrameState::Error(Arc::new(message.into()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FrameState::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            FrameState::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn frame(&self) -> Option<&Frame<'g>> {
        match self {
            FrameState::Concrete(frame) => Some(frame),
            _ => None,
        }
    }

    /// Unwrap the concrete frame, or explain why the operation cannot run
    ///
    /// Errors pass through untouched. Bottom turns into an error: no operation other than
    /// [`FrameState::check`] has anything sensible to do at an unreached program point.
    fn into_frame(self, operation: &str) -> Result<Frame<'g>, FrameState<'g>> {
        match self {
            FrameState::Concrete(frame) => Ok(frame),
            error @ FrameState::Error(_) => Err(error),
            FrameState::Bottom => Err(FrameState::error(format!(
                "cannot {} at a program point no path reaches",
                operation
            ))),
        }
    }

    /// State on entry to a method: parameters in the leading locals, nothing on the stack
    ///
    /// In a constructor, local 0 starts as [`FrameType::UninitializedThis`] (except in
    /// `java/lang/Object` itself, which has no superclass constructor left to call).
    pub fn entry(cx: &MethodContext<'g>) -> FrameState<'g> {
        let method: MethodId<'g> = cx.method;
        let mut frame = Frame::default();
        let mut next_index: u16 = 0;

        if !method.is_static {
            let this_type = if method.is_constructor() && method.class.superclass.is_some() {
                FrameType::UninitializedThis
            } else {
                FrameType::Object(RefType::Object(method.class))
            };
            frame.locals.insert(next_index, this_type);
            next_index += 1;
        }

        for &parameter in &method.descriptor.parameters {
            let ty = FrameType::from(parameter);
            frame.locals.insert(next_index, ty);
            if ty.width() == 2 {
                frame.locals.insert(next_index + 1, ty);
            }
            next_index += ty.width() as u16;
        }

        if next_index as usize > cx.max_locals as usize {
            return FrameState::error(format!(
                "parameters of {:?} need {} locals but max locals is {}",
                method, next_index, cx.max_locals
            ));
        }
        FrameState::Concrete(frame)
    }

    /// Push a value onto the stack
    pub fn push(self, cx: &MethodContext<'g>, ty: FrameType<'g>) -> FrameState<'g> {
        let mut frame = match self.into_frame("push") {
            Ok(frame) => frame,
            Err(state) => return state,
        };
        if frame.stack.offset_len().0 + ty.width() > cx.max_stack as usize {
            return FrameState::error(format!(
                "pushing {:?} would overflow the max stack of {}",
                ty, cx.max_stack
            ));
        }
        frame.stack.push(ty);
        FrameState::Concrete(frame)
    }

    /// Pop the top value off the stack, handing it to `continuation` for inspection
    pub fn pop(
        self,
        continuation: impl FnOnce(FrameState<'g>, FrameType<'g>) -> FrameState<'g>,
    ) -> FrameState<'g> {
        let mut frame = match self.into_frame("pop") {
            Ok(frame) => frame,
            Err(state) => return state,
        };
        match frame.stack.pop() {
            Some((_, _, ty)) => continuation(FrameState::Concrete(frame), ty),
            None => FrameState::error("cannot pop from an empty stack"),
        }
    }

    /// Pop a one-slot value off the stack
    pub fn pop_single(
        self,
        continuation: impl FnOnce(FrameState<'g>, FrameType<'g>) -> FrameState<'g>,
    ) -> FrameState<'g> {
        self.pop(|state, ty| {
            if ty.width() == 1 {
                continuation(state, ty)
            } else {
                FrameState::error(format!(
                    "expected a one-slot value on the stack but found {:?}",
                    ty
                ))
            }
        })
    }

    /// Pop a value that must be initialized and assignable to the expected type
    pub fn pop_initialized(self, expected: FieldType<ClassId<'g>>) -> FrameState<'g> {
        self.pop(|state, ty| match ty {
            FrameType::UninitializedThis | FrameType::Uninitialized(_) => {
                FrameState::error(format!(
                    "expected {} on the stack but found uninitialized {:?}",
                    expected.render(),
                    ty
                ))
            }
            _ if FrameType::is_assignable(&ty, &FrameType::from(expected)) => state,
            _ => FrameState::error(format!(
                "expected {} on the stack but found {:?}",
                expected.render(),
                ty
            )),
        })
    }

    /// Pop a value that must be an initialized object reference (or `null`)
    pub fn pop_reference(
        self,
        continuation: impl FnOnce(FrameState<'g>, FrameType<'g>) -> FrameState<'g>,
    ) -> FrameState<'g> {
        self.pop(|state, ty| match ty {
            FrameType::Null | FrameType::Object(_) => continuation(state, ty),
            _ => FrameState::error(format!(
                "expected an initialized reference on the stack but found {:?}",
                ty
            )),
        })
    }

    /// Pop a value that must be an array reference (or `null`)
    ///
    /// The continuation receives the element type of the popped array, or `None` when the
    /// popped value was `null` (in which case the element type is anything the caller likes).
    pub fn pop_array(
        self,
        continuation: impl FnOnce(FrameState<'g>, Option<FieldType<ClassId<'g>>>) -> FrameState<'g>,
    ) -> FrameState<'g> {
        self.pop(|state, ty| match ty {
            FrameType::Null => continuation(state, None),
            FrameType::Object(ref_type) => match ref_type.element_type() {
                Some(element) => continuation(state, Some(element)),
                None => FrameState::error(format!(
                    "expected an array on the stack but found {:?}",
                    ty
                )),
            },
            _ => FrameState::error(format!(
                "expected an array on the stack but found {:?}",
                ty
            )),
        })
    }

    /// Pop an uninitialized reference and run the initialization protocol on it
    ///
    /// The popped value may have been duplicated into other stack slots or locals before its
    /// constructor ran; every alias becomes initialized in the same step.
    pub fn pop_and_initialize(
        self,
        cx: &MethodContext<'g>,
        constructor: MethodId<'g>,
    ) -> FrameState<'g> {
        let mut frame = match self.into_frame("pop_and_initialize") {
            Ok(frame) => frame,
            Err(state) => return state,
        };
        let popped = match frame.stack.pop() {
            Some((_, _, ty)) => ty,
            None => return FrameState::error("cannot pop from an empty stack"),
        };

        let initialized = match popped {
            FrameType::UninitializedThis => {
                let this_class = cx.this_class();
                let owner_matches = constructor.class == this_class
                    || Some(constructor.class) == this_class.superclass;
                if !owner_matches {
                    return FrameState::error(format!(
                        "no matching constructor owner: {:?} cannot initialize this in {}",
                        constructor,
                        this_class.name.as_ref()
                    ));
                }
                FrameType::Object(RefType::Object(this_class))
            }
            FrameType::Uninitialized(site) => {
                if constructor.class != site.class {
                    return FrameState::error(format!(
                        "no matching constructor owner: {:?} cannot initialize {}",
                        constructor,
                        site.class.name.as_ref()
                    ));
                }
                FrameType::Object(RefType::Object(site.class))
            }
            FrameType::Null | FrameType::Object(_) => {
                return FrameState::error(format!("value is already initialized: {:?}", popped))
            }
            _ => {
                return FrameState::error(format!(
                    "expected an uninitialized reference on the stack but found {:?}",
                    popped
                ))
            }
        };

        frame.stack.for_each_mut(|ty| {
            if *ty == popped {
                *ty = initialized;
            }
        });
        for ty in frame.locals.values_mut() {
            if *ty == popped {
                *ty = initialized;
            }
        }
        FrameState::Concrete(frame)
    }

    /// Store a value into a local variable
    ///
    /// Replaces whatever the slot held; the old value is discarded, not merged. Overwriting
    /// half of a two-slot pair empties the pair's other slot.
    pub fn store_local(
        self,
        cx: &MethodContext<'g>,
        index: u16,
        ty: FrameType<'g>,
    ) -> FrameState<'g> {
        let mut frame = match self.into_frame("store_local") {
            Ok(frame) => frame,
            Err(state) => return state,
        };
        if index as usize + ty.width() > cx.max_locals as usize {
            return FrameState::error(format!(
                "storing {:?} at local {} does not fit below max locals of {}",
                ty, index, cx.max_locals
            ));
        }
        frame.store_local_slots(index, ty);
        FrameState::Concrete(frame)
    }

    /// Read a local variable holding an initialized value assignable to the expected type
    pub fn read_local(
        self,
        index: u16,
        expected: FieldType<ClassId<'g>>,
        continuation: impl FnOnce(FrameState<'g>, FrameType<'g>) -> FrameState<'g>,
    ) -> FrameState<'g> {
        let frame = match self.into_frame("read_local") {
            Ok(frame) => frame,
            Err(state) => return state,
        };
        match frame.local_value(index) {
            Some(ty) if !matches!(ty, FrameType::UninitializedThis | FrameType::Uninitialized(_))
                && FrameType::is_assignable(&ty, &FrameType::from(expected)) =>
            {
                continuation(FrameState::Concrete(frame), ty)
            }
            Some(ty) => FrameState::error(format!(
                "expected {} in local {} but found {:?}",
                expected.render(),
                index,
                ty
            )),
            None => FrameState::error(format!(
                "expected {} in local {} but found nothing usable",
                expected.render(),
                index
            )),
        }
    }

    /// Read a local variable holding any reference, initialized or not
    ///
    /// Loading an uninitialized reference is legal (constructors do it to get `this` onto the
    /// stack before calling a superclass constructor); only using it as an initialized value is
    /// restricted.
    pub fn read_local_reference(
        self,
        index: u16,
        continuation: impl FnOnce(FrameState<'g>, FrameType<'g>) -> FrameState<'g>,
    ) -> FrameState<'g> {
        let frame = match self.into_frame("read_local_reference") {
            Ok(frame) => frame,
            Err(state) => return state,
        };
        match frame.local_value(index) {
            Some(ty) if ty.is_reference() => continuation(FrameState::Concrete(frame), ty),
            Some(ty) => FrameState::error(format!(
                "expected a reference in local {} but found {:?}",
                index, ty
            )),
            None => FrameState::error(format!(
                "expected a reference in local {} but found nothing usable",
                index
            )),
        }
    }

    /// Forget everything: the next program point is unreachable
    ///
    /// Used after terminal instructions (returns, throws, unconditional jumps), whose textual
    /// successor can only be revived by an explicit declared frame.
    pub fn clear(self) -> FrameState<'g> {
        match self {
            error @ FrameState::Error(_) => error,
            _ => FrameState::Bottom,
        }
    }

    /// State at the start of an exception handler
    ///
    /// Locals carry over from the covered instruction; the stack is replaced by the single
    /// thrown exception, typed by the handler's guard (`None` guards catch everything).
    pub fn push_exception(
        self,
        cx: &MethodContext<'g>,
        java: &JavaClasses<'g>,
        guard: Option<ClassId<'g>>,
    ) -> FrameState<'g> {
        let mut frame = match self.into_frame("push_exception") {
            Ok(frame) => frame,
            Err(state) => return state,
        };
        frame.stack.clear();
        let thrown = guard.unwrap_or(java.lang.throwable);
        FrameState::Concrete(frame).push(cx, FrameType::Object(RefType::Object(thrown)))
    }

    /// Check the locals against a declared frame, leaving the state unchanged on success
    ///
    /// Bottom passes vacuously: an unreached point is compatible with any declaration.
    pub fn check_locals(self, declared: &DeclaredFrame<'g>) -> FrameState<'g> {
        let frame = match &self {
            FrameState::Concrete(frame) => frame,
            _ => return self,
        };

        let mut index: u16 = 0;
        for &declared_ty in &declared.locals {
            let width = declared_ty.width() as u16;
            // A declared one-slot top promises nothing, so anything (or nothing) satisfies it
            if declared_ty == (FrameType::Top { wide: false }) {
                index += 1;
                continue;
            }
            match frame.local_value(index) {
                Some(ty) if FrameType::is_assignable(&ty, &declared_ty) => {}
                Some(ty) => {
                    return FrameState::error(format!(
                        "local {}: declared frame expects {:?} but found {:?}",
                        index, declared_ty, ty
                    ))
                }
                None => {
                    return FrameState::error(format!(
                        "local {}: declared frame expects {:?} but found nothing usable",
                        index, declared_ty
                    ))
                }
            }
            index += width;
        }
        self
    }

    /// Check the stack against a declared frame, leaving the state unchanged on success
    pub fn check_stack(self, declared: &DeclaredFrame<'g>) -> FrameState<'g> {
        let frame = match &self {
            FrameState::Concrete(frame) => frame,
            _ => return self,
        };

        if frame.stack.len() != declared.stack.len() {
            return FrameState::error(format!(
                "different stack sizes: found {} values but declared frame has {}",
                frame.stack.len(),
                declared.stack.len()
            ));
        }
        for ((_, _, ty), declared_ty) in frame.stack.iter().zip(declared.stack.iter()) {
            if !FrameType::is_assignable(ty, declared_ty) {
                return FrameState::error(format!(
                    "stack: declared frame expects {:?} but found {:?}",
                    declared_ty, ty
                ));
            }
        }
        self
    }

    /// Check the state against a declared frame and canonicalize to it
    ///
    /// On success the result is rebuilt from the declared frame rather than the inferred one:
    /// the declared metadata is the authority once validated, which keeps precision drift from
    /// accumulating across many joins. A Bottom state is simply revived as the declared frame,
    /// which is how code behind an unconditional jump becomes analyzable again.
    pub fn check(self, cx: &MethodContext<'g>, declared: &DeclaredFrame<'g>) -> FrameState<'g> {
        let checked = self.check_locals(declared).check_stack(declared);
        if checked.is_error() {
            return checked;
        }

        let mut canonical = Frame::default();
        let mut next_index: u16 = 0;
        for &declared_ty in &declared.locals {
            if declared_ty != (FrameType::Top { wide: false }) {
                canonical.locals.insert(next_index, declared_ty);
                if declared_ty.width() == 2 {
                    canonical.locals.insert(next_index + 1, declared_ty);
                }
            }
            next_index += declared_ty.width() as u16;
        }
        if next_index as usize > cx.max_locals as usize {
            return FrameState::error(format!(
                "declared frame needs {} locals but max locals is {}",
                next_index, cx.max_locals
            ));
        }

        for &declared_ty in &declared.stack {
            canonical.stack.push(declared_ty);
        }
        if canonical.stack.offset_len().0 > cx.max_stack as usize {
            return FrameState::error(format!(
                "declared frame needs a stack of {} but max stack is {}",
                canonical.stack.offset_len().0,
                cx.max_stack
            ));
        }

        FrameState::Concrete(canonical)
    }
}
