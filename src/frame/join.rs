//! Merging the states that flow into a shared successor
//!
//! Locals and stack follow different rules, mirroring what the class-file verifier tolerates: a
//! local that the incoming paths disagree on merely becomes unusable, while a stack the paths
//! disagree on makes the whole method unverifiable.

use super::{Frame, FrameState, FrameType};
use crate::class_graph::{Assignable, ClassId, JavaClasses};
use crate::descriptors::{ArrayType, RefType};
use crate::util::{OffsetVec, Width};
use std::collections::{BTreeMap, BTreeSet};

impl<'g> FrameState<'g> {
    /// Merge the states flowing in from two predecessors
    ///
    /// A local defined on only one side degrades to an unusable slot of the same width; supply
    /// a different rule with [`FrameState::join_with`] to change that.
    pub fn join(self, other: FrameState<'g>, java: &JavaClasses<'g>) -> FrameState<'g> {
        self.join_with(other, java, |ty| FrameType::Top {
            wide: ty.width() == 2,
        })
    }

    /// Merge with a caller-supplied rule for locals defined on only one side
    ///
    /// The rule receives the value from whichever side has one and picks its replacement, which
    /// must keep the same width.
    pub fn join_with(
        self,
        other: FrameState<'g>,
        java: &JavaClasses<'g>,
        missing_local: impl Fn(&FrameType<'g>) -> FrameType<'g>,
    ) -> FrameState<'g> {
        match (self, other) {
            // Bottom is the identity
            (FrameState::Bottom, other) => other,
            (state, FrameState::Bottom) => state,

            // Errors dominate everything else
            (error @ FrameState::Error(_), _) => error,
            (_, error @ FrameState::Error(_)) => error,

            (FrameState::Concrete(left), FrameState::Concrete(right)) => {
                join_frames(left, right, java, missing_local)
            }
        }
    }
}

fn join_frames<'g>(
    left: Frame<'g>,
    right: Frame<'g>,
    java: &JavaClasses<'g>,
    missing_local: impl Fn(&FrameType<'g>) -> FrameType<'g>,
) -> FrameState<'g> {
    if left.stack.len() != right.stack.len() {
        return FrameState::error(format!(
            "different stack sizes: {} and {}",
            left.stack.len(),
            right.stack.len()
        ));
    }

    // The stack must merge to something precise at every position
    let mut stack = OffsetVec::new();
    let positions = left.stack.iter().zip(right.stack.iter()).enumerate();
    for (position, ((_, _, left_ty), (_, _, right_ty))) in positions {
        if left_ty.width() != right_ty.width() {
            return FrameState::error(format!(
                "stack position {}: widths of {:?} and {:?} disagree",
                position, left_ty, right_ty
            ));
        }
        match join_types(left_ty, right_ty, java) {
            Some(ty) if !matches!(ty, FrameType::Top { .. }) => {
                stack.push(ty);
            }
            _ => {
                return FrameState::error(format!(
                    "stack position {}: {:?} and {:?} do not merge to a usable type",
                    position, left_ty, right_ty
                ))
            }
        }
    }

    let locals = join_locals(&left.locals, &right.locals, java, missing_local);
    FrameState::Concrete(Frame { locals, stack })
}

/// One occupied local slot, seen as part of the whole picture of pairs
enum Cell<'g> {
    Single(FrameType<'g>),
    WideLow(FrameType<'g>),
    WideHigh(FrameType<'g>),
}

/// Classify each occupied slot as a one-slot value or as half of a two-slot pair
///
/// Pairs fill runs of identical entries from the lowest index up, so a single ascending sweep
/// settles which slot is which half.
fn classify<'g>(locals: &BTreeMap<u16, FrameType<'g>>) -> BTreeMap<u16, Cell<'g>> {
    let mut cells = BTreeMap::new();
    let mut pending_low: Option<(u16, FrameType<'g>)> = None;
    for (&index, &ty) in locals {
        if let Some((low_index, low_ty)) = pending_low.take() {
            if index == low_index + 1 && ty == low_ty {
                cells.insert(index, Cell::WideHigh(ty));
                continue;
            }
            debug_assert!(false, "wide local at {} lost its second slot", low_index);
        }
        if ty.width() == 2 {
            cells.insert(index, Cell::WideLow(ty));
            pending_low = Some((index, ty));
        } else {
            cells.insert(index, Cell::Single(ty));
        }
    }
    debug_assert!(
        pending_low.is_none(),
        "wide local at the end of the frame lost its second slot"
    );
    cells
}

fn join_locals<'g>(
    left: &BTreeMap<u16, FrameType<'g>>,
    right: &BTreeMap<u16, FrameType<'g>>,
    java: &JavaClasses<'g>,
    missing_local: impl Fn(&FrameType<'g>) -> FrameType<'g>,
) -> BTreeMap<u16, FrameType<'g>> {
    let left_cells = classify(left);
    let right_cells = classify(right);
    let mut joined: BTreeMap<u16, FrameType<'g>> = BTreeMap::new();

    // One-slot tops are left out of the map rather than stored; only a surviving pair (or a
    // fully wiped pair, which keeps its width) is written, and always from its first slot.
    let indices: BTreeSet<u16> = left_cells.keys().chain(right_cells.keys()).copied().collect();
    for &index in &indices {
        match (left_cells.get(&index), right_cells.get(&index)) {
            // Second halves were settled when their first slot was processed; anything facing
            // one across the merge is unusable anyway
            (Some(Cell::WideHigh(_)), _) | (_, Some(Cell::WideHigh(_))) => {}

            // Defined on one side only
            (Some(Cell::Single(ty)), None) | (None, Some(Cell::Single(ty))) => {
                let replacement = missing_local(ty);
                debug_assert_eq!(
                    replacement.width(),
                    1,
                    "missing-local rule changed the width of {:?}",
                    ty
                );
                if !matches!(replacement, FrameType::Top { .. }) {
                    joined.insert(index, replacement);
                }
            }
            (Some(Cell::WideLow(ty)), None) => {
                // A value on the other side of the pair's second slot tears the pair apart
                if right_cells.contains_key(&(index + 1)) {
                    continue;
                }
                let replacement = missing_local(ty);
                debug_assert_eq!(
                    replacement.width(),
                    2,
                    "missing-local rule changed the width of {:?}",
                    ty
                );
                joined.insert(index, replacement);
                joined.insert(index + 1, replacement);
            }
            (None, Some(Cell::WideLow(ty))) => {
                if left_cells.contains_key(&(index + 1)) {
                    continue;
                }
                let replacement = missing_local(ty);
                debug_assert_eq!(
                    replacement.width(),
                    2,
                    "missing-local rule changed the width of {:?}",
                    ty
                );
                joined.insert(index, replacement);
                joined.insert(index + 1, replacement);
            }

            // Defined on both sides with matching widths
            (Some(Cell::Single(left_ty)), Some(Cell::Single(right_ty))) => {
                match join_types(left_ty, right_ty, java) {
                    Some(ty) if !matches!(ty, FrameType::Top { .. }) => {
                        joined.insert(index, ty);
                    }
                    _ => {}
                }
            }
            (Some(Cell::WideLow(left_ty)), Some(Cell::WideLow(right_ty))) => {
                let ty = join_types(left_ty, right_ty, java)
                    .unwrap_or(FrameType::Top { wide: true });
                joined.insert(index, ty);
                joined.insert(index + 1, ty);
            }

            // A one-slot value against the first half of a pair: neither survives
            (Some(Cell::Single(_)), Some(Cell::WideLow(_)))
            | (Some(Cell::WideLow(_)), Some(Cell::Single(_))) => {}

            (None, None) => {}
        }
    }
    joined
}

/// Join two types of equal width, or `None` when they share no usable shape
fn join_types<'g>(
    left: &FrameType<'g>,
    right: &FrameType<'g>,
    java: &JavaClasses<'g>,
) -> Option<FrameType<'g>> {
    debug_assert_eq!(left.width(), right.width());
    match (left, right) {
        _ if left == right => Some(*left),
        (FrameType::Null, FrameType::Object(ref_type))
        | (FrameType::Object(ref_type), FrameType::Null) => Some(FrameType::Object(*ref_type)),
        (FrameType::Object(left_ref), FrameType::Object(right_ref)) => {
            Some(FrameType::Object(join_ref_types(left_ref, right_ref, java)))
        }
        (top @ FrameType::Top { .. }, _) | (_, top @ FrameType::Top { .. }) => Some(*top),
        _ => None,
    }
}

/// Most specific common supertype of two reference types
fn join_ref_types<'g>(
    left: &RefType<ClassId<'g>>,
    right: &RefType<ClassId<'g>>,
    java: &JavaClasses<'g>,
) -> RefType<ClassId<'g>> {
    if left.is_assignable(right) {
        return *right;
    }
    if right.is_assignable(left) {
        return *left;
    }
    match (left, right) {
        (RefType::Object(left_class), RefType::Object(right_class)) => {
            RefType::Object(join_classes(*left_class, *right_class, java))
        }

        // Arrays of references merge element-wise when their shapes line up
        (RefType::ObjectArray(left_arr), RefType::ObjectArray(right_arr))
            if left_arr.additional_dimensions == right_arr.additional_dimensions =>
        {
            RefType::ObjectArray(ArrayType {
                additional_dimensions: left_arr.additional_dimensions,
                element_type: join_classes(left_arr.element_type, right_arr.element_type, java),
            })
        }

        // Anything else shares nothing beyond being an object
        _ => RefType::Object(java.lang.object),
    }
}

/// Walk up the superclass chain of `left` until `right` fits underneath
///
/// Interface operands converge at `java/lang/Object` almost immediately, which matches how
/// little the verifier is willing to reason about interfaces at merge points.
fn join_classes<'g>(left: ClassId<'g>, right: ClassId<'g>, java: &JavaClasses<'g>) -> ClassId<'g> {
    let mut cursor = left;
    loop {
        if right.is_assignable(&cursor) {
            return cursor;
        }
        match cursor.superclass {
            Some(superclass) => cursor = superclass,
            None => return java.lang.object,
        }
    }
}
