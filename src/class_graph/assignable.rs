use super::ClassId;
use crate::descriptors::RefType;
use crate::names::BinaryName;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Provable subtyping, straight off the class hierarchy
///
/// Arrays follow the covariant rule from JVMS 4.10.1.2: `S[]` is assignable to `T[]` whenever
/// `S` is assignable to `T`, with the runtime making up the difference via
/// `ArrayStoreException`. For the still looser relation the verifier itself applies, see
/// [`verifier_assignable`].
pub trait Assignable {
    fn is_assignable(&self, super_type: &Self) -> bool;
}

impl<'g> Assignable for ClassId<'g> {
    fn is_assignable(&self, super_type: &ClassId<'g>) -> bool {
        /* Whenever the supertype is a class, there is no point exploring interface edges since
         * the class ancestry of every interface is just `java/lang/Object` (and that case is
         * already covered by the superclass chain).
         */
        let follow_interfaces = super_type.is_interface;

        let mut supertypes_to_visit: Vec<ClassId<'g>> = vec![*self];
        let mut dont_revisit: HashSet<ClassId<'g>> = supertypes_to_visit.iter().copied().collect();

        while let Some(class_data) = supertypes_to_visit.pop() {
            if class_data == *super_type {
                return true;
            }

            if let Some(superclass) = class_data.superclass {
                if dont_revisit.insert(superclass) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if follow_interfaces {
                for &interface in &class_data.interfaces {
                    if dont_revisit.insert(interface) {
                        supertypes_to_visit.push(interface);
                    }
                }
            }
        }

        false
    }
}

impl<'g> Assignable for RefType<ClassId<'g>> {
    fn is_assignable(&self, super_type: &RefType<ClassId<'g>>) -> bool {
        match (self, super_type) {
            (RefType::Object(class1), RefType::Object(class2)) => class1.is_assignable(class2),

            // Arrays cannot be more specific than these three types
            (RefType::ObjectArray(_), RefType::Object(class))
            | (RefType::PrimitiveArray(_), RefType::Object(class)) => is_array_supertype(*class),

            // Primitive arrays must match exactly
            (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => arr1 == arr2,

            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
                match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                    Ordering::Less => false,

                    // Same dimensions, so compare the element types (covariantly)
                    Ordering::Equal => arr1.element_type.is_assignable(&arr2.element_type),

                    // The subtype has extra dimensions, which the supertype's element must absorb
                    Ordering::Greater => is_array_supertype(arr2.element_type),
                }
            }

            // Something like `int[][]` is assignable to `Object[]`
            (RefType::PrimitiveArray(arr1), RefType::ObjectArray(arr2)) => {
                arr1.additional_dimensions > arr2.additional_dimensions
                    && is_array_supertype(arr2.element_type)
            }

            (RefType::Object(_), RefType::ObjectArray(_))
            | (RefType::Object(_), RefType::PrimitiveArray(_))
            | (RefType::ObjectArray(_), RefType::PrimitiveArray(_)) => false,
        }
    }
}

/// Assignability exactly as the bytecode verifier checks it (JVMS 4.10.1.2)
///
/// The verifier treats every interface like `java/lang/Object`: any class reference may flow
/// into an interface-typed slot without the hierarchy proving anything, with `invokeinterface`
/// making up the difference at runtime. Array sources stay restricted to the three array
/// supertypes, and everything else falls back to [`Assignable`].
///
/// This gap between what verifies and what the hierarchy can prove is precisely what the
/// open-interface scan measures.
pub fn verifier_assignable<'g>(
    sub_type: &RefType<ClassId<'g>>,
    super_type: &RefType<ClassId<'g>>,
) -> bool {
    match (sub_type, super_type) {
        (RefType::Object(_), RefType::Object(class)) if class.is_interface => true,

        (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2))
            if arr1.additional_dimensions == arr2.additional_dimensions =>
        {
            arr2.element_type.is_interface
                || arr1.element_type.is_assignable(&arr2.element_type)
        }

        _ => sub_type.is_assignable(super_type),
    }
}

/// Non-array supertypes of array types
fn is_array_supertype(class: ClassId) -> bool {
    class.name == BinaryName::OBJECT
        || class.name == BinaryName::CLONEABLE
        || class.name == BinaryName::SERIALIZABLE
}
