use crate::class_graph::{verifier_assignable, ClassId, JavaClasses};
use crate::code::{Instruction, InvokeType};
use crate::descriptors::{ArrayType, BaseType, FieldType, RefType, RenderDescriptor};
use crate::frame::{AllocationSite, FrameState, FrameType, MethodContext};
use crate::util::{Offset, Width};

impl<'g> Instruction<'g> {
    /// Execute one instruction against a frame state
    ///
    /// `at` is the instruction's position within the method, which becomes the identity of any
    /// allocation the instruction performs. An `Error` input flows through untouched, and a
    /// `Bottom` input turns into an error for any instruction that inspects the frame; only an
    /// explicit [`Instruction::Frame`] brings an unreached point back to a usable state.
    pub fn evaluate(
        &self,
        state: FrameState<'g>,
        at: Offset,
        cx: &MethodContext<'g>,
        java: &JavaClasses<'g>,
    ) -> FrameState<'g> {
        if state.is_error() {
            return state;
        }
        match self {
            Instruction::Nop => state,
            Instruction::ConstNull => state.push(cx, FrameType::Null),
            Instruction::ConstInteger(_) => state.push(cx, FrameType::Integer),
            Instruction::ConstLong(_) => state.push(cx, FrameType::Long),
            Instruction::ConstFloat(_) => state.push(cx, FrameType::Float),
            Instruction::ConstDouble(_) => state.push(cx, FrameType::Double),
            Instruction::ConstString(_) => {
                state.push(cx, FrameType::Object(RefType::Object(java.lang.string)))
            }
            Instruction::ConstClass(_) => {
                state.push(cx, FrameType::Object(RefType::Object(java.lang.class)))
            }

            Instruction::ILoad(index) => {
                state.read_local(*index, FieldType::int(), |state, ty| state.push(cx, ty))
            }
            Instruction::LLoad(index) => {
                state.read_local(*index, FieldType::long(), |state, ty| state.push(cx, ty))
            }
            Instruction::FLoad(index) => {
                state.read_local(*index, FieldType::float(), |state, ty| state.push(cx, ty))
            }
            Instruction::DLoad(index) => {
                state.read_local(*index, FieldType::double(), |state, ty| state.push(cx, ty))
            }
            Instruction::ALoad(index) => {
                state.read_local_reference(*index, |state, ty| state.push(cx, ty))
            }

            Instruction::IALoad => {
                array_load(state, cx, &[BaseType::Int], FrameType::Integer, "iaload")
            }
            Instruction::LALoad => {
                array_load(state, cx, &[BaseType::Long], FrameType::Long, "laload")
            }
            Instruction::FALoad => {
                array_load(state, cx, &[BaseType::Float], FrameType::Float, "faload")
            }
            Instruction::DALoad => {
                array_load(state, cx, &[BaseType::Double], FrameType::Double, "daload")
            }
            Instruction::AALoad => state.pop_initialized(FieldType::int()).pop_array(
                |state, element| match element {
                    None => state.push(cx, FrameType::Null),
                    Some(element @ FieldType::Ref(_)) => state.push(cx, FrameType::from(element)),
                    Some(element) => FrameState::error(format!(
                        "aaload cannot load from an array of {}",
                        element.render()
                    )),
                },
            ),
            Instruction::BALoad => array_load(
                state,
                cx,
                &[BaseType::Byte, BaseType::Boolean],
                FrameType::Integer,
                "baload",
            ),
            Instruction::CALoad => {
                array_load(state, cx, &[BaseType::Char], FrameType::Integer, "caload")
            }
            Instruction::SALoad => {
                array_load(state, cx, &[BaseType::Short], FrameType::Integer, "saload")
            }

            Instruction::IStore(index) => store_value(state, cx, *index, FrameType::Integer),
            Instruction::LStore(index) => store_value(state, cx, *index, FrameType::Long),
            Instruction::FStore(index) => store_value(state, cx, *index, FrameType::Float),
            Instruction::DStore(index) => store_value(state, cx, *index, FrameType::Double),
            Instruction::AStore(index) => {
                let index = *index;
                state.pop(|state, ty| {
                    if ty.is_reference() {
                        state.store_local(cx, index, ty)
                    } else {
                        FrameState::error(format!(
                            "astore expects a reference on the stack but found {:?}",
                            ty
                        ))
                    }
                })
            }

            Instruction::IAStore => {
                array_store(state, FieldType::int(), &[BaseType::Int], "iastore")
            }
            Instruction::LAStore => {
                array_store(state, FieldType::long(), &[BaseType::Long], "lastore")
            }
            Instruction::FAStore => {
                array_store(state, FieldType::float(), &[BaseType::Float], "fastore")
            }
            Instruction::DAStore => {
                array_store(state, FieldType::double(), &[BaseType::Double], "dastore")
            }
            // The element check is the runtime's job (ArrayStoreException), not ours: any
            // reference may be stored into any reference array here
            Instruction::AAStore => state
                .pop_initialized(FieldType::object(java.lang.object))
                .pop_initialized(FieldType::int())
                .pop_array(|state, element| match element {
                    None | Some(FieldType::Ref(_)) => state,
                    Some(element) => FrameState::error(format!(
                        "aastore cannot store into an array of {}",
                        element.render()
                    )),
                }),
            Instruction::BAStore => array_store(
                state,
                FieldType::int(),
                &[BaseType::Byte, BaseType::Boolean],
                "bastore",
            ),
            Instruction::CAStore => {
                array_store(state, FieldType::int(), &[BaseType::Char], "castore")
            }
            Instruction::SAStore => {
                array_store(state, FieldType::int(), &[BaseType::Short], "sastore")
            }

            Instruction::Pop => state.pop_single(|state, _| state),
            Instruction::Pop2 => state.pop(|state, v1| {
                if v1.width() == 2 {
                    state
                } else {
                    state.pop_single(|state, _| state)
                }
            }),
            Instruction::Dup => state.pop_single(|state, v1| state.push(cx, v1).push(cx, v1)),
            Instruction::DupX1 => state.pop_single(|state, v1| {
                state.pop_single(|state, v2| state.push(cx, v1).push(cx, v2).push(cx, v1))
            }),
            Instruction::DupX2 => state.pop_single(|state, v1| {
                state.pop(|state, v2| {
                    if v2.width() == 2 {
                        state.push(cx, v1).push(cx, v2).push(cx, v1)
                    } else {
                        state.pop_single(|state, v3| {
                            state.push(cx, v1).push(cx, v3).push(cx, v2).push(cx, v1)
                        })
                    }
                })
            }),
            Instruction::Dup2 => state.pop(|state, v1| {
                if v1.width() == 2 {
                    state.push(cx, v1).push(cx, v1)
                } else {
                    state.pop_single(|state, v2| {
                        state.push(cx, v2).push(cx, v1).push(cx, v2).push(cx, v1)
                    })
                }
            }),
            Instruction::Dup2X1 => state.pop(|state, v1| {
                if v1.width() == 2 {
                    state.pop_single(|state, v2| state.push(cx, v1).push(cx, v2).push(cx, v1))
                } else {
                    state.pop_single(|state, v2| {
                        state.pop_single(|state, v3| {
                            state
                                .push(cx, v2)
                                .push(cx, v1)
                                .push(cx, v3)
                                .push(cx, v2)
                                .push(cx, v1)
                        })
                    })
                }
            }),
            Instruction::Dup2X2 => state.pop(|state, v1| {
                if v1.width() == 2 {
                    state.pop(|state, v2| {
                        if v2.width() == 2 {
                            state.push(cx, v1).push(cx, v2).push(cx, v1)
                        } else {
                            state.pop_single(|state, v3| {
                                state.push(cx, v1).push(cx, v3).push(cx, v2).push(cx, v1)
                            })
                        }
                    })
                } else {
                    state.pop_single(|state, v2| {
                        state.pop(|state, v3| {
                            if v3.width() == 2 {
                                state
                                    .push(cx, v2)
                                    .push(cx, v1)
                                    .push(cx, v3)
                                    .push(cx, v2)
                                    .push(cx, v1)
                            } else {
                                state.pop_single(|state, v4| {
                                    state
                                        .push(cx, v2)
                                        .push(cx, v1)
                                        .push(cx, v4)
                                        .push(cx, v3)
                                        .push(cx, v2)
                                        .push(cx, v1)
                                })
                            }
                        })
                    })
                }
            }),
            Instruction::Swap => state.pop_single(|state, v1| {
                state.pop_single(|state, v2| state.push(cx, v1).push(cx, v2))
            }),

            Instruction::IAdd
            | Instruction::ISub
            | Instruction::IMul
            | Instruction::IDiv
            | Instruction::IRem
            | Instruction::IAnd
            | Instruction::IOr
            | Instruction::IXor => state
                .pop_initialized(FieldType::int())
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Integer),
            Instruction::LAdd
            | Instruction::LSub
            | Instruction::LMul
            | Instruction::LDiv
            | Instruction::LRem
            | Instruction::LAnd
            | Instruction::LOr
            | Instruction::LXor => state
                .pop_initialized(FieldType::long())
                .pop_initialized(FieldType::long())
                .push(cx, FrameType::Long),
            Instruction::FAdd
            | Instruction::FSub
            | Instruction::FMul
            | Instruction::FDiv
            | Instruction::FRem => state
                .pop_initialized(FieldType::float())
                .pop_initialized(FieldType::float())
                .push(cx, FrameType::Float),
            Instruction::DAdd
            | Instruction::DSub
            | Instruction::DMul
            | Instruction::DDiv
            | Instruction::DRem => state
                .pop_initialized(FieldType::double())
                .pop_initialized(FieldType::double())
                .push(cx, FrameType::Double),
            Instruction::INeg => state
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Integer),
            Instruction::LNeg => state
                .pop_initialized(FieldType::long())
                .push(cx, FrameType::Long),
            Instruction::FNeg => state
                .pop_initialized(FieldType::float())
                .push(cx, FrameType::Float),
            Instruction::DNeg => state
                .pop_initialized(FieldType::double())
                .push(cx, FrameType::Double),

            // The shift amount on top is always an int, even for long shifts
            Instruction::ISh(_) => state
                .pop_initialized(FieldType::int())
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Integer),
            Instruction::LSh(_) => state
                .pop_initialized(FieldType::int())
                .pop_initialized(FieldType::long())
                .push(cx, FrameType::Long),

            Instruction::IInc(index, _) => {
                state.read_local(*index, FieldType::int(), |state, _| state)
            }

            Instruction::I2L => state
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Long),
            Instruction::I2F => state
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Float),
            Instruction::I2D => state
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Double),
            Instruction::L2I => state
                .pop_initialized(FieldType::long())
                .push(cx, FrameType::Integer),
            Instruction::L2F => state
                .pop_initialized(FieldType::long())
                .push(cx, FrameType::Float),
            Instruction::L2D => state
                .pop_initialized(FieldType::long())
                .push(cx, FrameType::Double),
            Instruction::F2I => state
                .pop_initialized(FieldType::float())
                .push(cx, FrameType::Integer),
            Instruction::F2L => state
                .pop_initialized(FieldType::float())
                .push(cx, FrameType::Long),
            Instruction::F2D => state
                .pop_initialized(FieldType::float())
                .push(cx, FrameType::Double),
            Instruction::D2I => state
                .pop_initialized(FieldType::double())
                .push(cx, FrameType::Integer),
            Instruction::D2L => state
                .pop_initialized(FieldType::double())
                .push(cx, FrameType::Long),
            Instruction::D2F => state
                .pop_initialized(FieldType::double())
                .push(cx, FrameType::Float),
            Instruction::I2B | Instruction::I2C | Instruction::I2S => state
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Integer),

            Instruction::LCmp => state
                .pop_initialized(FieldType::long())
                .pop_initialized(FieldType::long())
                .push(cx, FrameType::Integer),
            Instruction::FCmp(_) => state
                .pop_initialized(FieldType::float())
                .pop_initialized(FieldType::float())
                .push(cx, FrameType::Integer),
            Instruction::DCmp(_) => state
                .pop_initialized(FieldType::double())
                .pop_initialized(FieldType::double())
                .push(cx, FrameType::Integer),

            Instruction::GetStatic(field) => state.push(cx, FrameType::from(field.descriptor)),
            Instruction::PutStatic(field) => state.pop_initialized(field.descriptor),
            Instruction::GetField(field) => state
                .pop_initialized(FieldType::object(field.class))
                .push(cx, FrameType::from(field.descriptor)),
            Instruction::PutField(field) => {
                let field = *field;
                state
                    .pop_initialized(field.descriptor)
                    .pop(|state, receiver| match receiver {
                        // Writing own fields before the superclass constructor runs is fine
                        FrameType::UninitializedThis if field.class == cx.this_class() => state,
                        FrameType::Null => state,
                        FrameType::Object(ref_type)
                            if verifier_assignable(&ref_type, &RefType::Object(field.class)) =>
                        {
                            state
                        }
                        receiver => FrameState::error(format!(
                            "putfield {:?} cannot write through a receiver of {:?}",
                            field, receiver
                        )),
                    })
            }

            Instruction::Invoke(invoke_type, method) => {
                let method = *method;
                let mut state = state;
                for &parameter in method.descriptor.parameters.iter().rev() {
                    state = state.pop_initialized(parameter);
                }
                state = match invoke_type {
                    InvokeType::Static => state,
                    InvokeType::Special if method.is_constructor() => {
                        state.pop_and_initialize(cx, method)
                    }
                    _ => state.pop_initialized(FieldType::object(method.class)),
                };
                match method.descriptor.return_type {
                    Some(return_type) => state.push(cx, FrameType::from(return_type)),
                    None => state,
                }
            }
            Instruction::InvokeDynamic(descriptor) => {
                let mut state = state;
                for &parameter in descriptor.parameters.iter().rev() {
                    state = state.pop_initialized(parameter);
                }
                match descriptor.return_type {
                    Some(return_type) => state.push(cx, FrameType::from(return_type)),
                    None => state,
                }
            }

            Instruction::New(class) => state.push(
                cx,
                FrameType::Uninitialized(AllocationSite { class: *class, at }),
            ),
            Instruction::NewArray(element_type) => {
                state.pop_initialized(FieldType::int()).push(
                    cx,
                    FrameType::Object(RefType::PrimitiveArray(ArrayType {
                        additional_dimensions: 0,
                        element_type: *element_type,
                    })),
                )
            }
            Instruction::ANewArray(component) => state
                .pop_initialized(FieldType::int())
                .push(cx, FrameType::Object(RefType::array(FieldType::Ref(*component)))),
            Instruction::MultiANewArray(array_type, dimensions) => {
                let available = match array_type {
                    RefType::Object(_) => 0,
                    RefType::ObjectArray(arr) => arr.dimensions(),
                    RefType::PrimitiveArray(arr) => arr.dimensions(),
                };
                if *dimensions == 0 || *dimensions as usize > available {
                    return FrameState::error(format!(
                        "multianewarray cannot make {} dimensions of {}",
                        dimensions,
                        array_type.render()
                    ));
                }
                let mut state = state;
                for _ in 0..*dimensions {
                    state = state.pop_initialized(FieldType::int());
                }
                state.push(cx, FrameType::Object(*array_type))
            }
            Instruction::ArrayLength => {
                state.pop_array(|state, _| state.push(cx, FrameType::Integer))
            }

            Instruction::CheckCast(target) => {
                let target = *target;
                state.pop_reference(|state, _| state.push(cx, FrameType::Object(target)))
            }
            Instruction::InstanceOf(_) => {
                state.pop_reference(|state, _| state.push(cx, FrameType::Integer))
            }
            Instruction::MonitorEnter | Instruction::MonitorExit => {
                state.pop_reference(|state, _| state)
            }

            Instruction::If(_) => state.pop_initialized(FieldType::int()),
            Instruction::IfICmp(_) => state
                .pop_initialized(FieldType::int())
                .pop_initialized(FieldType::int()),
            Instruction::IfACmp(_) => state
                .pop_reference(|state, _| state)
                .pop_reference(|state, _| state),
            Instruction::IfNull(_) => state.pop_reference(|state, _| state),
            Instruction::Goto => state,
            Instruction::Switch => state.pop_initialized(FieldType::int()),

            Instruction::IReturn => return_primitive(state, cx, "ireturn", FrameType::Integer),
            Instruction::LReturn => return_primitive(state, cx, "lreturn", FrameType::Long),
            Instruction::FReturn => return_primitive(state, cx, "freturn", FrameType::Float),
            Instruction::DReturn => return_primitive(state, cx, "dreturn", FrameType::Double),
            Instruction::AReturn => match cx.method.descriptor.return_type {
                Some(declared @ FieldType::Ref(_)) => state.pop_initialized(declared).clear(),
                Some(declared) => FrameState::error(format!(
                    "areturn does not match the declared return of {}",
                    declared.render()
                )),
                None => FrameState::error("areturn in a method that returns nothing"),
            },
            Instruction::Return => match cx.method.descriptor.return_type {
                None => state.clear(),
                Some(declared) => FrameState::error(format!(
                    "return ignores the declared return of {}",
                    declared.render()
                )),
            },

            Instruction::AThrow => state
                .pop_initialized(FieldType::object(java.lang.throwable))
                .clear(),

            Instruction::Frame(declared) => state.check(cx, declared),
        }
    }
}

/// Pop a value of exactly the given type and store it into a local
fn store_value<'g>(
    state: FrameState<'g>,
    cx: &MethodContext<'g>,
    index: u16,
    expected: FrameType<'g>,
) -> FrameState<'g> {
    state.pop(|state, ty| {
        if ty == expected {
            state.store_local(cx, index, ty)
        } else {
            FrameState::error(format!(
                "expected {:?} on the stack but found {:?}",
                expected, ty
            ))
        }
    })
}

/// Pop an index and an array whose element is one of `accepts`, then push the loaded value
fn array_load<'g>(
    state: FrameState<'g>,
    cx: &MethodContext<'g>,
    accepts: &[BaseType],
    pushes: FrameType<'g>,
    mnemonic: &str,
) -> FrameState<'g> {
    state
        .pop_initialized(FieldType::int())
        .pop_array(|state, element| match element {
            None => state.push(cx, pushes),
            Some(FieldType::Base(base)) if accepts.contains(&base) => state.push(cx, pushes),
            Some(element) => FrameState::error(format!(
                "{} cannot load from an array of {}",
                mnemonic,
                element.render()
            )),
        })
}

/// Pop a value, an index, and an array whose element is one of `accepts`
fn array_store<'g>(
    state: FrameState<'g>,
    stored: FieldType<ClassId<'g>>,
    accepts: &[BaseType],
    mnemonic: &str,
) -> FrameState<'g> {
    state
        .pop_initialized(stored)
        .pop_initialized(FieldType::int())
        .pop_array(|state, element| match element {
            None => state,
            Some(FieldType::Base(base)) if accepts.contains(&base) => state,
            Some(element) => FrameState::error(format!(
                "{} cannot store into an array of {}",
                mnemonic,
                element.render()
            )),
        })
}

/// Pop the declared return value and end the path, for `ireturn` through `dreturn`
fn return_primitive<'g>(
    state: FrameState<'g>,
    cx: &MethodContext<'g>,
    mnemonic: &str,
    returned: FrameType<'g>,
) -> FrameState<'g> {
    match cx.method.descriptor.return_type {
        Some(declared) if FrameType::from(declared) == returned => {
            state.pop_initialized(declared).clear()
        }
        Some(declared) => FrameState::error(format!(
            "{} does not match the declared return of {}",
            mnemonic,
            declared.render()
        )),
        None => FrameState::error(format!("{} in a method that returns nothing", mnemonic)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class_graph::{ClassData, ClassGraph, ClassGraphArenas, FieldData, MethodData};
    use crate::descriptors::MethodDescriptor;
    use crate::frame::DeclaredFrame;
    use crate::names::{BinaryName, Name, UnqualifiedName};
    use pretty_assertions::assert_eq;

    fn context_for<'g>(
        graph: &'g ClassGraph<'g>,
        java: &JavaClasses<'g>,
        descriptor: MethodDescriptor<ClassId<'g>>,
        max_stack: u16,
        max_locals: u16,
    ) -> MethodContext<'g> {
        let method = graph.add_method(MethodData {
            class: java.lang.object,
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor,
            is_static: true,
        });
        MethodContext {
            method,
            max_stack,
            max_locals,
        }
    }

    fn void_context<'g>(
        graph: &'g ClassGraph<'g>,
        java: &JavaClasses<'g>,
        max_stack: u16,
        max_locals: u16,
    ) -> MethodContext<'g> {
        context_for(
            graph,
            java,
            MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            max_stack,
            max_locals,
        )
    }

    fn evaluate_all<'g>(
        cx: &MethodContext<'g>,
        java: &JavaClasses<'g>,
        instructions: &[Instruction<'g>],
    ) -> FrameState<'g> {
        let mut state = FrameState::entry(cx);
        for (index, instruction) in instructions.iter().enumerate() {
            state = instruction.evaluate(state, Offset(index), cx, java);
        }
        state
    }

    fn stack_types<'g>(state: &FrameState<'g>) -> Vec<FrameType<'g>> {
        state
            .frame()
            .expect("state should be concrete")
            .stack
            .iter()
            .map(|(_, _, ty)| *ty)
            .collect()
    }

    #[test]
    fn integer_arithmetic_flows_through_the_stack() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 2, 0);

        let added = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(1),
                Instruction::ConstInteger(2),
                Instruction::IAdd,
            ],
        );
        assert_eq!(stack_types(&added), vec![FrameType::Integer]);

        let widened = evaluate_all(&cx, &java, &[Instruction::ConstInteger(1), Instruction::I2L]);
        assert_eq!(stack_types(&widened), vec![FrameType::Long]);

        let mistyped = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(1),
                Instruction::ConstFloat(2.0),
                Instruction::IAdd,
            ],
        );
        assert!(mistyped.is_error());
    }

    #[test]
    fn dup2_duplicates_a_wide_or_a_pair() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 4, 0);

        let wide = evaluate_all(&cx, &java, &[Instruction::ConstLong(1), Instruction::Dup2]);
        assert_eq!(stack_types(&wide), vec![FrameType::Long, FrameType::Long]);

        let pair = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(1),
                Instruction::ConstFloat(2.0),
                Instruction::Dup2,
            ],
        );
        assert_eq!(
            stack_types(&pair),
            vec![
                FrameType::Integer,
                FrameType::Float,
                FrameType::Integer,
                FrameType::Float,
            ]
        );

        let popped = evaluate_all(&cx, &java, &[Instruction::ConstLong(1), Instruction::Pop2]);
        assert!(popped.frame().unwrap().stack.is_empty());
    }

    #[test]
    fn dup_x2_threads_a_value_under_a_wide() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 4, 0);

        let state = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstLong(1),
                Instruction::ConstInteger(2),
                Instruction::DupX2,
            ],
        );
        assert_eq!(
            stack_types(&state),
            vec![FrameType::Integer, FrameType::Long, FrameType::Integer]
        );
    }

    #[test]
    fn swap_requires_single_slot_values() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 3, 0);

        let swapped = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(1),
                Instruction::ConstFloat(2.0),
                Instruction::Swap,
            ],
        );
        assert_eq!(stack_types(&swapped), vec![FrameType::Float, FrameType::Integer]);

        let wide = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstLong(1),
                Instruction::ConstInteger(2),
                Instruction::Swap,
            ],
        );
        assert!(wide.is_error());
    }

    #[test]
    fn primitive_arrays_check_their_element_kind() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 4, 0);

        let loaded = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(3),
                Instruction::NewArray(BaseType::Int),
                Instruction::ConstInteger(0),
                Instruction::IALoad,
            ],
        );
        assert_eq!(stack_types(&loaded), vec![FrameType::Integer]);

        let stored = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(3),
                Instruction::NewArray(BaseType::Long),
                Instruction::ConstInteger(0),
                Instruction::ConstLong(7),
                Instruction::LAStore,
            ],
        );
        assert!(stored.frame().unwrap().stack.is_empty());

        // baload also covers boolean arrays
        let boolean_load = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(1),
                Instruction::NewArray(BaseType::Boolean),
                Instruction::ConstInteger(0),
                Instruction::BALoad,
            ],
        );
        assert_eq!(stack_types(&boolean_load), vec![FrameType::Integer]);

        let mismatched = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(3),
                Instruction::NewArray(BaseType::Long),
                Instruction::ConstInteger(0),
                Instruction::IALoad,
            ],
        );
        assert!(mismatched.is_error());
    }

    #[test]
    fn reference_array_stores_defer_the_element_check() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 4, 0);

        // Storing a plain Object into a String[] passes: the runtime check catches bad elements
        let stored = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(1),
                Instruction::ANewArray(RefType::Object(java.lang.string)),
                Instruction::Dup,
                Instruction::ConstInteger(0),
                Instruction::ConstString(String::from("x")),
                Instruction::CheckCast(RefType::Object(java.lang.object)),
                Instruction::AAStore,
            ],
        );
        assert_eq!(
            stack_types(&stored),
            vec![FrameType::Object(RefType::array(FieldType::object(
                java.lang.string
            )))]
        );
    }

    #[test]
    fn multianewarray_checks_its_dimension_count() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 3, 0);
        let matrix = RefType::PrimitiveArray(ArrayType {
            additional_dimensions: 1,
            element_type: BaseType::Int,
        });

        let built = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(2),
                Instruction::ConstInteger(3),
                Instruction::MultiANewArray(matrix, 2),
            ],
        );
        assert_eq!(stack_types(&built), vec![FrameType::Object(matrix)]);

        let too_deep = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstInteger(2),
                Instruction::ConstInteger(3),
                Instruction::MultiANewArray(matrix, 3),
            ],
        );
        assert!(too_deep.is_error());
    }

    #[test]
    fn field_access_follows_the_descriptor() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let counter = graph.add_class(ClassData::new(
            BinaryName::from_string(String::from("com/example/Counter")).unwrap(),
            java.lang.object,
            false,
        ));
        let count = graph.add_field(FieldData {
            class: counter,
            name: UnqualifiedName::from_string(String::from("count")).unwrap(),
            descriptor: FieldType::long(),
            is_static: false,
        });
        let total = graph.add_field(FieldData {
            class: counter,
            name: UnqualifiedName::from_string(String::from("TOTAL")).unwrap(),
            descriptor: FieldType::long(),
            is_static: true,
        });
        let cx = void_context(&graph, &java, 3, 0);

        let read_static = evaluate_all(&cx, &java, &[Instruction::GetStatic(total)]);
        assert_eq!(stack_types(&read_static), vec![FrameType::Long]);

        let read = evaluate_all(
            &cx,
            &java,
            &[Instruction::ConstNull, Instruction::GetField(count)],
        );
        assert_eq!(stack_types(&read), vec![FrameType::Long]);

        let written = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstNull,
                Instruction::ConstLong(1),
                Instruction::PutField(count),
            ],
        );
        assert!(written.frame().unwrap().stack.is_empty());

        let wrong_kind = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstNull,
                Instruction::ConstInteger(1),
                Instruction::PutField(count),
            ],
        );
        assert!(wrong_kind.is_error());
    }

    #[test]
    fn constructors_initialize_every_alias() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let thing = graph.add_class(ClassData::new(
            BinaryName::from_string(String::from("com/example/Thing")).unwrap(),
            java.lang.object,
            false,
        ));
        let constructor = graph.add_method(MethodData {
            class: thing,
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            is_static: false,
        });
        let cx = void_context(&graph, &java, 2, 0);

        let state = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::New(thing),
                Instruction::Dup,
                Instruction::Invoke(InvokeType::Special, constructor),
            ],
        );
        assert_eq!(
            stack_types(&state),
            vec![FrameType::Object(RefType::Object(thing))]
        );

        // Calling the constructor again trips over the already-initialized value
        let again = state.clone().pop(|state, _| {
            state
                .push(&cx, FrameType::Object(RefType::Object(thing)))
                .pop_and_initialize(&cx, constructor)
        });
        assert!(again.is_error());
    }

    #[test]
    fn invocations_pop_arguments_in_declaration_order() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let callee = graph.add_method(MethodData {
            class: java.lang.object,
            name: UnqualifiedName::from_string(String::from("accept")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::object(java.lang.string), FieldType::long()],
                return_type: Some(FieldType::int()),
            },
            is_static: true,
        });
        let cx = void_context(&graph, &java, 4, 0);

        let good = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstString(String::from("s")),
                Instruction::ConstLong(4),
                Instruction::Invoke(InvokeType::Static, callee),
            ],
        );
        assert_eq!(stack_types(&good), vec![FrameType::Integer]);

        let reversed = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstLong(4),
                Instruction::ConstString(String::from("s")),
                Instruction::Invoke(InvokeType::Static, callee),
            ],
        );
        assert!(reversed.is_error());
    }

    #[test]
    fn returns_match_the_declared_type() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();

        let void_cx = void_context(&graph, &java, 1, 0);
        assert_eq!(
            evaluate_all(&void_cx, &java, &[Instruction::Return]),
            FrameState::Bottom
        );
        assert!(evaluate_all(&void_cx, &java, &[Instruction::IReturn]).is_error());

        let int_cx = context_for(
            &graph,
            &java,
            MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::int()),
            },
            1,
            0,
        );
        assert_eq!(
            evaluate_all(
                &int_cx,
                &java,
                &[Instruction::ConstInteger(3), Instruction::IReturn],
            ),
            FrameState::Bottom
        );
        assert!(evaluate_all(&int_cx, &java, &[Instruction::Return]).is_error());

        let string_cx = context_for(
            &graph,
            &java,
            MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::object(java.lang.string)),
            },
            1,
            0,
        );
        assert_eq!(
            evaluate_all(
                &string_cx,
                &java,
                &[Instruction::ConstNull, Instruction::AReturn],
            ),
            FrameState::Bottom
        );
    }

    #[test]
    fn athrow_needs_a_throwable() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 1, 0);

        assert_eq!(
            evaluate_all(&cx, &java, &[Instruction::ConstNull, Instruction::AThrow]),
            FrameState::Bottom
        );

        let not_throwable = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstString(String::from("nope")),
                Instruction::AThrow,
            ],
        );
        assert!(not_throwable.is_error());
    }

    #[test]
    fn declared_frames_restore_unreached_points() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 1, 1);

        let declared = DeclaredFrame {
            locals: vec![],
            stack: vec![FrameType::Integer],
        };
        let state = evaluate_all(
            &cx,
            &java,
            &[Instruction::Return, Instruction::Frame(declared)],
        );
        assert_eq!(stack_types(&state), vec![FrameType::Integer]);
    }

    #[test]
    fn casts_and_instance_checks() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let cx = void_context(&graph, &java, 1, 0);

        let cast = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstNull,
                Instruction::CheckCast(RefType::Object(java.lang.string)),
            ],
        );
        assert_eq!(
            stack_types(&cast),
            vec![FrameType::Object(RefType::Object(java.lang.string))]
        );

        let checked = evaluate_all(
            &cx,
            &java,
            &[
                Instruction::ConstNull,
                Instruction::InstanceOf(RefType::Object(java.lang.string)),
            ],
        );
        assert_eq!(stack_types(&checked), vec![FrameType::Integer]);
    }
}
