//! End-to-end runs over decoded method bodies: the fixpoint states they produce and the
//! open-interface conclusions drawn from them.

use classframe::analysis::{MethodFlow, OpenInterfaces};
use classframe::class_graph::{
    ClassData, ClassGraph, ClassGraphArenas, ClassId, FieldData, FieldId, JavaClasses, MethodData,
    MethodId,
};
use classframe::code::{
    BasicBlock, BlockId, ExceptionHandler, Instruction, InvokeType, MethodBody, OrdComparison,
};
use classframe::frame::{FrameType, MethodContext};
use classframe::{BinaryName, FieldType, MethodDescriptor, Name, RefType, UnqualifiedName};
use pretty_assertions::assert_eq;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn binary_name(name: &str) -> BinaryName {
    BinaryName::from_string(String::from(name)).unwrap()
}

fn member_name(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(String::from(name)).unwrap()
}

fn no_args<'g>() -> MethodDescriptor<ClassId<'g>> {
    MethodDescriptor {
        parameters: vec![],
        return_type: None,
    }
}

fn method_context<'g>(
    graph: &'g ClassGraph<'g>,
    holder: ClassId<'g>,
    name: &str,
    descriptor: MethodDescriptor<ClassId<'g>>,
    max_stack: u16,
    max_locals: u16,
) -> MethodContext<'g> {
    let method = graph.add_method(MethodData {
        class: holder,
        name: member_name(name),
        descriptor,
        is_static: true,
    });
    MethodContext {
        method,
        max_stack,
        max_locals,
    }
}

fn straight_line<'g>(cx: MethodContext<'g>, instructions: Vec<Instruction<'g>>) -> MethodBody<'g> {
    let range = 0..instructions.len();
    MethodBody {
        context: cx,
        instructions,
        blocks: vec![BasicBlock {
            range,
            successors: vec![],
            handlers: vec![],
        }],
    }
}

struct Program<'g> {
    canvas: ClassId<'g>,
    shape: ClassId<'g>,
    drawable: ClassId<'g>,
    circle: ClassId<'g>,
    circle_instance: FieldId<'g>,
    triangle_instance: FieldId<'g>,
    square_instance: FieldId<'g>,
    flag: FieldId<'g>,
    draw: MethodId<'g>,
}

/// A small program: `Shape extends Drawable`, `Circle` and `Triangle` implement `Shape`,
/// `Square` implements nothing, and `Canvas` holds a `draw(Shape)` helper and an int flag
fn program_fixture<'g>(graph: &'g ClassGraph<'g>, java: &JavaClasses<'g>) -> Program<'g> {
    let drawable = graph.add_class(ClassData::new(
        binary_name("app/Drawable"),
        java.lang.object,
        true,
    ));
    let mut shape = ClassData::new(binary_name("app/Shape"), java.lang.object, true);
    shape.interfaces.push(drawable);
    let shape = graph.add_class(shape);

    let mut circle = ClassData::new(binary_name("app/Circle"), java.lang.object, false);
    circle.interfaces.push(shape);
    let circle = graph.add_class(circle);
    let mut triangle = ClassData::new(binary_name("app/Triangle"), java.lang.object, false);
    triangle.interfaces.push(shape);
    let triangle = graph.add_class(triangle);
    let square = graph.add_class(ClassData::new(
        binary_name("app/Square"),
        java.lang.object,
        false,
    ));
    let canvas = graph.add_class(ClassData::new(
        binary_name("app/Canvas"),
        java.lang.object,
        false,
    ));

    let instance = |class: ClassId<'g>| FieldData {
        class,
        name: member_name("INSTANCE"),
        descriptor: FieldType::object(class),
        is_static: true,
    };
    let circle_instance = graph.add_field(instance(circle));
    let triangle_instance = graph.add_field(instance(triangle));
    let square_instance = graph.add_field(instance(square));
    let flag = graph.add_field(FieldData {
        class: canvas,
        name: member_name("FLAG"),
        descriptor: FieldType::int(),
        is_static: true,
    });
    let draw = graph.add_method(MethodData {
        class: canvas,
        name: member_name("draw"),
        descriptor: MethodDescriptor {
            parameters: vec![FieldType::object(shape)],
            return_type: None,
        },
        is_static: true,
    });

    Program {
        canvas,
        shape,
        drawable,
        circle,
        circle_instance,
        triangle_instance,
        square_instance,
        flag,
        draw,
    }
}

#[test]
fn well_typed_program_keeps_interfaces_closed() {
    init_logger();
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = graph.insert_java_library_types();
    let program = program_fixture(&graph, &java);

    // Shape[] shapes = new Shape[1]; shapes[0] = Circle.INSTANCE;
    let fills_array = straight_line(
        method_context(&graph, program.canvas, "fillArray", no_args(), 3, 0),
        vec![
            Instruction::ConstInteger(1),
            Instruction::ANewArray(RefType::Object(program.shape)),
            Instruction::ConstInteger(0),
            Instruction::GetStatic(program.circle_instance),
            Instruction::AAStore,
            Instruction::Return,
        ],
    );

    // Canvas.draw(Circle.INSTANCE);
    let draws_circle = straight_line(
        method_context(&graph, program.canvas, "drawCircle", no_args(), 1, 0),
        vec![
            Instruction::GetStatic(program.circle_instance),
            Instruction::Invoke(InvokeType::Static, program.draw),
            Instruction::Return,
        ],
    );

    // Object o; try { o = Square.INSTANCE; } catch (RuntimeException e) { o = Circle.INSTANCE; }
    // return o;
    let catches = MethodBody {
        context: method_context(
            &graph,
            program.canvas,
            "fallback",
            MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::object(java.lang.object)),
            },
            1,
            2,
        ),
        instructions: vec![
            Instruction::GetStatic(program.square_instance),
            Instruction::AStore(0),
            Instruction::Goto,
            Instruction::AStore(1),
            Instruction::GetStatic(program.circle_instance),
            Instruction::AStore(0),
            Instruction::Goto,
            Instruction::ALoad(0),
            Instruction::AReturn,
        ],
        blocks: vec![
            BasicBlock {
                range: 0..3,
                successors: vec![BlockId(2)],
                handlers: vec![ExceptionHandler {
                    guard: Some(java.lang.runtime_exception),
                    target: BlockId(1),
                }],
            },
            BasicBlock {
                range: 3..7,
                successors: vec![BlockId(2)],
                handlers: vec![],
            },
            BasicBlock {
                range: 7..9,
                successors: vec![],
                handlers: vec![],
            },
        ],
    };

    let result = OpenInterfaces::compute(&[fills_array, draws_circle, catches], &java);
    assert!(result.is_closed(program.shape));
    assert!(result.is_closed(program.drawable));
    assert_eq!(result.iter_open().count(), 0);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn array_store_witness_opens_the_extension_chain() {
    init_logger();
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = graph.insert_java_library_types();
    let program = program_fixture(&graph, &java);
    let paintable = graph.add_class(ClassData::new(
        binary_name("app/Paintable"),
        java.lang.object,
        true,
    ));

    // Nothing relates Square to Shape, yet this store verifies
    let smuggles = straight_line(
        method_context(&graph, program.canvas, "smuggle", no_args(), 3, 0),
        vec![
            Instruction::ConstInteger(1),
            Instruction::ANewArray(RefType::Object(program.shape)),
            Instruction::ConstInteger(0),
            Instruction::GetStatic(program.square_instance),
            Instruction::AAStore,
            Instruction::Return,
        ],
    );

    let result = OpenInterfaces::compute(&[smuggles], &java);
    assert!(result.is_open(program.shape));
    assert!(result.is_open(program.drawable));
    assert!(result.is_closed(paintable));
    assert!(result.diagnostics.is_empty());

    let mut open: Vec<String> = result
        .iter_open()
        .map(|class| class.name.as_ref().to_owned())
        .collect();
    open.sort_unstable();
    assert_eq!(open, vec!["app/Drawable", "app/Shape"]);
}

#[test]
fn constructor_call_initializes_every_alias() {
    init_logger();
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = graph.insert_java_library_types();
    let program = program_fixture(&graph, &java);

    let circle_init = graph.add_method(MethodData {
        class: program.circle,
        name: UnqualifiedName::INIT,
        descriptor: no_args(),
        is_static: false,
    });

    // Circle c = new Circle(); Canvas.draw(c);
    let builds = MethodBody {
        context: method_context(&graph, program.canvas, "build", no_args(), 2, 1),
        instructions: vec![
            Instruction::New(program.circle),
            Instruction::Dup,
            Instruction::AStore(0),
            Instruction::Invoke(InvokeType::Special, circle_init),
            Instruction::Goto,
            Instruction::ALoad(0),
            Instruction::Invoke(InvokeType::Static, program.draw),
            Instruction::Return,
        ],
        blocks: vec![
            BasicBlock {
                range: 0..5,
                successors: vec![BlockId(1)],
                handlers: vec![],
            },
            BasicBlock {
                range: 5..8,
                successors: vec![],
                handlers: vec![],
            },
        ],
    };

    // The constructor call rewrites the stored alias too, so the second block starts with an
    // initialized local
    let flow = MethodFlow::compute(&builds, &java);
    let at_merge = flow.block_entries[1].frame().expect("second block is reachable");
    assert_eq!(
        at_merge.local_value(0),
        Some(FrameType::Object(RefType::Object(program.circle)))
    );

    let result = OpenInterfaces::compute(&[builds], &java);
    assert!(result.is_closed(program.shape));
    assert!(result.is_closed(program.drawable));
    assert!(result.diagnostics.is_empty());
}

#[test]
fn merged_branches_fall_back_to_the_superclass() {
    init_logger();
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = graph.insert_java_library_types();
    let program = program_fixture(&graph, &java);

    // Shape s = Circle.INSTANCE; while (Canvas.FLAG != 0) { s = Triangle.INSTANCE; }
    // Canvas.draw(s);
    let loops = MethodBody {
        context: method_context(&graph, program.canvas, "redraw", no_args(), 1, 1),
        instructions: vec![
            Instruction::GetStatic(program.circle_instance),
            Instruction::AStore(0),
            Instruction::Goto,
            Instruction::GetStatic(program.flag),
            Instruction::If(OrdComparison::NE),
            Instruction::GetStatic(program.triangle_instance),
            Instruction::AStore(0),
            Instruction::Goto,
            Instruction::ALoad(0),
            Instruction::Invoke(InvokeType::Static, program.draw),
            Instruction::Return,
        ],
        blocks: vec![
            BasicBlock {
                range: 0..3,
                successors: vec![BlockId(1)],
                handlers: vec![],
            },
            BasicBlock {
                range: 3..5,
                successors: vec![BlockId(2), BlockId(3)],
                handlers: vec![],
            },
            BasicBlock {
                range: 5..8,
                successors: vec![BlockId(1)],
                handlers: vec![],
            },
            BasicBlock {
                range: 8..11,
                successors: vec![],
                handlers: vec![],
            },
        ],
    };

    // Both branches hold a Shape, but the join climbs superclass chains and lands on Object
    let flow = MethodFlow::compute(&loops, &java);
    let at_exit = flow.block_entries[3].frame().expect("exit block is reachable");
    assert_eq!(
        at_exit.local_value(0),
        Some(FrameType::Object(RefType::Object(java.lang.object)))
    );

    // So the call to draw is no longer provable and Shape has to be treated as open
    let result = OpenInterfaces::compute(&[loops], &java);
    assert!(result.is_open(program.shape));
    assert!(result.is_open(program.drawable));
    assert!(result.diagnostics.is_empty());
}

#[test]
fn unverifiable_method_reports_and_contributes_nothing() {
    init_logger();
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = graph.insert_java_library_types();
    let program = program_fixture(&graph, &java);
    let paintable = graph.add_class(ClassData::new(
        binary_name("app/Paintable"),
        java.lang.object,
        true,
    ));
    let last_painted = graph.add_field(FieldData {
        class: program.canvas,
        name: member_name("LAST_PAINTED"),
        descriptor: FieldType::object(paintable),
        is_static: true,
    });

    let witnesses_then_breaks = straight_line(
        method_context(&graph, program.canvas, "broken", no_args(), 3, 0),
        vec![
            Instruction::ConstInteger(1),
            Instruction::ANewArray(RefType::Object(program.shape)),
            Instruction::ConstInteger(0),
            Instruction::GetStatic(program.square_instance),
            Instruction::AAStore,
            Instruction::GetStatic(program.circle_instance),
            Instruction::IAdd,
        ],
    );
    let broken_method = witnesses_then_breaks.context.method;

    let stashes = straight_line(
        method_context(&graph, program.canvas, "stash", no_args(), 1, 0),
        vec![
            Instruction::GetStatic(program.square_instance),
            Instruction::PutStatic(last_painted),
            Instruction::Return,
        ],
    );

    let result = OpenInterfaces::compute(&[witnesses_then_breaks, stashes], &java);

    // The witness against Shape sat in the broken method, so it is discarded; the clean
    // method's witness against Paintable survives
    assert!(result.is_closed(program.shape));
    assert!(result.is_closed(program.drawable));
    assert!(result.is_open(paintable));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].method, broken_method);
    assert_eq!(result.diagnostics[0].instruction, 6);
    assert!(!result.diagnostics[0].message.is_empty());
}

#[test]
fn parallel_scan_is_deterministic() {
    init_logger();
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = graph.insert_java_library_types();

    // Many independent interface/class pairs, each with its own smuggling method, plus a few
    // methods that do not verify at all
    let mut bodies = vec![];
    for index in 0..12 {
        let sink = graph.add_class(ClassData::new(
            binary_name(&format!("app/Sink{}", index)),
            java.lang.object,
            true,
        ));
        let source = graph.add_class(ClassData::new(
            binary_name(&format!("app/Source{}", index)),
            java.lang.object,
            false,
        ));
        let source_instance = graph.add_field(FieldData {
            class: source,
            name: member_name("INSTANCE"),
            descriptor: FieldType::object(source),
            is_static: true,
        });
        bodies.push(straight_line(
            method_context(&graph, source, "smuggle", no_args(), 3, 0),
            vec![
                Instruction::ConstInteger(1),
                Instruction::ANewArray(RefType::Object(sink)),
                Instruction::ConstInteger(0),
                Instruction::GetStatic(source_instance),
                Instruction::AAStore,
                Instruction::Return,
            ],
        ));
    }
    for index in 0..4 {
        bodies.push(straight_line(
            method_context(
                &graph,
                java.lang.object,
                &format!("broken{}", index),
                no_args(),
                1,
                0,
            ),
            vec![Instruction::IAdd],
        ));
    }

    let first = OpenInterfaces::compute(&bodies, &java);
    let second = OpenInterfaces::compute(&bodies, &java);

    let open_names = |result: &OpenInterfaces| -> Vec<String> {
        let mut names: Vec<String> = result
            .iter_open()
            .map(|class| class.name.as_ref().to_owned())
            .collect();
        names.sort_unstable();
        names
    };
    assert_eq!(open_names(&first), open_names(&second));
    assert_eq!(open_names(&first).len(), 12);

    let reported = |result: &OpenInterfaces| -> Vec<(String, usize)> {
        result
            .diagnostics
            .iter()
            .map(|diagnostic| (format!("{:?}", diagnostic.method), diagnostic.instruction))
            .collect()
    };
    assert_eq!(reported(&first), reported(&second));
    assert_eq!(reported(&first).len(), 4);
}
