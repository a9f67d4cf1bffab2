//! End-to-end interpreter tests: programs built with the builders and
//! run through `Runner`.

use minipy::{
    BinaryOp, CodeBuilder, CompareOp, Const, Conversion, FaultKind, FunctionDef, Instr, NoopTracer, Object,
    ProgramBuilder, RecordingTracer, ResourceLimits, Runner, Signature, TraceEvent,
};
use pretty_assertions::assert_eq;

/// Runs a module-only program with no builtins.
fn run_module(code: CodeBuilder) -> Result<Object, minipy::Fault> {
    let program = ProgramBuilder::new().finish(code.build());
    Runner::new(program).run(vec![])
}

#[test]
fn arithmetic_returns_five_with_clean_stack() {
    let program = ProgramBuilder::new();
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(2));
    code.emit_load_const(Const::Int(3));
    code.emit_binary_op(BinaryOp::Add);
    code.emit_return_value();
    let runner = Runner::new(program.finish(code.build()));

    let mut tracer = RecordingTracer::new();
    let result = runner
        .run_with(vec![], ResourceLimits::default(), &mut tracer)
        .unwrap();
    assert_eq!(result, Object::Int(5));

    // Stack discipline: two operands before the add, exactly one value
    // (the sum) before the return.
    let instrs: Vec<(usize, &str, usize)> = tracer
        .events()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Instruction { ip, op, stack_depth } => Some((*ip, *op, *stack_depth)),
            _ => None,
        })
        .collect();
    assert_eq!(
        instrs,
        vec![
            (0, "LoadConst", 0),
            (1, "LoadConst", 1),
            (2, "BinaryOp", 2),
            (3, "ReturnValue", 1),
        ]
    );
}

#[test]
fn conditional_jump_skips_the_true_branch() {
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Bool(false));
    let jump = code.emit_pop_jump_if_false();
    code.emit_load_const(Const::Int(1));
    code.emit_return_value();
    code.patch_jump(jump);
    code.emit_load_const(Const::Int(0));
    code.emit_return_value();

    assert_eq!(run_module(code).unwrap(), Object::Int(0));
}

#[test]
fn short_circuit_jumps() {
    // True or <second>: keeps the truthy value without popping it.
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Bool(true));
    let jump = code.emit_jump_if_true_or_pop();
    code.emit_load_const(Const::Int(5));
    code.patch_jump(jump);
    code.emit_return_value();
    assert_eq!(run_module(code).unwrap(), Object::Bool(true));

    // False or <second>: pops and evaluates the second operand.
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Bool(false));
    let jump = code.emit_jump_if_true_or_pop();
    code.emit_load_const(Const::Int(5));
    code.patch_jump(jump);
    code.emit_return_value();
    assert_eq!(run_module(code).unwrap(), Object::Int(5));
}

#[test]
fn names_resolve_through_scopes() {
    let mut program = ProgramBuilder::new();
    let x = program.intern("x");
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(10));
    code.emit_store_name(x);
    code.emit_load_name(x);
    code.emit_load_const(Const::Int(1));
    code.emit_binary_op(BinaryOp::Add);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::Int(11));
}

#[test]
fn builtins_are_the_outermost_scope() {
    let mut program = ProgramBuilder::new();
    let answer = program.intern("answer");
    let mut code = CodeBuilder::new();
    code.emit_load_name(answer);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    let result = runner.run(vec![("answer".to_owned(), Object::Int(42))]).unwrap();
    assert_eq!(result, Object::Int(42));
}

#[test]
fn load_global_skips_function_locals() {
    let mut program = ProgramBuilder::new();
    let x = program.intern("x");
    let g = program.intern("g");

    let mut body = CodeBuilder::new();
    body.emit(Instr::LoadGlobal(x));
    body.emit_return_value();
    let g_id = program.add_function(FunctionDef::new(g, Signature::positional(vec![x]), body.build()));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit_store_name(x); // module locals are the globals
    code.emit_load_const(Const::Code(g_id));
    code.emit_load_const(Const::Str(g));
    code.emit_make_function(false, false);
    code.emit_store_name(g);
    code.emit_load_name(g);
    code.emit_load_const(Const::Int(5));
    code.emit_call_function(1);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::Int(1));
}

#[test]
fn missing_name_faults_with_location() {
    let mut program = ProgramBuilder::new();
    let x = program.intern("x");
    let mut code = CodeBuilder::new();
    code.emit_load_name(x);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    let fault = runner.run(vec![]).unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::NameNotFound("x".to_owned()));
    assert_eq!(fault.instr_index(), 0);
    assert_eq!(fault.frame_depth(), 1);
}

#[test]
fn function_call_binds_and_returns() {
    let mut program = ProgramBuilder::new();
    let (a, b, add) = (program.intern("a"), program.intern("b"), program.intern("add"));

    let mut body = CodeBuilder::new();
    body.emit_load_name(a);
    body.emit_load_name(b);
    body.emit_binary_op(BinaryOp::Add);
    body.emit_return_value();
    let add_id = program.add_function(FunctionDef::new(add, Signature::positional(vec![a, b]), body.build()));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Code(add_id));
    code.emit_load_const(Const::Str(add));
    code.emit_make_function(false, false);
    code.emit_store_name(add);
    code.emit_load_name(add);
    code.emit_load_const(Const::Int(2));
    code.emit_load_const(Const::Int(3));
    code.emit_call_function(2);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    let mut tracer = RecordingTracer::new();
    let result = runner
        .run_with(vec![], ResourceLimits::default(), &mut tracer)
        .unwrap();
    assert_eq!(result, Object::Int(5));

    // One call to depth 2, one return back to depth 1.
    assert!(tracer.events().contains(&TraceEvent::Call {
        function: "add".to_owned(),
        depth: 2
    }));
    assert!(tracer.events().contains(&TraceEvent::Return { depth: 1 }));
}

#[test]
fn closure_captures_locals_snapshot() {
    let mut program = ProgramBuilder::new();
    let x = program.intern("x");
    let g = program.intern("g");
    let inner = program.intern("inner");
    let outer = program.intern("outer");

    // def inner(): return x
    let mut inner_body = CodeBuilder::new();
    inner_body.emit_load_name(x);
    inner_body.emit_return_value();
    let inner_id = program.add_function(FunctionDef::new(inner, Signature::default(), inner_body.build()));

    // def outer(x): g = inner-closure; x = 99; return g
    let mut outer_body = CodeBuilder::new();
    outer_body.emit_load_const(Const::Code(inner_id));
    outer_body.emit_load_const(Const::Str(inner));
    outer_body.emit_make_function(false, false);
    outer_body.emit_store_name(g);
    outer_body.emit_load_const(Const::Int(99));
    outer_body.emit_store_name(x);
    outer_body.emit_load_name(g);
    outer_body.emit_return_value();
    let outer_id = program.add_function(FunctionDef::new(outer, Signature::positional(vec![x]), outer_body.build()));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Code(outer_id));
    code.emit_load_const(Const::Str(outer));
    code.emit_make_function(false, false);
    code.emit_store_name(outer);
    code.emit_load_name(outer);
    code.emit_load_const(Const::Int(7));
    code.emit_call_function(1);
    code.emit_call_function(0);
    code.emit_return_value();

    // The closure sees x as it was when it was created, not the later
    // rebinding in the defining frame.
    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::Int(7));
}

#[test]
fn dict_build_and_destructure_round_trip() {
    let mut program = ProgramBuilder::new();
    let (a, b, d) = (program.intern("a"), program.intern("b"), program.intern("d"));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Str(a));
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Str(b));
    code.emit_load_const(Const::Int(2));
    code.emit(Instr::BuildMap(2));
    code.emit_store_name(d);
    code.emit_load_name(d);
    code.emit_load_const(Const::Str(a));
    code.emit(Instr::BinarySubscr);
    code.emit_load_name(d);
    code.emit_load_const(Const::Str(b));
    code.emit(Instr::BinarySubscr);
    code.emit(Instr::BuildTuple(2));
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(
        runner.run(vec![]).unwrap(),
        Object::Tuple(vec![Object::Int(1), Object::Int(2)])
    );
}

#[test]
fn dict_merge_faults_on_key_collision() {
    let mut program = ProgramBuilder::new();
    let a = program.intern("a");

    let mut code = CodeBuilder::new();
    // target {'a': 1}
    code.emit_load_const(Const::Str(a));
    code.emit_load_const(Const::Int(1));
    code.emit(Instr::BuildMap(1));
    // source {'a': 2}
    code.emit_load_const(Const::Str(a));
    code.emit_load_const(Const::Int(2));
    code.emit(Instr::BuildMap(1));
    code.emit(Instr::DictMerge(1));
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    let fault = runner.run(vec![]).unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::KeyCollision("'a'".to_owned()));
}

#[test]
fn dict_update_replaces_on_collision() {
    let mut program = ProgramBuilder::new();
    let a = program.intern("a");

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Str(a));
    code.emit_load_const(Const::Int(1));
    code.emit(Instr::BuildMap(1));
    code.emit_load_const(Const::Str(a));
    code.emit_load_const(Const::Int(2));
    code.emit(Instr::BuildMap(1));
    code.emit(Instr::DictUpdate(1));
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(
        runner.run(vec![]).unwrap(),
        Object::Dict(vec![(Object::String("a".to_owned()), Object::Int(2))])
    );
}

#[test]
fn for_iter_sums_a_list() {
    let mut program = ProgramBuilder::new();
    let total = program.intern("total");
    let item = program.intern("item");

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(0));
    code.emit_store_name(total);
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Int(2));
    code.emit_load_const(Const::Int(3));
    code.emit(Instr::BuildList(3));
    code.emit(Instr::GetIter);
    let top = code.next_target();
    let end = code.emit_for_iter();
    code.emit_store_name(item);
    code.emit_load_name(total);
    code.emit_load_name(item);
    code.emit_binary_op(BinaryOp::Add);
    code.emit_store_name(total);
    code.emit_jump_to(top);
    code.patch_jump(end);
    code.emit_load_name(total);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::Int(6));
}

#[test]
fn unpack_sequence_order_and_arity() {
    let mut program = ProgramBuilder::new();
    let (a, b) = (program.intern("a"), program.intern("b"));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Int(2));
    code.emit(Instr::BuildTuple(2));
    code.emit(Instr::UnpackSequence(2));
    code.emit_store_name(a);
    code.emit_store_name(b);
    code.emit_load_name(a);
    code.emit_load_name(b);
    code.emit(Instr::BuildTuple(2));
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(
        runner.run(vec![]).unwrap(),
        Object::Tuple(vec![Object::Int(1), Object::Int(2)])
    );

    // Wrong arity faults.
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit(Instr::BuildTuple(1));
    code.emit(Instr::UnpackSequence(2));
    code.emit_return_value();
    let fault = run_module(code).unwrap_err();
    assert!(matches!(fault.kind(), FaultKind::Type(_)));
}

#[test]
fn subscripts_and_slices() {
    // [1, 2, 3, 4][1:3] == [2, 3]
    let mut code = CodeBuilder::new();
    for i in 1..=4 {
        code.emit_load_const(Const::Int(i));
    }
    code.emit(Instr::BuildList(4));
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Int(3));
    code.emit(Instr::BuildSlice(2));
    code.emit(Instr::BinarySubscr);
    code.emit_return_value();
    assert_eq!(
        run_module(code).unwrap(),
        Object::List(vec![Object::Int(2), Object::Int(3)])
    );

    // "hello"[::-1] == "olleh"
    let mut program = ProgramBuilder::new();
    let hello = program.intern("hello");
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Str(hello));
    code.emit_load_const(Const::None);
    code.emit_load_const(Const::None);
    code.emit_load_const(Const::Int(-1));
    code.emit(Instr::BuildSlice(3));
    code.emit(Instr::BinarySubscr);
    code.emit_return_value();
    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::String("olleh".to_owned()));

    // negative index
    let mut code = CodeBuilder::new();
    for i in 1..=3 {
        code.emit_load_const(Const::Int(i));
    }
    code.emit(Instr::BuildList(3));
    code.emit_load_const(Const::Int(-1));
    code.emit(Instr::BinarySubscr);
    code.emit_return_value();
    assert_eq!(run_module(code).unwrap(), Object::Int(3));
}

#[test]
fn store_subscr_mutates_through_aliases() {
    let mut program = ProgramBuilder::new();
    let (a, b) = (program.intern("a"), program.intern("b"));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit(Instr::BuildList(1));
    code.emit_store_name(a);
    code.emit_load_name(a);
    code.emit_store_name(b);
    // b[0] = 99, observed through a
    code.emit_load_name(b);
    code.emit_load_const(Const::Int(0));
    code.emit_load_const(Const::Int(99));
    code.emit(Instr::StoreSubscr);
    code.emit_load_name(a);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::List(vec![Object::Int(99)]));
}

#[test]
fn comparisons_and_incomparable_fault() {
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(2));
    code.emit_load_const(Const::Int(3));
    code.emit_compare_op(CompareOp::Lt);
    code.emit_return_value();
    assert_eq!(run_module(code).unwrap(), Object::Bool(true));

    let mut program = ProgramBuilder::new();
    let s = program.intern("a");
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Str(s));
    code.emit_compare_op(CompareOp::Lt);
    code.emit_return_value();
    let runner = Runner::new(program.finish(code.build()));
    let fault = runner.run(vec![]).unwrap_err();
    assert!(matches!(fault.kind(), FaultKind::Type(_)));
}

#[test]
fn set_algebra_through_operators() {
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Int(2));
    code.emit(Instr::BuildSet(2));
    code.emit_load_const(Const::Int(2));
    code.emit_load_const(Const::Int(3));
    code.emit(Instr::BuildSet(2));
    code.emit_binary_op(BinaryOp::Or);
    code.emit_return_value();
    assert_eq!(
        run_module(code).unwrap(),
        Object::Set(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Int(2));
    code.emit(Instr::BuildSet(2));
    code.emit_load_const(Const::Int(2));
    code.emit(Instr::BuildSet(1));
    code.emit_binary_op(BinaryOp::Sub);
    code.emit_return_value();
    assert_eq!(run_module(code).unwrap(), Object::Set(vec![Object::Int(1)]));
}

#[test]
fn string_formatting() {
    let mut program = ProgramBuilder::new();
    let prefix = program.intern("x=");
    let spec = program.intern(">5");
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Str(prefix));
    code.emit_load_const(Const::Int(42));
    code.emit_load_const(Const::Str(spec));
    code.emit_format_value(None, true);
    code.emit(Instr::BuildString(2));
    code.emit_return_value();
    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::String("x=   42".to_owned()));

    // repr conversion quotes strings
    let mut program = ProgramBuilder::new();
    let hi = program.intern("hi");
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Str(hi));
    code.emit_format_value(Some(Conversion::Repr), false);
    code.emit_return_value();
    let runner = Runner::new(program.finish(code.build()));
    assert_eq!(runner.run(vec![]).unwrap(), Object::String("'hi'".to_owned()));
}

#[test]
fn zero_division_faults() {
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    code.emit_load_const(Const::Int(0));
    code.emit_binary_op(BinaryOp::Div);
    code.emit_return_value();
    let fault = run_module(code).unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::ZeroDivision);
}

#[test]
fn stack_underflow_faults() {
    let mut code = CodeBuilder::new();
    code.emit(Instr::PopTop);
    code.emit_return_value();
    let fault = run_module(code).unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::StackUnderflow);
}

#[test]
fn callee_cannot_pop_into_caller_stack() {
    let mut program = ProgramBuilder::new();
    let f = program.intern("f");

    let mut body = CodeBuilder::new();
    body.emit(Instr::PopTop);
    body.emit_load_const(Const::None);
    body.emit_return_value();
    let f_id = program.add_function(FunctionDef::new(f, Signature::default(), body.build()));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1)); // caller value below the call
    code.emit_load_const(Const::Code(f_id));
    code.emit_load_const(Const::Str(f));
    code.emit_make_function(false, false);
    code.emit_call_function(0);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    let fault = runner.run(vec![]).unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::StackUnderflow);
    assert_eq!(fault.frame_depth(), 2);
}

#[test]
fn running_off_the_end_is_a_contract_violation() {
    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Int(1));
    let fault = run_module(code).unwrap_err();
    assert!(matches!(fault.kind(), FaultKind::Internal(_)));
}

#[test]
fn recursion_limit_faults() {
    let mut program = ProgramBuilder::new();
    let f = program.intern("f");

    let mut body = CodeBuilder::new();
    body.emit(Instr::LoadGlobal(f));
    body.emit_call_function(0);
    body.emit_return_value();
    let f_id = program.add_function(FunctionDef::new(f, Signature::default(), body.build()));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Code(f_id));
    code.emit_load_const(Const::Str(f));
    code.emit_make_function(false, false);
    code.emit_store_name(f);
    code.emit_load_name(f);
    code.emit_call_function(0);
    code.emit_return_value();

    let limits = ResourceLimits {
        max_recursion_depth: 10,
        max_instructions: None,
    };
    let runner = Runner::new(program.finish(code.build()));
    let fault = runner.run_with(vec![], limits, &mut NoopTracer).unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::Recursion(10));
    assert_eq!(fault.frame_depth(), 10);
}

#[test]
fn instruction_budget_stops_infinite_loops() {
    let mut code = CodeBuilder::new();
    code.emit_jump_to(0);
    let program = ProgramBuilder::new().finish(code.build());
    let runner = Runner::new(program);

    let fault = runner
        .run_with(vec![], ResourceLimits::with_budget(100), &mut NoopTracer)
        .unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::InstructionLimit(100));
}

#[test]
fn fault_trace_spans_frames() {
    let mut program = ProgramBuilder::new();
    let f = program.intern("f");
    let missing = program.intern("missing");

    let mut body = CodeBuilder::new();
    body.emit_load_name(missing);
    body.emit_return_value();
    let f_id = program.add_function(FunctionDef::new(f, Signature::default(), body.build()));

    let mut code = CodeBuilder::new();
    code.emit_load_const(Const::Code(f_id));
    code.emit_load_const(Const::Str(f));
    code.emit_make_function(false, false);
    code.emit_call_function(0);
    code.emit_return_value();

    let runner = Runner::new(program.finish(code.build()));
    let fault = runner.run(vec![]).unwrap_err();
    assert_eq!(fault.kind(), &FaultKind::NameNotFound("missing".to_owned()));
    assert_eq!(fault.frame_depth(), 2);
    assert_eq!(fault.trace().len(), 2);
    assert_eq!(fault.trace()[0].function, None);
    assert_eq!(fault.trace()[1].function, Some("f".to_owned()));
}
