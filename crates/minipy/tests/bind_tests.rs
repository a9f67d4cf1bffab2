//! Argument-binding semantics observed through calls: every binding
//! failure surfaces as a `FaultKind::Bind` with one of the six stable
//! kinds, and successful binds are observable from the values the
//! callee sees.

use minipy::{
    BindErrorKind, CodeBuilder, Const, Fault, FaultKind, FunctionDef, Instr, Object, ProgramBuilder, Runner,
    Signature, StringId,
};
use pretty_assertions::assert_eq;

/// Extracts the binding-error kind from a fault.
fn bind_kind(fault: &Fault) -> BindErrorKind {
    match fault.kind() {
        FaultKind::Bind(err) => err.kind(),
        other => panic!("expected a binding fault, got {other:?}"),
    }
}

/// Builds a program whose module defines one function and calls it.
///
/// The function body returns a tuple of all its parameters in
/// declaration order, so the bound values are directly observable. The
/// call passes `positional` count of integers `1..` and the given
/// keyword arguments (also small integers, continuing the sequence).
struct CallCase {
    program: ProgramBuilder,
    params: Vec<StringId>,
    signature: Signature,
    defaults: Vec<i64>,
    kw_defaults: Vec<(StringId, i64)>,
}

impl CallCase {
    fn new(
        pos_only: &[&str],
        pos_or_kw: &[&str],
        var_args: Option<&str>,
        kw_only: &[&str],
        var_kwargs: Option<&str>,
    ) -> Self {
        let mut program = ProgramBuilder::new();
        let intern_all = |program: &mut ProgramBuilder, names: &[&str]| -> Vec<StringId> {
            names.iter().map(|n| program.intern(n)).collect()
        };
        let pos_only_ids = intern_all(&mut program, pos_only);
        let pos_or_kw_ids = intern_all(&mut program, pos_or_kw);
        let var_args_id = var_args.map(|n| program.intern(n));
        let kw_only_ids = intern_all(&mut program, kw_only);
        let var_kwargs_id = var_kwargs.map(|n| program.intern(n));

        let mut params = Vec::new();
        params.extend(&pos_only_ids);
        params.extend(&pos_or_kw_ids);
        params.extend(var_args_id);
        params.extend(&kw_only_ids);
        params.extend(var_kwargs_id);

        let signature = Signature::new(pos_only_ids, pos_or_kw_ids, var_args_id, kw_only_ids, var_kwargs_id);
        Self {
            program,
            params,
            signature,
            defaults: Vec::new(),
            kw_defaults: Vec::new(),
        }
    }

    fn with_defaults(mut self, defaults: &[i64]) -> Self {
        self.defaults = defaults.to_vec();
        self
    }

    fn with_kw_defaults(mut self, kw_defaults: &[(&str, i64)]) -> Self {
        self.kw_defaults = kw_defaults
            .iter()
            .map(|(name, value)| (self.program.intern(name), *value))
            .collect();
        self
    }

    /// Calls the function with `positional` ints `1..=n` and the given
    /// keyword ints.
    fn call(mut self, positional: usize, keywords: &[(&str, i64)]) -> Result<Object, Fault> {
        let f = self.program.intern("f");

        let mut body = CodeBuilder::new();
        for &param in &self.params {
            body.emit_load_name(param);
        }
        body.emit(Instr::BuildTuple(self.params.len()));
        body.emit_return_value();
        let f_id = self
            .program
            .add_function(FunctionDef::new(f, self.signature.clone(), body.build()));

        let mut code = CodeBuilder::new();
        let has_defaults = !self.defaults.is_empty();
        if has_defaults {
            for &value in &self.defaults {
                code.emit_load_const(Const::Int(value));
            }
            code.emit(Instr::BuildTuple(self.defaults.len()));
        }
        let has_kw_defaults = !self.kw_defaults.is_empty();
        if has_kw_defaults {
            for &(name, value) in &self.kw_defaults {
                code.emit_load_const(Const::Str(name));
                code.emit_load_const(Const::Int(value));
            }
            code.emit(Instr::BuildMap(self.kw_defaults.len()));
        }
        code.emit_load_const(Const::Code(f_id));
        code.emit_load_const(Const::Str(f));
        code.emit_make_function(has_defaults, has_kw_defaults);

        for i in 0..positional {
            code.emit_load_const(Const::Int(i as i64 + 1));
        }
        if keywords.is_empty() {
            code.emit_call_function(positional);
        } else {
            let mut kw_names = Vec::new();
            for &(name, value) in keywords {
                kw_names.push(self.program.intern(name));
                code.emit_load_const(Const::Int(value));
            }
            code.emit_call_function_kw(positional, kw_names);
        }
        code.emit_return_value();

        Runner::new(self.program.finish(code.build())).run(vec![])
    }
}

#[test]
fn exact_arity_binds() {
    let result = CallCase::new(&[], &["a", "b"], None, &[], None).call(2, &[]);
    assert_eq!(result.unwrap(), Object::Tuple(vec![Object::Int(1), Object::Int(2)]));
}

#[test]
fn excess_positional_is_too_many_positional() {
    let fault = CallCase::new(&[], &["a", "b"], None, &[], None)
        .call(3, &[])
        .unwrap_err();
    assert_eq!(bind_kind(&fault), BindErrorKind::TooManyPositionalArguments);
}

#[test]
fn missing_positional_is_reported() {
    let fault = CallCase::new(&[], &["a", "b"], None, &[], None)
        .call(1, &[])
        .unwrap_err();
    assert_eq!(bind_kind(&fault), BindErrorKind::MissingPositionalArguments);
}

#[test]
fn unexpected_keyword_is_too_many_keyword() {
    let fault = CallCase::new(&[], &["a"], None, &[], None)
        .call(1, &[("z", 9)])
        .unwrap_err();
    assert_eq!(bind_kind(&fault), BindErrorKind::TooManyKeywordArguments);
}

#[test]
fn positional_and_keyword_for_same_name() {
    let fault = CallCase::new(&[], &["a", "b"], None, &[], None)
        .call(1, &[("a", 9)])
        .unwrap_err();
    assert_eq!(bind_kind(&fault), BindErrorKind::MultipleValuesForArgument);
}

#[test]
fn missing_keyword_only_is_reported() {
    let fault = CallCase::new(&[], &["a"], None, &["c"], None).call(1, &[]).unwrap_err();
    assert_eq!(bind_kind(&fault), BindErrorKind::MissingKeywordOnlyArguments);
}

#[test]
fn keyword_only_cannot_be_passed_positionally() {
    // def f(a, *, c): f(1, 2) has one positional slot too few.
    let fault = CallCase::new(&[], &["a"], None, &["c"], None).call(2, &[]).unwrap_err();
    assert_eq!(bind_kind(&fault), BindErrorKind::TooManyPositionalArguments);
}

#[test]
fn defaults_fill_right_to_left() {
    // def f(a, b=10, c=20): f(1) binds {a: 1, b: 10, c: 20}
    let result = CallCase::new(&[], &["a", "b", "c"], None, &[], None)
        .with_defaults(&[10, 20])
        .call(1, &[]);
    assert_eq!(
        result.unwrap(),
        Object::Tuple(vec![Object::Int(1), Object::Int(10), Object::Int(20)])
    );
}

#[test]
fn positional_only_passed_as_keyword_faults() {
    // def f(a, /, b): f(a=1, b=2)
    let fault = CallCase::new(&["a"], &["b"], None, &[], None)
        .call(0, &[("a", 1), ("b", 2)])
        .unwrap_err();
    assert_eq!(bind_kind(&fault), BindErrorKind::PositionalOnlyPassedAsKeyword);
}

#[test]
fn positional_only_name_goes_to_var_kwargs_when_declared() {
    // def f(a, /, **kw): f(1, a=9) puts a=9 into kw.
    let result = CallCase::new(&["a"], &[], None, &[], Some("kw")).call(1, &[("a", 9)]);
    assert_eq!(
        result.unwrap(),
        Object::Tuple(vec![
            Object::Int(1),
            Object::Dict(vec![(Object::String("a".to_owned()), Object::Int(9))]),
        ])
    );
}

#[test]
fn full_calling_convention_scenario() {
    // def f(a, b=2, *args, c, d=4, **kw): f(1, c=3, e=5)
    // binds {a: 1, b: 2, args: (), c: 3, d: 4, kw: {e: 5}}
    let result = CallCase::new(&[], &["a", "b"], Some("args"), &["c", "d"], Some("kw"))
        .with_defaults(&[2])
        .with_kw_defaults(&[("d", 4)])
        .call(1, &[("c", 3), ("e", 5)]);
    assert_eq!(
        result.unwrap(),
        Object::Tuple(vec![
            Object::Int(1),
            Object::Int(2),
            Object::Tuple(vec![]),
            Object::Int(3),
            Object::Int(4),
            Object::Dict(vec![(Object::String("e".to_owned()), Object::Int(5))]),
        ])
    );
}

#[test]
fn excess_positional_flows_into_var_args() {
    // def f(a, *rest): f(1, 2, 3)
    let result = CallCase::new(&[], &["a"], Some("rest"), &[], None).call(3, &[]);
    assert_eq!(
        result.unwrap(),
        Object::Tuple(vec![
            Object::Int(1),
            Object::Tuple(vec![Object::Int(2), Object::Int(3)]),
        ])
    );
}

#[test]
fn variadic_slots_are_present_when_unused() {
    // def f(*args, **kw): f()
    let result = CallCase::new(&[], &[], Some("args"), &[], Some("kw")).call(0, &[]);
    assert_eq!(
        result.unwrap(),
        Object::Tuple(vec![Object::Tuple(vec![]), Object::Dict(vec![])])
    );
}

#[test]
fn keyword_binds_positional_or_keyword_parameter() {
    // def f(a, b): f(1, b=2)
    let result = CallCase::new(&[], &["a", "b"], None, &[], None).call(1, &[("b", 2)]);
    assert_eq!(result.unwrap(), Object::Tuple(vec![Object::Int(1), Object::Int(2)]));
}

#[test]
fn bind_fault_reports_call_site() {
    let fault = CallCase::new(&[], &["a"], None, &[], None).call(0, &[]).unwrap_err();
    // The fault is raised by the call instruction in the module frame.
    assert_eq!(fault.frame_depth(), 1);
    assert_eq!(bind_kind(&fault), BindErrorKind::MissingPositionalArguments);
    let rendered = fault.to_string();
    assert!(rendered.contains("f() missing 1 required positional argument: 'a'"), "{rendered}");
}
