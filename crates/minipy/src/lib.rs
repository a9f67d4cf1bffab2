#![doc = include_str!("../../../README.md")]

mod args;
mod bytecode;
mod fault;
mod function;
mod heap;
mod intern;
mod object;
mod resource;
mod run;
mod scope;
mod signature;
mod tracer;
mod types;
mod value;

pub use crate::{
    bytecode::{
        BinaryOp, Code, CodeBuilder, CompareOp, Const, Conversion, FunctionId, Instr, JumpPatch, Program,
        ProgramBuilder, UnaryOp,
    },
    fault::{BindError, BindErrorKind, Fault, FaultKind, RunResult, TraceFrame},
    function::FunctionDef,
    intern::{Interns, StringId},
    object::Object,
    resource::{DEFAULT_MAX_RECURSION_DEPTH, ResourceLimits},
    run::Runner,
    signature::Signature,
    tracer::{NoopTracer, RecordingTracer, StderrTracer, TraceEvent, VmTracer},
};
