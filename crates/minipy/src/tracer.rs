//! VM execution tracing.
//!
//! A trait-based tracing system with zero-cost abstraction: the VM is
//! monomorphized over its tracer, so with [`NoopTracer`] every hook
//! compiles away entirely.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable execution log to stderr |
//! | [`RecordingTracer`] | Full event recording for assertions or post-mortem |

/// Trace event emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instruction was dispatched.
    Instruction {
        /// Instruction index within the frame's code unit.
        ip: usize,
        /// Instruction name.
        op: &'static str,
        /// Operand-stack depth relative to the frame's base, before the
        /// instruction executes.
        stack_depth: usize,
    },
    /// A call pushed a new frame.
    Call {
        /// Callee name.
        function: String,
        /// Call-stack depth after the push.
        depth: usize,
    },
    /// A return popped a frame.
    Return {
        /// Call-stack depth after the pop.
        depth: usize,
    },
    /// A closure was created.
    MakeFunction {
        /// Number of positional default values.
        defaults: usize,
        /// Number of keyword-only default values.
        kw_defaults: usize,
    },
}

/// Hooks into VM execution.
///
/// All methods default to no-ops, so implementations only override the
/// hooks they care about. `on_instruction` is called for every dispatched
/// instruction and should stay lightweight.
pub trait VmTracer {
    /// Called before each instruction dispatch.
    #[inline(always)]
    fn on_instruction(&mut self, _ip: usize, _op: &'static str, _stack_depth: usize, _frame_depth: usize) {}

    /// Called when a call pushes a new frame.
    #[inline(always)]
    fn on_call(&mut self, _function: &str, _depth: usize) {}

    /// Called when a frame returns.
    #[inline(always)]
    fn on_return(&mut self, _depth: usize) {}

    /// Called when `MakeFunction` creates a closure.
    #[inline(always)]
    fn on_make_function(&mut self, _defaults: usize, _kw_defaults: usize) {}
}

/// A tracer that does nothing; the compiler inlines every hook to
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Tracer that prints a human-readable execution log to stderr.
///
/// ```text
/// [    0] LoadConst          stack=0  frames=1
/// [    1] LoadConst          stack=1  frames=1
///   >>> call f               depth=2
///   <<< return               depth=1
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Stop after this many instructions, to bound output on loops.
    limit: Option<usize>,
    count: usize,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops tracing after `limit` instructions.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
        }
    }

    fn stopped(&self) -> bool {
        self.limit.is_some_and(|limit| self.count >= limit)
    }
}

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, ip: usize, op: &'static str, stack_depth: usize, frame_depth: usize) {
        if self.stopped() {
            return;
        }
        self.count += 1;
        eprintln!("[{ip:>5}] {op:<18} stack={stack_depth}  frames={frame_depth}");
    }

    fn on_call(&mut self, function: &str, depth: usize) {
        if !self.stopped() {
            eprintln!("  >>> call {function:<15} depth={depth}");
        }
    }

    fn on_return(&mut self, depth: usize) {
        if !self.stopped() {
            eprintln!("  <<< return              depth={depth}");
        }
    }
}

/// Tracer that records every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in execution order.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer, returning the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl VmTracer for RecordingTracer {
    fn on_instruction(&mut self, ip: usize, op: &'static str, stack_depth: usize, _frame_depth: usize) {
        self.events.push(TraceEvent::Instruction { ip, op, stack_depth });
    }

    fn on_call(&mut self, function: &str, depth: usize) {
        self.events.push(TraceEvent::Call {
            function: function.to_owned(),
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.events.push(TraceEvent::Return { depth });
    }

    fn on_make_function(&mut self, defaults: usize, kw_defaults: usize) {
        self.events.push(TraceEvent::MakeFunction { defaults, kw_defaults });
    }
}
