//! The dispatch loop
//!
//! Guest calls do not recurse on the host stack: entering a guest function
//! pushes a [`CallFrame`] and switches the loop to the callee's body, and
//! returning pops it and resumes the caller after its call instruction. The
//! frame stack is therefore bounded only by the configured ceiling.

use super::frame::{Activation, CallFrame};
use super::host::HostFunction;
use super::instruction::{Instruction, Jump};
use super::listener::FunctionListener;
use super::module_engine::{Callable, Function};
use super::ops::{bitwise, comparison, conversion, memory, numeric, parametric};
use super::stack::Stack;
use super::{CallContext, MemoryInstance, Trap};
use std::sync::Arc;

/// What the loop does after an instruction
enum Flow {
    Next,
    Jump(usize),
    Call(Arc<Function>),
}

/// Execution state of one invocation; never shared between invocations
pub(crate) struct CallEngine {
    stack: Stack,
    frames: Vec<CallFrame>,
    listeners: Arc<[Arc<dyn FunctionListener>]>,
    ceiling: usize,
}

impl CallEngine {
    /// `ceiling` is the maximum number of frames, guest and host, active at once
    pub fn new(listeners: Arc<[Arc<dyn FunctionListener>]>, ceiling: usize) -> Self {
        CallEngine {
            stack: Stack::new(),
            frames: Vec::new(),
            listeners,
            ceiling,
        }
    }

    /// Frames still active, outermost first
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Invoke `function` with `params` and return its results
    ///
    /// On a trap the frames that were active stay in [`frames`](Self::frames)
    /// so the caller can build a backtrace.
    pub fn call(&mut self, ctx: &CallContext, function: &Arc<Function>, params: &[u64]) -> Result<Vec<u64>, Trap> {
        match &function.callable {
            Callable::Host(host) => self.call_host(ctx, function, host.as_ref(), params),
            Callable::Wasm(_) => {
                self.stack.push_all(params.iter().copied());
                let activation = self.enter_guest(function)?;
                self.execute(ctx, activation)?;
                self.stack.pop_n(function.source.ty.results.len())
            }
        }
    }

    fn before(&self, function: &Function) {
        for listener in self.listeners.iter() {
            listener.before(&function.source.debug_name, &function.source.ty);
        }
    }

    fn after(&self, function: &Function) {
        for listener in self.listeners.iter().rev() {
            listener.after(&function.source.debug_name, &function.source.ty);
        }
    }

    fn check_ceiling(&self) -> Result<(), Trap> {
        if self.frames.len() >= self.ceiling {
            return Err(Trap::StackOverflow);
        }
        Ok(())
    }

    /// Push a frame for a guest function; its parameters are already on the stack
    fn enter_guest(&mut self, function: &Arc<Function>) -> Result<Activation, Trap> {
        self.check_ceiling()?;
        let Callable::Wasm(body) = &function.callable else {
            return Err(Trap::InvalidIndex {
                space: "function",
                index: function.source.index,
            });
        };
        let module = function.source.module().ok_or(Trap::ModuleClosed)?;
        let engine = module.engine().cloned().ok_or(Trap::ModuleClosed)?;
        let activation = Activation {
            body: Arc::clone(body),
            module,
            engine,
        };
        self.before(function);
        self.frames.push(CallFrame::guest(Arc::clone(function), activation.clone()));
        Ok(activation)
    }

    /// Run a host function with a frame of its own, so it shows in backtraces
    /// and counts toward the ceiling
    ///
    /// The host must return exactly as many values as its type declares. On
    /// any failure the host frame stays on the stack for the backtrace.
    fn call_host(
        &mut self,
        ctx: &CallContext,
        function: &Arc<Function>,
        host: &dyn HostFunction,
        params: &[u64],
    ) -> Result<Vec<u64>, Trap> {
        self.check_ceiling()?;
        self.before(function);
        self.frames.push(CallFrame::host(Arc::clone(function)));
        let results = host.call(ctx, params)?;
        let expected = function.source.ty.results.len();
        if results.len() != expected {
            return Err(Trap::HostResultCount {
                expected,
                actual: results.len(),
            });
        }
        self.frames.pop();
        self.after(function);
        Ok(results)
    }

    /// Bridge a host call made from guest code: parameters come off the
    /// operand stack and results go back on it
    fn call_host_from_stack(
        &mut self,
        ctx: &CallContext,
        caller: &Activation,
        function: &Arc<Function>,
        host: &dyn HostFunction,
    ) -> Result<(), Trap> {
        let params = self.stack.pop_n(function.source.ty.params.len())?;
        let ctx = ctx.with_memory(caller.module.memory().cloned());
        let results = self.call_host(&ctx, function, host, &params)?;
        self.stack.push_all(results);
        Ok(())
    }

    /// Drop the values a branch discards, then go to its target
    fn jump(&mut self, jump: &Jump) -> Result<Flow, Trap> {
        self.stack.drop_range(jump.drop)?;
        Ok(Flow::Jump(jump.address))
    }

    /// Resolve a `call_indirect` target from the table, checking the callee's type
    fn call_indirect(&mut self, activation: &Activation, type_index: u32, table_index: u32) -> Result<Flow, Trap> {
        let offset = self.stack.pop_u32()?;
        let table = match activation.module.table() {
            Some(table) if table_index == 0 => table,
            _ => return Err(Trap::InvalidTableAccess),
        };
        let target = table.get(offset)?;
        let expected = activation.module.type_id(type_index).ok_or(Trap::InvalidIndex {
            space: "type",
            index: type_index,
        })?;
        if target.source.type_id != expected {
            return Err(Trap::IndirectCallTypeMismatch);
        }
        Ok(Flow::Call(target))
    }

    /// Execute until the frame that `activation` belongs to returns
    fn execute(&mut self, ctx: &CallContext, mut activation: Activation) -> Result<(), Trap> {
        let base = self.frames.len().saturating_sub(1);
        let mut pc = 0usize;

        loop {
            let Some(instruction) = activation.body.get(pc) else {
                // fell off the end, or branched to the return address
                if let Some(frame) = self.frames.pop() {
                    self.after(&frame.function);
                }
                if self.frames.len() <= base {
                    return Ok(());
                }
                let caller = self.frames.last().and_then(|f| f.activation.as_ref().map(|a| (f.pc, a.clone())));
                let Some((saved_pc, caller)) = caller else {
                    return Err(Trap::StackUnderflow);
                };
                activation = caller;
                pc = saved_pc + 1;
                continue;
            };

            match self.step(&activation, instruction)? {
                Flow::Next => pc += 1,
                Flow::Jump(address) => pc = address,
                Flow::Call(callee) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.pc = pc;
                    }
                    match &callee.callable {
                        Callable::Host(host) => {
                            self.call_host_from_stack(ctx, &activation, &callee, host.as_ref())?;
                            pc += 1;
                        }
                        Callable::Wasm(_) => {
                            activation = self.enter_guest(&callee)?;
                            pc = 0;
                        }
                    }
                }
            }
        }
    }

    /// Execute one instruction
    fn step(&mut self, activation: &Activation, instruction: &Instruction) -> Result<Flow, Trap> {
        use Instruction as I;

        let stack = &mut self.stack;
        match instruction {
            I::Unreachable => return Err(Trap::Unreachable),
            I::Br { address } => return Ok(Flow::Jump(*address)),
            I::BrIf { then, else_ } => {
                let c = stack.pop_u32()?;
                return self.jump(if c != 0 { then } else { else_ });
            }
            I::BrTable { default, targets } => {
                let index = stack.pop_u32()? as usize;
                return self.jump(targets.get(index).unwrap_or(default));
            }
            I::Call { function_index } => {
                let callee = activation.engine.function(*function_index).ok_or(Trap::InvalidIndex {
                    space: "function",
                    index: *function_index,
                })?;
                return Ok(Flow::Call(Arc::clone(callee)));
            }
            I::CallIndirect { type_index, table_index } => {
                return self.call_indirect(activation, *type_index, *table_index);
            }
            I::Drop { range } => parametric::drop(stack, *range)?,
            I::Select => parametric::select(stack)?,
            I::Pick { depth } => stack.pick(*depth)?,
            I::Swap { depth } => stack.swap(*depth)?,
            I::GlobalGet { index } => {
                let global = activation.module.global(*index).ok_or(Trap::InvalidIndex {
                    space: "global",
                    index: *index,
                })?;
                stack.push(global.get());
            }
            I::GlobalSet { index } => {
                let global = activation.module.global(*index).ok_or(Trap::InvalidIndex {
                    space: "global",
                    index: *index,
                })?;
                global.set(stack.pop()?);
            }

            I::Load { ty, arg } => memory::load(stack, memory_of(activation)?, *ty, *arg)?,
            I::Load8 { ty, arg } => memory::load8(stack, memory_of(activation)?, *ty, *arg)?,
            I::Load16 { ty, arg } => memory::load16(stack, memory_of(activation)?, *ty, *arg)?,
            I::Load32 { signed, arg } => memory::load32(stack, memory_of(activation)?, *signed, *arg)?,
            I::Store { ty, arg } => memory::store(stack, memory_of(activation)?, *ty, *arg)?,
            I::Store8 { arg } => memory::store8(stack, memory_of(activation)?, *arg)?,
            I::Store16 { arg } => memory::store16(stack, memory_of(activation)?, *arg)?,
            I::Store32 { arg } => memory::store32(stack, memory_of(activation)?, *arg)?,
            I::MemorySize => memory::size(stack, memory_of(activation)?)?,
            I::MemoryGrow => memory::grow(stack, memory_of(activation)?)?,
            I::MemoryAtomicWait { ty, arg } => memory::atomic_wait(stack, memory_of(activation)?, *ty, *arg)?,
            I::MemoryAtomicNotify { arg } => memory::atomic_notify(stack, memory_of(activation)?, *arg)?,

            I::Const(bits) => stack.push(*bits),

            I::Eq(t) => comparison::eq(stack, *t)?,
            I::Ne(t) => comparison::ne(stack, *t)?,
            I::Eqz(t) => comparison::eqz(stack, *t)?,
            I::Lt(t) => comparison::lt(stack, *t)?,
            I::Gt(t) => comparison::gt(stack, *t)?,
            I::Le(t) => comparison::le(stack, *t)?,
            I::Ge(t) => comparison::ge(stack, *t)?,

            I::Add(t) => numeric::add(stack, *t)?,
            I::Sub(t) => numeric::sub(stack, *t)?,
            I::Mul(t) => numeric::mul(stack, *t)?,
            I::Clz(t) => numeric::clz(stack, *t)?,
            I::Ctz(t) => numeric::ctz(stack, *t)?,
            I::Popcnt(t) => numeric::popcnt(stack, *t)?,
            I::Div(t) => numeric::div(stack, *t)?,
            I::Rem(t) => numeric::rem(stack, *t)?,
            I::And(t) => bitwise::and(stack, *t)?,
            I::Or(t) => bitwise::or(stack, *t)?,
            I::Xor(t) => bitwise::xor(stack, *t)?,
            I::Shl(t) => bitwise::shl(stack, *t)?,
            I::Shr(t) => bitwise::shr(stack, *t)?,
            I::Rotl(t) => bitwise::rotl(stack, *t)?,
            I::Rotr(t) => bitwise::rotr(stack, *t)?,

            I::Abs(t) => numeric::abs(stack, *t)?,
            I::Neg(t) => numeric::neg(stack, *t)?,
            I::Ceil(t) => numeric::ceil(stack, *t)?,
            I::Floor(t) => numeric::floor(stack, *t)?,
            I::Trunc(t) => numeric::trunc(stack, *t)?,
            I::Nearest(t) => numeric::nearest(stack, *t)?,
            I::Sqrt(t) => numeric::sqrt(stack, *t)?,
            I::Min(t) => numeric::min(stack, *t)?,
            I::Max(t) => numeric::max(stack, *t)?,
            I::Copysign(t) => numeric::copysign(stack, *t)?,

            I::I32WrapFromI64 => conversion::i32_wrap_i64(stack)?,
            I::ITruncFromF { input, output } => conversion::trunc_from_float(stack, *input, *output)?,
            I::FConvertFromI { input, output } => conversion::convert_from_int(stack, *input, *output)?,
            I::F32DemoteFromF64 => conversion::f32_demote_f64(stack)?,
            I::F64PromoteFromF32 => conversion::f64_promote_f32(stack)?,
            I::Extend { signed } => conversion::i64_extend_i32(stack, *signed)?,
            I::SignExtend32From8 => conversion::i32_extend8_s(stack)?,
            I::SignExtend32From16 => conversion::i32_extend16_s(stack)?,
            I::SignExtend64From8 => conversion::i64_extend8_s(stack)?,
            I::SignExtend64From16 => conversion::i64_extend16_s(stack)?,
            I::SignExtend64From32 => conversion::i64_extend32_s(stack)?,
        }
        Ok(Flow::Next)
    }
}

/// A module without memory behaves as a memory of size zero
fn memory_of(activation: &Activation) -> Result<&MemoryInstance, Trap> {
    activation
        .module
        .memory()
        .map(Arc::as_ref)
        .ok_or(Trap::OutOfBoundsMemoryAccess)
}
