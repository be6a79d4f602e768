//! The execution entry point, call dispatch, and the reference interpreter
//! used for guest functions that have no compiled code attached.

use {
    super::{
        error::{Result, RuntimeErrorKind, TrapKind},
        instance::{
            addr::{self, Address},
            FunctionInstance, GuestFunction,
        },
        store::Store,
        values::Value,
    },
    crate::{
        impl_bug,
        log_tag::Tag,
        syntax::{
            types::ValueType, BlockType, Conversion, FloatOp, Instruction, IntOp, MemArg,
        },
    },
    std::rc::Rc,
};

/// Invoke the function at `addr` with `args`, writing its results into `ret`.
///
/// The address, the argument count and types, and the length of `ret` are all
/// checked before any guest instruction runs. `ret` is written only if the
/// call succeeds; after a trap the store is ready for the next call.
pub fn execute(
    store: &mut Store,
    addr: Address<addr::Function>,
    args: &[Value],
    ret: &mut [Value],
) -> Result<()> {
    let func = store.func(addr)?;
    func.validate_args(args)?;
    let expected = func.functype().result.len();
    if ret.len() != expected {
        Err(RuntimeErrorKind::ResultCount {
            expected,
            got: ret.len(),
        })?;
    }
    let results = store.call_function(addr, &func, args)?;
    ret.copy_from_slice(&results);
    Ok(())
}

impl Store {
    /// Invoke the function at `addr`, returning its results.
    pub fn invoke(&mut self, addr: Address<addr::Function>, args: &[Value]) -> Result<Vec<Value>> {
        let func = self.func(addr)?;
        func.validate_args(args)?;
        self.call_function(addr, &func, args)
    }

    /// Invoke the function bound to `(module_name, name)` in the namespace.
    pub fn call(&mut self, module_name: &str, name: &str, args: &[Value]) -> Result<Vec<Value>> {
        let addr = self.resolve_func(module_name, name)?;
        self.invoke(addr, args)
            .map_err(|e| e.with_context(format!("calling \"{module_name}\" \"{name}\"")))
    }

    /// Run a function whose arguments are already known to match its type.
    pub(crate) fn call_function(
        &mut self,
        addr: Address<addr::Function>,
        func: &FunctionInstance,
        args: &[Value],
    ) -> Result<Vec<Value>> {
        self.enter_call()?;
        self.log(Tag::Call, || {
            format!("CALL {addr:?} {} DEPTH {}", func.functype(), self.call_depth())
        });
        let result = self.dispatch(func, args);
        self.leave_call();
        match result {
            Ok(results) => {
                func.validate_results(&results)?;
                Ok(results)
            }
            Err(e) => {
                if let Some(trap) = e.as_trap_error() {
                    self.log(Tag::Trap, || format!("TRAP IN {addr:?}: {trap}"));
                }
                Err(e)
            }
        }
    }

    fn dispatch(&mut self, func: &FunctionInstance, args: &[Value]) -> Result<Vec<Value>> {
        match func {
            FunctionInstance::Host(host) => {
                self.log(Tag::Host, || format!("HOST {} ARGS {args:?}", host.functype));
                (host.callback)(self, args)
            }
            FunctionInstance::Guest(guest) => match guest.compiled() {
                Some(code) => code.call(self, guest.module, args),
                None => Interpreter::new(self).run(guest, args),
            },
        }
    }
}

/// A structured block in progress.
struct Label {
    body:   Rc<[Instruction]>,
    pc:     usize,
    /// A branch to a loop restarts it instead of leaving it.
    looped: bool,
    /// The number of values a branch to this label carries.
    arity:  usize,
    height: usize,
}

/// A guest function activation.
struct Frame {
    module: Address<addr::Module>,
    arity:  usize,
    locals: Vec<Value>,
    /// Value stack height below the activation.
    height: usize,
    /// Position of the function body's label on the label stack.
    labels: usize,
}

/// The reference interpreter for guest functions.
///
/// Labels and guest-to-guest calls live on explicit stacks, so deep nesting
/// costs heap rather than native stack. Only calls out to host functions or
/// compiled code recurse through [Store::call_function]. Every index is
/// resolved through the module instance of the frame on top.
struct Interpreter<'s> {
    store:  &'s mut Store,
    frames: Vec<Frame>,
    labels: Vec<Label>,
    stack:  Vec<Value>,
}

macro_rules! int_ops {
    ( $name:ident, $uty:ty, $sty:ty, $wrap:path ) => {
        fn $name(op: IntOp, a: $uty, b: $uty) -> Result<Value> {
            let test = |c: bool| Value::I32(c as u32);
            let (sa, sb) = (a as $sty, b as $sty);
            Ok(match op {
                IntOp::Add => $wrap(a.wrapping_add(b)),
                IntOp::Sub => $wrap(a.wrapping_sub(b)),
                IntOp::Mul => $wrap(a.wrapping_mul(b)),
                IntOp::DivS => {
                    if b == 0 {
                        Err(TrapKind::IntegerDivideByZero)?
                    }
                    $wrap(sa.checked_div(sb).ok_or(TrapKind::IntegerOverflow)? as $uty)
                }
                IntOp::DivU => $wrap(a.checked_div(b).ok_or(TrapKind::IntegerDivideByZero)?),
                IntOp::RemS => {
                    if b == 0 {
                        Err(TrapKind::IntegerDivideByZero)?
                    }
                    $wrap(sa.wrapping_rem(sb) as $uty)
                }
                IntOp::RemU => $wrap(a.checked_rem(b).ok_or(TrapKind::IntegerDivideByZero)?),
                IntOp::And => $wrap(a & b),
                IntOp::Or => $wrap(a | b),
                IntOp::Xor => $wrap(a ^ b),
                IntOp::Shl => $wrap(a.wrapping_shl(b as u32)),
                IntOp::ShrS => $wrap(sa.wrapping_shr(b as u32) as $uty),
                IntOp::ShrU => $wrap(a.wrapping_shr(b as u32)),
                IntOp::Eq => test(a == b),
                IntOp::Ne => test(a != b),
                IntOp::LtS => test(sa < sb),
                IntOp::LtU => test(a < b),
                IntOp::GtS => test(sa > sb),
                IntOp::GtU => test(a > b),
                IntOp::LeS => test(sa <= sb),
                IntOp::LeU => test(a <= b),
                IntOp::GeS => test(sa >= sb),
                IntOp::GeU => test(a >= b),
            })
        }
    };
}

int_ops! { i32_op, u32, i32, Value::I32 }
int_ops! { i64_op, u64, i64, Value::I64 }

macro_rules! float_ops {
    ( $name:ident, $fty:ty, $wrap:path ) => {
        fn $name(op: FloatOp, a: $fty, b: $fty) -> Value {
            let test = |c: bool| Value::I32(c as u32);
            match op {
                FloatOp::Add => $wrap(a + b),
                FloatOp::Sub => $wrap(a - b),
                FloatOp::Mul => $wrap(a * b),
                FloatOp::Div => $wrap(a / b),
                // NaN-propagating, and -0 orders below +0.
                FloatOp::Min => $wrap(if a.is_nan() || b.is_nan() {
                    a + b
                } else if a == b {
                    if a.is_sign_negative() { a } else { b }
                } else {
                    a.min(b)
                }),
                FloatOp::Max => $wrap(if a.is_nan() || b.is_nan() {
                    a + b
                } else if a == b {
                    if a.is_sign_positive() { a } else { b }
                } else {
                    a.max(b)
                }),
                FloatOp::Eq => test(a == b),
                FloatOp::Ne => test(a != b),
                FloatOp::Lt => test(a < b),
                FloatOp::Gt => test(a > b),
                FloatOp::Le => test(a <= b),
                FloatOp::Ge => test(a >= b),
            }
        }
    };
}

float_ops! { f32_op, f32, Value::F32 }
float_ops! { f64_op, f64, Value::F64 }

/// Truncate toward zero into an i32, trapping on NaN and out-of-range input.
/// Every f32 is exactly representable as an f64.
fn trunc_i32(f: f64) -> Result<u32> {
    if f.is_nan() {
        Err(TrapKind::InvalidConversionToInteger)?;
    }
    let t = f.trunc();
    if !(-2147483648.0..2147483648.0).contains(&t) {
        Err(TrapKind::IntegerOverflow)?;
    }
    Ok(t as i32 as u32)
}

fn convert(conv: Conversion, v: Value) -> Result<Value> {
    Ok(match (conv, v) {
        (Conversion::I32WrapI64, Value::I64(x)) => Value::I32(x as u32),
        (Conversion::I64ExtendI32S, Value::I32(x)) => Value::I64(x as i32 as i64 as u64),
        (Conversion::I64ExtendI32U, Value::I32(x)) => Value::I64(x as u64),
        (Conversion::I32TruncF32S, Value::F32(x)) => Value::I32(trunc_i32(x as f64)?),
        (Conversion::I32TruncF64S, Value::F64(x)) => Value::I32(trunc_i32(x)?),
        (Conversion::F64ConvertI32S, Value::I32(x)) => Value::F64(x as i32 as f64),
        (Conversion::F32DemoteF64, Value::F64(x)) => Value::F32(x as f32),
        (Conversion::F64PromoteF32, Value::F32(x)) => Value::F64(x as f64),
        (Conversion::I32ReinterpretF32, Value::F32(x)) => Value::I32(x.to_bits()),
        (Conversion::I64ReinterpretF64, Value::F64(x)) => Value::I64(x.to_bits()),
        (Conversion::F32ReinterpretI32, Value::I32(x)) => Value::F32(f32::from_bits(x)),
        (Conversion::F64ReinterpretI64, Value::I64(x)) => Value::F64(f64::from_bits(x)),
        (conv, v) => Err(RuntimeErrorKind::ValueType {
            expected: conv.input(),
            got:      v.valtype(),
        })?,
    })
}

impl<'s> Interpreter<'s> {
    fn new(store: &'s mut Store) -> Self {
        Interpreter {
            store,
            frames: Vec::new(),
            labels: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Run `func` to completion. The caller has already counted this call
    /// against the store's call depth.
    fn run(mut self, func: &GuestFunction, args: &[Value]) -> Result<Vec<Value>> {
        self.push_frame(func, args.to_vec())?;
        let result = self.run_frames();
        // Frames abandoned by a trap still hold call depth.
        for _ in 1..self.frames.len() {
            self.store.leave_call();
        }
        result?;
        Ok(self.stack)
    }

    fn run_frames(&mut self) -> Result<()> {
        while let Some(label) = self.labels.last_mut() {
            if label.pc < label.body.len() {
                let body = label.body.clone();
                let pc = label.pc;
                label.pc += 1;
                self.exec(&body[pc])?;
            } else {
                self.end_label()?;
            }
        }
        Ok(())
    }

    fn push_frame(&mut self, func: &GuestFunction, mut locals: Vec<Value>) -> Result<()> {
        let count = func.local_count().ok_or_else(|| {
            RuntimeErrorKind::AllocationFailure("local count overflows usize".to_owned())
        })?;
        locals
            .try_reserve_exact(count)
            .map_err(|e| RuntimeErrorKind::AllocationFailure(format!("{count} locals: {e}")))?;
        locals.extend(func.local_defaults());

        let arity = func.functype.result.len();
        let height = self.stack.len();
        self.frames.push(Frame {
            module: func.module,
            arity,
            locals,
            height,
            labels: self.labels.len(),
        });
        self.labels.push(Label {
            body: func.body.clone(),
            pc: 0,
            looped: false,
            arity,
            height,
        });
        Ok(())
    }

    fn frame(&self) -> Result<&Frame> {
        Ok(self
            .frames
            .last()
            .ok_or_else(|| impl_bug!("no active frame"))?)
    }

    fn module(&self) -> Result<Address<addr::Module>> {
        Ok(self.frame()?.module)
    }

    /// Pop the top frame, leaving its results on the caller's stack.
    fn return_from_frame(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| impl_bug!("return with no active frame"))?;
        self.unwind(frame.height, frame.arity)?;
        self.labels.truncate(frame.labels);
        // The outermost frame was counted by the caller of `run`.
        if !self.frames.is_empty() {
            self.store.leave_call();
        }
        Ok(())
    }

    /// Control fell off the end of the innermost label.
    fn end_label(&mut self) -> Result<()> {
        if self.labels.len() == self.frame()?.labels + 1 {
            self.return_from_frame()
        } else {
            self.labels.pop();
            Ok(())
        }
    }

    fn enter(&mut self, bt: BlockType, body: &Rc<[Instruction]>, looped: bool) {
        self.labels.push(Label {
            body: body.clone(),
            pc: 0,
            looped,
            arity: if looped { 0 } else { bt.arity() },
            height: self.stack.len(),
        });
    }

    fn branch(&mut self, depth: u32) -> Result<()> {
        let base = self.frame()?.labels;
        let target = self
            .labels
            .len()
            .checked_sub(1)
            .and_then(|top| top.checked_sub(depth as usize))
            .filter(|t| *t >= base)
            .ok_or_else(|| impl_bug!("branch to label {} outside its function", depth))?;
        // The body's own label is the return target.
        if target == base {
            return self.return_from_frame();
        }
        let Label {
            looped,
            arity,
            height,
            ..
        } = self.labels[target];
        if looped {
            self.unwind(height, 0)?;
            self.labels.truncate(target + 1);
            if let Some(label) = self.labels.last_mut() {
                label.pc = 0;
            }
        } else {
            self.unwind(height, arity)?;
            self.labels.truncate(target);
        }
        Ok(())
    }

    fn push(&mut self, v: impl Into<Value>) {
        self.stack.push(v.into())
    }

    fn pop(&mut self) -> Result<Value> {
        Ok(self.stack.pop().ok_or_else(|| impl_bug!("value stack underflow"))?)
    }

    fn pop_as<T>(&mut self) -> Result<T>
    where
        T: TryFrom<Value, Error = super::error::RuntimeError>,
    {
        T::try_from(self.pop()?)
    }

    /// Discard everything above `height` except the top `arity` values.
    fn unwind(&mut self, height: usize, arity: usize) -> Result<()> {
        let top = self
            .stack
            .len()
            .checked_sub(arity)
            .filter(|top| *top >= height)
            .ok_or_else(|| impl_bug!("branch past the bottom of its block"))?;
        self.stack.drain(height..top);
        Ok(())
    }

    fn local(&mut self, idx: u32) -> Result<&mut Value> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| impl_bug!("no active frame"))?;
        Ok(frame
            .locals
            .get_mut(idx as usize)
            .ok_or(RuntimeErrorKind::IndexOutOfRange("local", idx))?)
    }

    fn set_local(&mut self, idx: u32, val: Value) -> Result<()> {
        let slot = self.local(idx)?;
        if slot.valtype() != val.valtype() {
            Err(RuntimeErrorKind::ValueType {
                expected: slot.valtype(),
                got:      val.valtype(),
            })?;
        }
        *slot = val;
        Ok(())
    }

    fn memory(&self) -> Result<Address<addr::Memory>> {
        self.store.module(self.module()?)?.mem(0)
    }

    fn effective_address(&mut self, memarg: MemArg) -> Result<u64> {
        let base: u32 = self.pop_as()?;
        Ok(base as u64 + memarg.offset as u64)
    }

    fn load(&mut self, vt: ValueType, memarg: MemArg) -> Result<Value> {
        let ea = self.effective_address(memarg)?;
        let mem = self.store.mem(self.memory()?)?;
        Ok(match vt {
            ValueType::I32 => Value::I32(u32::from_le_bytes(mem.load(ea)?)),
            ValueType::I64 => Value::I64(u64::from_le_bytes(mem.load(ea)?)),
            ValueType::F32 => Value::F32(f32::from_le_bytes(mem.load(ea)?)),
            ValueType::F64 => Value::F64(f64::from_le_bytes(mem.load(ea)?)),
        })
    }

    fn store_value(&mut self, vt: ValueType, memarg: MemArg) -> Result<()> {
        let val = self.pop()?;
        if val.valtype() != vt {
            Err(RuntimeErrorKind::ValueType {
                expected: vt,
                got:      val.valtype(),
            })?;
        }
        let ea = self.effective_address(memarg)?;
        let addr = self.memory()?;
        let mem = self.store.mem_mut(addr)?;
        match val {
            Value::I32(v) => mem.write(ea, &v.to_le_bytes()),
            Value::I64(v) => mem.write(ea, &v.to_le_bytes()),
            Value::F32(v) => mem.write(ea, &v.to_le_bytes()),
            Value::F64(v) => mem.write(ea, &v.to_le_bytes()),
        }
    }

    fn call(&mut self, addr: Address<addr::Function>) -> Result<()> {
        let func = self.store.func(addr)?;
        let nparams = func.functype().params.len();
        let split = self
            .stack
            .len()
            .checked_sub(nparams)
            .ok_or_else(|| impl_bug!("{} arguments missing from the stack", nparams))?;
        let args = self.stack.split_off(split);
        func.validate_args(&args)?;
        match &*func {
            FunctionInstance::Guest(guest) if guest.compiled().is_none() => {
                self.store.enter_call()?;
                self.store.log(Tag::Call, || {
                    format!("CALL {addr:?} {} DEPTH {}", guest.functype, self.store.call_depth())
                });
                let pushed = self.push_frame(guest, args);
                if pushed.is_err() {
                    self.store.leave_call();
                }
                pushed
            }
            _ => {
                let results = self.store.call_function(addr, &func, &args)?;
                self.stack.extend(results);
                Ok(())
            }
        }
    }

    fn call_indirect(&mut self, typeidx: u32) -> Result<()> {
        let i: u32 = self.pop_as()?;
        let inst = self.store.module(self.module()?)?;
        let expected = inst.functype(typeidx)?.clone();
        let table = inst.table(0)?;
        let addr = self
            .store
            .table(table)?
            .elements()
            .get(i as usize)
            .copied()
            .ok_or(TrapKind::UndefinedElement(i))?
            .ok_or(TrapKind::UninitializedElement(i))?;
        if *self.store.func(addr)?.functype() != expected {
            Err(TrapKind::CallIndirectTypeMismatch)?;
        }
        self.call(addr)
    }

    fn exec(&mut self, instr: &Instruction) -> Result<()> {
        match instr {
            Instruction::Unreachable => Err(TrapKind::Unreachable)?,
            Instruction::Nop => {}
            Instruction::Block(bt, body) => self.enter(*bt, body, false),
            Instruction::Loop(bt, body) => self.enter(*bt, body, true),
            Instruction::If(bt, then, els) => {
                let cond: u32 = self.pop_as()?;
                self.enter(*bt, if cond != 0 { then } else { els }, false);
            }
            Instruction::Br(l) => self.branch(*l)?,
            Instruction::BrIf(l) => {
                let cond: u32 = self.pop_as()?;
                if cond != 0 {
                    self.branch(*l)?;
                }
            }
            Instruction::BrTable(labels, default) => {
                let i: u32 = self.pop_as()?;
                self.branch(*labels.get(i as usize).unwrap_or(default))?;
            }
            Instruction::Return => self.return_from_frame()?,
            Instruction::Call(idx) => {
                let addr = self.store.module(self.module()?)?.func(*idx)?;
                self.call(addr)?;
            }
            Instruction::CallIndirect(typeidx) => self.call_indirect(*typeidx)?,

            Instruction::Drop => {
                self.pop()?;
            }
            Instruction::Select => {
                let cond: u32 = self.pop_as()?;
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(if cond != 0 { a } else { b });
            }

            Instruction::LocalGet(idx) => {
                let v = *self.local(*idx)?;
                self.push(v);
            }
            Instruction::LocalSet(idx) => {
                let v = self.pop()?;
                self.set_local(*idx, v)?;
            }
            Instruction::LocalTee(idx) => {
                let v = self.pop()?;
                self.set_local(*idx, v)?;
                self.push(v);
            }
            Instruction::GlobalGet(idx) => {
                let addr = self.store.module(self.module()?)?.global(*idx)?;
                let v = self.store.global(addr)?;
                self.push(v);
            }
            Instruction::GlobalSet(idx) => {
                let v = self.pop()?;
                let addr = self.store.module(self.module()?)?.global(*idx)?;
                self.store.set_global(addr, v)?;
            }

            Instruction::Load(vt, memarg) => {
                let v = self.load(*vt, *memarg)?;
                self.push(v);
            }
            Instruction::Store(vt, memarg) => self.store_value(*vt, *memarg)?,
            Instruction::MemorySize => {
                let size = self.store.mem(self.memory()?)?.size();
                self.push(size);
            }
            Instruction::MemoryGrow => {
                let pgs: u32 = self.pop_as()?;
                let addr = self.memory()?;
                // -1 signals a rejected growth.
                let old = self.store.grow_mem(addr, pgs)?.unwrap_or(u32::MAX);
                self.push(old);
            }

            Instruction::Const(v) => self.push(*v),
            Instruction::I32Eqz => {
                let v: u32 = self.pop_as()?;
                self.push((v == 0) as u32);
            }
            Instruction::I64Eqz => {
                let v: u64 = self.pop_as()?;
                self.push((v == 0) as u32);
            }
            Instruction::I32(op) => {
                let b = self.pop_as()?;
                let a = self.pop_as()?;
                let v = i32_op(*op, a, b)?;
                self.push(v);
            }
            Instruction::I64(op) => {
                let b = self.pop_as()?;
                let a = self.pop_as()?;
                let v = i64_op(*op, a, b)?;
                self.push(v);
            }
            Instruction::F32(op) => {
                let b = self.pop_as()?;
                let a = self.pop_as()?;
                self.push(f32_op(*op, a, b));
            }
            Instruction::F64(op) => {
                let b = self.pop_as()?;
                let a = self.pop_as()?;
                self.push(f64_op(*op, a, b));
            }
            Instruction::Convert(conv) => {
                let v = self.pop()?;
                let v = convert(*conv, v)?;
                self.push(v);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            runtime::{config::Config, instance::CompiledCode},
            syntax::{
                types::{FunctionType, MemType, TableType},
                ConstExpr, ElemSegment, Export, ExportDesc, Func, Locals, Module,
            },
        },
        std::{cell::Cell, rc::Rc},
    };

    use Instruction as I;
    use ValueType::{F32, F64, I32, I64};

    fn func(typeidx: u32, body: Vec<Instruction>) -> Func {
        Func {
            typeidx,
            locals: vec![],
            body,
        }
    }

    fn exports(names: &[&str]) -> Vec<Export> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Export {
                name: n.to_string(),
                desc: ExportDesc::Func(i as u32),
            })
            .collect()
    }

    fn load(module: Module) -> Result<Store> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut store = Store::new();
        store.instantiate("m", module)?;
        Ok(store)
    }

    fn binop(ty: ValueType, op: Instruction) -> Module {
        Module {
            types: vec![FunctionType::new(&[ty, ty], &[ty])],
            funcs: vec![func(0, vec![I::LocalGet(0), I::LocalGet(1), op])],
            exports: exports(&["f"]),
            ..Module::default()
        }
    }

    #[test]
    fn integer_arithmetic() -> Result<()> {
        let mut store = load(binop(I32, I::I32(IntOp::Sub)))?;
        assert_eq!(store.call("m", "f", &[2u32.into(), 3u32.into()])?, vec![Value::I32(u32::MAX)]);

        let mut store = load(binop(I64, I::I64(IntOp::ShrS)))?;
        assert_eq!(
            store.call("m", "f", &[(-16i64).into(), 2u64.into()])?,
            vec![Value::from(-4i64)]
        );
        Ok(())
    }

    #[test]
    fn division_traps() -> Result<()> {
        let mut store = load(binop(I32, I::I32(IntOp::DivS)))?;
        let err = store.call("m", "f", &[1u32.into(), 0u32.into()]).unwrap_err();
        assert_eq!(err.as_trap_error(), Some(&TrapKind::IntegerDivideByZero));
        let err = store
            .call("m", "f", &[i32::MIN.into(), (-1i32).into()])
            .unwrap_err();
        assert_eq!(err.as_trap_error(), Some(&TrapKind::IntegerOverflow));
        assert_eq!(store.call_depth(), 0);

        let mut store = load(binop(I32, I::I32(IntOp::RemS)))?;
        assert_eq!(
            store.call("m", "f", &[i32::MIN.into(), (-1i32).into()])?,
            vec![Value::I32(0)]
        );
        Ok(())
    }

    #[test]
    fn float_min_orders_signed_zero() -> Result<()> {
        let mut store = load(binop(F64, I::F64(FloatOp::Min)))?;
        let r = store.call("m", "f", &[0.0f64.into(), (-0.0f64).into()])?;
        assert_eq!(r, vec![Value::F64(-0.0)]);
        let r = store.call("m", "f", &[f64::NAN.into(), 1.0f64.into()])?;
        assert!(matches!(r[0], Value::F64(x) if x.is_nan()));
        Ok(())
    }

    #[test]
    fn truncation_traps() -> Result<()> {
        let module = Module {
            types: vec![FunctionType::new(&[F32], &[I32])],
            funcs: vec![func(0, vec![
                I::LocalGet(0),
                I::Convert(Conversion::I32TruncF32S),
            ])],
            exports: exports(&["trunc"]),
            ..Module::default()
        };
        let mut store = load(module)?;
        assert_eq!(
            store.call("m", "trunc", &[(-3.9f32).into()])?,
            vec![Value::from(-3i32)]
        );
        let err = store.call("m", "trunc", &[f32::NAN.into()]).unwrap_err();
        assert_eq!(err.as_trap_error(), Some(&TrapKind::InvalidConversionToInteger));
        let err = store.call("m", "trunc", &[2147483648.0f32.into()]).unwrap_err();
        assert_eq!(err.as_trap_error(), Some(&TrapKind::IntegerOverflow));
        Ok(())
    }

    #[test]
    fn loops_and_branches() -> Result<()> {
        // sum(n) = n + (n-1) + ... + 1
        let body = vec![
            I::block(BlockType::Empty, vec![I::loop_(BlockType::Empty, vec![
                I::LocalGet(0),
                I::I32Eqz,
                I::BrIf(1),
                I::LocalGet(1),
                I::LocalGet(0),
                I::I32(IntOp::Add),
                I::LocalSet(1),
                I::LocalGet(0),
                I::i32const(1u32),
                I::I32(IntOp::Sub),
                I::LocalSet(0),
                I::Br(0),
            ])]),
            I::LocalGet(1),
        ];
        let module = Module {
            types: vec![FunctionType::new(&[I32], &[I32])],
            funcs: vec![Func {
                typeidx: 0,
                locals: vec![Locals::new(1, I32)],
                body,
            }],
            exports: exports(&["sum"]),
            ..Module::default()
        };
        let mut store = load(module)?;
        assert_eq!(store.call("m", "sum", &[100u32.into()])?, vec![Value::I32(5050)]);
        Ok(())
    }

    #[test]
    fn block_results_and_br_table() -> Result<()> {
        let pick = |n: u32| {
            I::block(BlockType::Value(I32), vec![
                I::i32const(n),
                I::LocalGet(0),
                I::BrTable(Box::new([0]), 0),
            ])
        };
        let module = Module {
            types: vec![FunctionType::new(&[I32], &[I32])],
            funcs: vec![func(0, vec![
                pick(7),
                I::if_else(BlockType::Value(I32), vec![I::i32const(1u32)], vec![
                    I::i32const(2u32),
                ]),
                I::Return,
                I::Unreachable,
            ])],
            exports: exports(&["f"]),
            ..Module::default()
        };
        let mut store = load(module)?;
        assert_eq!(store.call("m", "f", &[0u32.into()])?, vec![Value::I32(1)]);
        Ok(())
    }

    fn memory_module() -> Module {
        Module {
            types: vec![
                FunctionType::new(&[I32, F64], &[]),
                FunctionType::new(&[I32], &[F64]),
                FunctionType::new(&[I32], &[I32]),
            ],
            memories: vec![MemType::new(1, Some(2))],
            funcs: vec![
                func(0, vec![I::LocalGet(0), I::LocalGet(1), I::store(F64, 8)]),
                func(1, vec![I::LocalGet(0), I::load(F64, 8)]),
                func(2, vec![I::LocalGet(0), I::MemoryGrow]),
            ],
            exports: exports(&["put", "get", "grow"]),
            ..Module::default()
        }
    }

    #[test]
    fn memory_round_trips_nan_bits() -> Result<()> {
        let mut store = load(memory_module())?;
        let nan = f64::from_bits(0x7ff0_0000_0000_0001);
        store.call("m", "put", &[16u32.into(), nan.into()])?;
        let r = store.call("m", "get", &[16u32.into()])?;
        assert_eq!(r[0].bits(), 0x7ff0_0000_0000_0001);
        Ok(())
    }

    #[test]
    fn out_of_bounds_access_traps() -> Result<()> {
        let mut store = load(memory_module())?;
        let err = store
            .call("m", "put", &[65530u32.into(), 1.0f64.into()])
            .unwrap_err();
        assert_eq!(
            err.as_trap_error(),
            Some(&TrapKind::OutOfBoundsMemoryAccess(65538, 8))
        );
        // The effective address does not wrap.
        let err = store.call("m", "get", &[u32::MAX.into()]).unwrap_err();
        assert!(err.as_trap_error().is_some());
        Ok(())
    }

    #[test]
    fn memory_grow_reports_failure_as_minus_one() -> Result<()> {
        let mut store = load(memory_module())?;
        assert_eq!(store.call("m", "grow", &[1u32.into()])?, vec![Value::I32(1)]);
        assert_eq!(store.call("m", "grow", &[1u32.into()])?, vec![Value::from(-1i32)]);
        assert_eq!(store.call("m", "grow", &[1u32.into()])?, vec![Value::from(-1i32)]);
        Ok(())
    }

    #[test]
    fn call_indirect_checks_elements() -> Result<()> {
        let module = Module {
            types: vec![
                FunctionType::new(&[], &[I32]),
                FunctionType::new(&[], &[I64]),
                FunctionType::new(&[I32], &[I32]),
            ],
            tables: vec![TableType::new(3, None)],
            funcs: vec![
                func(2, vec![I::LocalGet(0), I::CallIndirect(0)]),
                func(0, vec![I::i32const(42u32)]),
                func(1, vec![I::i64const(42u64)]),
            ],
            elems: vec![ElemSegment {
                table:  0,
                offset: ConstExpr::Const(Value::I32(0)),
                funcs:  vec![1, 2],
            }],
            exports: exports(&["dispatch"]),
            ..Module::default()
        };
        let mut store = load(module)?;
        let call = |store: &mut Store, i: u32| store.call("m", "dispatch", &[i.into()]);
        assert_eq!(call(&mut store, 0)?, vec![Value::I32(42)]);
        assert_eq!(
            call(&mut store, 1).unwrap_err().as_trap_error(),
            Some(&TrapKind::CallIndirectTypeMismatch)
        );
        assert_eq!(
            call(&mut store, 2).unwrap_err().as_trap_error(),
            Some(&TrapKind::UninitializedElement(2))
        );
        assert_eq!(
            call(&mut store, 3).unwrap_err().as_trap_error(),
            Some(&TrapKind::UndefinedElement(3))
        );
        Ok(())
    }

    #[test]
    fn runaway_recursion_exhausts_call_stack() -> Result<()> {
        let mut store = Store::with_config(Config::default().with_max_call_depth(32));
        store.instantiate("m", Module {
            types: vec![FunctionType::default()],
            funcs: vec![func(0, vec![I::Call(0)])],
            exports: exports(&["loop"]),
            ..Module::default()
        })?;
        let err = store.call("m", "loop", &[]).unwrap_err();
        assert_eq!(err.as_trap_error(), Some(&TrapKind::CallStackExhausted(32)));
        assert_eq!(store.call_depth(), 0);
        Ok(())
    }

    fn nested(depth: u32, inner: Vec<Instruction>) -> Vec<Instruction> {
        (0..depth).fold(inner, |body, _| vec![I::block(BlockType::Empty, body)])
    }

    #[test]
    fn default_depth_traps_instead_of_overflowing() -> Result<()> {
        let mut store = Store::new();
        store.instantiate("m", Module {
            types: vec![FunctionType::default()],
            funcs: vec![func(0, nested(50, vec![I::Call(0)]))],
            exports: exports(&["loop"]),
            ..Module::default()
        })?;
        let limit = Config::default().max_call_depth;
        for _ in 0..2 {
            let err = store.call("m", "loop", &[]).unwrap_err();
            assert_eq!(err.as_trap_error(), Some(&TrapKind::CallStackExhausted(limit)));
            assert_eq!(store.call_depth(), 0);
        }
        Ok(())
    }

    #[test]
    fn deep_block_nesting_runs() -> Result<()> {
        let depth = 1000;
        let inner = vec![I::i32const(7u32), I::Br(depth - 1)];
        let body = (0..depth).fold(inner, |body, _| {
            vec![I::block(BlockType::Value(I32), body)]
        });
        let mut store = load(Module {
            types: vec![FunctionType::new(&[], &[I32])],
            funcs: vec![func(0, body)],
            exports: exports(&["f"]),
            ..Module::default()
        })?;
        assert_eq!(store.call("m", "f", &[])?, vec![Value::I32(7)]);
        Ok(())
    }

    #[test]
    fn oversized_locals_fail_to_allocate() -> Result<()> {
        let mut store = load(Module {
            types: vec![FunctionType::default()],
            funcs: vec![Func {
                typeidx: 0,
                locals:  vec![Locals::new(u32::MAX, I64); 4096],
                body:    vec![],
            }],
            exports: exports(&["f"]),
            ..Module::default()
        })?;
        let err = store.call("m", "f", &[]).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::AllocationFailure(_)));
        assert_eq!(store.call_depth(), 0);
        Ok(())
    }

    #[test]
    fn execute_checks_arguments_and_result_slots() -> Result<()> {
        let mut store = load(binop(I32, I::I32(IntOp::Add)))?;
        let f = store.resolve_func("m", "f")?;

        let mut ret = [Value::I32(77)];
        let err = execute(&mut store, f, &[Value::I32(1)], &mut ret).unwrap_err();
        assert!(matches!(
            err.kind,
            RuntimeErrorKind::ArgumentCount {
                expected: 2,
                got:      1,
            }
        ));
        let err = execute(&mut store, f, &[Value::I32(1), Value::I64(1)], &mut ret).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::ArgumentType { index: 1, .. }));
        let err = execute(&mut store, f, &[Value::I32(1), Value::I32(1)], &mut []).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::ResultCount { .. }));
        assert_eq!(ret, [Value::I32(77)]);

        execute(&mut store, f, &[Value::I32(20), Value::I32(22)], &mut ret)?;
        assert_eq!(ret, [Value::I32(42)]);

        let err = execute(&mut store, Address::new(99), &[], &mut []).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::InvalidAddress(..)));
        Ok(())
    }

    #[derive(Debug)]
    struct Doubler(Rc<Cell<u32>>);

    impl CompiledCode for Doubler {
        fn call(
            &self,
            _store: &mut Store,
            _module: Address<addr::Module>,
            args: &[Value],
        ) -> Result<Vec<Value>> {
            self.0.set(self.0.get() + 1);
            let x: u32 = args[0].try_into()?;
            Ok(vec![Value::I32(x * 2)])
        }
    }

    #[test]
    fn compiled_code_takes_over_dispatch() -> Result<()> {
        let module = Module {
            types: vec![FunctionType::new(&[I32], &[I32])],
            funcs: vec![func(0, vec![I::LocalGet(0)])],
            exports: exports(&["f"]),
            ..Module::default()
        };
        let mut store = load(module)?;
        let f = store.resolve_func("m", "f")?;
        assert_eq!(store.invoke(f, &[Value::I32(21)])?, vec![Value::I32(21)]);

        let calls = Rc::new(Cell::new(0));
        assert!(store.set_compiled_code(f, Rc::new(Doubler(calls.clone())))?);
        assert!(!store.set_compiled_code(f, Rc::new(Doubler(calls.clone())))?);
        assert_eq!(store.invoke(f, &[Value::I32(21)])?, vec![Value::I32(42)]);
        assert_eq!(calls.get(), 1);
        Ok(())
    }

    #[test]
    fn host_results_are_checked() -> Result<()> {
        let mut store = Store::new();
        let f = store.import_function(
            "env",
            "bad",
            FunctionType::new(&[], &[I32]),
            |_, _| Ok(vec![Value::I64(1)]),
        )?;
        let err = store.invoke(f, &[]).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::ResultType { index: 0, .. }));
        Ok(())
    }
}
