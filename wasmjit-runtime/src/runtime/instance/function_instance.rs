use {
    super::addr::{self, Address},
    crate::{
        runtime::{
            error::{Result, RuntimeErrorKind},
            store::Store,
            values::Value,
        },
        syntax::{
            types::{FunctionType, ResultType, ValueType},
            Instruction, Locals,
        },
    },
    std::{cell::OnceCell, fmt, rc::Rc},
};

/// The entry point of a host function. It receives arguments that already
/// match the declared parameter types, and may re-enter the store.
pub type HostFunc = dyn Fn(&mut Store, &[Value]) -> Result<Vec<Value>>;

/// Native code a backend produced for a guest function.
///
/// Attaching compiled code is an optimization; a guest function without it is
/// run by the interpreter with identical results.
pub trait CompiledCode: fmt::Debug {
    /// Run the function. `module` is the instance whose bindings the code must
    /// resolve its indices through.
    fn call(
        &self,
        store: &mut Store,
        module: Address<addr::Module>,
        args: &[Value],
    ) -> Result<Vec<Value>>;
}

/// A function instance is the runtime representation of a function.
/// [Spec][Spec]
///
/// A guest function is a closure of its body over the module instance it was
/// defined in. A host function is provided by the embedder and has no module
/// instance at all.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#function-instances
#[derive(Debug)]
pub enum FunctionInstance {
    Guest(GuestFunction),
    Host(HostFunction),
}

pub struct GuestFunction {
    pub functype: FunctionType,
    pub module:   Address<addr::Module>,
    pub locals:   Box<[Locals]>,
    pub body:     Rc<[Instruction]>,
    compiled:     OnceCell<Rc<dyn CompiledCode>>,
}

impl GuestFunction {
    pub fn new(
        functype: FunctionType,
        module: Address<addr::Module>,
        locals: Box<[Locals]>,
        body: Rc<[Instruction]>,
    ) -> Self {
        GuestFunction {
            functype,
            module,
            locals,
            body,
            compiled: OnceCell::new(),
        }
    }

    pub fn compiled(&self) -> Option<&Rc<dyn CompiledCode>> {
        self.compiled.get()
    }

    /// Attach compiled code. Only the first attachment takes effect; returns
    /// false if code was already present.
    pub fn set_compiled(&self, code: Rc<dyn CompiledCode>) -> bool {
        self.compiled.set(code).is_ok()
    }

    /// The number of declared locals, or `None` if it does not fit a `usize`.
    pub fn local_count(&self) -> Option<usize> {
        self.locals
            .iter()
            .try_fold(0usize, |n, l| n.checked_add(l.count as usize))
    }

    /// The initial values of the declared locals, after the parameters.
    pub fn local_defaults(&self) -> impl Iterator<Item = Value> + '_ {
        self.locals.iter().flat_map(|l| {
            std::iter::repeat(l.valtype.default_value()).take(l.count as usize)
        })
    }
}

impl fmt::Debug for GuestFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestFunction")
            .field("functype", &self.functype)
            .field("module", &self.module)
            .field("locals", &self.locals)
            .field("body_len", &self.body.len())
            .field("compiled", &self.compiled.get().is_some())
            .finish()
    }
}

/// A host function is a function expressed outside WebAssembly but passed to
/// a module as an import.
pub struct HostFunction {
    pub functype: FunctionType,
    pub callback: Rc<HostFunc>,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction {{ functype: {} }}", self.functype)
    }
}

/// Check that `values` match `types` exactly, position by position.
fn check_values(
    types: &ResultType,
    values: &[Value],
    count_err: impl FnOnce(usize, usize) -> RuntimeErrorKind,
    type_err: impl FnOnce(usize, ValueType, ValueType) -> RuntimeErrorKind,
) -> Result<()> {
    if types.len() != values.len() {
        return Err(count_err(types.len(), values.len()).into());
    }
    match types
        .iter()
        .zip(values)
        .position(|(t, v)| *t != v.valtype())
    {
        Some(index) => Err(type_err(index, types[index], values[index].valtype()).into()),
        None => Ok(()),
    }
}

impl FunctionInstance {
    pub fn functype(&self) -> &FunctionType {
        match self {
            FunctionInstance::Guest(g) => &g.functype,
            FunctionInstance::Host(h) => &h.functype,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, FunctionInstance::Host(_))
    }

    /// The defining module, for guest functions.
    pub fn module(&self) -> Option<Address<addr::Module>> {
        match self {
            FunctionInstance::Guest(g) => Some(g.module),
            FunctionInstance::Host(_) => None,
        }
    }

    pub fn validate_args(&self, args: &[Value]) -> Result<()> {
        check_values(
            &self.functype().params,
            args,
            |expected, got| RuntimeErrorKind::ArgumentCount { expected, got },
            |index, expected, got| RuntimeErrorKind::ArgumentType {
                index,
                expected,
                got,
            },
        )
    }

    pub fn validate_results(&self, results: &[Value]) -> Result<()> {
        check_values(
            &self.functype().result,
            results,
            |expected, got| RuntimeErrorKind::ResultCount { expected, got },
            |index, expected, got| RuntimeErrorKind::ResultType {
                index,
                expected,
                got,
            },
        )
    }
}
