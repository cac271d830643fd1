//! Native block dispatch.
//!
//! The interpreter does not assemble native code itself. A
//! [`NativeBackend`] turns a block's [`NativeCall`] description into a
//! [`NativeFn`], one of a closed set of function shapes over raw 64-bit
//! words, and the interpreter calls it with the input registers.

use tern_bytecode::{NativeCall, MAX_NATIVE_INPUTS};
use thiserror::Error;

/// A compiled native block: up to six word inputs, zero or one word output.
#[derive(Copy, Clone, Debug)]
pub enum NativeFn {
    Void0(fn()),
    Void1(fn(u64)),
    Void2(fn(u64, u64)),
    Void3(fn(u64, u64, u64)),
    Void4(fn(u64, u64, u64, u64)),
    Void5(fn(u64, u64, u64, u64, u64)),
    Void6(fn(u64, u64, u64, u64, u64, u64)),
    Ret0(fn() -> u64),
    Ret1(fn(u64) -> u64),
    Ret2(fn(u64, u64) -> u64),
    Ret3(fn(u64, u64, u64) -> u64),
    Ret4(fn(u64, u64, u64, u64) -> u64),
    Ret5(fn(u64, u64, u64, u64, u64) -> u64),
    Ret6(fn(u64, u64, u64, u64, u64, u64) -> u64),
}

impl NativeFn {
    pub const fn arity(&self) -> usize {
        match self {
            NativeFn::Void0(_) | NativeFn::Ret0(_) => 0,
            NativeFn::Void1(_) | NativeFn::Ret1(_) => 1,
            NativeFn::Void2(_) | NativeFn::Ret2(_) => 2,
            NativeFn::Void3(_) | NativeFn::Ret3(_) => 3,
            NativeFn::Void4(_) | NativeFn::Ret4(_) => 4,
            NativeFn::Void5(_) | NativeFn::Ret5(_) => 5,
            NativeFn::Void6(_) | NativeFn::Ret6(_) => 6,
        }
    }

    pub const fn returns(&self) -> bool {
        matches!(
            self,
            NativeFn::Ret0(_)
                | NativeFn::Ret1(_)
                | NativeFn::Ret2(_)
                | NativeFn::Ret3(_)
                | NativeFn::Ret4(_)
                | NativeFn::Ret5(_)
                | NativeFn::Ret6(_)
        )
    }

    /// Whether this function can serve `call`.
    pub fn fits(&self, call: &NativeCall) -> bool {
        self.arity() == call.inputs.len() && self.returns() == call.output.is_some()
    }

    /// Call with `args`, which must match [`NativeFn::arity`].
    pub fn call(&self, args: &[u64]) -> Result<Option<u64>, NativeError> {
        let result = match (*self, args) {
            (NativeFn::Void0(f), []) => {
                f();
                None
            }
            (NativeFn::Void1(f), &[a]) => {
                f(a);
                None
            }
            (NativeFn::Void2(f), &[a, b]) => {
                f(a, b);
                None
            }
            (NativeFn::Void3(f), &[a, b, c]) => {
                f(a, b, c);
                None
            }
            (NativeFn::Void4(f), &[a, b, c, d]) => {
                f(a, b, c, d);
                None
            }
            (NativeFn::Void5(f), &[a, b, c, d, e]) => {
                f(a, b, c, d, e);
                None
            }
            (NativeFn::Void6(f), &[a, b, c, d, e, g]) => {
                f(a, b, c, d, e, g);
                None
            }
            (NativeFn::Ret0(f), []) => Some(f()),
            (NativeFn::Ret1(f), &[a]) => Some(f(a)),
            (NativeFn::Ret2(f), &[a, b]) => Some(f(a, b)),
            (NativeFn::Ret3(f), &[a, b, c]) => Some(f(a, b, c)),
            (NativeFn::Ret4(f), &[a, b, c, d]) => Some(f(a, b, c, d)),
            (NativeFn::Ret5(f), &[a, b, c, d, e]) => Some(f(a, b, c, d, e)),
            (NativeFn::Ret6(f), &[a, b, c, d, e, g]) => Some(f(a, b, c, d, e, g)),
            _ => {
                return Err(NativeError::ShapeMismatch {
                    inputs: args.len(),
                    output: self.returns(),
                    fn_inputs: self.arity(),
                    fn_output: self.returns(),
                })
            }
        };
        Ok(result)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum NativeError {
    #[error("no native backend available for block `{code}`")]
    Unavailable { code: String },
    #[error("native backend rejected the block: {reason}")]
    Rejected { reason: String },
    #[error(
        "native block has {inputs} inputs (output: {output}) but its function takes \
         {fn_inputs} (output: {fn_output})"
    )]
    ShapeMismatch {
        inputs: usize,
        output: bool,
        fn_inputs: usize,
        fn_output: bool,
    },
}

impl NativeError {
    /// Mismatch between `call` and the function compiled for it.
    #[cold]
    pub fn shape(call: &NativeCall, function: &NativeFn) -> Self {
        NativeError::ShapeMismatch {
            inputs: call.inputs.len(),
            output: call.output.is_some(),
            fn_inputs: function.arity(),
            fn_output: function.returns(),
        }
    }
}

/// Compiles native blocks. Results are cached by the interpreter, so each
/// block is compiled at most once per [`Vm`](crate::Vm).
pub trait NativeBackend {
    fn compile(&mut self, call: &NativeCall) -> Result<NativeFn, NativeError>;
}

impl<B: NativeBackend + ?Sized> NativeBackend for &mut B {
    fn compile(&mut self, call: &NativeCall) -> Result<NativeFn, NativeError> {
        (**self).compile(call)
    }
}

impl<B: NativeBackend + ?Sized> NativeBackend for Box<B> {
    fn compile(&mut self, call: &NativeCall) -> Result<NativeFn, NativeError> {
        (**self).compile(call)
    }
}

/// Backend for hosts without a native code generator.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct UnavailableBackend;

impl NativeBackend for UnavailableBackend {
    fn compile(&mut self, call: &NativeCall) -> Result<NativeFn, NativeError> {
        debug_assert!(call.inputs.len() <= MAX_NATIVE_INPUTS);
        Err(NativeError::Unavailable {
            code: call.source.clone(),
        })
    }
}
