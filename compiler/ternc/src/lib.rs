//! Driver for the Tern middle end.
//!
//! [`compile`] runs the passes in order over one module:
//!
//! 1. index the module into a [`Section`](tern_ir::Section)
//! 2. resolve names
//! 3. infer types
//! 4. generate bytecode, only if nothing above reported an error
//!
//! Every diagnostic goes through one [`DiagnosticQueue`] so callers get a
//! deduplicated, position-sorted list. [`run`] compiles and then executes
//! the program on a [`Vm`].

use std::sync::Once;

use tern_bytecode::{generate, GenOptions, Program, Word};
use tern_diagnostic::queue::{too_many_errors, DiagnosticConfig, DiagnosticQueue};
use tern_diagnostic::span_utils::LineOffsetTable;
use tern_diagnostic::{Diagnostic, ErrorGuaranteed};
use tern_ir::{index, Ast, NodeId, Span};
use tern_types::{infer, resolve};
use tern_vm::{NativeBackend, RunOutput, Vm, VmConfig, VmError};
use thiserror::Error;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset, and nothing on second and later
/// calls.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CompilerConfig {
    pub diagnostics: DiagnosticConfig,
    pub codegen: GenOptions,
    pub vm: VmConfig,
}

impl CompilerConfig {
    /// No error limit and no deduplication.
    pub fn unlimited() -> Self {
        CompilerConfig {
            diagnostics: DiagnosticConfig::unlimited(),
            ..CompilerConfig::default()
        }
    }
}

/// A successful compilation. `diagnostics` holds any warnings.
#[derive(Debug)]
pub struct Compiled {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Error)]
#[error("compilation failed with {} diagnostic(s)", diagnostics.len())]
pub struct CompileFailure {
    /// Everything reported, sorted by position.
    pub diagnostics: Vec<Diagnostic>,
    pub guarantee: ErrorGuaranteed,
}

impl CompileFailure {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Compile(#[from] CompileFailure),
    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Outcome of [`run`]: the program and its final `start` state.
#[derive(Debug)]
pub struct Execution {
    pub program: Program,
    pub output: RunOutput,
    /// Native blocks the backend compiled.
    pub compiled_natives: usize,
}

impl Execution {
    /// Final value of the top-level variable `name`.
    pub fn symbol(&self, name: &str) -> Option<Word> {
        self.output.symbol(&self.program, name)
    }
}

/// Diagnostics of one compilation, positioned against its source text.
struct Reporter<'src> {
    source: &'src str,
    lines: LineOffsetTable,
    queue: DiagnosticQueue,
    error_limit: usize,
    /// Where to point the error-limit note.
    root_span: Span,
}

impl<'src> Reporter<'src> {
    fn new(source: &'src str, config: &DiagnosticConfig, root_span: Span) -> Self {
        Reporter {
            source,
            lines: LineOffsetTable::build(source),
            queue: DiagnosticQueue::with_config(config.clone()),
            error_limit: config.error_limit,
            root_span,
        }
    }

    fn report(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diag in diagnostics {
            self.queue.add_with_source(diag, self.source, &self.lines);
        }
    }

    /// `Err` once any error has been reported.
    fn checkpoint(&mut self, pass: &str) -> Result<(), CompileFailure> {
        match self.queue.has_errors() {
            Some(guarantee) => {
                tracing::debug!(pass, errors = self.queue.error_count(), "stopping after errors");
                Err(CompileFailure {
                    diagnostics: self.finish(),
                    guarantee,
                })
            }
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> Vec<Diagnostic> {
        let overflowed = self.queue.overflowed();
        let mut diagnostics = self.queue.flush();
        if overflowed {
            diagnostics.push(too_many_errors(self.error_limit, self.root_span));
        }
        diagnostics
    }
}

/// Compile the module rooted at `root`.
///
/// `source` is the text the tree's spans point into; it is only used to
/// turn spans into line and column numbers.
pub fn compile(
    ast: &mut Ast,
    root: NodeId,
    source: &str,
    config: &CompilerConfig,
) -> Result<Compiled, CompileFailure> {
    let section = index(ast, root, None);
    let ast: &Ast = ast;
    tracing::debug!(root = root.raw(), nodes = section.len(), "indexed module");

    let mut reporter = Reporter::new(source, &config.diagnostics, ast.span(root));

    let mut resolution = resolve(ast, &section, None);
    let mut types = infer(ast, &section, &resolution);
    reporter.report(resolution.take_diagnostics());
    reporter.report(types.take_diagnostics());
    reporter.checkpoint("inference")?;

    let generated = match generate(ast, root, &resolution, &types, config.codegen) {
        Ok(generated) => generated,
        Err(err) => {
            tracing::debug!(error = %err, "code generation aborted");
            reporter.report([err.to_diagnostic()]);
            reporter.checkpoint("generation")?;
            unreachable!("generation error left no error in the queue");
        }
    };
    reporter.report(generated.diagnostics);
    reporter.checkpoint("generation")?;

    Ok(Compiled {
        program: generated.program,
        diagnostics: reporter.finish(),
    })
}

/// Compile the module rooted at `root` and run it with `backend`.
pub fn run<B: NativeBackend>(
    ast: &mut Ast,
    root: NodeId,
    source: &str,
    config: &CompilerConfig,
    backend: B,
) -> Result<Execution, RunError> {
    let Compiled { program, .. } = compile(ast, root, source, config)?;
    let (output, compiled_natives) = {
        let mut vm = Vm::new(&program, backend, config.vm);
        let output = vm.run()?;
        (output, vm.compiled_natives())
    };
    Ok(Execution {
        program,
        output,
        compiled_natives,
    })
}
