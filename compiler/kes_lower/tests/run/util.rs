//! Test utilities for end-to-end runs
//!
//! Programs are built with [`AstBuilder`], lowered into an [`IrModule`]
//! and executed on the interpreter, so each test checks what a program
//! prints rather than the shape of its IR.

use kes_emit::IrModule;
use kes_eval::{ExecError, Outcome};
use kes_ir::{AstBuilder, NodeId, StringInterner};
use kes_lower::{lower_module, CompilationContext, LowerOptions, LowerOutcome};

/// A lowered program and what lowering reported about it.
pub struct Compiled {
    pub module: IrModule,
    pub lowered: LowerOutcome,
}

/// Lower the module whose items `build` returns.
pub fn compile_with(
    options: LowerOptions,
    build: impl FnOnce(&mut AstBuilder<'_>) -> Vec<NodeId>,
) -> Compiled {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    let items = build(&mut b);
    let root = b.module(&items);
    let ast = b.finish();

    let mut module = IrModule::new("test");
    let mut ctx = CompilationContext::new(options, &interner);
    let lowered = lower_module(&mut ctx, &ast, root, &interner, &mut module)
        .unwrap_or_else(|e| panic!("internal lowering error: {e}"));
    Compiled { module, lowered }
}

pub fn compile(build: impl FnOnce(&mut AstBuilder<'_>) -> Vec<NodeId>) -> Compiled {
    compile_with(LowerOptions::unlimited(), build)
}

/// Lower and run `main`. Any diagnostic fails the test.
pub fn run(build: impl FnOnce(&mut AstBuilder<'_>) -> Vec<NodeId>) -> Result<Outcome, ExecError> {
    let compiled = compile(build);
    assert!(
        compiled.lowered.is_success(),
        "unexpected diagnostics:\n{}",
        compiled.lowered.render()
    );
    kes_eval::run(&compiled.module, "main")
}

/// Output of a program that must run to completion.
pub fn stdout(build: impl FnOnce(&mut AstBuilder<'_>) -> Vec<NodeId>) -> String {
    match run(build) {
        Ok(outcome) => outcome.stdout,
        Err(e) => panic!("program failed: {e}"),
    }
}
