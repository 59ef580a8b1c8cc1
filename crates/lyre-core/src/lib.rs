//! The two-stage typing core: constraint generation for implicitly-typed
//! programs against an external solver, and dictionary-passing elaboration
//! of explicitly-typed programs into the class-free dialect.

pub mod builtin;
pub mod check;
pub mod constraint;
pub mod elaborate;
pub mod env;
pub mod error;
pub mod generate;
pub mod ledger;
pub mod pretty;

use constraint::Solver;
use error::Result;
use lyre_ast::{explicit, implicit};

/// The single entry point: generate the typing constraint, have the solver
/// discharge it, materialize the explicit program from the solution, and
/// elaborate the classes away. The result contains no class or instance
/// blocks.
pub fn compile<S: Solver>(program: &implicit::Program, solver: &mut S) -> Result<explicit::Program> {
    let generated = generate::generate(program)?;
    let solution = solver.solve(&generated.constraint)?;
    let program = solution.derive(generated.template);
    elaborate::elaborate_program(&program)
}
