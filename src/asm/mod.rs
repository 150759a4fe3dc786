//! Two-pass assembler: source text in, unlinked [`Program`] out.

pub mod lexer;
pub mod parse;
pub mod pass_one;
pub mod pass_two;
pub mod program;
pub mod pseudo;


pub use program::{DebugInfo, Program, Segment};

use crate::errors::{AsmError, AsmWarning};

/// The result of assembling one compilation unit. `program` is partial
/// when `errors` is non-empty.
#[derive(Debug)]
pub struct Assembled {
    pub program: Program,
    pub errors: Vec<AsmError>,
    pub warnings: Vec<AsmWarning>,
}

impl Assembled {
    pub fn into_result(self) -> Result<Program, Vec<AsmError>> {
        if self.errors.is_empty() {
            Ok(self.program)
        } else {
            Err(self.errors)
        }
    }
}

/// Assemble one source unit. Pass-one errors suppress pass two; all
/// errors are accumulated rather than stopping at the first.
pub fn assemble(source: &str) -> Assembled {
    let pass_one::PassOneOutput {
        mut program,
        tal,
        mut errors,
        warnings,
    } = pass_one::pass_one(source);
    if errors.is_empty() {
        errors.extend(pass_two::pass_two(&mut program, &tal));
    }
    Assembled {
        program,
        errors,
        warnings,
    }
}
