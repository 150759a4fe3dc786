use thiserror::Error;

/// Errors produced while assembling one compilation unit.
///
/// Pass one keeps going after an error so a unit reports as many problems
/// as possible; the variants tag which stage rejected the line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: {msg}")]
    Lex { line: usize, msg: String },

    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("line {line}: {msg}")]
    Range { line: usize, msg: String },

    #[error("line {line}: {msg}")]
    Label { line: usize, msg: String },

    #[error("line {line}: {msg}")]
    Directive { line: usize, msg: String },
}

impl AsmError {
    pub fn lex(line: usize, msg: impl Into<String>) -> Self {
        AsmError::Lex { line, msg: msg.into() }
    }
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        AsmError::Parse { line, msg: msg.into() }
    }
    pub fn range(line: usize, msg: impl Into<String>) -> Self {
        AsmError::Range { line, msg: msg.into() }
    }
    pub fn label(line: usize, msg: impl Into<String>) -> Self {
        AsmError::Label { line, msg: msg.into() }
    }
    pub fn directive(line: usize, msg: impl Into<String>) -> Self {
        AsmError::Directive { line, msg: msg.into() }
    }

    /// Source line the error points at (1-based).
    pub fn line(&self) -> usize {
        match self {
            AsmError::Lex { line, .. }
            | AsmError::Parse { line, .. }
            | AsmError::Range { line, .. }
            | AsmError::Label { line, .. }
            | AsmError::Directive { line, .. } => *line,
        }
    }
}

/// Non-fatal assembler diagnostics (`.float`/`.double` and friends).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmWarning {
    pub line: usize,
    pub msg: String,
}

impl std::fmt::Display for AsmWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.msg)
    }
}

/// Errors raised while linking assembled units. Fatal to the link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("label {0} defined global in two different files")]
    DuplicateGlobal(String),

    #[error("label {0} used but not defined")]
    Undefined(String),

    #[error("main must be defined in the text segment")]
    MainOutsideText,

    #[error("relocation at {addr:#010x}: {msg}")]
    Relocation { addr: u32, msg: String },

    #[error("{0} segment overflow")]
    SegmentOverflow(&'static str),
}

/// Runtime faults. Simulation halts and the step context is preserved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("memory access out of range: addr={addr:#010x} size={size} at pc={pc:#010x}")]
    Access { pc: u32, addr: u32, size: u32 },

    #[error("cannot decode instruction {word:#010x} at pc={pc:#010x}")]
    InvalidInstruction { pc: u32, word: u32 },

    #[error("unknown ecall {number} at pc={pc:#010x}")]
    UnknownEcall { pc: u32, number: u32 },
}
