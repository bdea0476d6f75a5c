use std::{error, fmt};

use bstr::BString;
use thiserror::Error;

use crate::vm::code::Op;

/// A fatal error raised while executing QuakeC.
///
/// The faulting frame is described by `function`, `statement` and `line`. `backtrace` lists every
/// active frame, innermost first, as it was before the failed invocation unwound.
#[derive(Debug)]
pub struct Error {
    pub program: String,
    pub function: BString,
    pub statement: Option<usize>,
    pub line: Option<i32>,
    pub backtrace: Vec<Frame>,
    pub kind: ErrorKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    pub function: BString,
    pub statement: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("bad opcode {0}")]
    BadOpcode(u16),
    #[error("NULL function")]
    NullFunction,
    #[error("CALL outside the program (function {0})")]
    InvalidFunction(i32),
    #[error("attempted to address an out of bounds edict ({entity}, max {max})")]
    OutOfBoundsEntity { entity: i32, max: usize },
    #[error("attempted to address an invalid field in an edict ({field}, max {max})")]
    OutOfBoundsField { field: i32, max: usize },
    #[error("attempted to write to an out of bounds edict ({pointer}, area {area})")]
    OutOfBoundsPointer { pointer: i32, area: usize },
    #[error("assignment to world.{name} (field {field}) is forbidden")]
    WorldWriteForbidden { field: usize, name: BString },
    #[error("indexed global out of bounds (index {index}, max {max})")]
    OutOfBoundsIndexedGlobal { index: i32, max: i32 },
    #[error("no such builtin #{0}")]
    UnknownBuiltin(usize),
    #[error("runaway loop counter hit limit of {limit} jumps (most active: {})", .hot.join(", "))]
    RunawayLoop { limit: u64, hot: Vec<String> },
    #[error("stack overflow (depth {0})")]
    StackOverflow(usize),
    #[error("locals stack overflow ({used} cells in use, {needed} more needed)")]
    LocalStackOverflow { used: usize, needed: usize },
    #[error("{0} is not supported by this program")]
    OpNotSupported(Op),
    #[error("{0}")]
    Builtin(#[source] Box<dyn error::Error + Send + Sync>),
    #[error("{0}")]
    Nested(Box<Error>),
}

impl From<Error> for ErrorKind {
    fn from(error: Error) -> ErrorKind { ErrorKind::Nested(Box::new(error)) }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} in {}", self.program, self.kind, self.function)?;
        if let Some(statement) = self.statement {
            write!(f, " at statement {}", statement)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind {
            ErrorKind::Builtin(ref error) => Some(&**error),
            ErrorKind::Nested(ref error) => Some(&**error),
            _ => None,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.statement {
            Some(statement) => write!(f, "{}+{}", self.function, statement),
            None => write!(f, "{}", self.function),
        }
    }
}

/// A program rejected while loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Progs(#[from] progs::Error),
    #[error("only {0} globals, fewer than the reserved parameter area")]
    Reserved(usize),
    #[error("statement {statement}: {op} operand {operand} is out of bounds ({value})")]
    Operand { statement: usize, op: Op, operand: char, value: i32 },
    #[error("statement {statement}: branch target {target} is out of range")]
    Target { statement: usize, target: i32 },
    #[error("statement {0}: execution can run past the last statement")]
    Fallthrough(usize),
    #[error("function {function}: first statement {first_statement} is out of range")]
    Entry { function: usize, first_statement: i32 },
    #[error("function {function}: parameters or locals are out of bounds")]
    Locals { function: usize },
}
