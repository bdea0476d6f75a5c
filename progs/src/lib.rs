use bstr::BString;

pub use crate::read::{read_progs, read_lines, Error};

mod read;

/// The only `progs.dat` version this crate understands.
pub const PROG_VERSION: i32 = 6;

/// The raw contents of a compiled QuakeC `progs.dat`.
#[derive(Default)]
pub struct Progs {
    pub version: i32,
    pub crc: i32,
    pub statements: Vec<Statement>,
    pub global_defs: Vec<Def>,
    pub field_defs: Vec<Def>,
    pub functions: Vec<Function>,
    pub strings: BString,
    pub globals: Vec<u32>,
    pub entity_fields: i32,
}

/// A statement as stored on disk, with branch offsets still relative.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct Statement {
    pub op: u16,
    pub a: i16,
    pub b: i16,
    pub c: i16,
}

/// A global or field definition.
#[derive(Copy, Clone, Default, Debug)]
pub struct Def {
    pub ty: u16,
    pub ofs: u16,
    pub name: i32,
}

#[derive(Copy, Clone, Default, Debug)]
pub struct Function {
    /// Negative for builtins.
    pub first_statement: i32,
    pub parm_start: i32,
    pub locals: i32,
    pub profile: i32,
    pub name: i32,
    pub file: i32,
    pub num_parms: i32,
    pub parm_size: [u8; 8],
}

/// Source line numbers, one per statement, from a `.lno` file.
#[derive(Default, Debug)]
pub struct Lines {
    pub lines: Vec<i32>,
}

pub mod def_type {
    pub const VOID: u16 = 0;
    pub const STRING: u16 = 1;
    pub const FLOAT: u16 = 2;
    pub const VECTOR: u16 = 3;
    pub const ENTITY: u16 = 4;
    pub const FIELD: u16 = 5;
    pub const FUNCTION: u16 = 6;
    pub const POINTER: u16 = 7;

    /// Set on globals that belong in a saved game.
    pub const SAVE_GLOBAL: u16 = 1 << 15;
}
