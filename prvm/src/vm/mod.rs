pub use crate::vm::interpreter::Thread;
pub use crate::vm::error::{Error, ErrorKind, Frame, LoadError};
pub use crate::vm::value::{Cell, Vector, load_vector, store_vector};
pub use crate::vm::code::{Op, Operand, Statement};
pub use crate::vm::program::{Program, Function, Def, FunctionId, Disassembly};
pub use crate::vm::program::{OFS_NULL, OFS_RETURN, OFS_PARM0, MAX_PARMS, RESERVED_OFS, ofs_parm};
pub use crate::vm::strings::Strings;
pub use crate::vm::entity::{Entities, EdictStore};
pub use crate::vm::builtin::{Builtin, Builtins, Context};
pub use crate::vm::profile::{Profile, FunctionProfile};
pub use crate::vm::config::{Config, Coverage, StateFields, WorldWrites};
pub use crate::vm::build::{Builder, FunctionRef, FieldRef};

mod interpreter;
mod error;
mod value;
mod code;
mod program;
mod strings;
mod entity;
mod address;
mod stack;
mod builtin;
mod profile;
mod config;
mod build;
