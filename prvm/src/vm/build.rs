use bstr::BString;

use crate::vm::{Cell, Def, Function, FunctionId, LoadError, Op, Program, Statement, Strings, Vector};
use crate::vm::program::{RESERVED_OFS, MAX_PARMS};
use progs::def_type;

/// An assembler for programs built in memory.
///
/// Global offsets, statement indices and branch targets are absolute, the form the interpreter
/// runs. `finish` applies the same verification as loading a `progs.dat`.
pub struct Builder {
    name: String,
    statements: Vec<Statement>,
    functions: Vec<Function>,
    globals: Vec<Cell>,
    global_defs: Vec<Def>,
    field_defs: Vec<Def>,
    strings: Strings,
    entity_fields: usize,
}

/// A declared function: its number, a global holding that number, and its first local.
#[derive(Copy, Clone, Debug)]
pub struct FunctionRef {
    pub id: FunctionId,
    pub global: i32,
    pub parm_start: i32,
}

/// A declared field: its offset within an entity, and a global holding that offset.
#[derive(Copy, Clone, Debug)]
pub struct FieldRef {
    pub offset: usize,
    pub global: i32,
}

impl FunctionRef {
    /// The global `n` cells into the function's parameters and locals.
    pub fn local(&self, n: usize) -> i32 { self.parm_start + n as i32 }
}

impl Builder {
    pub fn new(name: &str) -> Builder {
        Builder {
            name: name.to_string(),
            statements: Vec::new(),
            functions: vec![Function::default()],
            globals: vec![Cell::ZERO; RESERVED_OFS],
            global_defs: Vec::new(),
            field_defs: Vec::new(),
            strings: Strings::new(BString::from("\0")),
            entity_fields: 0,
        }
    }

    /// Allocate zeroed globals and return the first.
    pub fn reserve(&mut self, cells: usize) -> i32 {
        let ofs = self.globals.len();
        self.globals.resize(ofs + cells, Cell::ZERO);
        ofs as i32
    }

    /// An anonymous constant.
    pub fn constant(&mut self, value: impl Into<Cell>) -> i32 {
        let ofs = self.globals.len();
        self.globals.push(value.into());
        ofs as i32
    }

    pub fn vector(&mut self, value: Vector) -> i32 {
        let ofs = self.reserve(3);
        crate::vm::store_vector(&mut self.globals[ofs as usize..], value);
        ofs
    }

    /// A named float global.
    pub fn global(&mut self, name: &str, value: f32) -> i32 {
        let ofs = self.constant(value);
        self.define(def_type::FLOAT, ofs, name);
        ofs
    }

    /// A global holding a handle to a new table string.
    pub fn string(&mut self, value: &str) -> i32 {
        let handle = self.strings.push_table(value.as_bytes());
        self.constant(Cell::from_int(handle))
    }

    /// A global array of `width`-cell elements, preceded by its highest valid index.
    pub fn array(&mut self, width: usize, values: &[Cell]) -> i32 {
        let max = (values.len() / width) as i32 - 1;
        self.constant(Cell::from_int(max));
        let base = self.globals.len() as i32;
        self.globals.extend_from_slice(values);
        base
    }

    pub fn field(&mut self, name: &str, width: usize) -> FieldRef {
        let offset = self.entity_fields;
        self.entity_fields += width;
        let ty = if width == 3 { def_type::VECTOR } else { def_type::FLOAT };
        self.field_defs.push(Def { ty, ofs: offset, name: BString::from(name) });

        let global = self.constant(Cell::from_int(offset as i32));
        self.define(def_type::FIELD, global, name);
        FieldRef { offset, global }
    }

    /// Declare a script function whose body starts wherever `begin` is called.
    pub fn declare(&mut self, name: &str, parms: &[u8], locals: usize) -> FunctionRef {
        let mut parm_size = [0; MAX_PARMS];
        parm_size[..parms.len()].copy_from_slice(parms);
        let size = usize::max(locals, parms.iter().map(|&size| size as usize).sum());

        let parm_start = self.reserve(size);
        self.push_function(name, Function {
            first_statement: 0,
            parm_start: parm_start as usize,
            locals: size,
            num_parms: parms.len(),
            parm_size,
            name: BString::from(name),
            file: BString::from(self.name.as_str()),
        })
    }

    /// Start the body of a declared function at the next statement.
    pub fn begin(&mut self, function: FunctionRef) {
        self.functions[function.id as usize].first_statement = self.statements.len() as i32;
    }

    /// Declare a function and start its body.
    pub fn function(&mut self, name: &str, parms: &[u8], locals: usize) -> FunctionRef {
        let function = self.declare(name, parms, locals);
        self.begin(function);
        function
    }

    pub fn builtin(&mut self, name: &str, number: usize) -> FunctionRef {
        self.push_function(name, Function {
            first_statement: -(number as i32),
            name: BString::from(name),
            ..Function::default()
        })
    }

    pub fn emit(&mut self, op: Op, a: i32, b: i32, c: i32) -> usize {
        self.emit_raw(op as u16, a, b, c)
    }

    pub fn emit_raw(&mut self, op: u16, a: i32, b: i32, c: i32) -> usize {
        self.statements.push(Statement { op, a, b, c });
        self.statements.len() - 1
    }

    /// The index of the next statement.
    pub fn here(&self) -> usize { self.statements.len() }

    /// Point the branch at `statement` to `target`.
    pub fn patch(&mut self, statement: usize, target: usize) {
        let statement = &mut self.statements[statement];
        match Op::from_u16(statement.op) {
            Some(Op::Goto) => statement.a = target as i32,
            _ => statement.b = target as i32,
        }
    }

    pub fn finish(self) -> Result<Program, LoadError> {
        let program = Program {
            name: self.name,
            statements: self.statements,
            functions: self.functions,
            globals: self.globals,
            lines: Vec::new(),
            global_defs: self.global_defs,
            field_defs: self.field_defs,
            strings: self.strings,
            entity_fields: self.entity_fields,
            crc: 0,
        };
        program.verify()?;
        Ok(program)
    }

    fn push_function(&mut self, name: &str, function: Function) -> FunctionRef {
        let id = self.functions.len() as FunctionId;
        let parm_start = function.parm_start as i32;
        self.functions.push(function);

        let global = self.constant(Cell::from_int(id));
        self.define(def_type::FUNCTION, global, name);
        FunctionRef { id, global, parm_start }
    }

    fn define(&mut self, ty: u16, ofs: i32, name: &str) {
        self.global_defs.push(Def { ty, ofs: ofs as usize, name: BString::from(name) });
    }
}
