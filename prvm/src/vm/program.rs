use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use crate::vm::{self, Cell, Op, Operand, Statement, Strings, Vector, LoadError};

/// Function numbers, as stored in function-typed cells. Function 0 is the null function.
pub type FunctionId = i32;

pub const OFS_NULL: usize = 0;
pub const OFS_RETURN: usize = 1;
pub const OFS_PARM0: usize = 4;
pub const MAX_PARMS: usize = 8;
/// Cells per parameter slot, enough for a vector.
pub const PARM_SIZE: usize = 3;
/// The first global not reserved for the null cell, the return value, and parameters.
pub const RESERVED_OFS: usize = OFS_PARM0 + MAX_PARMS * PARM_SIZE;

pub const fn ofs_parm(parm: usize) -> usize { OFS_PARM0 + parm * PARM_SIZE }

#[derive(Clone, Default, Debug)]
pub struct Function {
    /// Negative for builtins, which are numbered by `-first_statement`.
    pub first_statement: i32,
    pub parm_start: usize,
    pub locals: usize,
    pub num_parms: usize,
    pub parm_size: [u8; MAX_PARMS],
    pub name: BString,
    pub file: BString,
}

impl Function {
    pub fn builtin(&self) -> Option<usize> {
        if self.first_statement < 0 {
            Some(-(self.first_statement as i64) as usize)
        } else {
            None
        }
    }

    /// The number of global cells the function's parameters and locals occupy.
    pub fn frame_size(&self) -> usize {
        let parms: usize = self.parm_size[..self.num_parms.min(MAX_PARMS)].iter()
            .map(|&size| size as usize)
            .sum();
        usize::max(self.locals, parms)
    }
}

#[derive(Clone, Default, Debug)]
pub struct Def {
    pub ty: u16,
    pub ofs: usize,
    pub name: BString,
}

/// A loaded, verified program.
///
/// Every global operand of every statement has been checked against the size of the global
/// array, and every branch target and function entry point against the statement count, so
/// the interpreter indexes them without further checks. The global array can be mutated but
/// not resized.
pub struct Program {
    pub name: String,
    pub(crate) statements: Vec<Statement>,
    pub(crate) functions: Vec<Function>,
    pub(crate) globals: Vec<Cell>,
    pub(crate) lines: Vec<i32>,
    pub global_defs: Vec<Def>,
    pub field_defs: Vec<Def>,
    pub strings: Strings,
    pub entity_fields: usize,
    pub crc: i32,
}

impl Program {
    /// Convert and verify a raw progs image, with optional line numbers.
    pub fn from_progs(
        name: &str, progs: &progs::Progs, lines: Option<&progs::Lines>
    ) -> Result<Program, LoadError> {
        let strings = Strings::new(progs.strings.clone());
        let string = |handle: i32| strings.get(handle).map(BString::from).unwrap_or_default();

        let statements = progs.statements.iter().enumerate()
            .map(|(index, &statement)| convert(index, statement))
            .collect();

        let functions = progs.functions.iter().enumerate()
            .map(|(id, function)| {
                let parm_start = usize::try_from(function.parm_start);
                let locals = usize::try_from(function.locals);
                let (Ok(parm_start), Ok(locals)) = (parm_start, locals) else {
                    return Err(LoadError::Locals { function: id });
                };
                Ok(Function {
                    first_statement: function.first_statement,
                    parm_start,
                    locals,
                    num_parms: function.num_parms.max(0) as usize,
                    parm_size: function.parm_size,
                    name: string(function.name),
                    file: string(function.file),
                })
            })
            .collect::<Result<_, _>>()?;

        let defs = |defs: &[progs::Def]| -> Vec<Def> {
            defs.iter()
                .map(|def| Def { ty: def.ty, ofs: def.ofs as usize, name: string(def.name) })
                .collect()
        };
        let global_defs = defs(&progs.global_defs);
        let field_defs = defs(&progs.field_defs);

        let program = Program {
            name: name.to_string(),
            statements,
            functions,
            globals: progs.globals.iter().map(|&bits| Cell::from_bits(bits)).collect(),
            lines: lines.map(|lines| lines.lines.clone()).unwrap_or_default(),
            global_defs,
            field_defs,
            strings,
            entity_fields: progs.entity_fields.max(0) as usize,
            crc: progs.crc,
        };
        program.verify()?;
        Ok(program)
    }

    /// Check that every statement and function only refers to globals and statements that exist.
    pub fn verify(&self) -> Result<(), LoadError> {
        let globals = self.globals.len();
        if globals < RESERVED_OFS {
            return Err(LoadError::Reserved(globals));
        }

        for (statement, &Statement { op, a, b, c }) in self.statements.iter().enumerate() {
            let Some(op) = Op::from_u16(op) else { continue };
            for ((operand, value), name) in op.operands().into_iter().zip([a, b, c]).zip(['a', 'b', 'c']) {
                let valid = match operand {
                    Operand::Unused => true,
                    Operand::Global => value >= 0 && (value as usize) < globals,
                    Operand::Vector => value >= 0 && (value as usize) + 3 <= globals,
                    Operand::Array => value >= 1 && (value as usize) < globals,
                    Operand::Target => {
                        if value < 0 || value as usize >= self.statements.len() {
                            return Err(LoadError::Target { statement, target: value });
                        }
                        true
                    }
                };
                if !valid {
                    return Err(LoadError::Operand { statement, op, operand: name, value });
                }
            }
        }

        if let Some(last) = self.statements.len().checked_sub(1) {
            let op = Op::from_u16(self.statements[last].op);
            if !op.is_some_and(Op::is_terminator) {
                return Err(LoadError::Fallthrough(last));
            }
        }

        for (id, function) in self.functions.iter().enumerate() {
            let first_statement = function.first_statement;
            if first_statement >= 0 && first_statement as usize >= self.statements.len() && id != 0 {
                return Err(LoadError::Entry { function: id, first_statement });
            }
            if function.parm_size.iter().any(|&size| size as usize > PARM_SIZE) {
                return Err(LoadError::Locals { function: id });
            }
            let end = function.parm_start.checked_add(function.frame_size());
            if !end.is_some_and(|end| end <= globals) {
                return Err(LoadError::Locals { function: id });
            }
        }

        Ok(())
    }

    pub fn statements(&self) -> &[Statement] { &self.statements }

    pub fn functions(&self) -> &[Function] { &self.functions }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(usize::try_from(id).ok()?)
    }

    pub fn function_name(&self, id: FunctionId) -> &BStr {
        self.function(id).map_or(BStr::new("<invalid function>"), |function| function.name.as_bstr())
    }

    /// The source line of a statement, if line numbers were loaded.
    pub fn line(&self, statement: usize) -> Option<i32> {
        self.lines.get(statement).copied()
    }

    pub fn find_function(&self, name: &str) -> Option<FunctionId> {
        let id = self.functions.iter().position(|function| function.name == name)?;
        Some(id as FunctionId)
    }

    pub fn find_global(&self, name: &str) -> Option<&Def> {
        self.global_defs.iter().find(|def| def.name == name)
    }

    pub fn find_field(&self, name: &str) -> Option<&Def> {
        self.field_defs.iter().find(|def| def.name == name)
    }

    /// The name of the field at an entity offset, for diagnostics.
    pub fn field_name(&self, ofs: usize) -> &BStr {
        field_name(&self.field_defs, ofs)
    }

    pub fn globals(&self) -> &[Cell] { &self.globals }

    pub fn globals_mut(&mut self) -> &mut [Cell] { &mut self.globals }

    pub fn parm(&self, parm: usize) -> Cell { self.globals[ofs_parm(parm)] }

    pub fn parm_vector(&self, parm: usize) -> Vector { vm::load_vector(&self.globals[ofs_parm(parm)..]) }

    pub fn set_parm(&mut self, parm: usize, value: impl Into<Cell>) {
        self.globals[ofs_parm(parm)] = value.into();
    }

    pub fn set_parm_vector(&mut self, parm: usize, value: Vector) {
        vm::store_vector(&mut self.globals[ofs_parm(parm)..], value);
    }

    pub fn return_value(&self) -> Cell { self.globals[OFS_RETURN] }

    pub fn return_vector(&self) -> Vector { vm::load_vector(&self.globals[OFS_RETURN..]) }

    pub fn set_return(&mut self, value: impl Into<Cell>) {
        self.globals[OFS_RETURN] = value.into();
    }

    pub fn set_return_vector(&mut self, value: Vector) {
        vm::store_vector(&mut self.globals[OFS_RETURN..], value);
    }

    /// Resolve a string handle, reading invalid handles as the empty string.
    pub fn string(&self, handle: i32) -> &BStr {
        string(&self.strings, &self.name, handle)
    }

    pub fn disassemble(&self, statement: usize) -> Disassembly<'_> {
        Disassembly { program: self, statement }
    }
}

pub(crate) fn string<'a>(strings: &'a Strings, program: &str, handle: i32) -> &'a BStr {
    strings.get(handle).unwrap_or_else(|| {
        tracing::warn!(program, handle, "invalid string handle");
        BStr::new("")
    })
}

pub(crate) fn field_name(field_defs: &[Def], ofs: usize) -> &BStr {
    field_defs.iter()
        .find(|def| def.ofs == ofs)
        .map_or(BStr::new("?"), |def| def.name.as_bstr())
}

/// Resolve a statement's relative branch offsets and widen its operands.
///
/// Global operands are unsigned offsets; everything else is sign-extended.
fn convert(index: usize, statement: progs::Statement) -> Statement {
    let progs::Statement { op, a, b, c } = statement;
    let operands = match Op::from_u16(op) {
        Some(op) => op.operands(),
        None => [Operand::Unused; 3],
    };
    let [a, b, c] = [a, b, c].map(|value| value as i32);
    let widen = |operand: Operand, value: i32| match operand {
        Operand::Global | Operand::Vector | Operand::Array => value as u16 as i32,
        Operand::Target => index as i32 + value,
        Operand::Unused => value,
    };
    Statement { op, a: widen(operands[0], a), b: widen(operands[1], b), c: widen(operands[2], c) }
}

/// One statement formatted with its operands.
pub struct Disassembly<'a> {
    program: &'a Program,
    statement: usize,
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Disassembly { program, statement } = *self;
        let Some(&Statement { op, a, b, c }) = program.statements.get(statement) else {
            return write!(f, "{:>6}: <out of range>", statement);
        };
        let Some(op) = Op::from_u16(op) else {
            return write!(f, "{:>6}: <bad opcode {}> {} {} {}", statement, op, a, b, c);
        };

        write!(f, "{:>6}: {:<13}", statement, op)?;
        for (operand, value) in op.operands().into_iter().zip([a, b, c]) {
            match operand {
                Operand::Unused => {}
                Operand::Target => write!(f, " -> {}", value)?,
                Operand::Global | Operand::Vector | Operand::Array => {
                    let def = program.global_defs.iter()
                        .find(|def| def.ofs == value as usize && !def.name.is_empty());
                    match def {
                        Some(def) => write!(f, " {}", def.name)?,
                        None => write!(f, " #{}", value)?,
                    }
                    let cell = program.globals[value as usize];
                    write!(f, "({:?})", cell.as_float())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> progs::Progs {
        let mut progs = progs::Progs::default();
        progs.version = progs::PROG_VERSION;
        progs.strings = BString::from(&b"\0main\0x\0"[..]);
        progs.globals = vec![0; RESERVED_OFS + 2];
        progs.statements = vec![
            progs::Statement { op: Op::IfNot as u16, a: 28, b: 2, c: 0 },
            progs::Statement { op: Op::Goto as u16, a: -1, b: 0, c: 0 },
            progs::Statement { op: Op::Done as u16, a: 0, b: 0, c: 0 },
        ];
        progs.functions = vec![
            progs::Function::default(),
            progs::Function { parm_start: 28, locals: 2, name: 1, ..Default::default() },
            progs::Function { first_statement: -3, name: 6, ..Default::default() },
        ];
        progs.global_defs = vec![progs::Def { ty: progs::def_type::FLOAT, ofs: 28, name: 6 }];
        progs
    }

    #[test]
    fn load() -> Result<(), LoadError> {
        let program = Program::from_progs("test", &image(), None)?;

        assert_eq!(program.statements()[0].b, 2);
        assert_eq!(program.statements()[1].a, 0);
        assert_eq!(program.find_function("main"), Some(1));
        assert_eq!(program.functions()[2].builtin(), Some(3));
        assert_eq!(program.functions()[1].builtin(), None);
        assert_eq!(program.find_global("x").map(|def| def.ofs), Some(28));
        assert!(program.find_field("x").is_none());
        Ok(())
    }

    #[test]
    fn unsigned_operands() {
        let mut progs = image();
        progs.statements[0].a = -1;
        let result = Program::from_progs("test", &progs, None);
        assert!(matches!(result, Err(LoadError::Operand { statement: 0, operand: 'a', value: 65535, .. })));
    }

    #[test]
    fn targets() {
        let mut progs = image();
        progs.statements[1].a = -2;
        let result = Program::from_progs("test", &progs, None);
        assert!(matches!(result, Err(LoadError::Target { statement: 1, target: -1 })));
    }

    #[test]
    fn fallthrough() {
        let mut progs = image();
        progs.statements.pop();
        progs.statements[0].b = 1;
        let result = Program::from_progs("test", &progs, None);
        assert!(matches!(result, Ok(_)));

        progs.statements[1] = progs::Statement { op: Op::AddF as u16, a: 28, b: 28, c: 28 };
        let result = Program::from_progs("test", &progs, None);
        assert!(matches!(result, Err(LoadError::Fallthrough(1))));
    }

    #[test]
    fn locals() {
        let mut progs = image();
        progs.functions[1].locals = 3;
        let result = Program::from_progs("test", &progs, None);
        assert!(matches!(result, Err(LoadError::Locals { function: 1 })));
    }

    #[test]
    fn disassemble() -> Result<(), LoadError> {
        let program = Program::from_progs("test", &image(), None)?;
        assert_eq!(program.disassemble(0).to_string(), "     0: IFNOT         x(0.0) -> 2");
        assert_eq!(program.disassemble(1).to_string(), "     1: GOTO          -> 0");
        Ok(())
    }
}
