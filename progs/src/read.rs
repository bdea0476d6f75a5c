use std::io::{self, Read};
use bstr::BString;
use thiserror::Error;

use crate::{Progs, Statement, Def, Function, Lines, PROG_VERSION};

const STATEMENT_SIZE: usize = 8;
const DEF_SIZE: usize = 8;
const FUNCTION_SIZE: usize = 36;
const GLOBAL_SIZE: usize = 4;

const LNO_MAGIC: u32 = u32::from_le_bytes(*b"LNOF");
const LNO_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("wrong version number ({0} should be 6)")]
    Version(i32),
    #[error("{0} lump is out of bounds")]
    Lump(&'static str),
    #[error("not a line number file")]
    LinesMagic,
    #[error("line number file does not match the progs it was loaded for")]
    LinesMismatch,
}

#[derive(Copy, Clone)]
struct Lump {
    ofs: i32,
    num: i32,
}

/// Read a version 6 `progs.dat` image.
pub fn read_progs(data: &[u8], progs: &mut Progs) -> Result<(), Error> {
    let read = &mut { data };

    read.read_i32(&mut progs.version)?;
    if progs.version != PROG_VERSION {
        return Err(Error::Version(progs.version));
    }
    read.read_i32(&mut progs.crc)?;

    let statements = read.next_lump()?;
    let global_defs = read.next_lump()?;
    let field_defs = read.next_lump()?;
    let functions = read.next_lump()?;
    let strings = read.next_lump()?;
    let globals = read.next_lump()?;
    read.read_i32(&mut progs.entity_fields)?;

    // statements

    let read = &mut lump(data, statements, STATEMENT_SIZE, "statements")?;
    progs.statements.reserve(statements.num as usize);
    while !read.is_empty() {
        let mut statement = Statement::default();
        read.read_u16(&mut statement.op)?;
        read.read_i16(&mut statement.a)?;
        read.read_i16(&mut statement.b)?;
        read.read_i16(&mut statement.c)?;
        progs.statements.push(statement);
    }

    // definitions

    let read = &mut lump(data, global_defs, DEF_SIZE, "globaldefs")?;
    read_defs(read, &mut progs.global_defs)?;

    let read = &mut lump(data, field_defs, DEF_SIZE, "fielddefs")?;
    read_defs(read, &mut progs.field_defs)?;

    // functions

    let read = &mut lump(data, functions, FUNCTION_SIZE, "functions")?;
    progs.functions.reserve(functions.num as usize);
    while !read.is_empty() {
        let mut function = Function::default();
        read.read_i32(&mut function.first_statement)?;
        read.read_i32(&mut function.parm_start)?;
        read.read_i32(&mut function.locals)?;
        read.read_i32(&mut function.profile)?;
        read.read_i32(&mut function.name)?;
        read.read_i32(&mut function.file)?;
        read.read_i32(&mut function.num_parms)?;
        read.read_exact(&mut function.parm_size)?;
        progs.functions.push(function);
    }

    // strings and globals

    progs.strings = BString::from(lump(data, strings, 1, "strings")?);

    let read = &mut lump(data, globals, GLOBAL_SIZE, "globals")?;
    progs.globals.reserve(globals.num as usize);
    while !read.is_empty() {
        progs.globals.push(read.next_u32()?);
    }

    Ok(())
}

/// Read a `.lno` file belonging to `progs`.
pub fn read_lines(data: &[u8], progs: &Progs, lines: &mut Lines) -> Result<(), Error> {
    let read = &mut { data };

    if read.next_u32()? != LNO_MAGIC {
        return Err(Error::LinesMagic);
    }
    if read.next_i32()? != LNO_VERSION {
        return Err(Error::LinesMagic);
    }

    let counts = [
        progs.global_defs.len(),
        progs.globals.len(),
        progs.field_defs.len(),
        progs.statements.len(),
    ];
    for count in counts {
        if read.next_i32()? as usize != count {
            return Err(Error::LinesMismatch);
        }
    }

    lines.lines.clear();
    lines.lines.reserve(progs.statements.len());
    for _ in 0..progs.statements.len() {
        lines.lines.push(read.next_i32()?);
    }

    Ok(())
}

fn read_defs(read: &mut &[u8], defs: &mut Vec<Def>) -> Result<(), Error> {
    defs.reserve(read.len() / DEF_SIZE);
    while !read.is_empty() {
        let mut def = Def::default();
        read.read_u16(&mut def.ty)?;
        read.read_u16(&mut def.ofs)?;
        read.read_i32(&mut def.name)?;
        defs.push(def);
    }
    Ok(())
}

fn lump<'a>(data: &'a [u8], lump: Lump, size: usize, name: &'static str) -> Result<&'a [u8], Error> {
    let Lump { ofs, num } = lump;
    if ofs < 0 || num < 0 {
        return Err(Error::Lump(name));
    }
    let start = ofs as usize;
    let end = (num as usize).checked_mul(size)
        .and_then(|len| start.checked_add(len))
        .ok_or(Error::Lump(name))?;
    data.get(start..end).ok_or(Error::Lump(name))
}

trait ProgsRead {
    fn read_u16(&mut self, buf: &mut u16) -> io::Result<usize>;
    fn read_i16(&mut self, buf: &mut i16) -> io::Result<usize>;
    fn read_u32(&mut self, buf: &mut u32) -> io::Result<usize>;
    fn read_i32(&mut self, buf: &mut i32) -> io::Result<usize>;

    fn next_u32(&mut self) -> io::Result<u32> {
        let mut buf = 0;
        self.read_u32(&mut buf)?;
        Ok(buf)
    }

    fn next_i32(&mut self) -> io::Result<i32> {
        let mut buf = 0;
        self.read_i32(&mut buf)?;
        Ok(buf)
    }

    fn next_lump(&mut self) -> io::Result<Lump> {
        let ofs = self.next_i32()?;
        let num = self.next_i32()?;
        Ok(Lump { ofs, num })
    }
}

impl<R: Read> ProgsRead for R {
    fn read_u16(&mut self, buf: &mut u16) -> io::Result<usize> {
        let mut bytes = [0u8; 2];
        self.read_exact(&mut bytes)?;
        *buf = u16::from_le_bytes(bytes);
        Ok(bytes.len())
    }

    fn read_i16(&mut self, buf: &mut i16) -> io::Result<usize> {
        let mut bytes = [0u8; 2];
        self.read_exact(&mut bytes)?;
        *buf = i16::from_le_bytes(bytes);
        Ok(bytes.len())
    }

    fn read_u32(&mut self, buf: &mut u32) -> io::Result<usize> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        *buf = u32::from_le_bytes(bytes);
        Ok(bytes.len())
    }

    fn read_i32(&mut self, buf: &mut i32) -> io::Result<usize> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        *buf = i32::from_le_bytes(bytes);
        Ok(bytes.len())
    }
}
