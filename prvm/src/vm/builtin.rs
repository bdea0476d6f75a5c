use bstr::{BStr, BString};

use crate::vm::{Cell, Entities, Error, ErrorKind, FunctionId, Program, Profile, Thread, Vector};

/// A host function callable from QuakeC.
///
/// Arguments are read from the parameter globals and the result left in the return globals,
/// both through the `Context`.
pub type Builtin<W> = fn(&mut Context<'_, W>) -> Result<(), ErrorKind>;

/// Host functions, indexed by builtin number.
pub struct Builtins<W> {
    table: Vec<Option<Builtin<W>>>,
}

impl<W> Default for Builtins<W> {
    fn default() -> Self { Builtins { table: Vec::new() } }
}

impl<W> Builtins<W> {
    pub fn new() -> Self { Self::default() }

    /// Install `builtin` as number `number`, returning what it replaced.
    pub fn register(&mut self, number: usize, builtin: Builtin<W>) -> Option<Builtin<W>> {
        if number >= self.table.len() {
            self.table.resize(number + 1, None);
        }
        self.table[number].replace(builtin)
    }

    pub fn get(&self, number: usize) -> Option<Builtin<W>> {
        self.table.get(number).copied().flatten()
    }
}

impl<W> FromIterator<(usize, Builtin<W>)> for Builtins<W> {
    fn from_iter<T: IntoIterator<Item = (usize, Builtin<W>)>>(iter: T) -> Self {
        let mut builtins = Builtins::new();
        for (number, builtin) in iter {
            builtins.register(number, builtin);
        }
        builtins
    }
}

/// What a builtin can see of the running program.
pub struct Context<'a, W> {
    pub program: &'a mut Program,
    pub world: &'a mut W,
    pub(crate) thread: &'a mut Thread,
    pub(crate) builtins: &'a Builtins<W>,
}

impl<W: Entities> Context<'_, W> {
    /// The number of arguments the caller passed.
    pub fn argc(&self) -> usize { self.thread.argc }

    /// The function that made the call.
    pub fn caller(&self) -> FunctionId { self.thread.stack.current() }

    pub fn profile(&self) -> &Profile { &self.thread.profile }

    pub fn float(&self, parm: usize) -> f32 { self.program.parm(parm).as_float() }

    pub fn vector(&self, parm: usize) -> Vector { self.program.parm_vector(parm) }

    pub fn entity(&self, parm: usize) -> i32 { self.program.parm(parm).as_entity() }

    pub fn function(&self, parm: usize) -> FunctionId { self.program.parm(parm).as_function() }

    pub fn string(&self, parm: usize) -> &BStr {
        self.program.string(self.program.parm(parm).as_string())
    }

    pub fn return_float(&mut self, value: f32) { self.program.set_return(value) }

    pub fn return_vector(&mut self, value: Vector) { self.program.set_return_vector(value) }

    pub fn return_entity(&mut self, entity: i32) { self.program.set_return(Cell::from_int(entity)) }

    /// Return a new engine string.
    pub fn return_string(&mut self, value: impl Into<BString>) {
        let handle = self.program.strings.alloc(value);
        self.program.set_return(Cell::from_int(handle));
    }

    /// Run another function to completion before this builtin returns.
    ///
    /// The nested invocation clobbers the parameter and return globals, so read arguments first.
    pub fn execute(&mut self, function: FunctionId) -> Result<(), Error> {
        let argc = self.thread.argc;
        let result = self.thread.execute_program(self.program, self.world, self.builtins, function);
        self.thread.argc = argc;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::EdictStore;

    fn one(cx: &mut Context<'_, EdictStore>) -> Result<(), ErrorKind> {
        cx.return_float(1.0);
        Ok(())
    }

    fn two(cx: &mut Context<'_, EdictStore>) -> Result<(), ErrorKind> {
        cx.return_float(2.0);
        Ok(())
    }

    #[test]
    fn register() {
        let mut builtins: Builtins<EdictStore> = [(1, one as Builtin<_>)].into_iter().collect();
        assert!(builtins.get(0).is_none());
        assert!(builtins.get(1).is_some());
        assert!(builtins.get(5).is_none());

        assert!(builtins.register(5, two).is_none());
        assert!(builtins.register(1, two).is_some());
        assert!(builtins.get(5).is_some());
    }
}
