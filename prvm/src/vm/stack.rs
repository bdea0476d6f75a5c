use crate::vm::{Cell, Function, FunctionId, ErrorKind};
use crate::vm::program::{ofs_parm, MAX_PARMS};

/// The frames and saved locals of one thread.
///
/// Entering a function saves the globals its locals occupy, then copies its arguments out of the
/// parameter slots. Leaving restores the saved globals, so recursion sees its own locals.
pub(crate) struct CallStack {
    frames: Vec<Frame>,
    locals: Vec<Cell>,
    current: FunctionId,
    max_depth: usize,
    local_limit: usize,
}

#[derive(Copy, Clone, Debug)]
struct Frame {
    /// The function to return to.
    caller: FunctionId,
    /// The statement that made the call, or `None` for an entry from the host.
    call_site: Option<usize>,
}

impl CallStack {
    pub(crate) fn new(max_depth: usize, local_limit: usize) -> CallStack {
        CallStack { frames: Vec::new(), locals: Vec::new(), current: 0, max_depth, local_limit }
    }

    pub(crate) fn depth(&self) -> usize { self.frames.len() }

    pub(crate) fn current(&self) -> FunctionId { self.current }

    pub(crate) fn locals_used(&self) -> usize { self.locals.len() }

    /// Push a frame for `function` and return its first statement.
    pub(crate) fn enter(
        &mut self, globals: &mut [Cell], functions: &[Function], function: FunctionId,
        call_site: Option<usize>,
    ) -> Result<usize, ErrorKind> {
        let f = &functions[function as usize];

        if self.frames.len() >= self.max_depth {
            return Err(ErrorKind::StackOverflow(self.frames.len()));
        }
        let (used, size) = (self.locals_used(), f.frame_size());
        if used + size > self.local_limit {
            return Err(ErrorKind::LocalStackOverflow { used, needed: size });
        }

        self.locals.extend_from_slice(&globals[f.parm_start..f.parm_start + size]);

        let mut ofs = f.parm_start;
        for (parm, &width) in f.parm_size.iter().enumerate().take(f.num_parms.min(MAX_PARMS)) {
            let width = width as usize;
            globals.copy_within(ofs_parm(parm)..ofs_parm(parm) + width, ofs);
            ofs += width;
        }

        self.frames.push(Frame { caller: self.current, call_site });
        self.current = function;
        Ok(f.first_statement as usize)
    }

    /// Pop the current frame, returning the statement that called it.
    pub(crate) fn leave(&mut self, globals: &mut [Cell], functions: &[Function]) -> Option<usize> {
        let frame = self.frames.pop()?;
        let f = &functions[self.current as usize];
        let size = f.frame_size();

        let base = self.locals.len() - size;
        globals[f.parm_start..f.parm_start + size].copy_from_slice(&self.locals[base..]);
        self.locals.truncate(base);

        self.current = frame.caller;
        frame.call_site
    }

    /// Pop every frame above `depth`, restoring their callers' locals.
    pub(crate) fn unwind(&mut self, depth: usize, globals: &mut [Cell], functions: &[Function]) {
        while self.frames.len() > depth {
            self.leave(globals, functions);
        }
    }

    /// The active frames, innermost first, given the statement the current function is at.
    pub(crate) fn backtrace(&self, statement: Option<usize>) -> Vec<(FunctionId, Option<usize>)> {
        let mut frames = Vec::with_capacity(self.frames.len());
        let mut function = self.current;
        let mut statement = statement;
        for frame in self.frames.iter().rev() {
            frames.push((function, statement));
            function = frame.caller;
            statement = frame.call_site;
        }
        frames
    }
}
