use tracing::{error, trace, warn};

use crate::vm::{self, Builtins, Cell, Config, Context, Def, Entities, Error, ErrorKind, Frame};
use crate::vm::{FunctionId, Op, Profile, Program, Statement, Vector, WorldWrites};
use crate::vm::address::{self, Bounds};
use crate::vm::profile::Runaway;
use crate::vm::program::{field_name, string, OFS_RETURN, MAX_PARMS};
use crate::vm::stack::CallStack;

/// A QuakeC interpreter thread.
///
/// The thread owns the call stack, the profile and the configuration. One thread can run any
/// number of invocations, nested ones included, against programs and entity stores it borrows.
pub struct Thread {
    pub(crate) stack: CallStack,
    pub(crate) profile: Profile,
    pub(crate) config: Config,
    pub(crate) argc: usize,
}

/// Where execution goes after a statement.
enum Flow {
    Next,
    Jump(usize),
    Exit,
}

impl Default for Thread {
    fn default() -> Self { Thread::new(Config::default()) }
}

impl Thread {
    pub fn new(config: Config) -> Thread {
        let stack = CallStack::new(config.max_depth, config.local_stack_size);
        Thread { stack, profile: Profile::default(), config, argc: 0 }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn profile(&self) -> &Profile { &self.profile }

    pub fn profile_mut(&mut self) -> &mut Profile { &mut self.profile }

    /// The number of active call frames.
    pub fn depth(&self) -> usize { self.stack.depth() }

    /// Run `function` to completion.
    ///
    /// Arguments are passed in the parameter globals and the result is left in the return
    /// globals. On error, every frame this invocation pushed is popped and the locals it saved
    /// are restored.
    pub fn execute_program<W: Entities>(
        &mut self,
        program: &mut Program, world: &mut W, builtins: &Builtins<W>,
        function: FunctionId
    ) -> Result<(), Error> {
        self.profile.fit(program, &self.config);

        let builtin = match function {
            0 => Err(ErrorKind::NullFunction),
            _ => program.function(function)
                .map(vm::Function::builtin)
                .ok_or(ErrorKind::InvalidFunction(function)),
        };
        let builtin = builtin.map_err(|kind| self.error(program, None, kind))?;

        if let Some(number) = builtin {
            self.argc = program.functions[function as usize].num_parms.min(MAX_PARMS);
            self.profile.call(program, &self.config, function);
            return self.builtin(program, world, builtins, number)
                .map_err(|kind| self.error(program, None, kind));
        }

        let depth = self.stack.depth();
        let result = self.run(program, world, builtins, function, depth);
        if result.is_err() {
            self.stack.unwind(depth, &mut program.globals, &program.functions);
        }
        result
    }

    fn run<W: Entities>(
        &mut self,
        program: &mut Program, world: &mut W, builtins: &Builtins<W>,
        function: FunctionId, exit_depth: usize
    ) -> Result<(), Error> {
        let mut runaway = Runaway::new(self.config.runaway_limit);
        let mut bounds = Bounds::of(world);

        self.profile.call(program, &self.config, function);
        let mut statement = self.stack.enter(&mut program.globals, &program.functions, function, None)
            .map_err(|kind| self.error(program, None, kind))?;

        loop {
            self.profile.step(program, &self.config, self.stack.current(), statement);
            if self.config.trace {
                trace!(
                    target: "prvm::trace",
                    program = %program.name, depth = self.stack.depth(),
                    "{}", program.disassemble(statement)
                );
            }

            let flow = self.step(program, world, builtins, &mut bounds, &mut runaway, statement, exit_depth);
            match flow {
                Ok(Flow::Next) => statement += 1,
                Ok(Flow::Jump(target)) => statement = target,
                Ok(Flow::Exit) => return Ok(()),
                Err(kind) => return Err(self.error(program, Some(statement), kind)),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn step<W: Entities>(
        &mut self,
        program: &mut Program, world: &mut W, builtins: &Builtins<W>,
        bounds: &mut Bounds, runaway: &mut Runaway,
        statement: usize, exit_depth: usize
    ) -> Result<Flow, ErrorKind> {
        let Statement { op, a, b, c } = program.statements[statement];
        let op = Op::from_u16(op).ok_or(ErrorKind::BadOpcode(op))?;
        let (a, b, c) = (a as usize, b as usize, c as usize);

        let g = &mut program.globals[..];
        match op {
            Op::Done | Op::Return => {
                // In order: `DONE 0` overlaps the return slot and must zero it.
                for i in 0..3 {
                    g[OFS_RETURN + i] = g[a + i];
                }
                let call_site = self.stack.leave(g, &program.functions);
                return Ok(match call_site {
                    Some(call_site) if self.stack.depth() > exit_depth => Flow::Jump(call_site + 1),
                    _ => Flow::Exit,
                });
            }

            Op::MulF => g[c] = Cell::from(float(g, a) * float(g, b)),
            Op::MulV => {
                let (x, y) = (vector(g, a), vector(g, b));
                g[c] = Cell::from(x[0] * y[0] + x[1] * y[1] + x[2] * y[2]);
            }
            Op::MulFV => {
                let (x, y) = (float(g, a), vector(g, b));
                set_vector(g, c, y.map(|y| x * y));
            }
            Op::MulVF => {
                let (x, y) = (vector(g, a), float(g, b));
                set_vector(g, c, x.map(|x| x * y));
            }
            Op::DivF => g[c] = Cell::from(self.divide(&program.name, float(g, a), float(g, b))),
            Op::AddF => g[c] = Cell::from(float(g, a) + float(g, b)),
            Op::AddV => {
                let value = zip(vector(g, a), vector(g, b), |x, y| x + y);
                set_vector(g, c, value);
            }
            Op::SubF => g[c] = Cell::from(float(g, a) - float(g, b)),
            Op::SubV => {
                let value = zip(vector(g, a), vector(g, b), |x, y| x - y);
                set_vector(g, c, value);
            }

            Op::EqF => g[c] = Cell::from(float(g, a) == float(g, b)),
            Op::EqV => g[c] = Cell::from(vector(g, a) == vector(g, b)),
            Op::EqS => {
                let x = string(&program.strings, &program.name, g[a].as_string());
                let y = string(&program.strings, &program.name, g[b].as_string());
                g[c] = Cell::from(x == y);
            }
            Op::EqE | Op::EqFnc => g[c] = Cell::from(g[a].as_int() == g[b].as_int()),
            Op::NeF => g[c] = Cell::from(float(g, a) != float(g, b)),
            Op::NeV => g[c] = Cell::from(vector(g, a) != vector(g, b)),
            Op::NeS => {
                let x = string(&program.strings, &program.name, g[a].as_string());
                let y = string(&program.strings, &program.name, g[b].as_string());
                g[c] = Cell::from(x != y);
            }
            Op::NeE | Op::NeFnc => g[c] = Cell::from(g[a].as_int() != g[b].as_int()),

            Op::Le => g[c] = Cell::from(float(g, a) <= float(g, b)),
            Op::Ge => g[c] = Cell::from(float(g, a) >= float(g, b)),
            Op::Lt => g[c] = Cell::from(float(g, a) < float(g, b)),
            Op::Gt => g[c] = Cell::from(float(g, a) > float(g, b)),

            Op::LoadF | Op::LoadS | Op::LoadEnt | Op::LoadFld | Op::LoadFnc => {
                let (entity, field) = bounds.field(g[a].as_entity(), g[b].as_field(), 1)?;
                g[c] = world.field_block(entity)[field];
            }
            Op::LoadV => {
                let (entity, field) = bounds.field(g[a].as_entity(), g[b].as_field(), 3)?;
                g[c..c + 3].copy_from_slice(&world.field_block(entity)[field..field + 3]);
            }
            Op::Address => g[c] = Cell::from_int(bounds.address(g[a].as_entity(), g[b].as_field())?),

            Op::StoreF | Op::StoreS | Op::StoreEnt | Op::StoreFld | Op::StoreFnc => g[b] = g[a],
            Op::StoreV => g.copy_within(a..a + 3, b),

            Op::StorePF | Op::StorePS | Op::StorePEnt | Op::StorePFld | Op::StorePFnc => {
                let value = g[a];
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 1)?;
                cells[0] = value;
            }
            Op::StorePV => {
                let value = [g[a], g[a + 1], g[a + 2]];
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 3)?;
                cells.copy_from_slice(&value);
            }

            Op::NotF => g[c] = Cell::from(!g[a].is_true()),
            Op::NotV => g[c] = Cell::from(vector(g, a) == [0.0; 3]),
            Op::NotS => {
                let handle = g[a].as_string();
                let empty = handle == 0 || string(&program.strings, &program.name, handle).is_empty();
                g[c] = Cell::from(empty);
            }
            Op::NotEnt => g[c] = Cell::from(g[a].as_entity() == 0),
            Op::NotFnc => g[c] = Cell::from(g[a].as_function() == 0),

            Op::If => if g[a].is_true() {
                self.jump(program, runaway)?;
                return Ok(Flow::Jump(b));
            }
            Op::IfNot => if !g[a].is_true() {
                self.jump(program, runaway)?;
                return Ok(Flow::Jump(b));
            }
            Op::Goto => {
                self.jump(program, runaway)?;
                return Ok(Flow::Jump(a));
            }

            Op::Call0 | Op::Call1 | Op::Call2 | Op::Call3 | Op::Call4 |
            Op::Call5 | Op::Call6 | Op::Call7 | Op::Call8 => {
                let function = g[a].as_function();
                self.argc = op.call_args().unwrap_or(0);
                self.jump(program, runaway)?;
                return self.call(program, world, builtins, bounds, statement, function);
            }

            Op::State => {
                let state = self.config.state.ok_or(ErrorKind::OpNotSupported(op))?;
                let (Some(&this), Some(&time)) = (g.get(state.self_global), g.get(state.time_global)) else {
                    return Err(ErrorKind::OpNotSupported(op));
                };
                let this = this.as_entity();
                for field in [state.nextthink, state.frame, state.think] {
                    bounds.field(this, field as i32, 1)?;
                }
                let block = world.field_block_mut(this as usize);
                block[state.nextthink] = Cell::from(time.as_float() + 0.1);
                block[state.frame] = g[a];
                block[state.think] = g[b];
            }

            Op::And => g[c] = Cell::from(g[a].is_true() && g[b].is_true()),
            Op::Or => g[c] = Cell::from(g[a].is_true() || g[b].is_true()),
            Op::BitAnd => g[c] = Cell::from((float(g, a) as i32 & float(g, b) as i32) as f32),
            Op::BitOr => g[c] = Cell::from((float(g, a) as i32 | float(g, b) as i32) as f32),

            Op::MulStoreF => g[b] = Cell::from(float(g, b) * float(g, a)),
            Op::MulStoreV => {
                let x = float(g, a);
                let value = vector(g, b).map(|y| y * x);
                set_vector(g, b, value);
            }
            Op::MulStorePF => {
                let x = float(g, a);
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 1)?;
                cells[0] = Cell::from(cells[0].as_float() * x);
                g[c] = cells[0];
            }
            Op::MulStorePV => {
                let x = float(g, a);
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 3)?;
                let value = vm::load_vector(cells).map(|y| y * x);
                vm::store_vector(cells, value);
                set_vector(g, c, value);
            }
            Op::DivStoreF => g[b] = Cell::from(self.divide(&program.name, float(g, b), float(g, a))),
            Op::DivStorePF => {
                let x = float(g, a);
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 1)?;
                cells[0] = Cell::from(self.divide(&program.name, cells[0].as_float(), x));
                g[c] = cells[0];
            }
            Op::AddStoreF => g[b] = Cell::from(float(g, b) + float(g, a)),
            Op::AddStoreV => {
                let value = zip(vector(g, b), vector(g, a), |y, x| y + x);
                set_vector(g, b, value);
            }
            Op::AddStorePF => {
                let x = float(g, a);
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 1)?;
                cells[0] = Cell::from(cells[0].as_float() + x);
                g[c] = cells[0];
            }
            Op::AddStorePV => {
                let x = vector(g, a);
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 3)?;
                let value = zip(vm::load_vector(cells), x, |y, x| y + x);
                vm::store_vector(cells, value);
                set_vector(g, c, value);
            }
            Op::SubStoreF => g[b] = Cell::from(float(g, b) - float(g, a)),
            Op::SubStoreV => {
                let value = zip(vector(g, b), vector(g, a), |y, x| y - x);
                set_vector(g, b, value);
            }
            Op::SubStorePF => {
                let x = float(g, a);
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 1)?;
                cells[0] = Cell::from(cells[0].as_float() - x);
                g[c] = cells[0];
            }
            Op::SubStorePV => {
                let x = vector(g, a);
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 3)?;
                let value = zip(vm::load_vector(cells), x, |y, x| y - x);
                vm::store_vector(cells, value);
                set_vector(g, c, value);
            }

            Op::FetchGblF | Op::FetchGblS | Op::FetchGblE | Op::FetchGblFnc => {
                let ofs = address::indexed(g.len(), a, g[a - 1].as_int(), float(g, b), 1)?;
                g[c] = g[ofs];
            }
            Op::FetchGblV => {
                let ofs = address::indexed(g.len(), a, g[a - 1].as_int(), float(g, b), 3)?;
                g.copy_within(ofs..ofs + 3, c);
            }

            Op::BitSet => g[b] = Cell::from((float(g, b) as i32 | float(g, a) as i32) as f32),
            Op::BitSetP => {
                let mask = float(g, a) as i32;
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 1)?;
                cells[0] = Cell::from((cells[0].as_float() as i32 | mask) as f32);
            }
            Op::BitClr => g[b] = Cell::from((float(g, b) as i32 & !(float(g, a) as i32)) as f32),
            Op::BitClrP => {
                let mask = float(g, a) as i32;
                let cells = self.pointer(&program.name, &program.field_defs, bounds, world, g[b].as_int(), 1)?;
                cells[0] = Cell::from((cells[0].as_float() as i32 & !mask) as f32);
            }

            Op::ConvItoF => g[c] = Cell::from(g[a].as_int() as f32),
            Op::ConvFtoI => g[c] = Cell::from_int(float(g, a) as i32),
        }

        Ok(Flow::Next)
    }

    fn call<W: Entities>(
        &mut self,
        program: &mut Program, world: &mut W, builtins: &Builtins<W>,
        bounds: &mut Bounds, statement: usize, function: FunctionId
    ) -> Result<Flow, ErrorKind> {
        if function == 0 {
            return Err(ErrorKind::NullFunction);
        }
        let builtin = program.function(function)
            .ok_or(ErrorKind::InvalidFunction(function))?
            .builtin();

        self.profile.call(program, &self.config, function);
        match builtin {
            None => {
                let globals = &mut program.globals;
                let first = self.stack.enter(globals, &program.functions, function, Some(statement))?;
                Ok(Flow::Jump(first))
            }
            Some(number) => {
                self.builtin(program, world, builtins, number)?;
                *bounds = Bounds::of(world);
                Ok(Flow::Next)
            }
        }
    }

    fn builtin<W: Entities>(
        &mut self,
        program: &mut Program, world: &mut W, builtins: &Builtins<W>,
        number: usize
    ) -> Result<(), ErrorKind> {
        self.profile.builtin_call(self.stack.current());
        let builtin = builtins.get(number).ok_or(ErrorKind::UnknownBuiltin(number))?;
        builtin(&mut Context { program, world, thread: self, builtins })
    }

    /// Count a taken branch or call against the runaway limit.
    fn jump(&self, program: &Program, runaway: &mut Runaway) -> Result<(), ErrorKind> {
        if !runaway.tick() {
            return Ok(());
        }

        let limit = runaway.limit();
        let hot = self.profile.hot(program, 5);
        error!(program = %program.name, limit, ?hot, "runaway loop counter hit limit");
        Err(ErrorKind::RunawayLoop { limit, hot })
    }

    fn divide(&self, program: &str, x: f32, y: f32) -> f32 {
        if y != 0.0 {
            return x / y;
        }
        if self.config.developer {
            warn!(program, "attempted division by zero");
        }
        0.0
    }

    /// Resolve a pointer stored through by `STOREP_*` and friends to the cells it names.
    fn pointer<'w, W: Entities>(
        &self,
        program: &str, field_defs: &[Def], bounds: &Bounds, world: &'w mut W,
        pointer: i32, width: usize
    ) -> Result<&'w mut [Cell], ErrorKind> {
        let (entity, field) = bounds.pointer(pointer, width)?;
        if entity == 0 {
            match self.config.world_writes {
                WorldWrites::Allow => {}
                WorldWrites::Warn => {
                    let name = field_name(field_defs, field);
                    warn!(program, field, %name, "assignment to world entity");
                }
                WorldWrites::Forbid => {
                    let name = field_name(field_defs, field).to_owned();
                    return Err(ErrorKind::WorldWriteForbidden { field, name });
                }
            }
        }
        Ok(&mut world.field_block_mut(entity)[field..field + width])
    }

    fn error(&self, program: &Program, statement: Option<usize>, kind: ErrorKind) -> Error {
        let function = self.stack.current();
        let backtrace = self.stack.backtrace(statement).into_iter()
            .map(|(function, statement)| Frame { function: program.function_name(function).to_owned(), statement })
            .collect();
        Error {
            program: program.name.clone(),
            function: program.function_name(function).to_owned(),
            statement,
            line: statement.and_then(|statement| program.line(statement)),
            backtrace,
            kind,
        }
    }
}

#[inline]
fn float(g: &[Cell], ofs: usize) -> f32 { g[ofs].as_float() }

#[inline]
fn vector(g: &[Cell], ofs: usize) -> Vector { vm::load_vector(&g[ofs..]) }

#[inline]
fn set_vector(g: &mut [Cell], ofs: usize, value: Vector) { vm::store_vector(&mut g[ofs..], value) }

#[inline]
fn zip(x: Vector, y: Vector, f: impl Fn(f32, f32) -> f32) -> Vector {
    [f(x[0], y[0]), f(x[1], y[1]), f(x[2], y[2])]
}
