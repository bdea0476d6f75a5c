use serde::Deserialize;

use crate::vm::Program;

/// Interpreter limits and diagnostics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The number of taken branches and calls after which one invocation is aborted.
    pub runaway_limit: u64,
    /// The maximum number of active call frames.
    pub max_depth: usize,
    /// The number of cells available for saving callers' locals.
    pub local_stack_size: usize,
    /// What happens when a pointer store targets a field of entity 0.
    pub world_writes: WorldWrites,
    /// Warn about suspicious but non-fatal operations, like division by zero.
    pub developer: bool,
    /// Count statements executed per function.
    pub profile: bool,
    /// Count executions of each statement.
    pub statement_profile: bool,
    pub coverage: Coverage,
    /// Emit a `prvm::trace` event for every statement.
    pub trace: bool,
    /// Offsets used by `STATE`. Programs without them cannot execute that opcode.
    pub state: Option<StateFields>,
}

#[derive(Copy, Clone, Default, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldWrites {
    Allow,
    #[default]
    Warn,
    Forbid,
}

#[derive(Copy, Clone, Default, Debug, Deserialize)]
#[serde(default)]
pub struct Coverage {
    pub functions: bool,
    pub statements: bool,
}

/// The globals and fields touched by `STATE`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct StateFields {
    pub self_global: usize,
    pub time_global: usize,
    pub nextthink: usize,
    pub frame: usize,
    pub think: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runaway_limit: 10_000_000,
            max_depth: 1024,
            local_stack_size: 16384,
            world_writes: WorldWrites::default(),
            developer: false,
            profile: true,
            statement_profile: false,
            coverage: Coverage::default(),
            trace: false,
            state: None,
        }
    }
}

impl StateFields {
    /// Look up `self`, `time`, `.nextthink`, `.frame` and `.think` by name.
    pub fn from_program(program: &Program) -> Option<StateFields> {
        Some(StateFields {
            self_global: program.find_global("self")?.ofs,
            time_global: program.find_global("time")?.ofs,
            nextthink: program.find_field("nextthink")?.ofs,
            frame: program.find_field("frame")?.ofs,
            think: program.find_field("think")?.ofs,
        })
    }
}
