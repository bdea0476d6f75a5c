use std::cmp::Reverse;

use tracing::debug;

use crate::bit_vec::BitVec;
use crate::vm::{Config, FunctionId, Program};

/// Execution counters for one function.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct FunctionProfile {
    pub calls: u64,
    pub statements: u64,
    pub builtin_calls: u64,
}

/// Counters and coverage marks accumulated across invocations.
#[derive(Default)]
pub struct Profile {
    functions: Vec<FunctionProfile>,
    statements: Vec<u64>,
    functions_covered: BitVec,
    statements_covered: BitVec,
}

impl Profile {
    pub fn function(&self, id: FunctionId) -> FunctionProfile {
        usize::try_from(id).ok()
            .and_then(|id| self.functions.get(id).copied())
            .unwrap_or_default()
    }

    /// How often a statement ran, when per-statement profiling is enabled.
    pub fn statement(&self, statement: usize) -> u64 {
        self.statements.get(statement).copied().unwrap_or(0)
    }

    pub fn function_covered(&self, id: FunctionId) -> bool {
        usize::try_from(id).is_ok_and(|id| self.functions_covered.get(id))
    }

    pub fn statement_covered(&self, statement: usize) -> bool {
        self.statements_covered.get(statement)
    }

    /// The number of distinct functions and statements reached so far.
    pub fn coverage(&self) -> (usize, usize) {
        (self.functions_covered.count(), self.statements_covered.count())
    }

    pub fn reset(&mut self) {
        self.functions.fill(FunctionProfile::default());
        self.statements.fill(0);
        self.functions_covered.clear();
        self.statements_covered.clear();
    }

    /// The `n` most active functions, by statements executed and then by calls.
    pub fn top(&self, n: usize) -> Vec<(FunctionId, FunctionProfile)> {
        let mut top: Vec<_> = self.functions.iter().enumerate()
            .filter(|(_, profile)| profile.calls > 0 || profile.statements > 0)
            .map(|(id, &profile)| (id as FunctionId, profile))
            .collect();
        top.sort_by_key(|&(id, profile)| (Reverse(profile.statements), Reverse(profile.calls), id));
        top.truncate(n);
        top
    }

    /// Format the most active functions for a report.
    pub fn hot(&self, program: &Program, n: usize) -> Vec<String> {
        self.top(n).into_iter()
            .map(|(id, profile)| {
                format!("{} ({} statements, {} calls)", program.function_name(id), profile.statements, profile.calls)
            })
            .collect()
    }

    pub(crate) fn fit(&mut self, program: &Program, config: &Config) {
        let functions = program.functions().len();
        if self.functions.len() < functions {
            self.functions.resize(functions, FunctionProfile::default());
        }
        let statements = program.statements().len();
        if config.statement_profile && self.statements.len() < statements {
            self.statements.resize(statements, 0);
        }
    }

    pub(crate) fn call(&mut self, program: &Program, config: &Config, id: FunctionId) {
        let index = id as usize;
        self.functions[index].calls += 1;
        if config.coverage.functions && !self.functions_covered.set(index) {
            debug!(
                target: "prvm::coverage",
                program = %program.name, function = %program.function_name(id),
                "function covered"
            );
        }
    }

    pub(crate) fn builtin_call(&mut self, caller: FunctionId) {
        if let Some(profile) = self.functions.get_mut(caller as usize) {
            profile.builtin_calls += 1;
        }
    }

    #[inline]
    pub(crate) fn step(&mut self, program: &Program, config: &Config, function: FunctionId, statement: usize) {
        if config.profile {
            self.functions[function as usize].statements += 1;
        }
        if config.statement_profile {
            self.statements[statement] += 1;
        }
        if config.coverage.statements && !self.statements_covered.set(statement) {
            debug!(
                target: "prvm::coverage",
                program = %program.name, function = %program.function_name(function), statement,
                "statement covered"
            );
        }
    }
}

/// Counts taken branches and calls within one invocation.
pub(crate) struct Runaway {
    count: u64,
    limit: u64,
}

impl Runaway {
    pub(crate) fn new(limit: u64) -> Runaway {
        Runaway { count: 0, limit }
    }

    pub(crate) fn limit(&self) -> u64 { self.limit }

    /// Count one jump, returning `true` once the limit is reached.
    #[inline]
    pub(crate) fn tick(&mut self) -> bool {
        self.count += 1;
        self.count >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top() {
        let mut profile = Profile::default();
        profile.functions = vec![
            FunctionProfile::default(),
            FunctionProfile { calls: 1, statements: 10, builtin_calls: 0 },
            FunctionProfile { calls: 5, statements: 50, builtin_calls: 2 },
            FunctionProfile { calls: 9, statements: 10, builtin_calls: 0 },
        ];

        let top: Vec<_> = profile.top(2).into_iter().map(|(id, _)| id).collect();
        assert_eq!(top, [2, 3]);
        assert_eq!(profile.top(10).len(), 3);

        profile.reset();
        assert!(profile.top(10).is_empty());
        assert_eq!(profile.function(2), FunctionProfile::default());
        assert_eq!(profile.function(-1), FunctionProfile::default());
    }

    #[test]
    fn runaway() {
        let mut runaway = Runaway::new(3);
        assert!(!runaway.tick());
        assert!(!runaway.tick());
        assert!(runaway.tick());
        assert_eq!(runaway.limit(), 3);
    }
}
