use std::{path::Path, sync::Mutex, time::Duration};

use splr::{Certificate, Config, SatSolverIF, SolveIF, Solver};
use tracing::{debug, trace};

use super::{Model, SatSolver, SolveOutcome, SolverError};

// splr keeps its variables in a static vector, so only one instance may run at a time
static SPLR: Mutex<()> = Mutex::new(());

/// Solves formulas in process with splr.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSolver;

impl SatSolver for EmbeddedSolver {
    fn solve(&self, cnf: &Path, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError> {
        let mut config = Config::from(cnf);
        config.quiet_mode = true;
        if let Some(timeout) = timeout {
            config.c_timeout = timeout.as_secs_f64();
        }

        let _guard = SPLR.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut solver = match Solver::build(&config) {
            Ok(solver) => solver,
            Err(error) => return map_error(error),
        };
        debug!("solving {} with splr", cnf.display());
        match solver.solve() {
            Ok(Certificate::SAT(literals)) => {
                trace!("splr found a model with {} literals", literals.len());
                Ok(SolveOutcome::Satisfiable(Model::from_literals(literals)))
            }
            Ok(Certificate::UNSAT) => Ok(SolveOutcome::Unsatisfiable),
            Err(error) => map_error(error),
        }
    }

    fn name(&self) -> String {
        "splr".to_string()
    }
}

fn map_error(error: splr::SolverError) -> Result<SolveOutcome, SolverError> {
    match error {
        splr::SolverError::TimeOut => Ok(SolveOutcome::TimedOut),
        splr::SolverError::EmptyClause | splr::SolverError::Inconsistent => {
            Ok(SolveOutcome::Unsatisfiable)
        }
        other => Err(SolverError::Backend(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::EmbeddedSolver;
    use crate::solver::{SatSolver, SolveOutcome};

    fn solve(dimacs: &str) -> SolveOutcome {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(dimacs.as_bytes()).unwrap();
        file.flush().unwrap();
        EmbeddedSolver.solve(file.path(), None).unwrap()
    }

    #[test]
    fn decides_small_formulas() {
        match solve("p cnf 3 3\n1 2 0\n-1 0\n-2 3 0\n") {
            SolveOutcome::Satisfiable(model) => {
                assert!(!model.is_true(1));
                assert!(model.is_true(2));
                assert!(model.is_true(3));
            }
            other => panic!("expected a model, got {other:?}"),
        }
        assert_eq!(
            solve("p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n"),
            SolveOutcome::Unsatisfiable
        );
    }
}
