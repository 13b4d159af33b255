use std::{
    io::Read,
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, warn};

use super::{Model, SatSolver, SolveOutcome, SolverError};

/// Runs a solver binary that speaks the SAT competition output format. The formula path is
/// appended to the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSolver {
    command: String,
    args: Vec<String>,
}

impl ExternalSolver {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            args: vec![],
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl SatSolver for ExternalSolver {
    fn solve(&self, cnf: &Path, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError> {
        debug!("running {} {:?} on {}", self.command, self.args, cnf.display());
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(cnf)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        let mut stdout = child
            .stdout
            .take()
            .expect("stdout of the solver is piped");

        let (sender, receiver) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let mut output = String::new();
            let result = stdout.read_to_string(&mut output).map(|_| output);
            // the receiver is gone if the solver timed out
            let _ = sender.send(result);
        });

        let received = match timeout {
            Some(timeout) => receiver.recv_timeout(timeout),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(output) => {
                let output = output?;
                let status = child.wait()?;
                debug!("{} exited with {status}", self.command);
                parse_output(&output)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} did not finish in time, stopping it", self.command);
                if let Err(error) = child.kill() {
                    warn!("could not stop {}: {error}", self.command);
                }
                child.wait()?;
                Ok(SolveOutcome::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => Err(SolverError::Backend(format!(
                "lost the output of {}",
                self.command
            ))),
        }
    }

    fn name(&self) -> String {
        self.command.clone()
    }
}

/// Reads the `s` status line and the `v` value lines of a solver run.
pub(crate) fn parse_output(output: &str) -> Result<SolveOutcome, SolverError> {
    let mut status = None;
    let mut literals = vec![];
    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("s") => status = Some(tokens.collect::<Vec<_>>().join(" ")),
            Some("v") => {
                for token in tokens {
                    let literal: i32 = token.parse().map_err(|_| {
                        SolverError::MalformedOutput(format!("`{token}` is not a literal"))
                    })?;
                    if literal != 0 {
                        literals.push(literal);
                    }
                }
            }
            _ => {}
        }
    }

    match status.as_deref() {
        Some("SATISFIABLE") => Ok(SolveOutcome::Satisfiable(Model::from_literals(literals))),
        Some("UNSATISFIABLE") => Ok(SolveOutcome::Unsatisfiable),
        Some("UNKNOWN") => Ok(SolveOutcome::TimedOut),
        Some(other) => Err(SolverError::MalformedOutput(format!(
            "unknown status `{other}`"
        ))),
        None => Err(SolverError::MalformedOutput("no status line".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{parse_output, ExternalSolver};
    use crate::solver::{SatSolver, SolveOutcome, SolverError};

    #[test]
    fn competition_output() {
        let output = "c some comment\ns SATISFIABLE\nv 1 -2 3\nv -4 0\n";
        match parse_output(output).unwrap() {
            SolveOutcome::Satisfiable(model) => {
                assert_eq!(model.literals(), &[1, -2, 3, -4]);
            }
            other => panic!("expected a model, got {other:?}"),
        }
        assert_eq!(
            parse_output("c\ns UNSATISFIABLE\n").unwrap(),
            SolveOutcome::Unsatisfiable
        );
        assert_eq!(parse_output("s UNKNOWN\n").unwrap(), SolveOutcome::TimedOut);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_output("c nothing\n"),
            Err(SolverError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_output("s SATISFIABLE\nv 1 x 0\n"),
            Err(SolverError::MalformedOutput(_))
        ));
    }

    #[test]
    fn missing_binary() {
        let solver = ExternalSolver::new("this-solver-does-not-exist");
        let path = std::env::temp_dir();
        assert!(matches!(
            solver.solve(&path, Some(Duration::from_secs(1))),
            Err(SolverError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn slow_solvers_are_stopped() {
        // the formula path ends up as `$0` of the script
        let solver = ExternalSolver::new("sh").with_args(["-c", "exec sleep 5"]);
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            solver
                .solve(file.path(), Some(Duration::from_millis(200)))
                .unwrap(),
            SolveOutcome::TimedOut
        );
    }

    #[cfg(unix)]
    #[test]
    fn scripted_solver() {
        let solver = ExternalSolver::new("sh").with_args(["-c", "echo 's SATISFIABLE'; echo 'v -1 2 0'"]);
        let file = tempfile::NamedTempFile::new().unwrap();
        match solver.solve(file.path(), None).unwrap() {
            SolveOutcome::Satisfiable(model) => assert!(model.is_true(2) && !model.is_true(1)),
            other => panic!("expected a model, got {other:?}"),
        }
    }
}
