use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use dfasat_core::prelude::*;
use dfasat_learning::prelude::*;
use owo_colors::OwoColorize;
use tracing::{debug, error, info, trace};
use tracing_subscriber::{filter, prelude::*};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

fn cli() -> clap::Command {
    Command::new("dfasat")
        .about("Identifies minimal DFAs that are consistent with labelled samples")
        .arg(
            Arg::new("samples")
                .help("sample files, each one is processed on its own")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(0..=1)
                .require_equals(true)
                .value_parser(["info", "debug", "trace"])
                .default_missing_value("info"),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("additionally write the log to this file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("directory for the DOT files of the automata, printed to stdout if absent")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("min")
                .long("min")
                .default_value("1")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("max")
                .long("max")
                .default_value("20")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .help("time budget in seconds for all solver calls of one sample")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("solutions")
                .short('n')
                .long("solutions")
                .help("number of automata to report, or `all`")
                .default_value("1"),
        )
        .arg(
            Arg::new("dimacs")
                .long("dimacs")
                .default_value("dimacsFile.cnf")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("symmetry")
                .short('s')
                .long("symmetry")
                .value_parser(["none", "bfs", "dfs", "clique"])
                .default_value("bfs"),
        )
        .arg(
            Arg::new("amo")
                .long("amo")
                .value_parser([
                    "pairwise",
                    "binary",
                    "commander",
                    "commander-half",
                    "product",
                    "sequential",
                    "bimander",
                    "bimander-half",
                ])
                .default_value("pairwise"),
        )
        .arg(
            Arg::new("noise")
                .long("noise")
                .help("percentage of labels that may be wrong")
                .default_value("0")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            Arg::new("loop-fix")
                .long("loop-fix")
                .help("unused transitions become self loops")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sinks")
                .long("sinks")
                .value_parser(["none", "rejecting", "both"])
                .default_value("none"),
        )
        .arg(
            Arg::new("reduce")
                .long("reduce")
                .help("shrink the APTA by state merging before encoding")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("heuristic")
                .long("heuristic")
                .value_parser(["status", "fanout"])
                .default_value("status"),
        )
        .arg(
            Arg::new("apta-bound")
                .long("apta-bound")
                .default_value("1000")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("red-bound")
                .long("red-bound")
                .default_value("50")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("random-greedy")
                .long("random-greedy")
                .help("seed for randomly scaled merge scores")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("merge-first")
                .long("merge-first")
                .help("only promote blue nodes once no merge is possible")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("solver")
                .long("solver")
                .help("external solver binary, the embedded solver is used if absent"),
        )
        .arg(
            Arg::new("solver-arg")
                .long("solver-arg")
                .action(ArgAction::Append)
                .allow_hyphen_values(true)
                .requires("solver"),
        )
}

fn setup_logging(matches: &ArgMatches) -> Result<(), std::io::Error> {
    let level = match matches
        .try_get_one::<String>("verbosity")
        .ok()
        .flatten()
        .map(|m| m.as_str())
    {
        Some("trace") => filter::LevelFilter::TRACE,
        Some("debug") => filter::LevelFilter::DEBUG,
        Some("info") => filter::LevelFilter::INFO,
        _ => filter::LevelFilter::WARN,
    };

    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);

    let file_log = match matches.get_one::<PathBuf>("log") {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .with_filter(level),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log.with_filter(level))
        .with(file_log)
        .init();

    trace!("setup {level} logging");
    Ok(())
}

fn solutions(value: &str) -> Result<Solutions, String> {
    match value {
        "all" => Ok(Solutions::All),
        "1" => Ok(Solutions::First),
        n => match n.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Solutions::UpTo(n)),
            _ => Err(format!("`{n}` is neither a positive number nor `all`")),
        },
    }
}

fn induction_config(matches: &ArgMatches) -> Result<InductionConfig, String> {
    let symmetry_breaking = match matches.get_one::<String>("symmetry").map(String::as_str) {
        Some("none") => SymmetryBreaking::None,
        Some("dfs") => SymmetryBreaking::Dfs,
        Some("clique") => SymmetryBreaking::Clique,
        _ => SymmetryBreaking::Bfs,
    };
    let at_most_one = match matches.get_one::<String>("amo").map(String::as_str) {
        Some("binary") => AtMostOne::Binary,
        Some("commander") => AtMostOne::Commander(GroupCount::Sqrt),
        Some("commander-half") => AtMostOne::Commander(GroupCount::Half),
        Some("product") => AtMostOne::Product,
        Some("sequential") => AtMostOne::Sequential,
        Some("bimander") => AtMostOne::Bimander(GroupCount::Sqrt),
        Some("bimander-half") => AtMostOne::Bimander(GroupCount::Half),
        _ => AtMostOne::Pairwise,
    };
    let sinks = match matches.get_one::<String>("sinks").map(String::as_str) {
        Some("rejecting") => SinkMode::Rejecting,
        Some("both") => SinkMode::AcceptingAndRejecting,
        _ => SinkMode::None,
    };

    let mut config = InductionConfig::default()
        .with_sizes(
            *matches.get_one::<usize>("min").unwrap_or(&1),
            *matches.get_one::<usize>("max").unwrap_or(&20),
        )
        .with_symmetry_breaking(symmetry_breaking)
        .with_at_most_one(at_most_one)
        .with_noise(*matches.get_one::<u8>("noise").unwrap_or(&0))
        .with_sinks(sinks)
        .with_loop_fix(matches.get_flag("loop-fix"))
        .with_solutions(solutions(
            matches
                .get_one::<String>("solutions")
                .map_or("1", String::as_str),
        )?);
    if let Some(path) = matches.get_one::<PathBuf>("dimacs") {
        config = config.with_dimacs_path(path);
    }
    if let Some(seconds) = matches.get_one::<u64>("timeout") {
        config = config.with_timeout(Duration::from_secs(*seconds));
    }

    if matches.get_flag("reduce") {
        let heuristic = match matches.get_one::<String>("heuristic").map(String::as_str) {
            Some("fanout") => MergeHeuristic::Fanout(FanoutBounds::default()),
            _ => MergeHeuristic::Status,
        };
        let mut reduction = ReductionConfig::new(heuristic)
            .with_bounds(
                *matches.get_one::<usize>("apta-bound").unwrap_or(&1000),
                *matches.get_one::<usize>("red-bound").unwrap_or(&50),
            )
            .with_extend_first(!matches.get_flag("merge-first"));
        if let Some(seed) = matches.get_one::<u64>("random-greedy") {
            reduction = reduction.with_random_greedy(*seed);
        }
        config = config.with_reduction(reduction);
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn solver(matches: &ArgMatches) -> Box<dyn SatSolver> {
    match matches.get_one::<String>("solver") {
        Some(command) => Box::new(
            ExternalSolver::new(command.as_str()).with_args(
                matches
                    .get_many::<String>("solver-arg")
                    .into_iter()
                    .flatten()
                    .cloned(),
            ),
        ),
        None => Box::new(EmbeddedSolver),
    }
}

/// Learns the automata for one sample file and writes them out.
fn process<S: SatSolver>(
    inductor: &Inductor<S>,
    path: &Path,
    output: Option<&PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sample = FiniteSample::from_path(path)?;
    debug!(
        "read {} words over {} symbols from {}",
        sample.count_words(),
        sample.alphabet().size(),
        path.display()
    );

    let start = std::time::Instant::now();
    let induction = inductor.infer(&sample)?;
    info!(
        "{}: {} states, searched from {} in {}ms",
        path.display(),
        induction.colors().bold(),
        induction.lower_bound(),
        start.elapsed().as_millis()
    );

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "automaton".to_string());
    let many = induction.automata().len() > 1;
    for (index, automaton) in induction.automata().iter().enumerate() {
        debug_assert!(automaton.is_consistent_with(&sample));
        let dot = automaton.dot_representation();
        match output {
            Some(directory) => {
                let name = if many {
                    format!("{stem}_{index}.dot")
                } else {
                    format!("{stem}.dot")
                };
                let target = directory.join(name);
                std::fs::write(&target, dot + "\n")?;
                debug!("wrote {}", target.display());
            }
            None => println!("{dot}"),
        }
    }
    Ok(())
}

pub fn main() -> ExitCode {
    let matches = cli().get_matches();

    if let Err(e) = setup_logging(&matches) {
        eprintln!("could not open log file: {e}");
        return ExitCode::FAILURE;
    }

    let config = match induction_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid settings: {e}");
            return ExitCode::FAILURE;
        }
    };
    let output = matches.get_one::<PathBuf>("output");
    if let Some(directory) = output {
        if let Err(e) = std::fs::create_dir_all(directory) {
            error!("could not create {}: {e}", directory.display());
            return ExitCode::FAILURE;
        }
    }

    let solver = solver(&matches);
    debug!("solving with {}", solver.name());
    let inductor = Inductor::new(config, solver);

    let mut failed = 0;
    for path in matches.get_many::<PathBuf>("samples").into_iter().flatten() {
        if let Err(e) = process(&inductor, path, output) {
            error!("{}: {e}", path.display());
            failed += 1;
        }
    }
    if failed > 0 {
        error!("{} samples failed", failed.red());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::{cli, induction_config, solutions};
    use dfasat_learning::prelude::*;

    #[test]
    fn parses_settings() {
        let matches = cli().get_matches_from([
            "dfasat",
            "--symmetry",
            "dfs",
            "--amo",
            "bimander-half",
            "-n",
            "all",
            "--reduce",
            "--red-bound",
            "7",
            "sample.txt",
        ]);
        let config = induction_config(&matches).unwrap();
        assert_eq!(config.encoding.symmetry_breaking, SymmetryBreaking::Dfs);
        assert_eq!(
            config.encoding.at_most_one,
            AtMostOne::Bimander(GroupCount::Half)
        );
        assert_eq!(config.solutions, Solutions::All);
        assert!(config.encoding.loop_fix);
        assert_eq!(config.reduction.map(|r| r.red_bound), Some(7));
    }

    #[test]
    fn rejects_bad_combinations() {
        let matches =
            cli().get_matches_from(["dfasat", "--noise", "5", "--sinks", "both", "sample.txt"]);
        assert!(induction_config(&matches).is_err());
        assert!(solutions("0").is_err());
        assert_eq!(solutions("3"), Ok(Solutions::UpTo(3)));
    }
}
