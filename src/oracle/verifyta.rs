//! Oracle backed by the `verifyta` command line tool.
//!
//! Every call writes the model (and the query) into a private working
//! directory and runs `verifyta` on it. The child's output pipes are drained
//! on helper threads while the calling thread polls for exit and for an
//! abort request, so an aborted call returns promptly with
//! [`OracleError::Cancelled`] and leaves no child process behind.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use super::{
    AbortHandle, CompiledModel, ConcreteTrace, Oracle, OracleError, ProcessLocation, Query, QueryOutcome, Series,
    State, Status, SymbolicTrace, TraceKind, Transition, TransitionEdge,
};
use crate::error::Problem;
use crate::network::Network;
use crate::serialize::{strip_builtin_stubs, to_xml};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const MODEL_FILE: &str = "model.xml";
const QUERY_FILE: &str = "query.q";

pub struct VerifytaOracle {
    executable: PathBuf,
    workdir: PathBuf,
    abort: AbortHandle,
}

impl VerifytaOracle {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        VerifytaOracle {
            executable: executable.into(),
            workdir: env::temp_dir().join(format!("nsta-rs-{}", std::process::id())),
            abort: AbortHandle::new(),
        }
    }

    /// Finds `verifyta` through the `VERIFYTA` environment variable, falling
    /// back to `$UPPAAL_ROOT/bin-<OS>/verifyta`.
    pub fn locate() -> Result<Self, OracleError> {
        if let Some(path) = env::var_os("VERIFYTA") {
            return Ok(Self::new(path));
        }
        if let Some(root) = env::var_os("UPPAAL_ROOT") {
            let path = PathBuf::from(root)
                .join(format!("bin-{}", platform_dir()))
                .join(format!("verifyta{}", env::consts::EXE_SUFFIX));
            if path.exists() {
                return Ok(Self::new(path));
            }
            return Err(OracleError::NotFound(path.display().to_string()));
        }
        Err(OracleError::NotFound(
            "neither VERIFYTA nor UPPAAL_ROOT is set".to_string(),
        ))
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn run(&self, args: &[String]) -> Result<(ExitStatus, String, String), OracleError> {
        debug!("run({} {})", self.executable.display(), args.join(" "));
        let mut child = Command::new(&self.executable)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => OracleError::NotFound(self.executable.display().to_string()),
                _ => OracleError::Io(e),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if self.abort.is_aborted() {
                debug!("run: abort requested, killing child");
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::Cancelled);
            }
            if let Some(status) = child.try_wait()? {
                break status;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = join(stdout)?;
        let stderr = join(stderr)?;
        Ok((status, stdout, stderr))
    }
}

type Drain = Option<thread::JoinHandle<io::Result<String>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut text = String::new();
            pipe.read_to_string(&mut text)?;
            Ok(text)
        })
    })
}

fn join(handle: Drain) -> Result<String, OracleError> {
    match handle {
        None => Ok(String::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| OracleError::UnexpectedResponse("output reader panicked".to_string()))?
            .map_err(OracleError::Io),
    }
}

fn platform_dir() -> &'static str {
    match env::consts::OS {
        "windows" => "Windows",
        "macos" => "Darwin",
        _ => "Linux",
    }
}

impl Oracle for VerifytaOracle {
    fn reconnect(&mut self) -> Result<(), OracleError> {
        fs::create_dir_all(&self.workdir)?;
        for file in [MODEL_FILE, QUERY_FILE] {
            match fs::remove_file(self.workdir.join(file)) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }

    fn compile(&mut self, network: &Network) -> Result<CompiledModel, OracleError> {
        let mut network = network.clone();
        let stripped = strip_builtin_stubs(&mut network);
        if stripped > 0 {
            debug!("compile: stripped {} builtin stub(s)", stripped);
        }
        let document = to_xml(&network);
        fs::create_dir_all(&self.workdir)?;
        fs::write(self.workdir.join(MODEL_FILE), &document)?;

        let (status, stdout, stderr) = self.run(&["-q".to_string(), "-s".to_string(), MODEL_FILE.to_string()])?;
        let problems = parse_problems(&stderr);
        if problems.iter().any(|p| p.is_error()) {
            return Err(OracleError::Compile(problems));
        }
        if !status.success() {
            return Err(OracleError::UnexpectedResponse(format!("{}{}", stdout, stderr)));
        }
        let processes = network.processes().map_err(OracleError::Compile)?;
        Ok(CompiledModel {
            network,
            document,
            processes,
            warnings: problems,
        })
    }

    fn query(&mut self, model: &CompiledModel, query: &Query) -> Result<QueryOutcome, OracleError> {
        debug!("query({})", query.formula);
        fs::create_dir_all(&self.workdir)?;
        fs::write(self.workdir.join(MODEL_FILE), &model.document)?;
        fs::write(self.workdir.join(QUERY_FILE), format!("{}\n", query.formula))?;

        let mut args = vec!["-q".to_string(), "-s".to_string()];
        let simulation = query.formula.trim_start().starts_with("simulate");
        if !simulation {
            match query.trace {
                TraceKind::None => {}
                TraceKind::Some => args.push("-t0".to_string()),
                TraceKind::Shortest => args.push("-t1".to_string()),
                TraceKind::Fastest => args.push("-t2".to_string()),
            }
            if query.trace != TraceKind::None {
                args.push("-y".to_string());
            }
        }
        args.push(MODEL_FILE.to_string());
        args.push(QUERY_FILE.to_string());

        let (_, stdout, stderr) = self.run(&args)?;
        let problems = parse_problems(&stderr);
        if problems.iter().any(|p| p.is_error()) {
            return Err(OracleError::Compile(problems));
        }
        let status = parse_status(&stdout).ok_or_else(|| {
            warn!("query: no verdict in oracle output");
            OracleError::UnexpectedResponse(format!("{}{}", stdout, stderr))
        })?;

        let mut outcome = QueryOutcome::new(status);
        if simulation {
            let samples = parse_simulation(&stdout);
            if !samples.series.is_empty() {
                outcome = outcome.with_samples(samples);
            }
        } else if query.trace != TraceKind::None {
            outcome.trace = parse_trace(&stderr, |process| model.template_of(process).map(str::to_string));
        }
        Ok(outcome)
    }

    fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

static SHARED: OnceLock<Mutex<VerifytaOracle>> = OnceLock::new();

/// The process-wide oracle, located on first use.
pub fn shared() -> Result<&'static Mutex<VerifytaOracle>, OracleError> {
    if let Some(oracle) = SHARED.get() {
        return Ok(oracle);
    }
    let oracle = VerifytaOracle::locate()?;
    Ok(SHARED.get_or_init(|| Mutex::new(oracle)))
}

fn parse_status(stdout: &str) -> Option<Status> {
    for line in stdout.lines() {
        let line = line.to_lowercase();
        if !line.contains("formula") {
            continue;
        }
        if line.contains("is not satisfied") {
            return Some(Status::NotOk);
        }
        if line.contains("maybe satisfied") || line.contains("may be satisfied") {
            return Some(Status::Inconclusive);
        }
        if line.contains("is satisfied") {
            return Some(Status::Ok);
        }
    }
    None
}

/// Parses compiler diagnostics of the form
/// `/nta/template[1]/transition[2]/label[1]:1: [error] message`.
fn parse_problems(stderr: &str) -> Vec<Problem> {
    let mut problems = Vec::new();
    for line in stderr.lines() {
        for (marker, error) in [("[error]", true), ("[warning]", false)] {
            if let Some(at) = line.find(marker) {
                let path = line[..at].trim().trim_end_matches(':').to_string();
                let message = line[at + marker.len()..].trim().to_string();
                problems.push(if error {
                    Problem::error(path, message)
                } else {
                    Problem::warning(path, message)
                });
            }
        }
    }
    problems
}

/// `name=value` with an identifier-like left side. Anything else (`x<=5`,
/// `x==0`, `#t(0)-x<=0`) is a constraint.
fn parse_assignment(token: &str) -> Option<(&str, i64)> {
    let (name, value) = token.split_once('=')?;
    let ident_like = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '[' | ']' | '.'));
    if !ident_like || value.starts_with('=') {
        return None;
    }
    Some((name, value.parse().ok()?))
}

fn split_qualified(token: &str) -> Option<(&str, &str)> {
    token.rsplit_once('.')
}

fn default_template(process: &str) -> String {
    process.split('(').next().unwrap_or(process).to_string()
}

/// Parses a symbolic trace printed with `-y`.
fn parse_trace(stderr: &str, template_of: impl Fn(&str) -> Option<String>) -> Option<SymbolicTrace> {
    let template = |process: &str| template_of(process).unwrap_or_else(|| default_template(process));

    let mut states: Vec<State> = Vec::new();
    let mut transitions: Vec<Vec<TransitionEdge>> = Vec::new();
    let mut lines = stderr.lines().map(str::trim).peekable();

    while let Some(line) = lines.next() {
        match line {
            "State:" => {
                let mut state = State::default();
                while let Some(&next) = lines.peek() {
                    if next.is_empty() || next == "Transition:" || next == "State:" {
                        break;
                    }
                    lines.next();
                    if next.starts_with('(') && next.ends_with(')') {
                        for token in next.trim_matches(|c| c == '(' || c == ')').split_whitespace() {
                            if let Some((process, location)) = split_qualified(token) {
                                state
                                    .locations
                                    .push(ProcessLocation::new(process, template(process), location));
                            }
                        }
                    } else {
                        for token in next.split_whitespace() {
                            match parse_assignment(token) {
                                Some((name, value)) => {
                                    state.variables.insert(name.to_string(), value);
                                }
                                None => state.constraints.push(token.to_string()),
                            }
                        }
                    }
                }
                states.push(state);
            }
            "Transition:" => {
                let mut edges = Vec::new();
                while let Some(&next) = lines.peek() {
                    if next.is_empty() || next == "State:" {
                        break;
                    }
                    lines.next();
                    let (head, label) = match next.split_once('{') {
                        Some((head, rest)) => (head, rest.trim_end_matches('}').trim()),
                        None => (next, ""),
                    };
                    let Some((from, to)) = head.split_once("->") else {
                        continue;
                    };
                    if let (Some((process, source)), Some((_, target))) =
                        (split_qualified(from.trim()), split_qualified(to.trim()))
                    {
                        let mut edge = TransitionEdge::new(process, template(process), source, target);
                        edge.label = label.to_string();
                        edges.push(edge);
                    }
                }
                transitions.push(edges);
            }
            _ => {}
        }
    }

    let mut states = states.into_iter();
    let initial = states.next()?;
    let transitions = transitions
        .into_iter()
        .zip(states)
        .map(|(edges, target)| Transition { edges, target })
        .collect();
    Some(SymbolicTrace { initial, transitions })
}

/// Parses the per-run series printed for a `simulate` query.
fn parse_simulation(stdout: &str) -> ConcreteTrace {
    let mut trace = ConcreteTrace::default();
    let mut expression: Option<String> = None;
    for line in stdout.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix('[') {
            let (Some(expr), Some((run, points))) = (&expression, rest.split_once("]:")) else {
                continue;
            };
            let Ok(run) = run.trim().parse::<usize>() else {
                continue;
            };
            let points: Vec<(f64, f64)> = points
                .split_whitespace()
                .filter_map(|p| {
                    let (t, v) = p.trim_matches(|c| c == '(' || c == ')').split_once(',')?;
                    Some((t.parse().ok()?, v.parse().ok()?))
                })
                .collect();
            trace.series.push(Series {
                expression: expr.clone(),
                run,
                points,
            });
        } else if let Some(expr) = line.strip_suffix(':') {
            if !expr.is_empty() && !expr.starts_with("Verifying") && !expr.starts_with("--") {
                expression = Some(expr.to_string());
            }
        }
    }
    trace
}
