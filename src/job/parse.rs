//! Submission-script parsing
//!
//! Directive lines are recognized by the manager's directive token and
//! decoded through its pattern table. All other lines are opaque body
//! content: the combined script re-invokes the original file, it never
//! copies its body text.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use regex::Captures;

use crate::job::script::{Job, ResourceParam};
use crate::timefmt;
use crate::wlm::{Registry, WorkloadManager};

#[derive(Debug)]
pub enum ParseError {
    /// The explicit manager hint names no registry row.
    UnsupportedManager { name: String, available: Vec<String> },
    /// No directive line ever bound a manager.
    UnknownFormat(PathBuf),
    /// A directive of the bound manager matched none of its patterns.
    MalformedDirective(String),
    InvalidDuration(timefmt::InvalidDuration),
    Io(PathBuf, io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::UnsupportedManager { name, available } => write!(
                f,
                "workload manager not supported: {} (expected one of: {})",
                name,
                available.join(", ")
            ),
            ParseError::UnknownFormat(path) => {
                write!(f, "`{}` is not a supported job file", path.display())
            }
            ParseError::MalformedDirective(text) => {
                write!(f, "can not process directive `{text}`")
            }
            ParseError::InvalidDuration(err) => write!(f, "{err}"),
            ParseError::Io(path, err) => {
                write!(f, "can't read job script `{}`: {err}", path.display())
            }
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::InvalidDuration(err) => Some(err),
            ParseError::Io(_, err) => Some(err),
            _ => None,
        }
    }
}

/// Parse a submission-script file into a canonical Job.
///
/// The manager is taken from the hint if given, otherwise inferred from the
/// first line carrying a known directive token. Directives found before the
/// manager binds (other than the binding line itself) are skipped.
pub fn parse_job(
    file: &Path,
    hint: Option<&str>,
    registry: &Registry,
) -> Result<Job, ParseError> {
    let mut manager: Option<&WorkloadManager> = match hint {
        Some(name) => {
            let m = registry
                .find(name)
                .ok_or_else(|| ParseError::UnsupportedManager {
                    name: name.to_string(),
                    available: registry.names(),
                })?;
            info!("Using workload manager: {}", m.kind);
            Some(m)
        }
        None => None,
    };

    let text = fs::read_to_string(file).map_err(|err| ParseError::Io(file.to_path_buf(), err))?;
    let file = fs::canonicalize(file).map_err(|err| ParseError::Io(file.to_path_buf(), err))?;
    let script_dir = file
        .parent()
        .expect("canonical script path has a parent")
        .to_path_buf();

    let mut name = None;
    let mut time = Duration::ZERO;
    let mut stdout = None;
    let mut stderr = None;
    let mut directory = script_dir.clone();
    let mut params: Vec<ResourceParam> = Vec::new();

    for line in text.lines() {
        if line.starts_with("#!") {
            continue; // shebang
        }
        if line.starts_with("# ") {
            continue; // human comment, can not be a directive
        }
        if !line.starts_with('#') {
            continue; // script body
        }

        if manager.is_none() {
            if let Some(m) = registry.infer(line) {
                info!("Inferred workload manager: {}", m.kind);
                manager = Some(m);
            }
        }
        let Some(m) = manager else {
            // directive-shaped, but no manager bound yet; one may bind later
            continue;
        };
        if !line.starts_with(m.directive) {
            // comment written in another dialect
            continue;
        }

        let (spelling, caps) = match_directive(m, line)
            .ok_or_else(|| ParseError::MalformedDirective(strip_directive(m, line)))?;
        let arg = caps
            .name("arg")
            .expect("directive patterns capture `arg`")
            .as_str();
        let value = caps.name("val").map(|v| v.as_str().to_string());

        // role classification applies only when the directive carried a
        // value; a bare flag with a role spelling stays a resource parameter
        match value {
            Some(val) if m.time_args[spelling] == Some(arg) => {
                time = timefmt::parse(&val, &m.time_templates)
                    .map_err(ParseError::InvalidDuration)?;
            }
            Some(val) if m.stdout_args[spelling] == Some(arg) => stdout = Some(val),
            Some(val) if m.stderr_args[spelling] == Some(arg) => stderr = Some(val),
            Some(val) if m.directory_args[spelling] == Some(arg) => {
                let dir = PathBuf::from(val);
                directory = if dir.is_absolute() {
                    dir
                } else {
                    script_dir.join(dir)
                };
            }
            Some(val) if m.name_args[spelling] == Some(arg) => name = Some(val),
            value => params.push(ResourceParam {
                key: arg.to_string(),
                spelling,
                value,
            }),
        }
    }

    let Some(m) = manager else {
        return Err(ParseError::UnknownFormat(file));
    };

    // key order decides combinability, source order must not
    params.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(Job {
        file: Some(file),
        name,
        directory: Some(directory),
        time,
        stdout,
        stderr,
        params,
        manager: m.kind,
    })
}

/// First matching pattern wins; argument patterns are tried before flag
/// patterns, in table order.
fn match_directive<'a>(m: &WorkloadManager, line: &'a str) -> Option<(usize, Captures<'a>)> {
    for (i, pattern) in m.arg_patterns.iter().enumerate() {
        if let Some(caps) = pattern.captures(line) {
            return Some((i, caps));
        }
    }
    for (i, pattern) in m.flag_patterns.iter().enumerate() {
        if let Some(caps) = pattern.captures(line) {
            return Some((i, caps));
        }
    }
    None
}

fn strip_directive(m: &WorkloadManager, line: &str) -> String {
    line.strip_prefix(m.directive).unwrap_or(line).trim().to_string()
}
