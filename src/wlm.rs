//! Data-driven table of supported workload managers
//!
//! Each scheduler dialect is one table row in `Registry::load`; parsing and
//! rendering code never change when a scheduler is added. Directive patterns
//! are applied to the complete line including the directive token and must
//! capture a named `arg` group (`val` too for argument patterns).

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ManagerKind {
    Slurm,
    LoadLeveler,
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ManagerKind::Slurm => write!(f, "Slurm"),
            ManagerKind::LoadLeveler => write!(f, "LoadLeveler"),
        }
    }
}

/// Directive dialect of one workload manager.
///
/// The role spelling lists, the pattern lists and the render template lists
/// are index-aligned: the index a directive was recognized at is the index
/// it is classified and re-rendered with. Spellings a manager does not offer
/// are `None`.
pub struct WorkloadManager {
    pub kind: ManagerKind,
    pub dispatch_command: &'static str,
    pub directive: &'static str,
    pub name_args: Vec<Option<&'static str>>,
    pub time_args: Vec<Option<&'static str>>,
    /// Ordered duration templates, most specific first. The first entry is
    /// also the one used when rendering a time limit back out.
    pub time_templates: Vec<&'static str>,
    pub stdout_args: Vec<Option<&'static str>>,
    pub stderr_args: Vec<Option<&'static str>>,
    pub directory_args: Vec<Option<&'static str>>,
    pub arg_patterns: Vec<Regex>,
    pub flag_patterns: Vec<Regex>,
    pub arg_templates: Vec<&'static str>,
    pub flag_templates: Vec<&'static str>,
}

/// Read-only registry of every supported manager.
///
/// Built once at startup and passed by reference into the parser and the
/// serializer.
pub struct Registry {
    managers: Vec<WorkloadManager>,
}

impl Registry {
    pub fn load() -> Registry {
        let managers = vec![
            WorkloadManager {
                kind: ManagerKind::Slurm,
                dispatch_command: "sbatch",
                directive: "#SBATCH",
                name_args: vec![Some("job-name"), Some("J")],
                time_args: vec![Some("time"), Some("t")],
                time_templates: vec![
                    "%D-%H:%M:%S",
                    "%D-%H:%M",
                    "%D-%H",
                    "%H:%M:%S",
                    "%M:%S",
                    "%M",
                ],
                stdout_args: vec![Some("output"), Some("o")],
                stderr_args: vec![Some("error"), Some("e")],
                // chdir long option does not exist everywhere, only -D is safe
                directory_args: vec![None, Some("D")],
                arg_patterns: patterns(&[
                    r"--(?P<arg>.+?)=(?P<val>.*?)[ \t]*$",
                    r"[ \t]-(?P<arg>[^-= \t]+)[ \t]+(?P<val>.+?)[ \t]*$",
                ]),
                flag_patterns: patterns(&[
                    r"--(?P<arg>[^= \t]+?)[ \t]*$",
                    r"[ \t]-(?P<arg>[^-= \t]+)[ \t]*$",
                ]),
                arg_templates: vec!["--{arg}={val}", "-{arg} {val}"],
                flag_templates: vec!["--{arg}", "-{arg}"],
            },
            WorkloadManager {
                kind: ManagerKind::LoadLeveler,
                dispatch_command: "llsubmit",
                directive: "#@",
                name_args: vec![Some("job_name")],
                time_args: vec![Some("wall_clock_limit")],
                time_templates: vec!["%H:%M:%S"],
                stdout_args: vec![Some("output")],
                stderr_args: vec![Some("error")],
                directory_args: vec![Some("initialdir")],
                arg_patterns: patterns(&[
                    r"[ \t](?P<arg>[^= \t]+?)[ \t]*=[ \t]*(?P<val>.+?)[ \t]*$",
                ]),
                flag_patterns: patterns(&[r"^#@[ \t]+(?P<arg>[^= \t]+?)[ \t]*$"]),
                arg_templates: vec!["{arg} = {val}"],
                flag_templates: vec!["{arg}"],
            },
        ];

        for m in &managers {
            validate(m);
        }

        Registry { managers }
    }

    pub fn get(&self, kind: ManagerKind) -> &WorkloadManager {
        self.managers
            .iter()
            .find(|m| m.kind == kind)
            .expect("every manager kind has a table row")
    }

    /// Resolve a manager by its user-facing name.
    pub fn find(&self, name: &str) -> Option<&WorkloadManager> {
        self.managers.iter().find(|m| m.kind.to_string() == name)
    }

    /// Manager whose directive token starts the given line, if any.
    pub fn infer(&self, line: &str) -> Option<&WorkloadManager> {
        self.managers.iter().find(|m| line.starts_with(m.directive))
    }

    pub fn names(&self) -> Vec<String> {
        self.managers.iter().map(|m| m.kind.to_string()).collect()
    }
}

fn patterns(raw: &[&str]) -> Vec<Regex> {
    raw.iter()
        .map(|p| Regex::new(p).expect("directive pattern compiles"))
        .collect()
}

/// Index-aligned lists must have the same length; a row violating this is a
/// configuration error, so it fails loudly at registry load.
fn validate(m: &WorkloadManager) {
    let n = m.arg_patterns.len();
    assert_eq!(m.arg_templates.len(), n, "{}: arg template list", m.kind);
    assert_eq!(m.flag_patterns.len(), n, "{}: flag pattern list", m.kind);
    assert_eq!(m.flag_templates.len(), n, "{}: flag template list", m.kind);
    assert_eq!(m.name_args.len(), n, "{}: name spelling list", m.kind);
    assert_eq!(m.time_args.len(), n, "{}: time spelling list", m.kind);
    assert_eq!(m.stdout_args.len(), n, "{}: stdout spelling list", m.kind);
    assert_eq!(m.stderr_args.len(), n, "{}: stderr spelling list", m.kind);
    assert_eq!(m.directory_args.len(), n, "{}: directory spelling list", m.kind);
    assert!(!m.time_templates.is_empty(), "{}: no duration templates", m.kind);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_are_aligned() {
        // Registry::load panics on a misaligned row
        let registry = Registry::load();
        assert_eq!(registry.names(), vec!["Slurm", "LoadLeveler"]);
    }

    #[test]
    fn infers_manager_from_directive_token() {
        let registry = Registry::load();
        let slurm = registry.infer("#SBATCH --time=01:00:00").unwrap();
        assert_eq!(slurm.kind, ManagerKind::Slurm);
        let ll = registry.infer("#@ wall_clock_limit = 01:00:00").unwrap();
        assert_eq!(ll.kind, ManagerKind::LoadLeveler);
        assert!(registry.infer("#PBS -l walltime=1:00:00").is_none());
    }

    #[test]
    fn finds_managers_by_name() {
        let registry = Registry::load();
        assert_eq!(registry.find("Slurm").unwrap().kind, ManagerKind::Slurm);
        assert!(registry.find("slurm").is_none());
        assert!(registry.find("PBS").is_none());
    }
}
