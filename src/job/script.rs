use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wlm::ManagerKind;

/// One directive that does not map to a job role.
///
/// `spelling` records which syntax variant of the manager's dialect the
/// directive was written in, so re-rendering reproduces it exactly. A
/// missing value marks a boolean flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceParam {
    pub key: String,
    pub spelling: usize,
    pub value: Option<String>,
}

/// A single schedulable task in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Absolute path of the submission script; absent for combined jobs
    /// until they are written to disk.
    pub file: Option<PathBuf>,
    pub name: Option<String>,
    /// Absolute working directory. A combined job receives one when its
    /// output directory is allocated.
    pub directory: Option<PathBuf>,
    pub time: Duration,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Always sorted by key, which makes grouping order-independent.
    pub params: Vec<ResourceParam>,
    pub manager: ManagerKind,
}

impl Job {
    /// Jobs with equal keys are interchangeable for merging.
    ///
    /// Deterministic because `params` is sorted before a job is stored.
    pub fn group_key(&self) -> String {
        serde_json::to_string(&(self.manager, &self.params))
            .expect("job parameters serialize to JSON")
    }
}

/// Aggregate time of a list of jobs.
pub fn sum_times(jobs: &[Job]) -> Duration {
    jobs.iter().map(|job| job.time).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(params: Vec<ResourceParam>) -> Job {
        Job {
            file: None,
            name: None,
            directory: None,
            time: Duration::from_secs(60),
            stdout: None,
            stderr: None,
            params,
            manager: ManagerKind::Slurm,
        }
    }

    fn param(key: &str, value: Option<&str>) -> ResourceParam {
        ResourceParam {
            key: key.to_string(),
            spelling: 0,
            value: value.map(|v| v.to_string()),
        }
    }

    #[test]
    fn equal_params_share_a_group_key() {
        let a = job(vec![param("nodes", Some("4")), param("exclusive", None)]);
        let b = job(vec![param("nodes", Some("4")), param("exclusive", None)]);
        assert_eq!(a.group_key(), b.group_key());
    }

    #[test]
    fn differing_params_split_groups() {
        let a = job(vec![param("nodes", Some("4"))]);
        let b = job(vec![param("nodes", Some("8"))]);
        assert_ne!(a.group_key(), b.group_key());
    }

    #[test]
    fn sums_job_times() {
        let jobs = vec![job(vec![]), job(vec![]), job(vec![])];
        assert_eq!(sum_times(&jobs), Duration::from_secs(180));
    }
}
