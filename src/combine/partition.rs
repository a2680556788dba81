//! Greedy balanced partitioning under aggregate-time constraints

use std::error::Error;
use std::fmt;
use std::time::Duration;

use log::{info, warn};

use crate::job::script::{sum_times, Job};
use crate::timefmt;

/// Template for constraint values on the command line and in log output.
pub const CONSTRAINT_TEMPLATE: &str = "%H:%M:%S";

/// The max-time constraint is below the min-time constraint.
#[derive(Debug)]
pub struct InvalidConstraint;

impl fmt::Display for InvalidConstraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "max time has to be larger than min time")
    }
}

impl Error for InvalidConstraint {}

enum Violation {
    Over,
    Under,
}

/// Split `jobs` into partitions with balanced aggregate times, within the
/// given bounds where possible.
///
/// Starts from `min(parallel, |jobs|)` partitions and retries with one more
/// when a partition runs over the max, one fewer when a partition falls
/// under the min. When the retry direction starts to oscillate between two
/// neighboring counts, the constraint selected by `break_max` is dropped
/// with a warning instead of looping forever. Unsatisfiable constraints
/// never fail; the best-effort result is returned.
pub fn partition(
    jobs: Vec<Job>,
    max_time: Option<Duration>,
    min_time: Option<Duration>,
    parallel: usize,
    break_max: bool,
) -> Result<Vec<Vec<Job>>, InvalidConstraint> {
    assert!(!jobs.is_empty());

    let tmax = max_time.unwrap_or(Duration::MAX);
    let tmin = min_time.unwrap_or(Duration::ZERO);
    if tmax < tmin {
        return Err(InvalidConstraint);
    }

    info!("Partitioning results for {} combinable scripts", jobs.len());

    let mut sorted = jobs;
    // stable: jobs with equal times keep their insertion order
    sorted.sort_by_key(|job| job.time);

    let mut target = sorted.len().min(parallel).max(1);
    let mut previous: Option<usize> = None;

    let parts = loop {
        let parts = distribute(&sorted, target);

        match first_violation(&parts, tmax, tmin) {
            None => break parts,
            Some(Violation::Over) => {
                if target >= sorted.len() {
                    warn!(
                        "Could not fulfill max_time = {} constraint as there exists a single script with a longer time.",
                        timefmt::format(tmax, CONSTRAINT_TEMPLATE)
                    );
                    break parts;
                }
                if previous == Some(target + 1) && break_max {
                    warn!(
                        "Could not fulfill both time constraints simultaneously. Breaking the max_time = {} constraint.",
                        timefmt::format(tmax, CONSTRAINT_TEMPLATE)
                    );
                    break parts;
                }
                previous = Some(target);
                target += 1; // need more partitions
            }
            Some(Violation::Under) => {
                if target == 1 {
                    warn!(
                        "Could not fulfill min_time = {} constraint as there are not enough combinable scripts to reach this time.",
                        timefmt::format(tmin, CONSTRAINT_TEMPLATE)
                    );
                    break parts;
                }
                if previous == Some(target - 1) && !break_max {
                    warn!(
                        "Could not fulfill both time constraints simultaneously. Breaking the min_time = {} constraint.",
                        timefmt::format(tmin, CONSTRAINT_TEMPLATE)
                    );
                    break parts;
                }
                previous = Some(target);
                target -= 1; // need fewer partitions
            }
        }
    };

    if parts.len() > parallel && parallel > 1 {
        warn!(
            "Could not partition the jobs to less than {parallel} partitions. Try relaxing the max_time constraint."
        );
    }

    let times: Vec<String> = parts
        .iter()
        .map(|part| timefmt::format(sum_times(part), CONSTRAINT_TEMPLATE))
        .collect();
    info!("{} partitions with times: {}", parts.len(), times.join(", "));

    Ok(parts)
}

/// Seed one partition per target with the smallest jobs, then hand each
/// remaining job (still ascending) to the partition with the smallest
/// aggregate time, first partition on ties.
fn distribute(sorted: &[Job], target: usize) -> Vec<Vec<Job>> {
    let mut parts: Vec<Vec<Job>> = sorted[..target].iter().map(|job| vec![job.clone()]).collect();

    for job in &sorted[target..] {
        let smallest = parts
            .iter()
            .enumerate()
            .min_by_key(|(_, part)| sum_times(part))
            .map(|(i, _)| i)
            .expect("at least one partition is seeded");
        parts[smallest].push(job.clone());
    }

    parts
}

/// First partition, in partition order, whose aggregate time is out of
/// bounds.
fn first_violation(parts: &[Vec<Job>], tmax: Duration, tmin: Duration) -> Option<Violation> {
    for part in parts {
        let time = sum_times(part);
        if time > tmax {
            return Some(Violation::Over);
        } else if time < tmin {
            return Some(Violation::Under);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::wlm::ManagerKind;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn job(label: &str, time: Duration) -> Job {
        Job {
            file: Some(PathBuf::from(format!("/work/{label}.sh"))),
            name: Some(label.to_string()),
            directory: Some(PathBuf::from("/work")),
            time,
            stdout: None,
            stderr: None,
            params: Vec::new(),
            manager: ManagerKind::Slurm,
        }
    }

    fn labels(part: &[Job]) -> Vec<&str> {
        part.iter().map(|j| j.name.as_deref().unwrap()).collect()
    }

    #[test]
    fn single_target_merges_everything() {
        let jobs = vec![
            job("a", minutes(10)),
            job("b", minutes(10)),
            job("c", minutes(10)),
        ];
        let parts = partition(jobs, None, None, 1, false).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(sum_times(&parts[0]), minutes(30));
    }

    #[test]
    fn oversized_job_ends_up_alone_without_failing() {
        let jobs = vec![
            job("a", minutes(5)),
            job("b", minutes(5)),
            job("big", minutes(50)),
        ];
        let parts = partition(jobs, Some(minutes(10)), None, 1, false).unwrap();

        assert!(parts.len() >= 2);
        let big = parts
            .iter()
            .find(|p| p.iter().any(|j| j.name.as_deref() == Some("big")))
            .unwrap();
        assert_eq!(big.len(), 1);
    }

    #[test]
    fn partitions_conserve_the_input() {
        let jobs = vec![
            job("a", minutes(3)),
            job("b", minutes(7)),
            job("c", minutes(7)),
            job("d", minutes(20)),
        ];
        let parts = partition(jobs, Some(minutes(15)), None, 2, false).unwrap();

        let mut seen: Vec<&str> = parts.iter().flat_map(|p| labels(p)).collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn balanced_result_respects_both_bounds() {
        let jobs = vec![
            job("a", minutes(10)),
            job("b", minutes(20)),
            job("c", minutes(30)),
        ];
        let parts = partition(jobs, Some(minutes(40)), Some(minutes(20)), 2, false).unwrap();

        assert_eq!(parts.len(), 2);
        for part in &parts {
            let time = sum_times(part);
            assert!(time >= minutes(20) && time <= minutes(40));
        }
    }

    #[test]
    fn remaining_jobs_go_to_the_first_smallest_partition() {
        // seeds [a=5] [b=5]; c joins the first partition on the tie
        let jobs = vec![
            job("a", minutes(5)),
            job("b", minutes(5)),
            job("c", minutes(6)),
        ];
        let parts = partition(jobs, None, None, 2, false).unwrap();
        assert_eq!(labels(&parts[0]), vec!["a", "c"]);
        assert_eq!(labels(&parts[1]), vec!["b"]);
    }

    #[test]
    fn max_below_min_is_rejected() {
        let jobs = vec![job("a", minutes(10))];
        let err = partition(jobs, Some(minutes(5)), Some(minutes(10)), 1, false);
        assert!(err.is_err());
    }

    #[test]
    fn oscillation_breaks_min_constraint_by_default() {
        // two 6-minute jobs can satisfy min=10 only together and max=11
        // only apart; without break-max the min constraint gives way
        let jobs = vec![job("a", minutes(6)), job("b", minutes(6))];
        let parts = partition(jobs, Some(minutes(11)), Some(minutes(10)), 2, false).unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn oscillation_breaks_max_constraint_when_asked() {
        let jobs = vec![job("a", minutes(6)), job("b", minutes(6))];
        let parts = partition(jobs, Some(minutes(11)), Some(minutes(10)), 2, true).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(sum_times(&parts[0]), minutes(12));
    }

    #[test]
    fn min_time_with_a_single_job_is_best_effort() {
        let jobs = vec![job("a", minutes(5))];
        let parts = partition(jobs, None, Some(minutes(30)), 1, false).unwrap();
        assert_eq!(parts.len(), 1);
    }
}
