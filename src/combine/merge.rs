//! Merge one partition into a single combined job

use crate::job::script::{sum_times, Job};

/// Conventional output targets of every combined job, distinct from any
/// member's own targets because members redirect into the combined job's
/// working directory.
pub const COMBINED_STDOUT: &str = "job.out";
pub const COMBINED_STDERR: &str = "job.err";

/// Name used when the members share no common name fragment.
const FALLBACK_NAME: &str = "Job";

/// Merge a partition into one synthetic job plus the script body that runs
/// every member in its own working directory.
///
/// Callers guarantee a non-empty partition; the public flow can not produce
/// an empty one.
pub fn combine(jobs: &[Job]) -> (Job, String) {
    assert!(!jobs.is_empty());

    // members are combinable, so params and manager are shared
    let params = jobs[0].params.clone();
    let manager = jobs[0].manager;

    let mut best = jobs[0].name.clone().unwrap_or_default();
    for job in jobs {
        best = longest_common_substring(&best, job.name.as_deref().unwrap_or_default());
    }
    let name = if best.trim().is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        best
    };

    let mut body = String::new();
    for job in jobs {
        let directory = job
            .directory
            .as_ref()
            .expect("parsed job has a working directory");
        let file = job.file.as_ref().expect("parsed job has a script file");

        body += &format!("cd \"{}\"\n", directory.display());
        body += &format!("\"{}\"", file.display());
        if job.stdout.is_some() {
            body += &format!(" >{COMBINED_STDOUT}");
        }
        if job.stderr.is_some() {
            body += &format!(" 2>{COMBINED_STDERR}");
        }
        body += "\n\n";
    }

    let combined = Job {
        file: None,
        name: Some(name),
        directory: None,
        time: sum_times(jobs),
        stdout: Some(COMBINED_STDOUT.to_string()),
        stderr: Some(COMBINED_STDERR.to_string()),
        params,
        manager,
    };

    (combined, body)
}

/// Longest common contiguous substring, leftmost on ties.
fn longest_common_substring(a: &str, b: &str) -> String {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    // lengths[j] = length of the common suffix ending at a[i] and b[j-1]
    let mut lengths = vec![0usize; b_chars.len() + 1];
    let mut best_len = 0;
    let mut best_end = 0;

    for (i, ca) in a_chars.iter().enumerate() {
        // walk j backwards so lengths[j - 1] still holds the previous row
        for j in (1..=b_chars.len()).rev() {
            if b_chars[j - 1] == *ca {
                lengths[j] = lengths[j - 1] + 1;
                if lengths[j] > best_len {
                    best_len = lengths[j];
                    best_end = i + 1;
                }
            } else {
                lengths[j] = 0;
            }
        }
    }

    a_chars[best_end - best_len..best_end].iter().collect()
}
