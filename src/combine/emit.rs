//! Write combined jobs to disk and hand them to the scheduler

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::job::script::Job;
use crate::wlm::Registry;

/// File name of every combined submission script.
pub const SCRIPT_FILE: &str = "submit.job";

/// Rendering context for the combined script skeleton
#[derive(Serialize)]
struct ScriptContext {
    time_now: String,
    directives: String,
    body: String,
}

/// Write one combined job into its own output directory.
///
/// Assigns the job its final file path and working directory, then writes
/// the complete submission script: directive header, blank line, body.
pub fn write_script(
    job: &mut Job,
    body: &str,
    script_dir: &Path,
    registry: &Registry,
) -> Result<PathBuf> {
    static COMBINED: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/templates/combined.txt"
    ));

    fs::create_dir_all(script_dir)
        .with_context(|| format!("can't create script directory {}", script_dir.display()))?;
    let script_dir = fs::canonicalize(script_dir)
        .with_context(|| format!("can't resolve script directory {}", script_dir.display()))?;

    let path = script_dir.join(SCRIPT_FILE);
    job.file = Some(path.clone());
    job.directory = Some(script_dir);

    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("combined", COMBINED)
        .expect("combined script template");
    let context = ScriptContext {
        time_now: Utc::now().to_string(),
        directives: job.to_directives(registry),
        body: body.to_string(),
    };
    let content = tt
        .render("combined", &context)
        .expect("rendered combined script");

    fs::write(&path, content)
        .with_context(|| format!("can't write job script {}", path.display()))?;

    Ok(path)
}

/// Hand a written script to its manager's dispatch command.
pub fn dispatch(job: &Job, registry: &Registry) -> Result<()> {
    let m = registry.get(job.manager);
    let file = job.file.as_ref().expect("combined job was written to disk");

    info!("Running {} {}", m.dispatch_command, file.display());
    let status = Command::new(m.dispatch_command)
        .arg(file)
        .status()
        .with_context(|| format!("can't run {}", m.dispatch_command))?;
    if !status.success() {
        bail!("{} exited with {status}", m.dispatch_command);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::combine::merge;
    use crate::job::script::ResourceParam;
    use crate::wlm::ManagerKind;

    fn member(name: &str) -> Job {
        Job {
            file: Some(PathBuf::from(format!("/work/{name}.sh"))),
            name: Some(name.to_string()),
            directory: Some(PathBuf::from("/work")),
            time: Duration::from_secs(600),
            stdout: Some(format!("{name}.out")),
            stderr: None,
            params: vec![ResourceParam {
                key: "nodes".to_string(),
                spelling: 0,
                value: Some("4".to_string()),
            }],
            manager: ManagerKind::Slurm,
        }
    }

    #[test]
    fn writes_a_complete_submission_script() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::load();

        let jobs = vec![member("run_1"), member("run_2")];
        let (mut combined, body) = merge::combine(&jobs);

        let script_dir = dir.path().join("00");
        let path = write_script(&mut combined, &body, &script_dir, &registry).unwrap();

        assert_eq!(path.file_name().unwrap(), SCRIPT_FILE);
        assert_eq!(combined.file.as_deref(), Some(path.as_path()));
        assert_eq!(
            combined.directory.as_deref(),
            Some(fs::canonicalize(script_dir).unwrap().as_path())
        );

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/bash -x\n"));
        assert!(content.contains("#SBATCH --job-name=run_\n"));
        assert!(content.contains("#SBATCH --time=00-00:20:00\n"));
        assert!(content.contains("#SBATCH --nodes=4\n"));
        // header and body separated by a blank line
        assert!(content.contains("\n\ncd \"/work\"\n"));
        assert!(content.contains("\"/work/run_1.sh\" >job.out\n"));
    }

    #[test]
    fn written_script_reparses_to_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::load();

        let jobs = vec![member("run_1"), member("run_2")];
        let (mut combined, body) = merge::combine(&jobs);
        let expected_key = combined.group_key();

        let script_dir = dir.path().join("00");
        let path = write_script(&mut combined, &body, &script_dir, &registry).unwrap();

        let reparsed = crate::job::parse::parse_job(&path, None, &registry).unwrap();
        assert_eq!(reparsed.group_key(), expected_key);
        assert_eq!(reparsed.time, combined.time);
        assert_eq!(reparsed.name, combined.name);
    }
}
