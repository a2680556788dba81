//! Render a Job back into directive lines of its manager's dialect

use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::job::script::Job;
use crate::timefmt;
use crate::wlm::{Registry, WorkloadManager};

/// Rendering context for a single directive line
#[derive(Serialize)]
struct DirectiveContext<'a> {
    arg: &'a str,
    val: &'a str,
}

impl Job {
    /// Directive header block for this job, one line per set field.
    ///
    /// Role directives render through the first spelling the manager
    /// offers; resource parameters render through the spelling they were
    /// parsed with. The time limit uses the manager's primary duration
    /// template and is always present.
    pub fn to_directives(&self, registry: &Registry) -> String {
        let m = registry.get(self.manager);
        let mut out = String::new();

        if let Some(name) = &self.name {
            out += &role_directive(m, &m.name_args, name);
        }
        out += &role_directive(m, &m.time_args, &timefmt::format(self.time, m.time_templates[0]));
        if let Some(directory) = &self.directory {
            out += &role_directive(m, &m.directory_args, &directory.display().to_string());
        }
        if let Some(stdout) = &self.stdout {
            out += &role_directive(m, &m.stdout_args, stdout);
        }
        if let Some(stderr) = &self.stderr {
            out += &role_directive(m, &m.stderr_args, stderr);
        }

        for param in &self.params {
            let template = match &param.value {
                Some(_) => m.arg_templates[param.spelling],
                None => m.flag_templates[param.spelling],
            };
            let val = param.value.as_deref().unwrap_or_default();
            out += &directive_line(m, template, &param.key, val);
        }

        out
    }
}

fn role_directive(m: &WorkloadManager, spellings: &[Option<&str>], val: &str) -> String {
    for (i, spelling) in spellings.iter().enumerate() {
        if let Some(arg) = spelling {
            return directive_line(m, m.arg_templates[i], arg, val);
        }
    }
    String::new()
}

fn directive_line(m: &WorkloadManager, template: &str, arg: &str, val: &str) -> String {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("directive", template).expect("render template");
    let rendered = tt
        .render("directive", &DirectiveContext { arg, val })
        .expect("rendered directive");
    format!("{} {}\n", m.directive, rendered)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::job::script::{Job, ResourceParam};
    use crate::wlm::{ManagerKind, Registry};

    fn base_job(manager: ManagerKind) -> Job {
        Job {
            file: None,
            name: None,
            directory: None,
            time: Duration::from_secs(30 * 60),
            stdout: None,
            stderr: None,
            params: Vec::new(),
            manager,
        }
    }

    #[test]
    fn renders_slurm_roles_through_primary_spellings() {
        let registry = Registry::load();
        let mut job = base_job(ManagerKind::Slurm);
        job.name = Some("bench".to_string());
        job.directory = Some(PathBuf::from("/scratch/bench"));
        job.stdout = Some("job.out".to_string());
        job.stderr = Some("job.err".to_string());

        let header = job.to_directives(&registry);
        let lines: Vec<&str> = header.lines().collect();
        assert_eq!(
            lines,
            vec![
                "#SBATCH --job-name=bench",
                "#SBATCH --time=00-00:30:00",
                // the only directory spelling Slurm offers is the short one
                "#SBATCH -D /scratch/bench",
                "#SBATCH --output=job.out",
                "#SBATCH --error=job.err",
            ]
        );
    }

    #[test]
    fn parameters_keep_their_parsed_spelling() {
        let registry = Registry::load();
        let mut job = base_job(ManagerKind::Slurm);
        job.params = vec![
            ResourceParam {
                key: "exclusive".to_string(),
                spelling: 0,
                value: None,
            },
            ResourceParam {
                key: "p".to_string(),
                spelling: 1,
                value: Some("fast".to_string()),
            },
        ];

        let header = job.to_directives(&registry);
        assert!(header.contains("#SBATCH --exclusive\n"));
        assert!(header.contains("#SBATCH -p fast\n"));
    }

    #[test]
    fn renders_loadleveler_dialect() {
        let registry = Registry::load();
        let mut job = base_job(ManagerKind::LoadLeveler);
        job.name = Some("md_sim".to_string());
        job.params = vec![ResourceParam {
            key: "queue".to_string(),
            spelling: 0,
            value: None,
        }];

        let header = job.to_directives(&registry);
        let lines: Vec<&str> = header.lines().collect();
        assert_eq!(
            lines,
            vec![
                "#@ job_name = md_sim",
                "#@ wall_clock_limit = 00:30:00",
                "#@ queue",
            ]
        );
    }
}
