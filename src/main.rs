//! Combines many small scheduler jobs into fewer, larger combined jobs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{error, info, LevelFilter};

mod combine;
mod db;
mod job;
mod timefmt;
mod wlm;

use crate::combine::{emit, merge, partition};
use crate::db::store;
use crate::job::parse;
use crate::job::script::sum_times;
use crate::wlm::Registry;

#[derive(Parser)]
#[command(name = "kimppu")]
#[command(about = "Combines multiple job files into a single job")]
struct Args {
    /// Path to the file the added scripts are stored in
    #[arg(short = 's', long, global = true, default_value = "kimppu.db")]
    storage_file: PathBuf,

    /// Increases verbosity level
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a job for combination with the other stored jobs
    Add {
        /// Job file containing a single task
        job_file: PathBuf,
        /// Type of the job file; inferred from the directives if not set
        #[arg(short = 'w', long)]
        workload_manager: Option<String>,
    },
    /// Combine the stored jobs to as few as possible job files and
    /// optionally dispatch them to the queue of the workload manager
    Queue {
        /// Dispatch the combined scripts immediately after creating them
        #[arg(long)]
        dispatch: bool,
        /// Directory to store the combined scripts in
        #[arg(short = 'd', long, default_value = "scripts")]
        output_dir: PathBuf,
        /// No combined job will have a runtime longer than this value
        #[arg(short = 't', long)]
        max_time: Option<String>,
        /// No combined job will have a runtime shorter than this value
        #[arg(short = 'm', long)]
        min_time: Option<String>,
        /// Tries to distribute the jobs equally to this many scripts
        #[arg(short = 'p', long, default_value_t = 1)]
        parallel: usize,
        /// Break the max_time constraint instead of the min_time constraint
        /// if not both can be fulfilled at the same time
        #[arg(long)]
        break_max: bool,
    },
    /// Display information about the stored jobs
    Status,
    /// Remove all stored jobs
    Clear,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
    info!("terve! starting up :)");

    let registry = Registry::load();

    match &args.command {
        Command::Add {
            job_file,
            workload_manager,
        } => add(&args, job_file, workload_manager.as_deref(), &registry),
        Command::Queue {
            dispatch,
            output_dir,
            max_time,
            min_time,
            parallel,
            break_max,
        } => queue(
            &args,
            QueueOptions {
                dispatch: *dispatch,
                output_dir,
                max_time: max_time.as_deref(),
                min_time: min_time.as_deref(),
                parallel: *parallel,
                break_max: *break_max,
            },
            &registry,
        ),
        Command::Status => status(&args, &registry),
        Command::Clear => clear(&args),
    }
}

fn add(args: &Args, job_file: &Path, manager: Option<&str>, registry: &Registry) -> Result<()> {
    let job = parse::parse_job(job_file, manager, registry)?;
    make_executable(job.file.as_ref().expect("parsed job has a file"))?;

    let conn = store::open_for_append(&args.storage_file)?;
    store::append_job(&conn, &job)?;

    println!("Added job successfully.");
    Ok(())
}

/// The combined script invokes members directly, so every stored script has
/// to carry execute permission.
fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = fs::metadata(path)
            .with_context(|| format!("can't read permissions of {}", path.display()))?
            .permissions();
        permissions.set_mode(permissions.mode() | 0o111);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("can't mark {} executable", path.display()))?;
    }
    Ok(())
}

struct QueueOptions<'a> {
    dispatch: bool,
    output_dir: &'a Path,
    max_time: Option<&'a str>,
    min_time: Option<&'a str>,
    parallel: usize,
    break_max: bool,
}

fn queue(args: &Args, opts: QueueOptions, registry: &Registry) -> Result<()> {
    let max_time = opts
        .max_time
        .map(|t| timefmt::parse(t, &[partition::CONSTRAINT_TEMPLATE]))
        .transpose()?;
    let min_time = opts
        .min_time
        .map(|t| timefmt::parse(t, &[partition::CONSTRAINT_TEMPLATE]))
        .transpose()?;

    let groups = store::load_groups(&args.storage_file);

    println!("Combining scripts...");

    let mut dir_counter = 0;
    for group in groups {
        let parts = partition::partition(
            group.jobs,
            max_time,
            min_time,
            opts.parallel,
            opts.break_max,
        )?;

        for part in parts {
            let (mut combined, body) = merge::combine(&part);

            let script_dir = opts.output_dir.join(format!("{dir_counter:02}"));
            dir_counter += 1;

            let path = emit::write_script(&mut combined, &body, &script_dir, registry)?;
            if args.verbose >= 1 {
                println!("Written script to {}", path.display());
            }

            if opts.dispatch {
                match emit::dispatch(&combined, registry) {
                    Ok(()) => {
                        if args.verbose >= 1 {
                            println!("Dispatching successful for: {}", path.display());
                        }
                    }
                    Err(err) => error!("Dispatching failed for {}: {err:#}", path.display()),
                }
            }
        }
    }

    println!("Done combining scripts.");
    Ok(())
}

fn status(args: &Args, registry: &Registry) -> Result<()> {
    let groups = store::load_groups(&args.storage_file);
    let n_jobs: usize = groups.iter().map(|group| group.jobs.len()).sum();

    let times: Vec<String> = groups
        .iter()
        .map(|group| {
            let manager = registry.get(group.jobs[0].manager);
            timefmt::format(sum_times(&group.jobs), manager.time_templates[0])
        })
        .collect();

    println!(
        "Stored {} jobs that can be combined to {} tasks with the times [{}].",
        n_jobs,
        groups.len(),
        times.join(", ")
    );

    if args.verbose >= 1 {
        for (i, group) in groups.iter().enumerate() {
            let manager = registry.get(group.jobs[0].manager);
            println!("\nGroup {} ({}):", i, manager.kind);
            for job in &group.jobs {
                let file = job
                    .file
                    .as_deref()
                    .map(|f| f.display().to_string())
                    .unwrap_or_default();
                println!(
                    "  {} ({})",
                    file,
                    timefmt::format(job.time, manager.time_templates[0])
                );
                if args.verbose >= 2 {
                    for param in &job.params {
                        match &param.value {
                            Some(value) => println!("    {} = {}", param.key, value),
                            None => println!("    {}", param.key),
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn clear(args: &Args) -> Result<()> {
    if store::clear(&args.storage_file)? {
        println!("Deleted storage file.");
    } else {
        println!("No storage file to delete.");
    }
    Ok(())
}
