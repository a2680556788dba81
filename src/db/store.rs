//! Persisted job grouping
//!
//! Logically a map from combinability key to the ordered list of jobs added
//! under that key. Jobs are stored as JSON manifests, one row each; groups
//! and their members come back in insertion order. A missing or unreadable
//! storage file is an empty store, never an error to the caller.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use rusqlite::Connection;

use crate::db::open::open_db;
use crate::job::script::Job;

/// The ordered jobs sharing one combinability key.
pub struct JobGroup {
    pub key: String,
    pub jobs: Vec<Job>,
}

/// Load every stored group, oldest first.
pub fn load_groups(path: &Path) -> Vec<JobGroup> {
    if !path.exists() {
        return Vec::new();
    }
    match try_load(path) {
        Ok(groups) => groups,
        Err(err) => {
            warn!(
                "Ignoring unreadable storage file {}: {err:#}",
                path.display()
            );
            Vec::new()
        }
    }
}

fn try_load(path: &Path) -> Result<Vec<JobGroup>> {
    let conn = open_db(path)?;
    let mut stmt = conn.prepare("SELECT group_key, manifest FROM job ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut groups: Vec<JobGroup> = Vec::new();
    for row in rows {
        let (key, manifest) = row?;
        let job: Job = serde_json::from_str(&manifest).context("corrupt job manifest")?;
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.jobs.push(job),
            None => groups.push(JobGroup {
                key,
                jobs: vec![job],
            }),
        }
    }
    Ok(groups)
}

/// Open the storage database for appending.
///
/// An existing file SQLite refuses to open is discarded and replaced, so an
/// `add` always leaves behind a well-formed store.
pub fn open_for_append(path: &Path) -> Result<Connection> {
    match open_db(path) {
        Ok(conn) => Ok(conn),
        Err(err) => {
            warn!("Replacing corrupt storage file {}: {err}", path.display());
            fs::remove_file(path)
                .with_context(|| format!("can't replace storage file {}", path.display()))?;
            Ok(open_db(path)?)
        }
    }
}

/// Append one job under its combinability key.
pub fn append_job(conn: &Connection, job: &Job) -> Result<()> {
    let key = job.group_key();
    let manifest = serde_json::to_string(job)?;
    info!("Storing job under key {key}");
    conn.execute(
        "INSERT INTO job (group_key, manifest) VALUES (?1, ?2)",
        (&key, &manifest),
    )?;
    Ok(())
}

/// Remove the storage file entirely, dropping every group.
///
/// Returns whether a file existed.
pub fn clear(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)
        .with_context(|| format!("can't delete storage file {}", path.display()))?;
    Ok(true)
}
