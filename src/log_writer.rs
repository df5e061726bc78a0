//! Human-readable run log, written once at agent disconnect (§4.7c, §6).
//!
//! `logs/<run_name>_<YYYY-MM-DD_HH-MM-SS>.log`, not the wire JSON format —
//! this is for a person tailing the directory, not for re-import.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::domain::event::EventKind;
use crate::domain::run::Run;

fn sanitize_file_component(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn log_path_for(run: &Run, logs_dir: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let filename = format!("{}_{stamp}.log", sanitize_file_component(&run.name));
    logs_dir.join(filename)
}

fn render_run(run: &Run) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run: {} ({})", run.name, run.program_name);
    let _ = writeln!(out, "uuid: {}", run.id);
    let _ = writeln!(out, "started: {}", run.start_time.to_rfc3339());
    let _ = writeln!(out, "server_version: {}", run.server_version);
    out.push('\n');

    for event in run.events_in_order() {
        let _ = writeln!(out, "[{}] {:?}", event.creation_time.to_rfc3339(), event.kind);
        if event.kind == EventKind::DebugMessage {
            if let Some(data) = &event.data {
                let _ = writeln!(out, "    {data}");
            }
        }
        for bp in &event.breakpoints {
            let _ = writeln!(out, "  breakpoint {} ({})", bp.id, bp.agent_name);
            if let Some(summary) = &bp.summary {
                let _ = writeln!(out, "    summary: {summary}");
            }
            let _ = writeln!(out, "    data: {}", bp.effective_data());
        }
    }

    if !run.commits.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "commits:");
        for commit in &run.commits {
            let _ = writeln!(out, "  {} {}", commit.id, commit.title);
            for change in &commit.changes {
                let _ = writeln!(out, "    {:?} {}", change.change_type, change.path);
            }
        }
    }

    out
}

pub fn write_run_log(run: &Run, logs_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(logs_dir)?;
    let path = log_path_for(run, logs_dir);
    std::fs::write(path, render_run(run))
}
