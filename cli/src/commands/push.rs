use super::engine;
use crate::{output, ux_error};
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use sync::{PushOptions, PushReport, SyncError};

#[derive(Args)]
pub struct PushArgs {
    #[arg(value_name = "FILE", help = "Push only this document")]
    pub file: Option<PathBuf>,

    #[arg(long, help = "Overwrite remote changes made since the last pull")]
    pub force: bool,

    #[arg(long, help = "Show the push order without sending anything")]
    pub dry_run: bool,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub async fn run(root: &Path, args: PushArgs) -> Result<()> {
    let manager = engine::manager(root)?;
    let file = args.file.as_deref().map(|f| relative_to_root(root, f));
    let report = manager
        .push(PushOptions {
            file,
            force: args.force,
            dry_run: args.dry_run
        })
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&to_json(&report))?);
    } else {
        print_report(&report);
    }

    if report.cancelled {
        return Err(SyncError::Cancelled.into());
    }
    if !report.conflicts.is_empty() {
        return Err(ux_error::version_conflicts(&report.conflicts).into());
    }
    if !report.failed.is_empty() {
        return Err(ux_error::pages_failed("Push", &report.failed).into());
    }
    Ok(())
}

/// Paths given on the command line may be absolute or relative to the
/// working directory; the engine wants them relative to the mirror root.
fn relative_to_root(root: &Path, file: &Path) -> String {
    let relative = match file.strip_prefix(root) {
        Ok(p) => p.to_path_buf(),
        Err(_) => std::path::absolute(file)
            .ok()
            .zip(std::path::absolute(root).ok())
            .and_then(|(f, r)| f.strip_prefix(&r).ok().map(Path::to_path_buf))
            .unwrap_or_else(|| file.to_path_buf())
    };
    relative.to_string_lossy().replace('\\', "/")
}

fn to_json(report: &PushReport) -> serde_json::Value {
    serde_json::json!({
        "dryRun": report.dry_run,
        "order": report.order,
        "cycles": report.cycles,
        "pushed": report.pushed,
        "skipped": report.skipped,
        "conflicts": report.conflicts.iter()
            .map(|c| serde_json::json!({ "path": c.path, "local": c.local, "remote": c.remote }))
            .collect::<Vec<_>>(),
        "failed": report.failed.iter()
            .map(|f| serde_json::json!({ "path": f.path, "error": f.error }))
            .collect::<Vec<_>>(),
        "warnings": report.warnings,
        "cancelled": report.cancelled,
    })
}

fn print_report(report: &PushReport) {
    output::warnings(&report.warnings);

    if report.order.is_empty() {
        output::success("Nothing to push");
        return;
    }

    if report.dry_run {
        output::header("Push (dry run)");
        for (i, path) in report.order.iter().enumerate() {
            println!("  {}. {}", i + 1, path);
        }
        output::hint("Nothing was sent");
        return;
    }

    output::header("Push");
    for path in &report.pushed {
        println!("  pushed  {}", path);
    }
    for path in &report.skipped {
        println!("  skipped {}", path);
    }
    for c in &report.conflicts {
        println!(
            "  conflict {} (local v{}, remote v{})",
            c.path, c.local, c.remote
        );
    }

    println!();
    output::subheader(&format!(
        "{}, {}, {}",
        output::counted("pushed", report.pushed.len()),
        output::counted("skipped", report.skipped.len()),
        output::counted("failed", report.failed.len() + report.conflicts.len())
    ));
}
