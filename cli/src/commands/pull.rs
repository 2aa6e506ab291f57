use super::engine;
use crate::{output, ux_error};
use anyhow::Result;
use clap::Args;
use std::path::Path;
use sync::{PullOptions, PullReport, SyncError};

#[derive(Args)]
pub struct PullArgs {
    #[arg(long, help = "Re-download pages even when their versions match")]
    pub force: bool,

    #[arg(long, help = "Show what would change without writing anything")]
    pub dry_run: bool,

    #[arg(
        long = "page",
        value_name = "ID|PATH",
        help = "Only pull this page (repeatable)"
    )]
    pub pages: Vec<String>,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub async fn run(root: &Path, args: PullArgs) -> Result<()> {
    let manager = engine::manager(root)?;
    let report = manager
        .pull(PullOptions {
            force: args.force,
            dry_run: args.dry_run,
            pages: args.pages
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
    if !report.failed.is_empty() {
        return Err(ux_error::pages_failed("Pull", &report.failed).into());
    }
    Ok(())
}

fn to_json(report: &PullReport) -> serde_json::Value {
    serde_json::json!({
        "dryRun": report.dry_run,
        "changes": report.changes,
        "written": report.written,
        "renamed": report.renamed.iter()
            .map(|(from, to)| serde_json::json!({ "from": from, "to": to }))
            .collect::<Vec<_>>(),
        "deleted": report.deleted,
        "kept": report.kept,
        "failed": report.failed.iter()
            .map(|f| serde_json::json!({ "path": f.path, "error": f.error }))
            .collect::<Vec<_>>(),
        "linksRepaired": report.links_repaired,
        "warnings": report.warnings,
        "cancelled": report.cancelled,
    })
}

fn print_report(report: &PullReport) {
    output::warnings(&report.warnings);

    if report.changes.is_empty() {
        output::success("Already up to date");
        return;
    }

    if report.dry_run {
        output::header("Pull (dry run)");
        output::change_set(&report.changes);
        output::hint("Nothing was written");
        return;
    }

    output::header("Pull");
    for path in &report.written {
        println!("  wrote   {}", path);
    }
    for (from, to) in &report.renamed {
        println!("  renamed {} -> {}", from, to);
    }
    for path in &report.deleted {
        println!("  deleted {}", path);
    }
    for path in &report.kept {
        println!("  kept    {} (edited locally)", path);
    }

    println!();
    output::subheader(&format!(
        "{}, {}, {}",
        output::counted("written", report.written.len()),
        output::counted("deleted", report.deleted.len()),
        output::counted("failed", report.failed.len())
    ));
    if report.links_repaired > 0 {
        output::info(&format!(
            "Repaired links in {} document(s)",
            report.links_repaired
        ));
    }
}
