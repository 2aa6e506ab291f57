use super::engine;
use crate::output;
use anyhow::Result;
use clap::Args;
use mirror_core::types::CandidateKind;
use std::path::Path;

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub async fn run(root: &Path, args: StatusArgs) -> Result<()> {
    let manager = engine::manager(root)?;
    let report = manager.status().await?;

    if args.json {
        let json = serde_json::json!({
            "remote": report.changes,
            "local": report.pending,
            "warnings": report.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    output::warnings(&report.warnings);

    output::header("Remote changes");
    if report.changes.is_empty() {
        println!("  none");
    } else {
        output::change_set(&report.changes);
        output::hint("Run `mirror pull` to apply them");
    }

    println!();
    output::header("Local changes");
    if report.pending.is_empty() {
        println!("  none");
    } else {
        for candidate in &report.pending {
            let mark = match candidate.kind {
                CandidateKind::New => "new",
                CandidateKind::Modified => "modified"
            };
            println!("  {:<8} {}", mark, candidate.path);
        }
        output::hint("Run `mirror push` to send them");
    }
    Ok(())
}
