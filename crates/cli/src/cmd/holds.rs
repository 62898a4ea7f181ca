//! List holds and step bookmarks across the host

use anyhow::{Context, Result};
use endpoint::{JobID, LastReceivedHold, ListStepAllOutput};
use owo_colors::OwoColorize;
use serde::Serialize;
use zfs::ZfsCli;

/// Combined listing. The field names are a stable surface for operator
/// tooling; do not rename.
#[derive(Serialize)]
struct Listing {
    #[serde(rename = "StepHolds")]
    step_holds: ListStepAllOutput,
    #[serde(rename = "LastReceivedHolds")]
    last_received_holds: Vec<LastReceivedHold>,
}

pub async fn list(job: Option<&str>, json: bool) -> Result<()> {
    let job = job.map(JobID::new).transpose().context("invalid --job")?;

    let zfs = ZfsCli::new();

    // 1. Walk the host
    let mut steps = endpoint::list_step_all(&zfs).await?;
    let mut last_received = endpoint::list_last_received_all(&zfs).await?;

    // 2. Narrow to the requested job
    if let Some(job) = &job {
        steps.step_holds.retain(|h| &h.job_id == job);
        steps.step_bookmarks.retain(|b| &b.job_id == job);
        last_received.retain(|h| &h.job_id == job);
    }

    // 3. Print
    if json {
        let listing = Listing {
            step_holds: steps,
            last_received_holds: last_received,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{}", "step holds:".bold());
    if steps.step_holds.is_empty() {
        println!("  (none)");
    }
    for hold in &steps.step_holds {
        println!(
            "  {}@{}  job {}",
            hold.fs.cyan(),
            hold.snap,
            hold.job_id.as_str().green()
        );
    }

    println!("{}", "step bookmarks:".bold());
    if steps.step_bookmarks.is_empty() {
        println!("  (none)");
    }
    for bm in &steps.step_bookmarks {
        println!(
            "  {}#{}  guid {:016x}  job {}",
            bm.fs.cyan(),
            bm.name,
            bm.guid,
            bm.job_id.as_str().green()
        );
    }

    println!("{}", "last-received holds:".bold());
    if last_received.is_empty() {
        println!("  (none)");
    }
    for hold in &last_received {
        println!(
            "  {}@{}  tag {}  job {}",
            hold.fs.cyan(),
            hold.snap,
            hold.tag.yellow(),
            hold.job_id.as_str().green()
        );
    }

    Ok(())
}
