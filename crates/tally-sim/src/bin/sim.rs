#![forbid(unsafe_code)]

use anyhow::Result;
use tally_sim::campaign::{CampaignConfig, run_campaign};

fn main() -> Result<()> {
    let report = run_campaign(&CampaignConfig::default())?;

    println!(
        "campaign complete: seeds={} passed={} interesting={} first_failure={:?}",
        report.seeds_run, report.seeds_passed, report.interesting_states_reached, report.first_failure
    );
    for failure in &report.failures {
        for violation in &failure.violations {
            println!("  seed {}: {violation}", failure.seed);
        }
    }

    if !report.all_passed() {
        anyhow::bail!("{} seed(s) violated invariants", report.failures.len());
    }
    Ok(())
}
