mod cli;

use anyhow::{anyhow, Context};
use github_ratelimit::config::Config;
use github_ratelimit::http::{self, RateLimitOverview};
use github_ratelimit::types::RateReport;
use github_ratelimit::{RateLimitSnapshot, RateLimitTracker, SystemClock};
use log::{debug, info};
use std::collections::BTreeMap;

#[tokio::main(flavor = "current_thread")] // a single request; no worker pool needed
async fn main() -> anyhow::Result<()> {
    let cmd = cli::build_cli();
    let matches = cmd.get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    let version_flag = matches.get_flag("version");

    cli::init_logging(log_level.as_deref());

    if version_flag {
        println!("github-ratelimit {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let resource = matches
        .get_one::<String>("resource")
        .cloned()
        .unwrap_or_else(|| "core".to_string());
    let all = matches.get_flag("all");
    let json = matches.get_flag("json");

    let cfg = Config::from_env()?;
    debug!("Querying {}/rate_limit", cfg.api_url);
    let client = http::build_client(&cfg)?;
    let overview = http::fetch_rate_limit(&client, &cfg)
        .await
        .context("fetching rate limit")?;

    let selected = select(&overview, &resource, all)?;

    let tracker = RateLimitTracker::new();
    if let Some(core) = overview.resource("core") {
        tracker.observe(*core);
    }
    if let Some(from_headers) = overview.headers {
        tracker.observe(from_headers);
    }
    info!("current core rate limit: {}", tracker.current());

    if json {
        let reports: BTreeMap<&str, RateReport> = selected
            .iter()
            .map(|(name, s)| (*name, RateReport::from_snapshot(s, &SystemClock)))
            .collect();
        println!("{}", serde_json::to_string(&reports)?);
    } else {
        for (name, snapshot) in &selected {
            let status = if snapshot.is_expired() { " (expired)" } else { "" };
            println!("{}: {}{}", name, snapshot, status);
        }
    }
    Ok(())
}

fn select<'a>(
    overview: &'a RateLimitOverview,
    resource: &'a str,
    all: bool,
) -> anyhow::Result<Vec<(&'a str, RateLimitSnapshot)>> {
    if all {
        return Ok(overview
            .resources
            .iter()
            .map(|(name, s)| (name.as_str(), *s))
            .collect());
    }
    overview
        .resource(resource)
        .map(|s| vec![(resource, *s)])
        .ok_or_else(|| anyhow!("unknown rate limit resource: {}", resource))
}
