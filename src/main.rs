use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

mod cli;
mod config;
mod driver;
mod error;
mod extract;
mod logging;
mod models;
mod nav;
mod numerals;
mod selectors;
mod store;
mod walker;

use crate::cli::Args;
use crate::config::Credentials;
use crate::driver::{Session, SessionOptions};
use crate::models::LocalClock;
use crate::nav::{login, LoginArtifacts};
use crate::selectors::{PostSelectors, SelectorTable};
use crate::store::PostStore;
use crate::walker::{FeedWalker, WalkKnobs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let clock = LocalClock::from_hours(args.utc_offset_hours)
        .ok_or_else(|| anyhow!("utc offset {}h is out of range", args.utc_offset_hours))?;
    let _log_guard = logging::init(&args.log_file, clock)?;

    let creds = Credentials::load(&args.config)?;
    let table = match &args.selectors {
        Some(path) => SelectorTable::load(path)?,
        None => SelectorTable::default(),
    };
    let sel = PostSelectors::try_from(&table)?;

    let mut store = PostStore::load(&creds.output_file);
    if store.is_empty() {
        tracing::info!("Starting a new table at {}", store.path().display());
    }

    let opts = SessionOptions {
        webdriver_url: args.webdriver_url.clone(),
        headless: args.headless,
        ..SessionOptions::default()
    };
    let session = Session::open(&opts)
        .await
        .with_context(|| format!("starting browser session at {}", opts.webdriver_url))?;

    if let Err(e) = login(&session, &creds, &table, &LoginArtifacts::default()).await {
        session.close().await;
        return Err(e.into());
    }

    let knobs = WalkKnobs {
        settle: Duration::from_secs(args.settle),
        scroll_pause: Duration::from_secs(args.pause),
        ceiling: Duration::from_secs_f64(args.minutes.max(0.0) * 60.0),
        ..WalkKnobs::default()
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {wide_msg}")?.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Walking feed...");

    let res = FeedWalker::new(&session, &table, &sel, clock, knobs)
        .with_progress(pb)
        .walk(&creds.group_url, &mut store)
        .await;
    session.close().await;

    let outcome = res?;
    eprintln!(
        "[DONE] {} posts in {} after {} passes ({:?})",
        store.len(),
        store.path().display(),
        outcome.passes,
        outcome.reason
    );
    Ok(())
}
