use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use backoff::{backoff::Backoff, ExponentialBackoff};
use tokio::time::Instant;

use crate::config::Credentials;
use crate::driver::{Browser, Locator};
use crate::error::HarvestError;
use crate::selectors::SelectorTable;

pub const LOGIN_FIELD_WAIT: Duration = Duration::from_secs(30);
pub const LOGIN_LANDING_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub enum WaitError {
    Timeout,
    Browser(anyhow::Error),
}

/// Polls until `loc` matches at least one element or `timeout` passes.
/// Browser errors while polling end the wait immediately.
pub async fn wait_for_present<B: Browser + ?Sized>(
    drv: &B,
    loc: &Locator,
    timeout: Duration,
) -> Result<(), WaitError> {
    let deadline = Instant::now() + timeout;
    let mut eb = ExponentialBackoff {
        current_interval: Duration::from_millis(250),
        initial_interval: Duration::from_millis(250),
        max_interval: Duration::from_secs(2),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };
    loop {
        if drv.count(loc).await.map_err(WaitError::Browser)? > 0 {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout);
        }
        let step = eb.next_backoff().unwrap_or(eb.max_interval);
        tokio::time::sleep(step.min(deadline - now)).await;
    }
}

/// Where the login diagnostics go.
#[derive(Debug, Clone)]
pub struct LoginArtifacts {
    pub on_timeout: PathBuf,
    pub on_error: PathBuf,
}

impl Default for LoginArtifacts {
    fn default() -> Self {
        Self {
            on_timeout: PathBuf::from("login_timeout.png"),
            on_error: PathBuf::from("login_error.png"),
        }
    }
}

async fn login_steps<B: Browser + ?Sized>(
    drv: &B,
    creds: &Credentials,
    sel: &SelectorTable,
) -> Result<(), HarvestError> {
    drv.goto(&sel.login_url).await?;

    let fields = [
        ("email input", sel.email_locator()),
        ("password input", sel.password_locator()),
        ("login button", sel.login_button_locator()),
    ];
    for (what, loc) in &fields {
        match wait_for_present(drv, loc, LOGIN_FIELD_WAIT).await {
            Ok(()) => tracing::info!("{what} found"),
            Err(WaitError::Timeout) => return Err(HarvestError::LoginTimeout(what.to_string())),
            Err(WaitError::Browser(e)) => return Err(HarvestError::Login(e.to_string())),
        }
    }

    let email = drv.first(&fields[0].1).await?;
    let password = drv.first(&fields[1].1).await?;
    let submit = drv.first(&fields[2].1).await?;
    drv.send_keys(&email, &creds.email).await?;
    drv.send_keys(&password, &creds.password).await?;
    tracing::info!("Submitting credentials for {}", creds.email);
    drv.click(&submit).await?;

    match wait_for_present(drv, &sel.logged_in_locator(), LOGIN_LANDING_WAIT).await {
        Ok(()) => Ok(()),
        Err(WaitError::Timeout) => Err(HarvestError::LoginTimeout("home page".into())),
        Err(WaitError::Browser(e)) => Err(HarvestError::Login(e.to_string())),
    }
}

/// Runs the login form. On failure a screenshot is saved before the error
/// is returned; the caller is expected to close the session and stop.
pub async fn login<B: Browser + ?Sized>(
    drv: &B,
    creds: &Credentials,
    sel: &SelectorTable,
    artifacts: &LoginArtifacts,
) -> Result<(), HarvestError> {
    tracing::info!("Attempting to log in...");
    let res = login_steps(drv, creds, sel).await;
    match &res {
        Ok(()) => tracing::info!("Logged in successfully."),
        Err(e) => {
            let shot = match e {
                HarvestError::LoginTimeout(_) => &artifacts.on_timeout,
                _ => &artifacts.on_error,
            };
            tracing::error!("Login failed: {e}");
            if let Err(se) = drv.screenshot(shot).await {
                tracing::warn!("{se:#}");
            }
        }
    }
    res
}
