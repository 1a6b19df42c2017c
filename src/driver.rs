use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::prelude::*;
use thirtyfour::PageLoadStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    Name(String),
    XPath(String),
}

impl Locator {
    fn by(&self) -> By {
        match self {
            Locator::Css(s) => By::Css(s.as_str()),
            Locator::Name(s) => By::Name(s.as_str()),
            Locator::XPath(s) => By::XPath(s.as_str()),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{s}`"),
            Locator::Name(s) => write!(f, "name `{s}`"),
            Locator::XPath(s) => write!(f, "xpath `{s}`"),
        }
    }
}

/// What the harvester needs from a browser.
#[async_trait]
pub trait Browser: Send + Sync {
    type Element: Send + Sync;

    async fn goto(&self, url: &str) -> Result<()>;

    async fn find_all(&self, loc: &Locator) -> Result<Vec<Self::Element>>;

    async fn outer_html(&self, el: &Self::Element) -> Result<String>;

    /// `arguments[0].click()`, which ignores overlays that swallow real
    /// clicks.
    async fn script_click(&self, el: &Self::Element) -> Result<()>;

    async fn send_keys(&self, el: &Self::Element, text: &str) -> Result<()>;

    async fn click(&self, el: &Self::Element) -> Result<()>;

    async fn execute(&self, script: &str) -> Result<Value>;

    async fn screenshot(&self, path: &Path) -> Result<()>;

    async fn count(&self, loc: &Locator) -> Result<usize> {
        Ok(self.find_all(loc).await?.len())
    }

    async fn first(&self, loc: &Locator) -> Result<Self::Element> {
        self.find_all(loc)
            .await?
            .into_iter()
            .next()
            .with_context(|| format!("no element matches {loc}"))
    }
}

pub const SCROLL_HEIGHT_JS: &str = "return document.body.scrollHeight;";
pub const SCROLL_TO_BOTTOM_JS: &str =
    "window.scrollTo({ left: 0, top: document.body.clientHeight, behavior: 'smooth' });";

pub async fn scroll_height<B: Browser + ?Sized>(b: &B) -> Result<u64> {
    let v = b.execute(SCROLL_HEIGHT_JS).await?;
    v.as_u64()
        .or_else(|| v.as_f64().map(|f| f as u64))
        .with_context(|| format!("scrollHeight was not a number: {v}"))
}

pub async fn scroll_to_bottom<B: Browser + ?Sized>(b: &B) -> Result<()> {
    b.execute(SCROLL_TO_BOTTOM_JS).await.map(|_| ())
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub lang: String,
    pub window: (u32, u32),
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:9515".into(),
            headless: true,
            lang: "th".into(),
            window: (1920, 1080),
        }
    }
}

/// An open Chrome session. Owned by the run and closed explicitly.
pub struct Session {
    drv: WebDriver,
}

impl Session {
    pub async fn open(opts: &SessionOptions) -> WebDriverResult<Session> {
        let mut caps = DesiredCapabilities::chrome();

        let mut args: Vec<String> = vec![
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            "--disable-gpu".into(),
            "--disable-software-rasterizer".into(),
            "--no-first-run".into(),
            "--no-default-browser-check".into(),
        ];
        if opts.headless {
            args.push("--headless=new".into());
        }
        let (w, h) = opts.window;
        args.push(format!("--window-size={w},{h}"));
        args.push(format!("--lang={}", opts.lang));

        for a in &args {
            caps.add_arg(a)?;
        }
        caps.set_page_load_strategy(PageLoadStrategy::Eager)?;

        let drv = WebDriver::new(&opts.webdriver_url, caps).await?;
        drv.set_script_timeout(Duration::from_secs(30)).await?;
        Ok(Session { drv })
    }

    pub async fn close(self) {
        if let Err(e) = self.drv.quit().await {
            tracing::warn!("closing browser session: {e}");
        }
    }
}

#[async_trait]
impl Browser for Session {
    type Element = WebElement;

    async fn goto(&self, url: &str) -> Result<()> {
        self.drv.goto(url).await.with_context(|| format!("navigating to {url}"))
    }

    async fn find_all(&self, loc: &Locator) -> Result<Vec<WebElement>> {
        Ok(self.drv.find_all(loc.by()).await?)
    }

    async fn outer_html(&self, el: &WebElement) -> Result<String> {
        Ok(el.outer_html().await?)
    }

    async fn script_click(&self, el: &WebElement) -> Result<()> {
        self.drv
            .execute("arguments[0].click();", vec![el.to_json()?])
            .await?;
        Ok(())
    }

    async fn send_keys(&self, el: &WebElement, text: &str) -> Result<()> {
        Ok(el.send_keys(text).await?)
    }

    async fn click(&self, el: &WebElement) -> Result<()> {
        Ok(el.click().await?)
    }

    async fn execute(&self, script: &str) -> Result<Value> {
        let ret = self.drv.execute(script, vec![]).await?;
        Ok(ret.json().clone())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.drv
            .screenshot(path)
            .await
            .with_context(|| format!("saving screenshot {}", path.display()))
    }
}
