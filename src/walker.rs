use std::time::Duration;

use indicatif::ProgressBar;
use tokio::time::{sleep, Instant};

use crate::driver::{scroll_height, scroll_to_bottom, Browser};
use crate::error::HarvestError;
use crate::extract::collect_posts;
use crate::models::LocalClock;
use crate::nav::{wait_for_present, WaitError};
use crate::selectors::{PostSelectors, SelectorTable};
use crate::store::PostStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Loading,
    Expanding,
    Extracting,
    Scrolling,
    Stalled,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct WalkKnobs {
    /// After the first navigation.
    pub settle: Duration,
    /// After each "See more" click.
    pub expand_pause: Duration,
    /// After each scroll, before the height is measured.
    pub scroll_pause: Duration,
    /// Wall-clock budget for the scroll loop.
    pub ceiling: Duration,
    /// How long a pass waits for the first post container.
    pub feed_wait: Duration,
}

impl Default for WalkKnobs {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(15),
            expand_pause: Duration::from_secs(2),
            scroll_pause: Duration::from_secs(10),
            ceiling: Duration::from_secs(2 * 60),
            feed_wait: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Two consecutive scrolls measured the same page height.
    Stalled { height: u64 },
    TimeBudget { elapsed: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOutcome {
    pub reason: StopReason,
    pub passes: usize,
    /// Batch sizes summed over all passes; a post seen on three passes
    /// counts three times.
    pub posts_extracted: usize,
}

pub struct FeedWalker<'a, B: Browser + ?Sized> {
    drv: &'a B,
    table: &'a SelectorTable,
    sel: &'a PostSelectors,
    clock: LocalClock,
    knobs: WalkKnobs,
    pb: ProgressBar,
}

impl<'a, B: Browser + ?Sized> FeedWalker<'a, B> {
    pub fn new(
        drv: &'a B,
        table: &'a SelectorTable,
        sel: &'a PostSelectors,
        clock: LocalClock,
        knobs: WalkKnobs,
    ) -> Self {
        Self { drv, table, sel, clock, knobs, pb: ProgressBar::hidden() }
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.pb = pb;
        self
    }

    /// Clicks every expander currently on the page. A click that fails is
    /// logged; the rest still run.
    async fn expand(&self) -> Result<usize, HarvestError> {
        let expanders = self.drv.find_all(&self.table.see_more_locator()).await?;
        let mut clicked = 0;
        for el in &expanders {
            match self.drv.script_click(el).await {
                Ok(()) => clicked += 1,
                Err(e) => tracing::warn!("expander click failed: {e:#}"),
            }
            sleep(self.knobs.expand_pause).await;
        }
        Ok(clicked)
    }

    /// One extraction batch: every post on the page is merged into `store`
    /// and the table is rewritten once. A failed write is logged and the
    /// next batch writes the whole table again.
    async fn extract(&self, store: &mut PostStore) -> Result<usize, HarvestError> {
        match wait_for_present(self.drv, &self.table.post_locator(), self.knobs.feed_wait).await {
            Ok(()) => {}
            Err(WaitError::Timeout) => return Err(HarvestError::FeedTimeout(self.knobs.feed_wait)),
            Err(WaitError::Browser(e)) => return Err(e.into()),
        }

        let batch = collect_posts(self.drv, &self.table.post_locator(), self.sel, self.clock.now_naive())
            .await?;
        let n = batch.len();
        if let Err(e) = store.merge_and_persist(batch) {
            tracing::error!("Error saving to {}: {e:#}", store.path().display());
        }
        tracing::debug!("extracted {n} posts");
        Ok(n)
    }

    /// Drives the feed from navigation to `Done`. An `Err` means the run
    /// must be abandoned. The spinner is cleared either way.
    pub async fn walk(&self, group_url: &str, store: &mut PostStore) -> Result<WalkOutcome, HarvestError> {
        let res = self.run(group_url, store).await;
        self.pb.finish_and_clear();
        let outcome = res?;
        tracing::info!(
            "Data extraction complete: {:?} after {} passes",
            outcome.reason,
            outcome.passes
        );
        Ok(outcome)
    }

    async fn run(&self, group_url: &str, store: &mut PostStore) -> Result<WalkOutcome, HarvestError> {
        let mut state = WalkState::Loading;
        let mut started = Instant::now();
        let mut last_height: Option<u64> = None;
        let mut passes = 0usize;
        let mut posts_extracted = 0usize;
        let mut reason = None;

        loop {
            tracing::trace!("walk state {state:?}");
            state = match state {
                WalkState::Loading => {
                    tracing::info!("Navigating to the group URL...");
                    self.drv.goto(group_url).await?;
                    sleep(self.knobs.settle).await;
                    started = Instant::now();
                    WalkState::Expanding
                }
                WalkState::Expanding => {
                    let n = self.expand().await?;
                    if n > 0 {
                        tracing::debug!("expanded {n} truncated posts");
                    }
                    WalkState::Extracting
                }
                WalkState::Extracting => match self.extract(store).await {
                    Ok(n) => {
                        passes += 1;
                        posts_extracted += n;
                        WalkState::Scrolling
                    }
                    Err(e) => {
                        tracing::error!("Error in extraction pass {}: {e}", passes + 1);
                        return Err(e);
                    }
                },
                WalkState::Scrolling => {
                    scroll_to_bottom(self.drv).await?;
                    sleep(self.knobs.scroll_pause).await;
                    let height = scroll_height(self.drv).await?;
                    self.pb.set_message(format!(
                        "pass {passes} • {} posts stored • height {height}",
                        store.len()
                    ));

                    let elapsed = started.elapsed();
                    if last_height == Some(height) {
                        reason = Some(StopReason::Stalled { height });
                        WalkState::Stalled
                    } else if elapsed > self.knobs.ceiling {
                        reason = Some(StopReason::TimeBudget { elapsed });
                        WalkState::Done
                    } else {
                        last_height = Some(height);
                        WalkState::Expanding
                    }
                }
                WalkState::Stalled => {
                    tracing::info!("Page height stopped growing; feed exhausted");
                    WalkState::Done
                }
                WalkState::Done => break,
            };
        }

        let reason = reason.unwrap_or(StopReason::TimeBudget { elapsed: started.elapsed() });
        Ok(WalkOutcome { reason, passes, posts_extracted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::fake::FakeBrowser;

    fn post(text: &str, reactions: &str) -> Result<String, String> {
        Ok(format!(
            r#"<div role="article"><div data-ad-preview="message">{text}</div>
               <span class="xrbpyxo x6ikm8r x10wlt62 xlyipyv x1exxlbk">{reactions}</span></div>"#
        ))
    }

    fn knobs() -> WalkKnobs {
        WalkKnobs {
            ceiling: Duration::from_secs(60),
            ..WalkKnobs::default()
        }
    }

    struct Rig {
        table: SelectorTable,
        sel: PostSelectors,
        dir: tempfile::TempDir,
    }

    impl Rig {
        fn new() -> Self {
            let table = SelectorTable::default();
            let sel = PostSelectors::try_from(&table).unwrap();
            Self { table, sel, dir: tempfile::tempdir().unwrap() }
        }

        fn store(&self) -> PostStore {
            PostStore::load(self.dir.path().join("posts.csv"))
        }

        fn page(&self, posts: Vec<Result<String, String>>) -> FakeBrowser {
            FakeBrowser::default().with_html(self.table.post_locator(), posts)
        }

        async fn walk(&self, b: &FakeBrowser, store: &mut PostStore) -> Result<WalkOutcome, HarvestError> {
            self.walk_with(b, store, ProgressBar::hidden()).await
        }

        async fn walk_with(
            &self,
            b: &FakeBrowser,
            store: &mut PostStore,
            pb: ProgressBar,
        ) -> Result<WalkOutcome, HarvestError> {
            let clock = LocalClock::from_hours(7).unwrap();
            FeedWalker::new(b, &self.table, &self.sel, clock, knobs())
                .with_progress(pb)
                .walk("https://example.com/groups/1", store)
                .await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn equal_heights_stop_the_walk() {
        let rig = Rig::new();
        let b = rig
            .page(vec![post("a", "1K"), post("b", "3")])
            .with_heights(vec![100, 200, 200, 300]);
        let mut store = rig.store();

        let out = rig.walk(&b, &mut store).await.unwrap();
        assert_eq!(out.reason, StopReason::Stalled { height: 200 });
        assert_eq!(out.passes, 3);
        assert_eq!(out.posts_extracted, 6);
        assert_eq!(b.calls("scroll"), 3);
        // one height read per scroll, none during extraction
        assert_eq!(b.calls("height"), 3);
        assert_eq!(b.calls("goto "), 1);

        assert_eq!(store.len(), 2);
        let reloaded = rig.store();
        assert_eq!(reloaded.get("a").map(|r| r.reactions), Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_stops_a_growing_feed() {
        let rig = Rig::new();
        let b = rig
            .page(vec![post("a", "1")])
            .with_heights((1..=100).map(|i| i * 1000).collect());
        let mut store = rig.store();

        let out = rig.walk(&b, &mut store).await.unwrap();
        // each pass costs one 10s scroll pause; 70s is the first past 60s
        assert_eq!(out.reason, StopReason::TimeBudget { elapsed: Duration::from_secs(70) });
        assert_eq!(out.passes, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_feed_aborts() {
        let rig = Rig::new();
        let b = FakeBrowser::default().with_heights(vec![100, 200]);
        let mut store = rig.store();

        let started = Instant::now();
        let err = rig.walk(&b, &mut store).await.unwrap_err();
        assert!(matches!(err, HarvestError::FeedTimeout(d) if d == Duration::from_secs(30)));
        assert_eq!(started.elapsed(), Duration::from_secs(15 + 30));
        assert_eq!(b.calls("scroll"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expanders_are_clicked_each_pass() {
        let rig = Rig::new();
        let b = rig
            .page(vec![post("a", "1")])
            .with_count(rig.table.see_more_locator(), 2)
            .with_heights(vec![500, 500]);
        let mut store = rig.store();

        let out = rig.walk(&b, &mut store).await.unwrap();
        assert_eq!(out.passes, 2);
        assert_eq!(b.calls("script-click"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn later_pass_overwrites_counts() {
        let rig = Rig::new();
        let mut store = rig.store();

        let first = rig.page(vec![post("same text", "5")]).with_heights(vec![10, 10]);
        rig.walk(&first, &mut store).await.unwrap();
        let second = rig.page(vec![post("same text", "2.5K")]).with_heights(vec![10, 10]);
        rig.walk(&second, &mut store).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("same text").map(|r| r.reactions), Some(2500));
        assert_eq!(rig.store().get("same text").map(|r| r.reactions), Some(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn unwritable_output_keeps_walking() {
        let rig = Rig::new();
        let b = rig
            .page(vec![post("a", "1K"), post("b", "3")])
            .with_heights(vec![100, 100]);
        // a directory cannot be opened as the output file
        let mut store = PostStore::empty(rig.dir.path());

        let out = rig.walk(&b, &mut store).await.unwrap();
        assert_eq!(out.reason, StopReason::Stalled { height: 100 });
        assert_eq!(out.passes, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").map(|r| r.reactions), Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn spinner_is_cleared_when_navigation_fails() {
        let rig = Rig::new();
        let b = rig.page(vec![post("a", "1")]).with_goto_error("net::ERR_NAME_NOT_RESOLVED");
        let mut store = rig.store();
        let pb = ProgressBar::hidden();

        let err = rig.walk_with(&b, &mut store, pb.clone()).await.unwrap_err();
        assert!(matches!(err, HarvestError::Browser(_)));
        assert!(pb.is_finished());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spinner_is_cleared_after_a_walk() {
        let rig = Rig::new();
        let b = rig.page(vec![post("a", "1")]).with_heights(vec![5, 5]);
        let mut store = rig.store();
        let pb = ProgressBar::hidden();

        rig.walk_with(&b, &mut store, pb.clone()).await.unwrap();
        assert!(pb.is_finished());
    }
}
