//! Single-active-crawl ownership for an interactive consumer.
//!
//! A [`CrawlSession`] is what a dialog or CLI holds: it starts crawls, makes
//! sure at most one runs at a time, and hands results back on the caller's
//! own task through an internal channel. Crawl workers never call consumer
//! code directly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::crawl::{
    CrawlError, CrawlHandle, CrawlListing, CrawlOutcome, CrawlProgress, CrawlProgressSnapshot,
    Crawler,
};
use crate::listing::ListingClient;

/// Receives crawl results on the consumer's task.
pub trait CrawlObserver {
    /// Called once when a crawl completes.
    fn on_crawl_complete(&mut self, listing: CrawlListing);

    /// Called once when the root listing fails.
    fn on_crawl_error(&mut self, message: &str);
}

#[derive(Debug)]
struct SessionEvent {
    generation: u64,
    outcome: Option<CrawlOutcome>,
}

/// Owns the active crawl and its result channel.
#[derive(Debug)]
pub struct CrawlSession {
    client: ListingClient,
    active: Option<CrawlHandle>,
    generation: u64,
    awaiting_result: bool,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl CrawlSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new(client: ListingClient) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            active: None,
            generation: 0,
            awaiting_result: false,
            events_tx,
            events_rx,
        }
    }

    /// Starts crawling `root_url`.
    ///
    /// The URL is validated first. A crawl that is still running is then
    /// stopped, and this waits until its worker has exited before the new
    /// crawl is spawned. Results of the superseded crawl are never delivered.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::EmptyUrl`] for blank input and
    /// [`CrawlError::InvalidRootUrl`] for URLs that cannot be crawled. In
    /// both cases the active crawl is left untouched.
    #[instrument(skip(self))]
    pub async fn start(&mut self, root_url: &str) -> Result<(), CrawlError> {
        let crawler = Crawler::new(self.client.clone(), root_url)?;

        self.stop_and_wait().await;

        self.generation += 1;
        let generation = self.generation;
        let events_tx = self.events_tx.clone();

        info!(generation, root = %crawler.root_url(), "crawl started");
        let handle = crawler.spawn(move |outcome| {
            // The receiver lives as long as the session; a send error only
            // means the session was dropped.
            let _ = events_tx.send(SessionEvent {
                generation,
                outcome,
            });
        });
        self.active = Some(handle);
        self.awaiting_result = true;
        Ok(())
    }

    /// Requests cancellation of the active crawl without waiting.
    pub fn stop(&self) {
        if let Some(handle) = &self.active {
            handle.stop();
        }
    }

    /// Stops the active crawl and waits for its worker to exit.
    ///
    /// Call this when the consumer goes away (dialog close).
    pub async fn close(&mut self) {
        self.stop_and_wait().await;
    }

    /// Whether a crawl worker is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Progress of the active crawl, if any.
    #[must_use]
    pub fn progress(&self) -> Option<CrawlProgressSnapshot> {
        self.active.as_ref().map(CrawlHandle::progress)
    }

    /// Live counters of the active crawl, for polling from another task.
    #[must_use]
    pub fn progress_counters(&self) -> Option<Arc<CrawlProgress>> {
        self.active.as_ref().map(CrawlHandle::progress_counters)
    }

    /// Waits for the result of the current crawl.
    ///
    /// Returns `None` when no crawl is pending, when its result was already
    /// taken, or when it was cancelled.
    pub async fn next_outcome(&mut self) -> Option<CrawlOutcome> {
        while self.awaiting_result {
            let event = self.events_rx.recv().await?;
            if event.generation != self.generation {
                debug!(
                    stale = event.generation,
                    current = self.generation,
                    "dropping result of superseded crawl"
                );
                continue;
            }
            self.awaiting_result = false;
            return event.outcome;
        }
        None
    }

    /// Waits for the current crawl and forwards its result to `observer`.
    ///
    /// Returns true when a callback was invoked.
    pub async fn dispatch<O>(&mut self, observer: &mut O) -> bool
    where
        O: CrawlObserver + ?Sized,
    {
        match self.next_outcome().await {
            Some(CrawlOutcome::Success(listing)) => {
                observer.on_crawl_complete(listing);
                true
            }
            Some(CrawlOutcome::Failure { message }) => {
                observer.on_crawl_error(&message);
                true
            }
            None => false,
        }
    }

    async fn stop_and_wait(&mut self) {
        if let Some(handle) = self.active.take() {
            if !handle.is_finished() {
                debug!(root = %handle.root_url(), "stopping previous crawl");
            }
            handle.stop_and_wait().await;
        }
        // Whatever the old crawl produced is stale from here on.
        self.awaiting_result = false;
    }
}
