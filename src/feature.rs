//! The feature engine.
//!
//! A [`Feature`] turns wishes into actions, runs each action through its actor,
//! folds every produced effect into the state with its reducer and optionally
//! feeds follow-up actions back or publishes news. Actions are processed one at
//! a time by a single worker, so reducers always see self-consistent state no
//! matter how many callers submit concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::AbortHandle;
use futures::stream::BoxStream;
use log::info;

use crate::binder::connection::Consumer;
use crate::channel::{lock, NewsChannel, StateChannel};
use crate::error::MviError;

pub mod builder;
mod engine;
mod memo;
pub mod strategy;
mod tracker;

#[cfg(test)]
mod tests;

pub use builder::FeatureBuilder;
pub use strategy::FeatureThreadStrategy;

use strategy::Launcher;
use tracker::InvocationTracker;

type ShutdownHook = Box<dyn Fn() + Send + Sync>;

/// Cancellation and termination state shared by a feature and its tasks.
pub(crate) struct Lifecycle {
    name: String,
    cancelled: AtomicBool,
    terminated: AtomicBool,
    failure: Mutex<Option<MviError>>,
    aborts: Mutex<Vec<AbortHandle>>,
    shutdown: Mutex<Vec<ShutdownHook>>,
}

impl Lifecycle {
    pub(crate) fn new(name: &str) -> Self {
        Lifecycle {
            name: name.to_string(),
            cancelled: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            failure: Mutex::new(None),
            aborts: Mutex::new(Vec::new()),
            shutdown: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn on_abort(&self, handle: AbortHandle) {
        lock(&self.aborts).push(handle);
    }

    /// Runs once at termination: closes channels and completes stage middleware.
    pub(crate) fn on_shutdown(&self, hook: impl Fn() + Send + Sync + 'static) {
        lock(&self.shutdown).push(Box::new(hook));
    }

    /// Records the first failure. Later failures are consequences of it.
    pub(crate) fn fail(&self, failure: MviError) {
        let mut recorded = lock(&self.failure);
        if recorded.is_none() {
            *recorded = Some(failure);
        }
    }

    pub(crate) fn failure(&self) -> Option<MviError> {
        lock(&self.failure).clone()
    }

    pub(crate) fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(feature = self.name.as_str(); "Cancelling feature");
        for handle in lock(&self.aborts).drain(..) {
            handle.abort();
        }
        self.terminate();
    }

    pub(crate) fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let hooks: Vec<ShutdownHook> = lock(&self.shutdown).drain(..).collect();
        for hook in hooks {
            hook();
        }
        for handle in lock(&self.aborts).drain(..) {
            handle.abort();
        }
        info!(feature = self.name.as_str(); "Feature terminated");
    }
}

/// A running feature.
///
/// Dropping the feature cancels it.
pub struct Feature<Wish, State, News> {
    pub(crate) name: String,
    pub(crate) submitter: Consumer<Wish>,
    pub(crate) states: Arc<StateChannel<State>>,
    pub(crate) news: Arc<NewsChannel<News>>,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) tracker: Arc<InvocationTracker>,
    pub(crate) launcher: Launcher,
}

impl<Wish, State, News> Feature<Wish, State, News>
where
    Wish: Send + 'static,
    State: Clone + Send + 'static,
    News: Clone + Send + 'static,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues the action for `wish` without waiting for it to be processed.
    /// A no-op once the feature is cancelled or terminated.
    pub fn submit(&self, wish: Wish) {
        (self.submitter)(wish)
    }

    /// The most recently committed state. Stays pinned after termination.
    pub fn state(&self) -> State {
        self.states.current()
    }

    /// The current state followed by every later commit, delivered on the
    /// observation scheduler when one is configured.
    pub fn observe_states(&self) -> BoxStream<'static, State> {
        self.launcher.observe(self.states.subscribe())
    }

    /// News published from now on. Nothing is replayed.
    pub fn observe_news(&self) -> BoxStream<'static, News> {
        self.launcher.observe(self.news.subscribe())
    }

    /// Like [`Feature::observe_states`], but always fed straight from the processing loop.
    pub fn background_states(&self) -> BoxStream<'static, State> {
        self.states.subscribe()
    }

    /// Like [`Feature::observe_news`], but always fed straight from the processing loop.
    pub fn background_news(&self) -> BoxStream<'static, News> {
        self.news.subscribe()
    }

    /// The feature as a binder sink. Every call returns the same consumer, so
    /// named connections into the feature keep a stable identity.
    pub fn as_consumer(&self) -> Consumer<Wish> {
        self.submitter.clone()
    }

    /// Stops the processing loop and the bootstrapper, closes both channels and
    /// completes stage middleware. Idempotent.
    pub fn cancel(&self) {
        self.lifecycle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    /// True once the feature stopped processing, by cancellation or failure.
    pub fn is_terminated(&self) -> bool {
        self.lifecycle.is_terminated()
    }

    /// The fault that terminated the processing loop, if any.
    pub fn failure(&self) -> Option<MviError> {
        self.lifecycle.failure()
    }

    /// Actor invocations whose effect streams are still open.
    pub fn in_flight_invocations(&self) -> usize {
        self.tracker.in_flight()
    }
}

impl<Wish, State, News> Drop for Feature<Wish, State, News> {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}
