use std::fmt;
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::channel::receiver_stream;
use crate::error::{MviError, MviResult};
use crate::scheduler::{FeatureScheduler, SameThreadVerifier, Scheduler, Task, TokioScheduler};

/// Where a feature runs its processing loop and how wishes and observers reach it.
#[derive(Clone)]
pub enum FeatureThreadStrategy {
    /// Run on the runtime of the thread that builds the feature. Wishes are enqueued
    /// without a hop.
    ///
    /// On a current-thread runtime the loop runs on the thread driving it. On a
    /// multi-thread runtime it runs on the worker pool, one action at a time, so
    /// same-thread verification is rejected at build.
    ExecuteOnCurrentThread,
    /// Run on a single-threaded feature scheduler. Wishes from other contexts are
    /// marshalled onto it; `observation`, when set, moves state and news delivery
    /// to a third context.
    ExecuteOnFeatureScheduler {
        scheduler: FeatureScheduler,
        observation: Option<Arc<dyn Scheduler>>,
    },
}

impl FeatureThreadStrategy {
    pub fn on_feature_scheduler(scheduler: FeatureScheduler) -> Self {
        FeatureThreadStrategy::ExecuteOnFeatureScheduler {
            scheduler,
            observation: None,
        }
    }

    /// Delivers observed states and news on `observation`. No-op for
    /// `ExecuteOnCurrentThread`.
    pub fn observe_on(self, observation: Arc<dyn Scheduler>) -> Self {
        match self {
            FeatureThreadStrategy::ExecuteOnFeatureScheduler { scheduler, .. } => {
                FeatureThreadStrategy::ExecuteOnFeatureScheduler {
                    scheduler,
                    observation: Some(observation),
                }
            }
            current => current,
        }
    }

    pub fn is_current_thread(&self) -> bool {
        matches!(self, FeatureThreadStrategy::ExecuteOnCurrentThread)
    }

    /// The verifier guarding reduce, only meaningful when running on the current thread.
    ///
    /// Fails when verification is requested on a runtime that spreads tasks over
    /// a worker pool, where reduce could never stay on the building thread.
    pub(crate) fn create_verifier(
        &self,
        feature: &str,
        enabled: bool,
    ) -> MviResult<Option<SameThreadVerifier>> {
        if !(enabled && self.is_current_thread()) {
            return Ok(None);
        }
        if !TokioScheduler::current()?.is_single_threaded() {
            return Err(MviError::configuration(format!(
                "feature '{}' verifies same-thread reduce, but the building runtime runs tasks \
                 on a worker pool; build it on a current-thread runtime or use a feature scheduler",
                feature
            )));
        }
        Ok(Some(SameThreadVerifier::new(feature)))
    }

    pub(crate) fn launcher(&self) -> MviResult<Launcher> {
        match self {
            FeatureThreadStrategy::ExecuteOnCurrentThread => Ok(Launcher {
                processing: Arc::new(TokioScheduler::current()?),
                marshalling: None,
                observation: None,
            }),
            FeatureThreadStrategy::ExecuteOnFeatureScheduler {
                scheduler,
                observation,
            } => Ok(Launcher {
                processing: scheduler.scheduler().clone(),
                marshalling: Some(scheduler.clone()),
                observation: observation.clone(),
            }),
        }
    }
}

impl fmt::Debug for FeatureThreadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureThreadStrategy::ExecuteOnCurrentThread => f.write_str("ExecuteOnCurrentThread"),
            FeatureThreadStrategy::ExecuteOnFeatureScheduler {
                scheduler,
                observation,
            } => f
                .debug_struct("ExecuteOnFeatureScheduler")
                .field("scheduler", scheduler)
                .field("observation", &observation.is_some())
                .finish(),
        }
    }
}

/// The resolved execution contexts of one feature.
#[derive(Clone)]
pub(crate) struct Launcher {
    processing: Arc<dyn Scheduler>,
    marshalling: Option<FeatureScheduler>,
    observation: Option<Arc<dyn Scheduler>>,
}

impl Launcher {
    /// Starts a long-running task (processing loop or bootstrapper) on the processing context.
    pub(crate) fn launch(&self, task: Task) {
        self.processing.submit(task);
    }

    /// Runs `enqueue` on the feature scheduler, in place when no hop is needed.
    pub(crate) fn marshal(&self, enqueue: impl FnOnce() + Send + 'static) {
        match &self.marshalling {
            Some(scheduler) if scheduler.should_hop() => {
                scheduler.scheduler().submit(Box::pin(async move { enqueue() }));
            }
            _ => enqueue(),
        }
    }

    /// Re-delivers `source` on the observation context, if one is configured.
    pub(crate) fn observe<T: Send + 'static>(&self, source: BoxStream<'static, T>) -> BoxStream<'static, T> {
        let Some(observation) = &self.observation else {
            return source;
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        observation.submit(Box::pin(async move {
            let mut source = source;
            while let Some(value) = source.next().await {
                if sender.send(value).is_err() {
                    break;
                }
            }
        }));
        receiver_stream(receiver)
    }
}
