use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use log::{debug, error, trace};
use tokio::sync::mpsc;

use super::tracker::InvocationTracker;
use super::Lifecycle;
use crate::binder::middleware::standalone::StandaloneMiddleware;
use crate::binder::middleware::Middleware;
use crate::channel::{NewsChannel, StateChannel};
use crate::element::{Actor, NewsPublisher, PostProcessor, Reducer};
use crate::error::{MviError, MviResult};
use crate::scheduler::SameThreadVerifier;

/// How a pipeline stage is entered, picked once when the feature is built.
pub(crate) enum Stage<T> {
    /// No middleware: the stage is invoked directly and no element is assembled.
    Direct,
    Instrumented(Arc<StandaloneMiddleware<T>>),
}

impl<T: 'static> Stage<T> {
    pub(crate) fn new(
        layers: Vec<Arc<dyn Middleware<T>>>,
        feature: &str,
        stage: &str,
        postfix: Option<&str>,
    ) -> Self {
        if layers.is_empty() {
            return Stage::Direct;
        }
        let name = format!("{}.{}", feature, stage);
        Stage::Instrumented(Arc::new(StandaloneMiddleware::new(layers, &name, postfix)))
    }

    /// Hands the element to the stage's middleware. `element` only runs when instrumented.
    pub(crate) fn observe(&self, element: impl FnOnce() -> T) {
        if let Stage::Instrumented(middleware) = self {
            middleware.on_element(&element());
        }
    }

    pub(crate) fn middleware(&self) -> Option<&Arc<StandaloneMiddleware<T>>> {
        match self {
            Stage::Direct => None,
            Stage::Instrumented(middleware) => Some(middleware),
        }
    }
}

/// The pipeline functions of a feature together with the middleware around them.
pub(crate) struct Pipeline<Action, Effect, State, News> {
    pub(crate) actor: Arc<dyn Actor<State, Action, Effect>>,
    pub(crate) reducer: Arc<dyn Reducer<State, Effect>>,
    pub(crate) post_processor: Option<Arc<dyn PostProcessor<Action, Effect, State>>>,
    pub(crate) news_publisher: Option<Arc<dyn NewsPublisher<Action, Effect, State, News>>>,
    pub(crate) actor_stage: Stage<(Action, State)>,
    pub(crate) reducer_stage: Stage<(State, Effect)>,
    pub(crate) post_processor_stage: Stage<(Action, Effect, State)>,
    pub(crate) news_stage: Stage<(Action, Effect, State)>,
}

/// The single worker that owns state transitions of one feature.
pub(crate) struct Engine<Action, Effect, State, News> {
    pub(crate) name: String,
    pub(crate) pipeline: Pipeline<Action, Effect, State, News>,
    pub(crate) states: Arc<StateChannel<State>>,
    pub(crate) news: Arc<NewsChannel<News>>,
    pub(crate) feedback: mpsc::UnboundedSender<Action>,
    pub(crate) tracker: Arc<InvocationTracker>,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) verifier: Option<SameThreadVerifier>,
}

impl<Action, Effect, State, News> Engine<Action, Effect, State, News>
where
    Action: Clone + Send + Sync + 'static,
    Effect: Clone + Send + Sync + 'static,
    State: Clone + Send + Sync + 'static,
    News: Clone + Send + 'static,
{
    /// Processes actions one at a time until cancelled or a stage fails.
    pub(crate) async fn run(self, mut intake: mpsc::UnboundedReceiver<Action>) {
        debug!(feature = self.name.as_str(); "Processing loop started");
        while let Some(action) = intake.recv().await {
            if self.lifecycle.is_cancelled() {
                break;
            }
            let outcome = AssertUnwindSafe(self.process(action))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(MviError::PipelineFault {
                        reason: panic_message(panic),
                    })
                });
            if let Err(failure) = outcome {
                error!(feature = self.name.as_str(); "Feature terminated: {}", failure);
                self.lifecycle.fail(failure);
                break;
            }
        }
        self.lifecycle.terminate();
    }

    async fn process(&self, action: Action) -> MviResult<()> {
        let state = self.states.current();
        self.pipeline
            .actor_stage
            .observe(|| (action.clone(), state.clone()));
        let _invocation = self.tracker.begin();
        let mut effects = self.pipeline.actor.invoke(&state, &action);
        while let Some(effect) = effects.next().await {
            if self.lifecycle.is_cancelled() {
                break;
            }
            self.apply(&action, effect)?;
        }
        Ok(())
    }

    fn apply(&self, action: &Action, effect: Effect) -> MviResult<()> {
        if let Some(verifier) = &self.verifier {
            verifier.verify()?;
        }
        let previous = self.states.current();
        self.pipeline
            .reducer_stage
            .observe(|| (previous.clone(), effect.clone()));
        let state = self.pipeline.reducer.reduce(&previous, &effect);
        if !self.states.commit(state.clone()) {
            return Ok(());
        }
        trace!(feature = self.name.as_str(); "State committed");

        if let Some(post_processor) = &self.pipeline.post_processor {
            self.pipeline
                .post_processor_stage
                .observe(|| (action.clone(), effect.clone(), state.clone()));
            if let Some(next) = post_processor.post_process(action, &effect, &state) {
                let _ = self.feedback.send(next);
            }
        }

        if let Some(publisher) = &self.pipeline.news_publisher {
            self.pipeline
                .news_stage
                .observe(|| (action.clone(), effect.clone(), state.clone()));
            if let Some(news) = publisher.publish(action, &effect, &state) {
                self.news.publish(news);
            }
        }
        Ok(())
    }
}

impl<Action, Effect, State, News> Drop for Engine<Action, Effect, State, News> {
    fn drop(&mut self) {
        self.lifecycle.terminate();
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "pipeline function panicked".to_string()
    }
}
