use std::any::type_name;
use std::sync::Arc;

use futures::future;
use futures::StreamExt;
use log::info;
use tokio::sync::mpsc;

use super::engine::{Engine, Pipeline, Stage};
use super::strategy::FeatureThreadStrategy;
use super::tracker::InvocationTracker;
use super::{Feature, Lifecycle};
use crate::binder::connection::Consumer;
use crate::binder::middleware::Middleware;
use crate::channel::{NewsChannel, StateChannel};
use crate::config::{default_thread_strategy, MviConfig};
use crate::element::{Actor, Bootstrapper, NewsPublisher, PostProcessor, Reducer, WishToAction};
use crate::error::MviResult;

type Layers<T> = Vec<Arc<dyn Middleware<T>>>;

/// Assembles a [`Feature`] from its pipeline functions.
///
/// ```rust,no_run
/// use mvicore::element::{effects, EffectStream};
/// use mvicore::feature::FeatureBuilder;
///
/// fn actor(_: &u32, step: &u32) -> EffectStream<u32> {
///     effects::just(*step)
/// }
///
/// fn reducer(state: &u32, step: &u32) -> u32 {
///     state + step
/// }
///
/// # async fn run() -> mvicore::error::MviResult<()> {
/// let feature = FeatureBuilder::<u32, u32, u32, u32, ()>::new(0, |wish: u32| wish, actor, reducer)
///     .name("counter")
///     .build()?;
/// feature.submit(2);
/// # Ok(())
/// # }
/// ```
pub struct FeatureBuilder<Wish, Action, Effect, State, News> {
    initial_state: State,
    wish_to_action: Arc<dyn WishToAction<Wish, Action>>,
    actor: Arc<dyn Actor<State, Action, Effect>>,
    reducer: Arc<dyn Reducer<State, Effect>>,
    bootstrapper: Option<Arc<dyn Bootstrapper<Action>>>,
    post_processor: Option<Arc<dyn PostProcessor<Action, Effect, State>>>,
    news_publisher: Option<Arc<dyn NewsPublisher<Action, Effect, State, News>>>,
    thread_strategy: Option<FeatureThreadStrategy>,
    name: Option<String>,
    verify_same_thread: bool,
    actor_layers: Layers<(Action, State)>,
    reducer_layers: Layers<(State, Effect)>,
    post_processor_layers: Layers<(Action, Effect, State)>,
    news_layers: Layers<(Action, Effect, State)>,
    bootstrapper_layers: Layers<Action>,
}

impl<Wish, Action, Effect, State, News> FeatureBuilder<Wish, Action, Effect, State, News>
where
    Wish: Send + 'static,
    Action: Clone + Send + Sync + 'static,
    Effect: Clone + Send + Sync + 'static,
    State: Clone + Send + Sync + 'static,
    News: Clone + Send + 'static,
{
    pub fn new(
        initial_state: State,
        wish_to_action: impl WishToAction<Wish, Action>,
        actor: impl Actor<State, Action, Effect>,
        reducer: impl Reducer<State, Effect>,
    ) -> Self {
        FeatureBuilder {
            initial_state,
            wish_to_action: Arc::new(wish_to_action),
            actor: Arc::new(actor),
            reducer: Arc::new(reducer),
            bootstrapper: None,
            post_processor: None,
            news_publisher: None,
            thread_strategy: None,
            name: None,
            verify_same_thread: false,
            actor_layers: Vec::new(),
            reducer_layers: Vec::new(),
            post_processor_layers: Vec::new(),
            news_layers: Vec::new(),
            bootstrapper_layers: Vec::new(),
        }
    }

    pub fn bootstrapper(mut self, bootstrapper: impl Bootstrapper<Action>) -> Self {
        self.bootstrapper = Some(Arc::new(bootstrapper));
        self
    }

    pub fn post_processor(mut self, post_processor: impl PostProcessor<Action, Effect, State>) -> Self {
        self.post_processor = Some(Arc::new(post_processor));
        self
    }

    pub fn news_publisher(
        mut self,
        news_publisher: impl NewsPublisher<Action, Effect, State, News>,
    ) -> Self {
        self.news_publisher = Some(Arc::new(news_publisher));
        self
    }

    /// Overrides the process-wide default strategy.
    pub fn thread_strategy(mut self, strategy: FeatureThreadStrategy) -> Self {
        self.thread_strategy = Some(strategy);
        self
    }

    /// Names the feature in logs and in its stage connections. Defaults to the state type.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fails the feature with a concurrency violation when a reduce runs off the
    /// building thread. Only applies to [`FeatureThreadStrategy::ExecuteOnCurrentThread`],
    /// and [`build`](Self::build) rejects it on a multi-thread runtime.
    pub fn verify_same_thread(mut self, verify: bool) -> Self {
        self.verify_same_thread = verify;
        self
    }

    pub fn with_config(mut self, config: &MviConfig) -> Self {
        if let Some(name) = &config.feature.name {
            self.name = Some(name.clone());
        }
        self.verify_same_thread = config.feature.verify_same_thread;
        self
    }

    pub fn actor_middleware(mut self, layer: Arc<dyn Middleware<(Action, State)>>) -> Self {
        self.actor_layers.push(layer);
        self
    }

    pub fn reducer_middleware(mut self, layer: Arc<dyn Middleware<(State, Effect)>>) -> Self {
        self.reducer_layers.push(layer);
        self
    }

    pub fn post_processor_middleware(
        mut self,
        layer: Arc<dyn Middleware<(Action, Effect, State)>>,
    ) -> Self {
        self.post_processor_layers.push(layer);
        self
    }

    pub fn news_publisher_middleware(
        mut self,
        layer: Arc<dyn Middleware<(Action, Effect, State)>>,
    ) -> Self {
        self.news_layers.push(layer);
        self
    }

    pub fn bootstrapper_middleware(mut self, layer: Arc<dyn Middleware<Action>>) -> Self {
        self.bootstrapper_layers.push(layer);
        self
    }

    /// Wraps every stage in the same layer.
    pub fn middleware<M>(self, layer: M) -> Self
    where
        M: Middleware<(Action, State)>
            + Middleware<(State, Effect)>
            + Middleware<(Action, Effect, State)>
            + Middleware<Action>
            + Clone
            + 'static,
    {
        self.actor_middleware(Arc::new(layer.clone()))
            .reducer_middleware(Arc::new(layer.clone()))
            .post_processor_middleware(Arc::new(layer.clone()))
            .news_publisher_middleware(Arc::new(layer.clone()))
            .bootstrapper_middleware(Arc::new(layer))
    }

    /// Starts the processing loop and the bootstrapper.
    ///
    /// Fails with [`crate::error::MviError::NoRuntime`] when the strategy runs on the
    /// current thread and no tokio runtime is entered, and with a configuration
    /// error when same-thread verification is asked of a multi-thread runtime.
    pub fn build(self) -> MviResult<Feature<Wish, State, News>> {
        let name = self.name.unwrap_or_else(short_type_name::<State>);
        let strategy = self.thread_strategy.unwrap_or_else(default_thread_strategy);
        let launcher = strategy.launcher()?;
        let verifier = strategy.create_verifier(&name, self.verify_same_thread)?;

        let states = Arc::new(StateChannel::new(self.initial_state));
        let news = Arc::new(NewsChannel::new());
        let lifecycle = Arc::new(Lifecycle::new(&name));
        let tracker = Arc::new(InvocationTracker::default());
        let (intake, receiver) = mpsc::unbounded_channel::<Action>();

        let pipeline = Pipeline {
            actor: self.actor,
            reducer: self.reducer,
            post_processor: self.post_processor,
            news_publisher: self.news_publisher,
            actor_stage: Stage::new(self.actor_layers, &name, "actor", None),
            reducer_stage: Stage::new(self.reducer_layers, &name, "reducer", None),
            post_processor_stage: Stage::new(self.post_processor_layers, &name, "post_processor", None),
            news_stage: Stage::new(self.news_layers, &name, "news_publisher", None),
        };
        {
            let states = states.clone();
            lifecycle.on_shutdown(move || states.close());
            let news = news.clone();
            lifecycle.on_shutdown(move || news.close());
        }
        complete_on_shutdown(&lifecycle, &pipeline.actor_stage);
        complete_on_shutdown(&lifecycle, &pipeline.reducer_stage);
        complete_on_shutdown(&lifecycle, &pipeline.post_processor_stage);
        complete_on_shutdown(&lifecycle, &pipeline.news_stage);

        let engine = Engine {
            name: name.clone(),
            pipeline,
            states: states.clone(),
            news: news.clone(),
            feedback: intake.clone(),
            tracker: tracker.clone(),
            lifecycle: lifecycle.clone(),
            verifier,
        };
        let (processing, abort) = future::abortable(engine.run(receiver));
        lifecycle.on_abort(abort);
        launcher.launch(Box::pin(async move {
            let _ = processing.await;
        }));

        if let Some(bootstrapper) = self.bootstrapper {
            let stage = Stage::new(self.bootstrapper_layers, &name, "bootstrapper", Some("output"));
            complete_on_shutdown(&lifecycle, &stage);
            let intake = intake.clone();
            let (bootstrap, abort) = future::abortable(async move {
                let mut actions = bootstrapper.bootstrap();
                while let Some(action) = actions.next().await {
                    stage.observe(|| action.clone());
                    if intake.send(action).is_err() {
                        break;
                    }
                }
            });
            lifecycle.on_abort(abort);
            launcher.launch(Box::pin(async move {
                let _ = bootstrap.await;
            }));
        }

        let submitter: Consumer<Wish> = {
            let wish_to_action = self.wish_to_action;
            let lifecycle = lifecycle.clone();
            let launcher = launcher.clone();
            Arc::new(move |wish: Wish| {
                if lifecycle.is_terminated() {
                    return;
                }
                let action = wish_to_action.to_action(wish);
                let intake = intake.clone();
                launcher.marshal(move || {
                    let _ = intake.send(action);
                });
            })
        };

        info!(feature = name.as_str(), strategy = format!("{:?}", strategy).as_str(); "Feature started");
        Ok(Feature {
            name,
            submitter,
            states,
            news,
            lifecycle,
            tracker,
            launcher,
        })
    }
}

fn complete_on_shutdown<T: 'static>(lifecycle: &Lifecycle, stage: &Stage<T>) {
    if let Some(middleware) = stage.middleware() {
        let middleware = middleware.clone();
        lifecycle.on_shutdown(move || middleware.complete());
    }
}

fn short_type_name<T>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
