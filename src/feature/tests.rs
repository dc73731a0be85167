use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use log::Level;
use mockall::{mock, Sequence};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::timeout;

use super::{Feature, FeatureBuilder, FeatureThreadStrategy};
use crate::binder::connection::{Connection, ConnectionInfo, Consumer};
use crate::binder::middleware::logging::LoggingMiddleware;
use crate::binder::middleware::Middleware;
use crate::binder::Binder;
use crate::config::MviConfig;
use crate::element::{effects, EffectStream, Reducer};
use crate::error::MviError;
use crate::scheduler::{FeatureScheduler, Scheduler, Task, TokioScheduler};

#[derive(Debug, Clone, PartialEq)]
struct TestState {
    id: String,
    counter: i32,
    loading: bool,
}

impl Default for TestState {
    fn default() -> Self {
        TestState {
            id: "initial".to_string(),
            counter: 100,
            loading: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TestWish {
    FulfillableInstantly1,
    MaybeFulfillable,
    Unfulfillable,
    FulfillableAsync(Duration),
    TranslatesTo3Effects,
    LoopbackWishInitial,
    LoopbackWish1,
    LoopbackWish2,
    LoopbackWish3,
    Explode,
}

#[derive(Debug, Clone, PartialEq)]
enum TestEffect {
    Added(i32),
    Multiplied(i32),
    StartedAsync,
    FinishedAsync(i32),
    Renamed(&'static str),
    Exploded,
}

#[derive(Debug, Clone, PartialEq)]
enum TestNews {
    Loopback,
}

fn to_action(wish: TestWish) -> TestWish {
    wish
}

fn actor(state: &TestState, action: &TestWish) -> EffectStream<TestEffect> {
    match action {
        TestWish::FulfillableInstantly1 => effects::just(TestEffect::Added(2)),
        TestWish::MaybeFulfillable if state.counter % 3 == 0 => {
            effects::just(TestEffect::Multiplied(10))
        }
        TestWish::MaybeFulfillable | TestWish::Unfulfillable => effects::none(),
        TestWish::FulfillableAsync(delay) => {
            let delay = *delay;
            stream::once(async { TestEffect::StartedAsync })
                .chain(stream::once(async move {
                    tokio::time::sleep(delay).await;
                    TestEffect::FinishedAsync(5)
                }))
                .boxed()
        }
        TestWish::TranslatesTo3Effects => effects::from_iter(vec![
            TestEffect::Added(1),
            TestEffect::Added(2),
            TestEffect::Added(3),
        ]),
        TestWish::LoopbackWishInitial => effects::just(TestEffect::Renamed("Loopback initial state")),
        TestWish::LoopbackWish1 => effects::just(TestEffect::Renamed("Loopback state 1")),
        TestWish::LoopbackWish2 => effects::just(TestEffect::Renamed("Loopback state 2")),
        TestWish::LoopbackWish3 => effects::just(TestEffect::Renamed("Loopback state 3")),
        TestWish::Explode => effects::just(TestEffect::Exploded),
    }
}

fn reducer(state: &TestState, effect: &TestEffect) -> TestState {
    let mut next = state.clone();
    match effect {
        TestEffect::Added(amount) => next.counter += amount,
        TestEffect::Multiplied(factor) => next.counter *= factor,
        TestEffect::StartedAsync => next.loading = true,
        TestEffect::FinishedAsync(amount) => {
            next.loading = false;
            next.counter += amount;
        }
        TestEffect::Renamed(id) => next.id = id.to_string(),
        TestEffect::Exploded => panic!("reducer exploded"),
    }
    next
}

fn news_publisher(_: &TestWish, effect: &TestEffect, _: &TestState) -> Option<TestNews> {
    matches!(effect, TestEffect::Renamed("Loopback state 1")).then_some(TestNews::Loopback)
}

type TestBuilder = FeatureBuilder<TestWish, TestWish, TestEffect, TestState, TestNews>;
type TestFeature = Feature<TestWish, TestState, TestNews>;

fn builder() -> TestBuilder {
    FeatureBuilder::new(TestState::default(), to_action, actor, reducer)
        .news_publisher(news_publisher)
        .name("counter")
        .thread_strategy(FeatureThreadStrategy::ExecuteOnCurrentThread)
}

fn feature() -> TestFeature {
    builder().build().expect("feature should build inside a runtime")
}

async fn next<T>(stream: &mut BoxStream<'static, T>) -> T {
    timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("timed out waiting for an element")
        .expect("stream ended early")
}

async fn take<T>(stream: &mut BoxStream<'static, T>, count: usize) -> Vec<T> {
    let mut taken = Vec::with_capacity(count);
    for _ in 0..count {
        taken.push(next(stream).await);
    }
    taken
}

async fn wait_until(condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn counters(states: &[TestState]) -> Vec<i32> {
    states.iter().map(|state| state.counter).collect()
}

#[tokio::test]
async fn test_initial_state_is_emitted() {
    let feature = feature();
    let mut states = feature.observe_states();
    assert_eq!(next(&mut states).await, TestState::default());
    assert_eq!(feature.state(), TestState::default());
    assert_eq!(feature.name(), "counter");
}

#[tokio::test]
async fn test_instant_wishes_commit_in_submission_order() {
    let feature = feature();
    let mut states = feature.observe_states();
    for _ in 0..3 {
        feature.submit(TestWish::FulfillableInstantly1);
    }
    assert_eq!(counters(&take(&mut states, 4).await), vec![100, 102, 104, 106]);
}

#[tokio::test]
async fn test_unfulfillable_wishes_commit_nothing() {
    let feature = feature();
    let mut states = feature.observe_states();
    for _ in 0..3 {
        feature.submit(TestWish::Unfulfillable);
    }
    feature.submit(TestWish::FulfillableInstantly1);
    assert_eq!(counters(&take(&mut states, 2).await), vec![100, 102]);
}

#[tokio::test]
async fn test_conditional_wish_depends_on_latest_state() {
    let feature = feature();
    let mut states = feature.observe_states();
    feature.submit(TestWish::MaybeFulfillable);
    feature.submit(TestWish::FulfillableInstantly1);
    feature.submit(TestWish::MaybeFulfillable);
    assert_eq!(counters(&take(&mut states, 3).await), vec![100, 102, 1020]);
}

#[tokio::test]
async fn test_each_effect_commits_a_state() {
    let feature = feature();
    let mut states = feature.observe_states();
    feature.submit(TestWish::TranslatesTo3Effects);
    assert_eq!(counters(&take(&mut states, 4).await), vec![100, 101, 103, 106]);
}

#[tokio::test]
async fn test_async_effects_are_reduced_in_emission_order() {
    let feature = feature();
    let mut states = feature.observe_states();
    feature.submit(TestWish::FulfillableAsync(Duration::from_millis(10)));
    feature.submit(TestWish::FulfillableInstantly1);

    let seen = take(&mut states, 4).await;
    assert_eq!(
        seen.iter().map(|s| (s.counter, s.loading)).collect::<Vec<_>>(),
        vec![(100, false), (100, true), (105, false), (107, false)]
    );
    wait_until(|| feature.in_flight_invocations() == 0).await;
}

#[derive(Debug, Clone, PartialEq)]
enum TriggerAction {
    InitialTrigger,
    PostProcessorTrigger,
}

#[derive(Debug, Clone, PartialEq)]
enum TriggerNews {
    TriggerNews,
    PostProcessorNews,
}

fn trigger_actor(_: &u32, action: &TriggerAction) -> EffectStream<TriggerAction> {
    effects::just(action.clone())
}

fn trigger_reducer(state: &u32, _: &TriggerAction) -> u32 {
    state + 1
}

fn trigger_post_processor(
    action: &TriggerAction,
    _: &TriggerAction,
    _: &u32,
) -> Option<TriggerAction> {
    (*action == TriggerAction::InitialTrigger).then_some(TriggerAction::PostProcessorTrigger)
}

fn trigger_news(action: &TriggerAction, _: &TriggerAction, _: &u32) -> Option<TriggerNews> {
    Some(match action {
        TriggerAction::InitialTrigger => TriggerNews::TriggerNews,
        TriggerAction::PostProcessorTrigger => TriggerNews::PostProcessorNews,
    })
}

#[tokio::test]
async fn test_post_processor_feedback_news_order() {
    let feature = FeatureBuilder::new(0u32, |wish: TriggerAction| wish, trigger_actor, trigger_reducer)
        .post_processor(trigger_post_processor)
        .news_publisher(trigger_news)
        .thread_strategy(FeatureThreadStrategy::ExecuteOnCurrentThread)
        .build()
        .unwrap();
    let mut news = feature.observe_news();
    feature.submit(TriggerAction::InitialTrigger);

    assert_eq!(
        take(&mut news, 2).await,
        vec![TriggerNews::TriggerNews, TriggerNews::PostProcessorNews]
    );
    assert_eq!(feature.state(), 2);
}

#[tokio::test]
async fn test_loopback_from_news_sees_latest_state() {
    let feature = feature();
    let mut states = feature.observe_states();
    let mut news = feature.observe_news();
    let consumer = feature.as_consumer();
    tokio::spawn(async move {
        while let Some(event) = news.next().await {
            if event == TestNews::Loopback {
                consumer(TestWish::LoopbackWish2);
                consumer(TestWish::LoopbackWish3);
            }
        }
    });

    feature.submit(TestWish::LoopbackWishInitial);
    feature.submit(TestWish::LoopbackWish1);

    let ids: Vec<String> = take(&mut states, 5)
        .await
        .into_iter()
        .skip(1)
        .map(|state| state.id)
        .collect();
    assert_eq!(
        ids,
        vec![
            "Loopback initial state",
            "Loopback state 1",
            "Loopback state 2",
            "Loopback state 3"
        ]
    );
}

#[tokio::test]
async fn test_news_is_not_replayed() {
    let feature = feature();
    let mut states = feature.observe_states();
    feature.submit(TestWish::LoopbackWish1);
    take(&mut states, 2).await;

    let mut late = feature.observe_news();
    feature.cancel();
    assert_eq!(timeout(Duration::from_secs(1), late.next()).await.unwrap(), None);
}

type Entry = (usize, usize);

/// Appends every entry to the log and flags any reduce that starts while another runs.
struct AppendingReducer {
    inside: AtomicBool,
    overlapped: Arc<AtomicBool>,
}

impl Reducer<Vec<Entry>, Entry> for AppendingReducer {
    fn reduce(&self, log: &Vec<Entry>, entry: &Entry) -> Vec<Entry> {
        if self.inside.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        thread::yield_now();
        let mut next = log.clone();
        next.push(*entry);
        self.inside.store(false, Ordering::SeqCst);
        next
    }
}

fn append_actor(_: &Vec<Entry>, entry: &Entry) -> EffectStream<Entry> {
    effects::just(*entry)
}

#[tokio::test]
async fn test_submitter_order_survives_scheduler_hop() {
    const SUBMITTERS: usize = 4;
    const WISHES: usize = 25;

    let overlapped = Arc::new(AtomicBool::new(false));
    let appending = AppendingReducer {
        inside: AtomicBool::new(false),
        overlapped: overlapped.clone(),
    };
    let scheduler = ThreadScheduler::start();
    let feature: Feature<Entry, Vec<Entry>, ()> =
        FeatureBuilder::<Entry, Entry, Entry, Vec<Entry>, ()>::new(
            Vec::new(),
            |entry: Entry| entry,
            append_actor,
            appending,
        )
        .name("log")
        .thread_strategy(FeatureThreadStrategy::on_feature_scheduler(
            FeatureScheduler::Simple(scheduler),
        ))
        .build()
        .unwrap();
    let mut states: BoxStream<'static, Vec<Entry>> = feature.background_states();

    let submitters: Vec<_> = (0..SUBMITTERS)
        .map(|submitter| {
            let consumer = feature.as_consumer();
            thread::spawn(move || {
                for sequence in 0..WISHES {
                    consumer((submitter, sequence));
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.join().unwrap();
    }

    let seen = take(&mut states, SUBMITTERS * WISHES + 1).await;
    let log = seen.last().unwrap().clone();
    for (commits, state) in seen.iter().enumerate() {
        assert_eq!(state.as_slice(), &log[..commits]);
    }
    for submitter in 0..SUBMITTERS {
        let sequences: Vec<usize> = log
            .iter()
            .filter(|(id, _)| *id == submitter)
            .map(|(_, sequence)| *sequence)
            .collect();
        assert_eq!(sequences, (0..WISHES).collect::<Vec<_>>());
    }
    assert!(!overlapped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancel_is_final() {
    let feature = feature();
    let mut states = feature.observe_states();
    feature.submit(TestWish::FulfillableAsync(Duration::from_secs(30)));
    assert!(take(&mut states, 2).await[1].loading);
    assert_eq!(feature.in_flight_invocations(), 1);

    feature.cancel();
    feature.cancel();
    assert!(feature.is_cancelled());
    assert!(feature.is_terminated());
    assert!(feature.failure().is_none());
    assert_eq!(timeout(Duration::from_secs(1), states.next()).await.unwrap(), None);
    wait_until(|| feature.in_flight_invocations() == 0).await;

    feature.submit(TestWish::FulfillableInstantly1);
    tokio::task::yield_now().await;
    assert_eq!(feature.state().counter, 100);
    assert!(feature.state().loading);
    assert_eq!(feature.observe_states().next().await, None);
}

#[tokio::test]
async fn test_panicking_reducer_terminates_feature() {
    let feature = feature();
    let mut states = feature.observe_states();
    feature.submit(TestWish::FulfillableInstantly1);
    feature.submit(TestWish::Explode);
    feature.submit(TestWish::FulfillableInstantly1);

    assert_eq!(counters(&take(&mut states, 2).await), vec![100, 102]);
    assert_eq!(timeout(Duration::from_secs(1), states.next()).await.unwrap(), None);
    assert!(feature.is_terminated());
    assert!(!feature.is_cancelled());
    assert_eq!(
        feature.failure(),
        Some(MviError::PipelineFault {
            reason: "reducer exploded".to_string()
        })
    );
    assert_eq!(feature.state().counter, 102);
    assert_eq!(feature.in_flight_invocations(), 0);
}

#[test]
fn test_reduce_off_building_thread_is_a_concurrency_violation() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let feature = {
        let _context = runtime.enter();
        builder().verify_same_thread(true).build().unwrap()
    };
    feature.submit(TestWish::FulfillableInstantly1);

    // The runtime is driven from another thread, so the loop runs there.
    let feature = thread::spawn(move || {
        runtime.block_on(wait_until(|| feature.is_terminated()));
        feature
    })
    .join()
    .unwrap();
    assert!(matches!(
        feature.failure(),
        Some(MviError::ConcurrencyViolation { .. })
    ));
    assert_eq!(feature.state().counter, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_thread_verification_rejected_on_worker_pool() {
    assert!(matches!(
        builder().verify_same_thread(true).build().err(),
        Some(MviError::Configuration { .. })
    ));

    let feature = builder().build().unwrap();
    let mut states = feature.observe_states();
    feature.submit(TestWish::FulfillableInstantly1);
    assert_eq!(counters(&take(&mut states, 2).await), vec![100, 102]);
    assert!(feature.failure().is_none());
}

#[tokio::test]
async fn test_verifier_passes_on_building_thread() {
    let feature = builder().verify_same_thread(true).build().unwrap();
    let mut states = feature.observe_states();
    feature.submit(TestWish::FulfillableInstantly1);
    assert_eq!(counters(&take(&mut states, 2).await), vec![100, 102]);
    assert!(feature.failure().is_none());
}

#[test]
fn test_current_thread_strategy_needs_runtime() {
    assert_eq!(builder().build().err(), Some(MviError::NoRuntime));
}

#[tokio::test]
async fn test_config_names_feature() {
    let config = MviConfig::from_toml_str("[feature]\nname = \"configured\"\n").unwrap();
    let feature = builder().with_config(&config).build().unwrap();
    assert_eq!(feature.name(), "configured");
}

#[tokio::test]
async fn test_bootstrapper_actions_are_processed() {
    fn bootstrap() -> BoxStream<'static, TestWish> {
        stream::iter(vec![TestWish::FulfillableInstantly1, TestWish::FulfillableInstantly1]).boxed()
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let feature = builder()
        .bootstrapper(bootstrap)
        .bootstrapper_middleware(Arc::new(Recorder(events.clone())))
        .build()
        .unwrap();
    let mut states = feature.observe_states();
    assert_eq!(counters(&take(&mut states, 3).await), vec![100, 102, 104]);

    feature.cancel();
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "bind counter.bootstrapper.output",
            "element FulfillableInstantly1",
            "element FulfillableInstantly1",
            "complete counter.bootstrapper.output",
        ]
    );
}

struct Recorder(Arc<Mutex<Vec<String>>>);

impl Middleware<TestWish> for Recorder {
    fn on_bind(&self, connection: &ConnectionInfo) {
        self.0
            .lock()
            .unwrap()
            .push(format!("bind {}", connection.name().unwrap_or_default()));
    }

    fn on_element(&self, _connection: &ConnectionInfo, element: &TestWish) {
        self.0.lock().unwrap().push(format!("element {:?}", element));
    }

    fn on_complete(&self, connection: &ConnectionInfo) {
        self.0
            .lock()
            .unwrap()
            .push(format!("complete {}", connection.name().unwrap_or_default()));
    }
}

mock! {
    ActorLayer {}
    impl Middleware<(TestWish, TestState)> for ActorLayer {
        fn on_bind(&self, connection: &ConnectionInfo);
        fn on_element(&self, connection: &ConnectionInfo, element: &(TestWish, TestState));
        fn on_complete(&self, connection: &ConnectionInfo);
    }
}

#[tokio::test]
async fn test_actor_middleware_lifecycle() {
    let elements = Arc::new(AtomicUsize::new(0));
    let mut layer = MockActorLayer::new();
    let mut seq = Sequence::new();
    layer
        .expect_on_bind()
        .withf(|connection| {
            connection.name() == Some("counter.actor.input") && connection.is_standalone()
        })
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let counted = elements.clone();
    layer
        .expect_on_element()
        .withf(|_, (action, state)| {
            *action == TestWish::FulfillableInstantly1 && state.counter % 2 == 0
        })
        .times(2)
        .in_sequence(&mut seq)
        .returning(move |_, _| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
    layer
        .expect_on_complete()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let feature = builder().actor_middleware(Arc::new(layer)).build().unwrap();
    let mut states = feature.observe_states();
    feature.submit(TestWish::FulfillableInstantly1);
    feature.submit(TestWish::FulfillableInstantly1);
    assert_eq!(counters(&take(&mut states, 3).await), vec![100, 102, 104]);
    assert_eq!(elements.load(Ordering::SeqCst), 2);

    feature.cancel();
    assert!(feature.failure().is_none());
}

#[tokio::test]
async fn test_logging_middleware_on_every_stage() {
    let feature = builder()
        .post_processor(|_: &TestWish, _: &TestEffect, _: &TestState| None::<TestWish>)
        .middleware(LoggingMiddleware::new(Level::Debug))
        .build()
        .unwrap();
    let mut states = feature.observe_states();
    feature.submit(TestWish::TranslatesTo3Effects);
    assert_eq!(counters(&take(&mut states, 4).await), vec![100, 101, 103, 106]);
    assert!(feature.failure().is_none());
}

/// A single-threaded scheduler backed by its own thread and runtime.
struct ThreadScheduler {
    handle: Handle,
    thread: ThreadId,
    submitted: AtomicUsize,
    _shutdown: oneshot::Sender<()>,
}

impl ThreadScheduler {
    fn start() -> Arc<Self> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        thread::Builder::new()
            .name("feature-scheduler".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                ready_tx
                    .send((runtime.handle().clone(), thread::current().id()))
                    .unwrap();
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
            })
            .unwrap();
        let (handle, thread) = ready_rx.recv().unwrap();
        Arc::new(ThreadScheduler {
            handle,
            thread,
            submitted: AtomicUsize::new(0),
            _shutdown: shutdown_tx,
        })
    }

    fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl Scheduler for ThreadScheduler {
    fn submit(&self, task: Task) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.handle.spawn(task);
    }

    fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread
    }
}

#[tokio::test]
async fn test_smart_scheduler_skips_hop_on_its_own_thread() {
    let scheduler = ThreadScheduler::start();
    let feature = builder()
        .thread_strategy(FeatureThreadStrategy::on_feature_scheduler(
            FeatureScheduler::Smart(scheduler.clone()),
        ))
        .build()
        .unwrap();
    let mut states = feature.observe_states();

    let launched = scheduler.submitted();
    feature.submit(TestWish::FulfillableInstantly1);
    assert_eq!(scheduler.submitted(), launched + 1);
    assert_eq!(counters(&take(&mut states, 2).await), vec![100, 102]);

    let consumer = feature.as_consumer();
    let (done_tx, done_rx) = oneshot::channel();
    scheduler.submit(Box::pin(async move {
        consumer(TestWish::FulfillableInstantly1);
        let _ = done_tx.send(());
    }));
    done_rx.await.unwrap();
    assert_eq!(scheduler.submitted(), launched + 2);
    assert_eq!(next(&mut states).await.counter, 104);
}

#[tokio::test]
async fn test_observation_scheduler_delivers_states_and_news() {
    let processing = ThreadScheduler::start();
    let observation = Arc::new(TokioScheduler::current().unwrap());
    let feature = builder()
        .thread_strategy(
            FeatureThreadStrategy::on_feature_scheduler(FeatureScheduler::Simple(processing))
                .observe_on(observation),
        )
        .build()
        .unwrap();
    let mut states = feature.observe_states();
    let mut background = feature.background_states();
    let mut news = feature.observe_news();

    feature.submit(TestWish::LoopbackWish1);
    assert_eq!(take(&mut states, 2).await[1].id, "Loopback state 1");
    assert_eq!(take(&mut background, 2).await[1].id, "Loopback state 1");
    assert_eq!(next(&mut news).await, TestNews::Loopback);
}

#[tokio::test]
async fn test_feature_as_binder_sink_and_source() {
    let feature = feature();
    let mut states = feature.observe_states();
    let binder = Binder::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let news_sink: Consumer<TestNews> = {
        let seen = seen.clone();
        Arc::new(move |news: TestNews| seen.lock().unwrap().push(news))
    };
    binder
        .bind_scope(|scope| {
            scope.bind(
                Connection::new(
                    stream::iter(vec![TestWish::FulfillableInstantly1, TestWish::LoopbackWish1]),
                    feature.as_consumer(),
                )
                .named("wishes"),
            )?;
            scope.bind(Connection::new(feature.observe_news(), news_sink))
        })
        .unwrap();

    let seen_states = take(&mut states, 3).await;
    assert_eq!(seen_states[1].counter, 102);
    assert_eq!(seen_states[2].id, "Loopback state 1");
    wait_until(|| seen.lock().unwrap().len() == 1).await;
    assert_eq!(binder.active_connections().len(), 1);

    binder.unbind();
    assert!(binder.active_connections().is_empty());
}
