extern crate mvicore;

use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{info, Level};
use mvicore::binder::middleware::logging::LoggingMiddleware;
use mvicore::config::{init_logging, MviConfig};
use mvicore::element::{effects, EffectStream};
use mvicore::feature::{FeatureBuilder, FeatureThreadStrategy};
use mvicore::MviResult;

#[derive(Debug, Clone)]
struct Counter {
    value: i64,
    loading: bool,
}

#[derive(Debug, Clone)]
enum Wish {
    Increment,
    Reset,
    IncrementLater(Duration),
}

#[derive(Debug, Clone)]
enum Effect {
    Added(i64),
    Cleared,
    Loading,
}

#[derive(Debug, Clone)]
enum News {
    ReachedTen,
}

fn actor(_: &Counter, wish: &Wish) -> EffectStream<Effect> {
    match wish {
        Wish::Increment => effects::just(Effect::Added(1)),
        Wish::Reset => effects::just(Effect::Cleared),
        Wish::IncrementLater(delay) => {
            let delay = *delay;
            stream::once(async { Effect::Loading })
                .chain(stream::once(async move {
                    tokio::time::sleep(delay).await;
                    Effect::Added(5)
                }))
                .boxed()
        }
    }
}

fn reducer(state: &Counter, effect: &Effect) -> Counter {
    match effect {
        Effect::Added(amount) => Counter {
            value: state.value + amount,
            loading: false,
        },
        Effect::Cleared => Counter {
            value: 0,
            loading: false,
        },
        Effect::Loading => Counter {
            loading: true,
            ..state.clone()
        },
    }
}

fn news_publisher(_: &Wish, _: &Effect, state: &Counter) -> Option<News> {
    (state.value >= 10).then_some(News::ReachedTen)
}

// Once the counter reaches ten, reset it.
fn post_processor(_: &Wish, _: &Effect, state: &Counter) -> Option<Wish> {
    (state.value >= 10).then_some(Wish::Reset)
}

#[tokio::main]
async fn main() -> MviResult<()> {
    let config = MviConfig::load_from_file("mvi.config.example.toml").unwrap_or_default();
    init_logging(&config.logging);

    let feature = FeatureBuilder::new(
        Counter {
            value: 0,
            loading: false,
        },
        |wish: Wish| wish,
        actor,
        reducer,
    )
    .with_config(&config)
    .news_publisher(news_publisher)
    .post_processor(post_processor)
    .thread_strategy(FeatureThreadStrategy::ExecuteOnCurrentThread)
    .middleware(LoggingMiddleware::new(Level::Debug))
    .build()?;

    let mut news = feature.observe_news();
    tokio::spawn(async move {
        while let Some(event) = news.next().await {
            info!("News: {:?}", event);
        }
    });

    let mut states = feature.observe_states();
    feature.submit(Wish::IncrementLater(Duration::from_millis(200)));
    for _ in 0..5 {
        feature.submit(Wish::Increment);
    }

    // initial, loading, +5, five increments, reset
    for _ in 0..9 {
        if let Some(state) = states.next().await {
            info!("State: {:?}", state);
        }
    }
    feature.cancel();
    Ok(())
}
