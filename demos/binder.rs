extern crate mvicore;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{info, Level};
use mvicore::binder::middleware::config::{MiddlewareConfiguration, NamePrefix};
use mvicore::binder::middleware::logging::LoggingMiddleware;
use mvicore::binder::middleware::Middleware;
use mvicore::config::{init_logging, LoggingConfig};
use mvicore::element::{effects, EffectStream};
use mvicore::feature::FeatureBuilder;
use mvicore::{Binder, Connection, Consumer, MviResult};

#[derive(Debug, Clone)]
enum UiEvent {
    Clicked,
    Scrolled(u32),
}

fn actor(_: &u32, click: &()) -> EffectStream<()> {
    effects::just(*click)
}

fn reducer(state: &u32, _: &()) -> u32 {
    state + 1
}

fn announce(_: &(), _: &(), clicks: &u32) -> Option<String> {
    (clicks % 2 == 0).then(|| format!("{} clicks so far", clicks))
}

#[tokio::main]
async fn main() -> MviResult<()> {
    init_logging(&LoggingConfig {
        level: "debug".to_string(),
    });

    let feature = FeatureBuilder::new(0u32, |click: ()| click, actor, reducer)
        .name("clicks")
        .news_publisher(announce)
        .build()?;

    let ui = stream::iter(vec![
        UiEvent::Clicked,
        UiEvent::Scrolled(40),
        UiEvent::Clicked,
        UiEvent::Clicked,
        UiEvent::Clicked,
    ])
    .then(|event| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        event
    });
    let toasts: Consumer<String> = Arc::new(|toast: String| info!("Toast: {}", toast));
    let logging = MiddlewareConfiguration::new(NamePrefix("ui.".to_string()))
        .with_factory(|| -> Arc<dyn Middleware<()>> { Arc::new(LoggingMiddleware::new(Level::Info)) });

    let binder = Binder::new()?;
    binder.bind_scope(|scope| {
        scope.bind_with(
            Connection::using(ui, feature.as_consumer(), |event: UiEvent| match event {
                UiEvent::Clicked => Some(()),
                UiEvent::Scrolled(_) => None,
            })
            .named("ui.clicks"),
            &logging,
        )?;
        scope.bind(Connection::new(feature.observe_news(), toasts).named("clicks.toasts"))
    })?;

    let mut states = feature.observe_states();
    while let Some(clicks) = states.next().await {
        info!("Clicks: {}", clicks);
        if clicks == 4 {
            break;
        }
    }
    for connection in binder.active_connections() {
        info!("Still bound: {}", connection);
    }
    binder.unbind();
    Ok(())
}
