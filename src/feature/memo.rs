use std::convert::Infallible;

use super::FeatureBuilder;
use crate::element::{effects, EffectStream, Reducer};

fn pass_through<State, T: Clone + Send + 'static>(_: &State, wish: &T) -> EffectStream<T> {
    effects::just(wish.clone())
}

fn identity<T>(wish: T) -> T {
    wish
}

fn replace<State: Clone>(_: &State, next: &State) -> State {
    next.clone()
}

impl<State> FeatureBuilder<State, State, State, State, Infallible>
where
    State: Clone + Send + Sync + 'static,
{
    /// A feature that only remembers the last state submitted to it.
    pub fn memo(initial_state: State) -> Self {
        FeatureBuilder::new(
            initial_state,
            identity::<State>,
            pass_through::<State, State>,
            replace::<State>,
        )
    }
}

impl<Wish, State, News> FeatureBuilder<Wish, Wish, Wish, State, News>
where
    Wish: Clone + Send + Sync + 'static,
    State: Clone + Send + Sync + 'static,
    News: Clone + Send + 'static,
{
    /// A feature that reduces each wish directly, with no actor in between.
    pub fn reducer_only(initial_state: State, reducer: impl Reducer<State, Wish>) -> Self {
        FeatureBuilder::new(
            initial_state,
            identity::<Wish>,
            pass_through::<State, Wish>,
            reducer,
        )
    }
}
