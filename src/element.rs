//! The application-supplied pipeline functions.
//!
//! Every contract has a blanket implementation for closures and `fn` items
//! with the matching signature, so a feature can be assembled from plain
//! functions or from dedicated types.

use futures::stream::BoxStream;

/// The effects an [`Actor`] produces for one action. May be empty, finite or unbounded.
pub type EffectStream<Effect> = BoxStream<'static, Effect>;

/// Translates an external wish into an internal action.
pub trait WishToAction<Wish, Action>: Send + Sync + 'static {
    fn to_action(&self, wish: Wish) -> Action;
}

impl<F, Wish, Action> WishToAction<Wish, Action> for F
where
    F: Fn(Wish) -> Action + Send + Sync + 'static,
{
    fn to_action(&self, wish: Wish) -> Action {
        self(wish)
    }
}

/// Turns `(state, action)` into a stream of effects.
///
/// An actor whose stream never ends keeps every later action waiting; bounding
/// the stream (or timing it out) is the actor's responsibility.
pub trait Actor<State, Action, Effect>: Send + Sync + 'static {
    fn invoke(&self, state: &State, action: &Action) -> EffectStream<Effect>;
}

impl<F, State, Action, Effect> Actor<State, Action, Effect> for F
where
    F: Fn(&State, &Action) -> EffectStream<Effect> + Send + Sync + 'static,
{
    fn invoke(&self, state: &State, action: &Action) -> EffectStream<Effect> {
        self(state, action)
    }
}

/// Folds an effect into the next state.
pub trait Reducer<State, Effect>: Send + Sync + 'static {
    fn reduce(&self, state: &State, effect: &Effect) -> State;
}

impl<F, State, Effect> Reducer<State, Effect> for F
where
    F: Fn(&State, &Effect) -> State + Send + Sync + 'static,
{
    fn reduce(&self, state: &State, effect: &Effect) -> State {
        self(state, effect)
    }
}

/// Derives a follow-up action, fed back into the feature's intake.
pub trait PostProcessor<Action, Effect, State>: Send + Sync + 'static {
    fn post_process(&self, action: &Action, effect: &Effect, state: &State) -> Option<Action>;
}

impl<F, Action, Effect, State> PostProcessor<Action, Effect, State> for F
where
    F: Fn(&Action, &Effect, &State) -> Option<Action> + Send + Sync + 'static,
{
    fn post_process(&self, action: &Action, effect: &Effect, state: &State) -> Option<Action> {
        self(action, effect, state)
    }
}

/// Derives a one-shot news event.
pub trait NewsPublisher<Action, Effect, State, News>: Send + Sync + 'static {
    fn publish(&self, action: &Action, effect: &Effect, state: &State) -> Option<News>;
}

impl<F, Action, Effect, State, News> NewsPublisher<Action, Effect, State, News> for F
where
    F: Fn(&Action, &Effect, &State) -> Option<News> + Send + Sync + 'static,
{
    fn publish(&self, action: &Action, effect: &Effect, state: &State) -> Option<News> {
        self(action, effect, state)
    }
}

/// Produces actions independently of wishes. Invoked once, when the feature starts.
pub trait Bootstrapper<Action>: Send + Sync + 'static {
    fn bootstrap(&self) -> BoxStream<'static, Action>;
}

impl<F, Action> Bootstrapper<Action> for F
where
    F: Fn() -> BoxStream<'static, Action> + Send + Sync + 'static,
{
    fn bootstrap(&self) -> BoxStream<'static, Action> {
        self()
    }
}

/// Constructors for common effect streams.
pub mod effects {
    use futures::stream::{self, StreamExt};

    use super::EffectStream;

    /// No effect: the action leaves the state untouched.
    pub fn none<E: Send + 'static>() -> EffectStream<E> {
        stream::empty().boxed()
    }

    pub fn just<E: Send + 'static>(effect: E) -> EffectStream<E> {
        stream::once(async move { effect }).boxed()
    }

    pub fn from_iter<E, I>(effects: I) -> EffectStream<E>
    where
        E: Send + 'static,
        I: IntoIterator<Item = E>,
        I::IntoIter: Send + 'static,
    {
        stream::iter(effects).boxed()
    }
}
