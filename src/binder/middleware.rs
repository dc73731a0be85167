use std::sync::Arc;

use super::connection::{ConnectionInfo, Consumer};
use crate::error::{MviError, MviResult};

pub mod config;
pub mod logging;
pub mod standalone;

/// An instrumentation layer around a sink.
///
/// Middleware observes the lifecycle of a connection without touching the
/// elements flowing through it. Every method has an empty default, so a layer
/// only implements the events it cares about.
pub trait Middleware<T>: Send + Sync {
    /// The connection started delivering to the wrapped sink.
    fn on_bind(&self, _connection: &ConnectionInfo) {}

    /// An element is about to be delivered to the wrapped sink.
    fn on_element(&self, _connection: &ConnectionInfo, _element: &T) {}

    /// The connection stopped delivering, by completion or cancellation.
    fn on_complete(&self, _connection: &ConnectionInfo) {}
}

/// Observes an element by reference, the shape every folded layer list takes.
pub(crate) type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Folds `layers` around `last` so that the last layer wrapped observes first.
pub(crate) fn fold_layers<T: 'static>(
    layers: &[Arc<dyn Middleware<T>>],
    connection: &Arc<ConnectionInfo>,
    last: Observer<T>,
) -> Observer<T> {
    layers.iter().fold(last, |next, layer| {
        let layer = layer.clone();
        let connection = connection.clone();
        let wrapped: Observer<T> = Arc::new(move |element: &T| {
            layer.on_element(&connection, element);
            next(element)
        });
        wrapped
    })
}

/// A sink wrapped in an ordered list of middleware layers.
///
/// Layers are kept in wrapping order: wrapping `a` then `b` makes `b` the
/// outermost layer, so `b` observes every event before `a`, which observes it
/// before the sink runs. Binding folds the layers into a single dispatch
/// closure once; delivering an element never walks the list by hand.
pub struct MiddlewareChain<T> {
    sink: Consumer<T>,
    layers: Vec<Arc<dyn Middleware<T>>>,
    dispatch: Consumer<T>,
    connection: Option<ConnectionInfo>,
}

impl<T: Send + 'static> MiddlewareChain<T> {
    pub fn new(sink: Consumer<T>) -> Self {
        MiddlewareChain {
            dispatch: sink.clone(),
            sink,
            layers: Vec::new(),
            connection: None,
        }
    }

    /// Adds an outer layer. Fails once the chain is bound.
    pub fn wrap(&mut self, layer: Arc<dyn Middleware<T>>) -> MviResult<()> {
        if let Some(connection) = &self.connection {
            return Err(MviError::configuration(format!(
                "middleware chain already bound to {}, can't wrap it again",
                connection
            )));
        }
        self.layers.push(layer);
        Ok(())
    }

    pub fn is_instrumented(&self) -> bool {
        !self.layers.is_empty()
    }

    /// The undecorated sink, for callers that bypass instrumentation.
    pub fn innermost(&self) -> &Consumer<T> {
        &self.sink
    }

    pub fn connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    /// Binds the chain to a connection and signals `on_bind`, outermost layer first.
    ///
    /// Rebinding to the same connection is allowed; a different one is a
    /// configuration error.
    pub fn bind(&mut self, connection: ConnectionInfo) -> MviResult<()> {
        if let Some(bound) = &self.connection {
            if *bound != connection {
                return Err(MviError::configuration(format!(
                    "middleware chain bound to {} can't accept {}",
                    bound, connection
                )));
            }
        }
        for layer in self.layers.iter().rev() {
            layer.on_bind(&connection);
        }
        if self.is_instrumented() {
            let observe = fold_layers(&self.layers, &Arc::new(connection.clone()), Arc::new(|_: &T| {}));
            let sink = self.sink.clone();
            self.dispatch = Arc::new(move |element: T| {
                observe(&element);
                sink(element)
            });
        }
        self.connection = Some(connection);
        Ok(())
    }

    /// Delivers an element through every layer to the sink.
    pub fn accept(&self, element: T) {
        (self.dispatch)(element)
    }

    /// Signals `on_complete`, outermost layer first. No-op while unbound.
    pub fn complete(&self) {
        if let Some(connection) = &self.connection {
            for layer in self.layers.iter().rev() {
                layer.on_complete(connection);
            }
        }
    }
}
