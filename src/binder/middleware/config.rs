use std::sync::Arc;

use super::{Middleware, MiddlewareChain};
use crate::binder::connection::{ConnectionInfo, Consumer};
use crate::error::MviResult;

/// Decides whether a configuration applies to a connection.
pub trait WrappingCondition: Send + Sync {
    fn should_wrap(&self, connection: &ConnectionInfo) -> bool;
}

impl<F> WrappingCondition for F
where
    F: Fn(&ConnectionInfo) -> bool + Send + Sync,
{
    fn should_wrap(&self, connection: &ConnectionInfo) -> bool {
        self(connection)
    }
}

/// Wraps every connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl WrappingCondition for Always {
    fn should_wrap(&self, _connection: &ConnectionInfo) -> bool {
        true
    }
}

/// Wraps named connections whose name starts with a prefix. Anonymous connections never match.
#[derive(Debug, Clone)]
pub struct NamePrefix(pub String);

impl WrappingCondition for NamePrefix {
    fn should_wrap(&self, connection: &ConnectionInfo) -> bool {
        connection
            .name()
            .map_or(false, |name| name.starts_with(&self.0))
    }
}

/// Creates a fresh middleware layer for each connection it is applied to.
pub trait MiddlewareFactory<T>: Send + Sync {
    fn create(&self) -> Arc<dyn Middleware<T>>;
}

impl<F, T> MiddlewareFactory<T> for F
where
    F: Fn() -> Arc<dyn Middleware<T>> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Middleware<T>> {
        self()
    }
}

/// A condition plus the ordered factories of the layers it installs.
pub struct MiddlewareConfiguration<T> {
    condition: Box<dyn WrappingCondition>,
    factories: Vec<Box<dyn MiddlewareFactory<T>>>,
}

impl<T: Send + 'static> MiddlewareConfiguration<T> {
    pub fn new(condition: impl WrappingCondition + 'static) -> Self {
        MiddlewareConfiguration {
            condition: Box::new(condition),
            factories: Vec::new(),
        }
    }

    /// Adds a factory. Layers are wrapped in the order their factories were added.
    pub fn with_factory(mut self, factory: impl MiddlewareFactory<T> + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    /// Fresh layers for the connection, or none if the condition rejects it.
    pub fn layers_for(&self, connection: &ConnectionInfo) -> Vec<Arc<dyn Middleware<T>>> {
        if !self.condition.should_wrap(connection) {
            return Vec::new();
        }
        self.factories.iter().map(|factory| factory.create()).collect()
    }

    /// Wraps the sink in this configuration's layers and binds the chain to the connection.
    pub fn apply_on(
        &self,
        sink: Consumer<T>,
        connection: ConnectionInfo,
    ) -> MviResult<MiddlewareChain<T>> {
        let mut chain = MiddlewareChain::new(sink);
        for layer in self.layers_for(&connection) {
            chain.wrap(layer)?;
        }
        chain.bind(connection)?;
        Ok(chain)
    }
}
