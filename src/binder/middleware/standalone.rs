use std::any::type_name;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{fold_layers, Middleware, Observer};
use crate::binder::connection::ConnectionInfo;
use crate::error::{MviError, MviResult};

/// Middleware around a feature stage, bound to a connection of its own.
///
/// The connection is named `<name>.<postfix>` (postfix defaults to `input`) and
/// is bound on construction. Any later bind must present that same connection.
pub struct StandaloneMiddleware<T> {
    layers: Vec<Arc<dyn Middleware<T>>>,
    connection: ConnectionInfo,
    observe: Observer<T>,
    completed: AtomicBool,
}

impl<T: 'static> StandaloneMiddleware<T> {
    pub fn new(layers: Vec<Arc<dyn Middleware<T>>>, name: &str, postfix: Option<&str>) -> Self {
        let connection = ConnectionInfo::standalone(
            format!("{}.{}", name, postfix.unwrap_or("input")),
            type_name::<T>(),
        );
        for layer in layers.iter().rev() {
            layer.on_bind(&connection);
        }
        let observe = fold_layers(&layers, &Arc::new(connection.clone()), Arc::new(|_: &T| {}));
        StandaloneMiddleware {
            layers,
            connection,
            observe,
            completed: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    pub fn bind(&self, connection: &ConnectionInfo) -> MviResult<()> {
        if *connection != self.connection {
            return Err(MviError::configuration(format!(
                "middleware was initialised in standalone mode for {}, can't accept {}",
                self.connection, connection
            )));
        }
        for layer in self.layers.iter().rev() {
            layer.on_bind(connection);
        }
        Ok(())
    }

    pub fn on_element(&self, element: &T) {
        (self.observe)(element)
    }
}

impl<T> StandaloneMiddleware<T> {
    /// Signals `on_complete` exactly once.
    pub fn complete(&self) {
        if self.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        for layer in self.layers.iter().rev() {
            layer.on_complete(&self.connection);
        }
    }
}

impl<T> Drop for StandaloneMiddleware<T> {
    fn drop(&mut self) {
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{mock, Sequence};

    mock! {
        Layer {}
        impl Middleware<String> for Layer {
            fn on_bind(&self, connection: &ConnectionInfo);
            fn on_element(&self, connection: &ConnectionInfo, element: &String);
            fn on_complete(&self, connection: &ConnectionInfo);
        }
    }

    #[test]
    fn test_binds_on_construction_and_completes_once() {
        let mut layer = MockLayer::new();
        let mut seq = Sequence::new();
        layer
            .expect_on_bind()
            .withf(|connection| connection.name() == Some("counter.actor.input"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        layer
            .expect_on_element()
            .withf(|_, element| element == "hello")
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        layer
            .expect_on_complete()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let middleware =
            StandaloneMiddleware::<String>::new(vec![Arc::new(layer)], "counter.actor", None);
        assert!(middleware.connection().is_standalone());
        middleware.on_element(&"hello".to_string());
        middleware.complete();
        drop(middleware);
    }

    #[test]
    fn test_rejects_foreign_connection() {
        let mut layer = MockLayer::new();
        layer.expect_on_bind().times(1).return_const(());
        layer.expect_on_complete().times(1).return_const(());

        let middleware = StandaloneMiddleware::<String>::new(
            vec![Arc::new(layer)],
            "counter.bootstrapper",
            Some("output"),
        );
        let foreign = ConnectionInfo::standalone("other.input".to_string(), "String");
        let result = middleware.bind(&foreign);
        assert!(matches!(result, Err(MviError::Configuration { .. })));
    }

    #[test]
    fn test_accepts_own_connection_again() {
        let mut layer = MockLayer::new();
        layer.expect_on_bind().times(2).return_const(());
        layer.expect_on_complete().times(1).return_const(());

        let middleware =
            StandaloneMiddleware::<String>::new(vec![Arc::new(layer)], "counter.reducer", None);
        let own = middleware.connection().clone();
        assert!(middleware.bind(&own).is_ok());
    }
}
