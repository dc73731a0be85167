use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use futures::stream::{BoxStream, Stream, StreamExt};

use super::middleware::Middleware;

/// A function that receives every element delivered by a connection.
pub type Consumer<T> = Arc<dyn Fn(T) + Send + Sync>;

/// The asynchronous source side of a connection.
pub type Source<T> = BoxStream<'static, T>;

/// Transforms the upstream of a connection before it reaches the sink.
pub type Connector<Out, In> = Arc<dyn Fn(Source<Out>) -> Source<In> + Send + Sync>;

const ANONYMOUS: &str = "anonymous";

fn address<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

/// The identity of a connection, handed to middleware on every lifecycle event.
///
/// Two infos are equal when they carry the same name, source and element types
/// and the very same sink allocation. Custom connectors must also be the same
/// allocation; built-in connectors compare by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionInfo {
    name: Option<String>,
    source: &'static str,
    sink: &'static str,
    connector: &'static str,
    sink_id: usize,
    connector_id: usize,
    standalone: bool,
}

impl ConnectionInfo {
    /// The identity of a feature stage wrapped in standalone mode.
    pub(crate) fn standalone(name: String, sink: &'static str) -> Self {
        ConnectionInfo {
            name: Some(name),
            source: "feature",
            sink,
            connector: "identity",
            sink_id: 0,
            connector_id: 0,
            standalone: true,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// Type name of the elements the sink receives.
    pub fn target(&self) -> &'static str {
        self.sink
    }

    /// Names the parts of `other` that differ from this identity, e.g. `"sink"`.
    pub(crate) fn differences(&self, other: &ConnectionInfo) -> Vec<&'static str> {
        let mut parts = Vec::new();
        if self.source != other.source {
            parts.push("source type");
        }
        if self.sink != other.sink {
            parts.push("sink type");
        } else if self.sink_id != other.sink_id {
            parts.push("sink");
        }
        if self.connector != other.connector {
            parts.push("connector kind");
        } else if self.connector_id != other.connector_id {
            parts.push("connector");
        }
        if self.standalone != other.standalone {
            parts.push("standalone mode");
        }
        parts
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}> ({} --> {} using {})",
            self.name.as_deref().unwrap_or(ANONYMOUS),
            self.source,
            self.sink,
            self.connector
        )
    }
}

/// Binds one asynchronous source to one sink through a connector.
///
/// ```rust
/// use std::sync::Arc;
/// use futures::stream;
/// use mvicore::binder::connection::{Connection, Consumer};
///
/// let sink: Consumer<u32> = Arc::new(|value: u32| println!("{}", value));
/// let connection = Connection::using(stream::iter(vec!["1", "x", "3"]), sink, |text: &str| text.parse().ok())
///     .named("parse");
/// assert_eq!(connection.info().name(), Some("parse"));
/// ```
pub struct Connection<Out, In> {
    from: Source<Out>,
    to: Consumer<In>,
    connector: Connector<Out, In>,
    connector_kind: &'static str,
    custom_connector: bool,
    name: Option<String>,
    middleware: Vec<Arc<dyn Middleware<In>>>,
}

impl<T: Send + 'static> Connection<T, T> {
    /// Passes every upstream element through unchanged.
    pub fn new<S>(from: S, to: Consumer<T>) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Connection {
            from: from.boxed(),
            to,
            connector: Arc::new(|upstream: Source<T>| upstream),
            connector_kind: "identity",
            custom_connector: false,
            name: None,
            middleware: Vec::new(),
        }
    }
}

impl<Out: Send + 'static, In: Send + 'static> Connection<Out, In> {
    /// Maps every element to zero or one input elements; `None` drops the element.
    pub fn using<S, F>(from: S, to: Consumer<In>, transformer: F) -> Self
    where
        S: Stream<Item = Out> + Send + 'static,
        F: Fn(Out) -> Option<In> + Send + Sync + 'static,
    {
        let transformer = Arc::new(transformer);
        Connection {
            from: from.boxed(),
            to,
            connector: Arc::new(move |upstream: Source<Out>| {
                let transformer = transformer.clone();
                upstream
                    .filter_map(move |element| futures::future::ready(transformer(element)))
                    .boxed()
            }),
            connector_kind: "transformer",
            custom_connector: false,
            name: None,
            middleware: Vec::new(),
        }
    }

    pub fn with_connector<S>(from: S, to: Consumer<In>, connector: Connector<Out, In>) -> Self
    where
        S: Stream<Item = Out> + Send + 'static,
    {
        Connection {
            from: from.boxed(),
            to,
            connector,
            connector_kind: "connector",
            custom_connector: true,
            name: None,
            middleware: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds an instrumentation layer around the sink. The last layer added sees events first.
    pub fn with_middleware(mut self, layer: Arc<dyn Middleware<In>>) -> Self {
        self.middleware.push(layer);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            name: self.name.clone(),
            source: type_name::<Out>(),
            sink: type_name::<In>(),
            connector: self.connector_kind,
            sink_id: address(&self.to),
            connector_id: if self.custom_connector {
                address(&self.connector)
            } else {
                0
            },
            standalone: false,
        }
    }

    /// Splits the connection into the transformed upstream, its sink and its layers.
    pub(crate) fn into_parts(self) -> (Source<In>, Consumer<In>, Vec<Arc<dyn Middleware<In>>>) {
        let upstream = (self.connector)(self.from);
        (upstream, self.to, self.middleware)
    }
}

impl<Out: Send + 'static, In: Send + 'static> fmt::Display for Connection<Out, In> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.info().fmt(f)
    }
}
