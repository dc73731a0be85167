use std::fmt::Debug;

use log::{log, Level};

use super::Middleware;
use crate::binder::connection::ConnectionInfo;

/// Logs every lifecycle event of the connection it wraps.
#[derive(Debug, Clone, Copy)]
pub struct LoggingMiddleware {
    level: Level,
}

impl LoggingMiddleware {
    pub fn new(level: Level) -> Self {
        LoggingMiddleware { level }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        LoggingMiddleware::new(Level::Debug)
    }
}

impl<T: Debug> Middleware<T> for LoggingMiddleware {
    fn on_bind(&self, connection: &ConnectionInfo) {
        let name = connection.to_string();
        log!(self.level, connection = name.as_str(); "Binding {}", connection);
    }

    fn on_element(&self, connection: &ConnectionInfo, element: &T) {
        let name = connection.to_string();
        log!(self.level, connection = name.as_str(); "Element {:?}", element);
    }

    fn on_complete(&self, connection: &ConnectionInfo) {
        let name = connection.to_string();
        log!(self.level, connection = name.as_str(); "Completed {}", connection);
    }
}
