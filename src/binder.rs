use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::future::{self, AbortHandle};
use futures::StreamExt;
use log::{debug, info};

use crate::channel::lock;
use crate::error::{MviError, MviResult};
use crate::scheduler::{Scheduler, TokioScheduler};

pub mod connection;
pub mod middleware;

use connection::{Connection, ConnectionInfo};
use middleware::config::MiddlewareConfiguration;
use middleware::MiddlewareChain;

type ActiveMap = Mutex<HashMap<u64, ActiveConnection>>;

struct ActiveConnection {
    info: ConnectionInfo,
    abort: AbortHandle,
    finish: Arc<dyn Fn() + Send + Sync>,
}

/// A bound middleware chain that signals completion once, whichever side stops first.
struct Link<T> {
    chain: MiddlewareChain<T>,
    completed: AtomicBool,
}

impl<T: Send + 'static> Link<T> {
    fn deliver(&self, element: T) {
        if !self.completed.load(Ordering::SeqCst) {
            self.chain.accept(element);
        }
    }

    fn finish(&self) {
        if !self.completed.swap(true, Ordering::SeqCst) {
            self.chain.complete();
        }
    }
}

/// Completes the link and forgets the connection when its drain task ends or is aborted.
struct DrainGuard {
    id: u64,
    finish: Arc<dyn Fn() + Send + Sync>,
    active: Weak<ActiveMap>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        (self.finish)();
        if let Some(active) = self.active.upgrade() {
            lock(&active).remove(&self.id);
        }
    }
}

/// A connection waiting for its scope to commit.
struct Pending {
    info: ConnectionInfo,
    start: Box<dyn FnOnce(u64, Weak<ActiveMap>) -> MviResult<Started> + Send>,
}

struct Started {
    drain: future::BoxFuture<'static, ()>,
    finish: Arc<dyn Fn() + Send + Sync>,
}

/// Drives connections from their sources into their sinks.
///
/// Connections are collected in a [`BindScope`] and only start once the scope
/// commits, all of them together. They stay bound until [`Binder::unbind`] is
/// called or the binder is dropped.
pub struct Binder {
    scheduler: Arc<dyn Scheduler>,
    names: Mutex<HashMap<String, ConnectionInfo>>,
    active: Arc<ActiveMap>,
    next_id: AtomicU64,
}

impl Binder {
    /// A binder draining connections on the caller's tokio runtime.
    pub fn new() -> MviResult<Self> {
        Ok(Binder::with_scheduler(Arc::new(TokioScheduler::current()?)))
    }

    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Binder {
            scheduler,
            names: Mutex::new(HashMap::new()),
            active: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Binds a single connection right away.
    pub fn bind<Out, In>(&self, connection: Connection<Out, In>) -> MviResult<()>
    where
        Out: Send + 'static,
        In: Send + 'static,
    {
        self.bind_scope(|scope| scope.bind(connection))
    }

    /// Collects connections and starts them together once `build` returns `Ok`.
    ///
    /// If `build` fails, nothing collected so far is started and no name is claimed.
    pub fn bind_scope<F>(&self, build: F) -> MviResult<()>
    where
        F: FnOnce(&mut BindScope<'_>) -> MviResult<()>,
    {
        let mut scope = BindScope {
            binder: self,
            pending: Vec::new(),
        };
        build(&mut scope)?;
        self.commit(scope.pending)
    }

    fn commit(&self, pending: Vec<Pending>) -> MviResult<()> {
        let claimed = self.claim_names(&pending)?;
        // Dropping prepared drains on failure completes their middleware.
        let mut prepared = Vec::with_capacity(pending.len());
        for Pending { info, start } in pending {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            match start(id, Arc::downgrade(&self.active)) {
                Ok(started) => prepared.push((id, info, started)),
                Err(error) => {
                    self.release_names(&claimed);
                    return Err(error);
                }
            }
        }

        let mut started = Vec::with_capacity(prepared.len());
        for (id, info, Started { drain, finish }) in prepared {
            let (drain, abort) = future::abortable(drain);
            lock(&self.active).insert(
                id,
                ActiveConnection {
                    info: info.clone(),
                    abort,
                    finish,
                },
            );
            info!(connection = info.to_string().as_str(); "Binding connection {}", info);
            started.push(drain);
        }
        for drain in started {
            self.scheduler.submit(Box::pin(async move {
                let _ = drain.await;
            }));
        }
        Ok(())
    }

    /// Checks every name in `pending` and claims the new ones under a single lock.
    ///
    /// Returns the names claimed by this call, so a failed commit can release them.
    fn claim_names(&self, pending: &[Pending]) -> MviResult<Vec<String>> {
        let mut names = lock(&self.names);
        for info in pending.iter().map(|p| &p.info) {
            if let Some(existing) = info.name().and_then(|name| names.get(name)) {
                check_identity(existing, info)?;
            }
        }
        let mut claimed = Vec::new();
        for info in pending.iter().map(|p| &p.info) {
            if let Some(name) = info.name() {
                if names.insert(name.to_string(), info.clone()).is_none() {
                    claimed.push(name.to_string());
                }
            }
        }
        Ok(claimed)
    }

    fn release_names(&self, claimed: &[String]) {
        let mut names = lock(&self.names);
        for name in claimed {
            names.remove(name);
        }
    }

    /// Stops every active connection and signals `on_complete` to its middleware.
    pub fn unbind(&self) {
        let stopped: Vec<ActiveConnection> = lock(&self.active).drain().map(|(_, c)| c).collect();
        for connection in stopped {
            info!(connection = connection.info.to_string().as_str(); "Unbinding connection {}", connection.info);
            connection.abort.abort();
            (connection.finish)();
        }
    }

    /// Connections whose sources are still being drained, in binding order.
    pub fn active_connections(&self) -> Vec<ConnectionInfo> {
        let active = lock(&self.active);
        let mut ids: Vec<&u64> = active.keys().collect();
        ids.sort();
        ids.into_iter().map(|id| active[id].info.clone()).collect()
    }

    fn is_active(&self, info: &ConnectionInfo) -> bool {
        lock(&self.active).values().any(|active| active.info == *info)
    }

    fn check_name(&self, info: &ConnectionInfo, pending: &[Pending]) -> MviResult<()> {
        let Some(name) = info.name() else {
            return Ok(());
        };
        let claimed = pending
            .iter()
            .map(|p| &p.info)
            .find(|p| p.name() == Some(name))
            .cloned()
            .or_else(|| lock(&self.names).get(name).cloned());
        match claimed {
            Some(existing) => check_identity(&existing, info),
            None => Ok(()),
        }
    }
}

fn check_identity(existing: &ConnectionInfo, info: &ConnectionInfo) -> MviResult<()> {
    let differences = existing.differences(info);
    if differences.is_empty() {
        return Ok(());
    }
    Err(MviError::configuration(format!(
        "connection name '{}' is already bound as {}, can't rebind it with a different {}",
        info.name().unwrap_or_default(),
        existing,
        differences.join(" and ")
    )))
}

impl Drop for Binder {
    fn drop(&mut self) {
        self.unbind();
    }
}

/// Collects connections for [`Binder::bind_scope`].
pub struct BindScope<'a> {
    binder: &'a Binder,
    pending: Vec<Pending>,
}

impl BindScope<'_> {
    pub fn bind<Out, In>(&mut self, connection: Connection<Out, In>) -> MviResult<()>
    where
        Out: Send + 'static,
        In: Send + 'static,
    {
        self.enqueue(connection, None)
    }

    /// Binds a connection with the layers `configuration` selects for it, outside
    /// the connection's own layers.
    pub fn bind_with<Out, In>(
        &mut self,
        connection: Connection<Out, In>,
        configuration: &MiddlewareConfiguration<In>,
    ) -> MviResult<()>
    where
        Out: Send + 'static,
        In: Send + 'static,
    {
        self.enqueue(connection, Some(configuration))
    }

    fn enqueue<Out, In>(
        &mut self,
        connection: Connection<Out, In>,
        configuration: Option<&MiddlewareConfiguration<In>>,
    ) -> MviResult<()>
    where
        Out: Send + 'static,
        In: Send + 'static,
    {
        let info = connection.info();
        self.binder.check_name(&info, &self.pending)?;
        let duplicate = !info.is_anonymous()
            && (self.binder.is_active(&info) || self.pending.iter().any(|p| p.info == info));
        if duplicate {
            debug!(connection = info.to_string().as_str(); "Connection {} is already bound", info);
            return Ok(());
        }

        let (upstream, sink, own_layers) = connection.into_parts();
        let mut chain = MiddlewareChain::new(sink);
        for layer in own_layers {
            chain.wrap(layer)?;
        }
        if let Some(configuration) = configuration {
            for layer in configuration.layers_for(&info) {
                chain.wrap(layer)?;
            }
        }

        let bind_info = info.clone();
        let start = move |id: u64, active: Weak<ActiveMap>| -> MviResult<Started> {
            chain.bind(bind_info)?;
            let link = Arc::new(Link {
                chain,
                completed: AtomicBool::new(false),
            });
            let finisher = link.clone();
            let finish: Arc<dyn Fn() + Send + Sync> = Arc::new(move || finisher.finish());
            let guard = DrainGuard {
                id,
                finish: finish.clone(),
                active,
            };
            let drain = Box::pin(async move {
                let _guard = guard;
                let mut upstream = upstream;
                while let Some(element) = upstream.next().await {
                    link.deliver(element);
                }
            });
            Ok(Started { drain, finish })
        };
        self.pending.push(Pending {
            info,
            start: Box::new(start),
        });
        Ok(())
    }
}
