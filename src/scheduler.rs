use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use futures::future::BoxFuture;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{MviError, MviResult};

/// A unit of work handed to a [`Scheduler`].
pub type Task = BoxFuture<'static, ()>;

/// An execution context supplied by the host.
///
/// The engine never creates threads itself; every loop, bootstrapper and
/// observation hop is submitted through this trait.
pub trait Scheduler: Send + Sync + 'static {
    /// Queue a task at the end of this scheduler's work queue.
    fn submit(&self, task: Task);

    /// Whether the caller is already running on this scheduler's thread.
    ///
    /// Only consulted by [`FeatureScheduler::Smart`]. Schedulers that cannot
    /// tell keep the default and always hop.
    fn is_current_thread(&self) -> bool {
        false
    }
}

/// Spawns tasks onto a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        TokioScheduler { handle }
    }

    /// Captures the runtime the caller is running in.
    pub fn current() -> MviResult<Self> {
        Handle::try_current()
            .map(TokioScheduler::new)
            .map_err(|_| MviError::NoRuntime)
    }

    /// Whether every task runs on the one thread driving the runtime.
    pub fn is_single_threaded(&self) -> bool {
        matches!(self.handle.runtime_flavor(), RuntimeFlavor::CurrentThread)
    }
}

impl Scheduler for TokioScheduler {
    fn submit(&self, task: Task) {
        self.handle.spawn(task);
    }
}

/// The single-threaded scheduler a feature is pinned to.
///
/// Both variants must wrap a scheduler that runs one task at a time, otherwise
/// wish marshalling loses its ordering.
#[derive(Clone)]
pub enum FeatureScheduler {
    /// Always enqueue at the end of the scheduler's queue.
    Simple(Arc<dyn Scheduler>),
    /// Skip the hop when the caller already runs on the scheduler's thread.
    Smart(Arc<dyn Scheduler>),
}

impl FeatureScheduler {
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        match self {
            FeatureScheduler::Simple(scheduler) | FeatureScheduler::Smart(scheduler) => scheduler,
        }
    }

    /// Whether work coming from the calling thread must be submitted to the scheduler.
    pub fn should_hop(&self) -> bool {
        match self {
            FeatureScheduler::Simple(_) => true,
            FeatureScheduler::Smart(scheduler) => !scheduler.is_current_thread(),
        }
    }
}

impl fmt::Debug for FeatureScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureScheduler::Simple(_) => f.write_str("FeatureScheduler::Simple"),
            FeatureScheduler::Smart(_) => f.write_str("FeatureScheduler::Smart"),
        }
    }
}

/// Fails fast when state is mutated away from the thread that built the feature.
#[derive(Debug, Clone)]
pub struct SameThreadVerifier {
    feature: String,
    thread: ThreadId,
    thread_name: String,
}

impl SameThreadVerifier {
    /// Pins the verifier to the calling thread.
    pub fn new(feature: impl Into<String>) -> Self {
        let current = thread::current();
        SameThreadVerifier {
            feature: feature.into(),
            thread: current.id(),
            thread_name: describe(&current),
        }
    }

    pub fn verify(&self) -> MviResult<()> {
        let current = thread::current();
        if current.id() == self.thread {
            return Ok(());
        }
        Err(MviError::ConcurrencyViolation {
            expected: format!("{} (feature '{}')", self.thread_name, self.feature),
            actual: describe(&current),
        })
    }
}

fn describe(thread: &thread::Thread) -> String {
    match thread.name() {
        Some(name) => format!("{} {:?}", name, thread.id()),
        None => format!("{:?}", thread.id()),
    }
}
