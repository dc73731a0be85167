pub mod binder;
mod channel;
pub mod config;
pub mod element;
pub mod error;
pub mod feature;
pub mod scheduler;

pub use binder::connection::{Connection, ConnectionInfo, Consumer};
pub use binder::Binder;
pub use error::{MviError, MviResult};
pub use feature::{Feature, FeatureBuilder, FeatureThreadStrategy};
pub use scheduler::{FeatureScheduler, Scheduler, TokioScheduler};
