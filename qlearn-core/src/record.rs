//! Records of training and evaluation metrics.
//!
//! A [`Record`] is a map from names to [`RecordValue`]s. Diagnostics returned by
//! environments, agents, the collector and the evaluator are all records, which are
//! passed to an [`AggregateRecorder`]. The trainer stores records during an epoch
//! and flushes them once per epoch, with the number of environment steps as the
//! step of the flushed values.
//!
//! ```rust
//! use qlearn_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("collect/env_steps", RecordValue::Scalar(100.0));
//! record.insert("obs", RecordValue::Array1(vec![1.0, 2.0, 3.0]));
//! assert_eq!(record.get_scalar("collect/env_steps").unwrap(), 100.0);
//! ```
mod base;
mod buffered_recorder;
mod log_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use log_recorder::LogRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
