use super::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use itertools::Itertools;
use log::info;

/// A recorder writing records through the `log` facade.
///
/// Stored records are aggregated with [`RecordStorage`] and emitted as a single
/// `info` line per flush, keys in alphabetical order.
#[derive(Default)]
pub struct LogRecorder {
    storage: RecordStorage,
}

impl LogRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn format(record: &Record) -> String {
        record
            .iter()
            .sorted_by(|(k1, _), (k2, _)| k1.cmp(k2))
            .filter_map(|(k, v)| match v {
                RecordValue::Scalar(v) => Some(format!("{} = {:.4}", k, v)),
                RecordValue::String(s) => Some(format!("{} = {}", k, s)),
                RecordValue::DateTime(t) => Some(format!("{} = {}", k, t)),
                _ => None,
            })
            .join(", ")
    }
}

impl Recorder for LogRecorder {
    fn write(&mut self, record: Record) {
        info!("{}", Self::format(&record));
    }
}

impl AggregateRecorder for LogRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        if self.storage.is_empty() {
            return;
        }
        let record = self.storage.aggregate();
        info!("step = {}, {}", step, Self::format(&record));
    }
}
