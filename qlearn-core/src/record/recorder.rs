use super::Record;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);
}

/// Stores records and writes values aggregated over them.
pub trait AggregateRecorder {
    /// Stores a record.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records and clears them.
    ///
    /// `step` is attached to the written values, the trainer passes the
    /// number of environment steps.
    fn flush(&mut self, step: i64);
}
