use std::collections::HashMap;
use std::io;

use tracing::debug;

use crate::core::types::{Destination, OutputMode};
use crate::routing::record::ReadUnit;
use crate::routing::router::RoutingError;

/// An output stream of alignment records
pub trait RecordSink {
    type Record;

    fn add_record(&mut self, record: &Self::Record) -> io::Result<()>;

    /// Flush and finalize the stream. Called exactly once.
    fn close(&mut self) -> io::Result<()>;
}

#[derive(Debug)]
enum Streams {
    Single {
        passed: usize,
        filtered: usize,
    },
    PerBarcode {
        passed: HashMap<String, usize>,
        filtered: HashMap<String, usize>,
    },
}

/// Every output stream of a run, addressed by [`Destination`].
///
/// Sinks are opened before the first record is routed and closed together by
/// [`SinkSet::close_all`].
#[derive(Debug)]
pub struct SinkSet<S> {
    sinks: Vec<S>,
    control: usize,
    streams: Streams,
    closed: bool,
}

impl<S> SinkSet<S> {
    /// One passed and one filtered stream shared by every barcode
    pub fn single(passed: S, filtered: S, control: S) -> Self {
        Self {
            sinks: vec![control, passed, filtered],
            control: 0,
            streams: Streams::Single {
                passed: 1,
                filtered: 2,
            },
            closed: false,
        }
    }

    /// Start a per-barcode set; add streams with [`SinkSet::add_barcode`]
    pub fn per_barcode(control: S) -> Self {
        Self {
            sinks: vec![control],
            control: 0,
            streams: Streams::PerBarcode {
                passed: HashMap::new(),
                filtered: HashMap::new(),
            },
            closed: false,
        }
    }

    /// Register the passed and filtered streams of one barcode key.
    ///
    /// Ignored in single mode, where every key shares the same streams.
    pub fn add_barcode(&mut self, key: impl Into<String>, passed: S, filtered: S) {
        if let Streams::PerBarcode {
            passed: passed_streams,
            filtered: filtered_streams,
        } = &mut self.streams
        {
            let key = key.into();
            self.sinks.push(passed);
            passed_streams.insert(key.clone(), self.sinks.len() - 1);
            self.sinks.push(filtered);
            filtered_streams.insert(key, self.sinks.len() - 1);
        }
    }

    #[must_use]
    pub fn mode(&self) -> OutputMode {
        match self.streams {
            Streams::Single { .. } => OutputMode::Single,
            Streams::PerBarcode { .. } => OutputMode::PerBarcode,
        }
    }

    /// Number of streams, the control stream included
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn resolve(&self, destination: &Destination) -> Option<usize> {
        match (destination, &self.streams) {
            (Destination::Control, _) => Some(self.control),
            (Destination::Passed(_), Streams::Single { passed, .. }) => Some(*passed),
            (Destination::Filtered(_), Streams::Single { filtered, .. }) => Some(*filtered),
            (Destination::Passed(key), Streams::PerBarcode { passed, .. }) => {
                passed.get(key).copied()
            }
            (Destination::Filtered(key), Streams::PerBarcode { filtered, .. }) => {
                filtered.get(key).copied()
            }
        }
    }

    /// The stream a destination resolves to
    #[must_use]
    pub fn get(&self, destination: &Destination) -> Option<&S> {
        self.resolve(destination).map(|i| &self.sinks[i])
    }
}

impl<S: RecordSink> SinkSet<S> {
    /// Write every record of a unit, primary first, to one destination
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::NoSink` if nothing is registered for the
    /// destination, or `RoutingError::Write` if the sink fails.
    pub fn write(
        &mut self,
        destination: &Destination,
        unit: &ReadUnit<S::Record>,
    ) -> Result<(), RoutingError> {
        let index = self
            .resolve(destination)
            .ok_or_else(|| RoutingError::NoSink(destination.clone()))?;
        let sink = &mut self.sinks[index];
        for record in unit.records() {
            sink.add_record(record).map_err(|source| RoutingError::Write {
                destination: destination.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Close every stream, even after a failure; later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the first `RoutingError::Close` encountered.
    pub fn close_all(&mut self) -> Result<(), RoutingError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.close() {
                debug!("Failed to close an output: {e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(RoutingError::Close(e)),
            None => Ok(()),
        }
    }
}

/// In-memory sink for exercising the router
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct MemorySink<R> {
    pub records: Vec<R>,
    pub closed: bool,
    pub fail_writes: bool,
}

#[cfg(test)]
impl<R> Default for MemorySink<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            closed: false,
            fail_writes: false,
        }
    }
}

#[cfg(test)]
impl<R: Clone> RecordSink for MemorySink<R> {
    type Record = R;

    fn add_record(&mut self, record: &R) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::other("disk full"));
        }
        if self.closed {
            return Err(io::Error::other("write after close"));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
