use std::io;

use noodles::sam::alignment::record::data::field::Tag;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::barcode::BarcodeTable;
use crate::core::types::{DecodingConfig, Destination};
use crate::matching::engine::{BarcodeMatch, MatchError, MatchingEngine};
use crate::metrics::barcode::MetricsAggregator;
use crate::routing::record::{AlignmentRecord, ReadUnit};
use crate::routing::sink::{RecordSink, SinkSet};

/// Log progress every this many read units
pub const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Read units classified per batch, per worker thread
pub const BATCH_SIZE_PER_THREAD: usize = 1024;

/// Fatal errors raised while routing records
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Read {read_name}: barcode '{barcode}' is shorter than the expected length {expected}")]
    ShortBarcode {
        read_name: String,
        barcode: String,
        expected: usize,
    },

    #[error("Read {read_name} is paired but the next record is {mate_name}; the input is not grouped by read name")]
    MateMismatch {
        read_name: String,
        mate_name: String,
    },

    #[error("Mate of read {read_name} is not flagged as paired")]
    MateNotPaired { read_name: String },

    #[error("Read {read_name} is paired but its mate is missing at the end of the input")]
    MissingMate { read_name: String },

    #[error("No output stream for {0}")]
    NoSink(Destination),

    #[error("Failed to read input record: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to the {destination} output: {source}")]
    Write {
        destination: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to close an output: {0}")]
    Close(#[source] io::Error),

    #[error("Failed to start worker threads: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Match(#[from] MatchError),
}

fn display_name<R: AlignmentRecord>(record: &R) -> String {
    record
        .read_name()
        .map_or_else(|| "*".to_string(), |n| String::from_utf8_lossy(n).into_owned())
}

/// Groups a record stream into read units, pairing each paired record with the
/// record that follows it
pub struct ReadUnits<I> {
    records: I,
}

impl<I> ReadUnits<I> {
    pub fn new(records: I) -> Self {
        Self { records }
    }
}

impl<I, R> Iterator for ReadUnits<I>
where
    I: Iterator<Item = io::Result<R>>,
    R: AlignmentRecord,
{
    type Item = Result<ReadUnit<R>, RoutingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let primary = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(RoutingError::Read(e))),
        };

        if !primary.is_paired() {
            return Some(Ok(ReadUnit::single(primary)));
        }

        let mate = match self.records.next() {
            Some(Ok(record)) => record,
            Some(Err(e)) => return Some(Err(RoutingError::Read(e))),
            None => {
                return Some(Err(RoutingError::MissingMate {
                    read_name: display_name(&primary),
                }))
            }
        };

        if primary.read_name() != mate.read_name() {
            return Some(Err(RoutingError::MateMismatch {
                read_name: display_name(&primary),
                mate_name: display_name(&mate),
            }));
        }
        if !mate.is_paired() {
            return Some(Err(RoutingError::MateNotPaired {
                read_name: display_name(&mate),
            }));
        }

        Some(Ok(ReadUnit::paired(primary, mate)))
    }
}

/// The barcode read pulled off a unit, cut to the table's barcode length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedBarcode {
    /// Empty when neither record carries the barcode attribute
    pub bases: String,
    /// False only for units with a barcode that fail the vendor quality check
    pub is_quality_pass: bool,
}

/// Counts over every routed unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingSummary {
    pub units: u64,
    pub records: u64,
    pub matched: u64,
    pub undetermined: u64,
    pub filtered: u64,
    pub controls: u64,
}

impl RoutingSummary {
    fn add(&mut self, records: usize, result: &BarcodeMatch, destination: &Destination) {
        self.units += 1;
        self.records += records as u64;
        if result.matched {
            self.matched += 1;
        } else {
            self.undetermined += 1;
        }
        match destination {
            Destination::Control => self.controls += 1,
            Destination::Filtered(_) => self.filtered += 1,
            Destination::Passed(_) => {}
        }
    }
}

/// Drives each read unit through extract, classify, rewrite and dispatch
#[derive(Debug, Clone, Copy)]
pub struct RecordRouter<'a> {
    engine: MatchingEngine<'a>,
    config: DecodingConfig,
}

impl<'a> RecordRouter<'a> {
    pub fn new(table: &'a BarcodeTable, config: DecodingConfig) -> Self {
        Self {
            engine: MatchingEngine::new(table, config.thresholds),
            config,
        }
    }

    /// Pull the observed barcode off a unit.
    ///
    /// The primary's value wins when both records carry the tag; the mate's is
    /// used when only it has one. Without the tag on either record the barcode
    /// is empty and the unit passes the quality gate.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::ShortBarcode` if the value is shorter than the
    /// table's barcode length. An empty or non-string value counts as short.
    pub fn extract<R: AlignmentRecord>(
        &self,
        unit: &ReadUnit<R>,
    ) -> Result<ObservedBarcode, RoutingError> {
        let tag = self.config.barcode_tag;
        let Some(carrier) = unit.records().find(|r| r.has_attribute(tag)) else {
            return Ok(ObservedBarcode {
                bases: String::new(),
                is_quality_pass: true,
            });
        };
        let value = carrier.get_attribute(tag).unwrap_or_default();

        let length = self.engine.table().barcode_length();
        if value.len() < length {
            return Err(RoutingError::ShortBarcode {
                read_name: display_name(&unit.primary),
                barcode: String::from_utf8_lossy(value).into_owned(),
                expected: length,
            });
        }

        Ok(ObservedBarcode {
            bases: String::from_utf8_lossy(&value[..length]).into_owned(),
            is_quality_pass: !unit.primary.is_qc_fail(),
        })
    }

    /// Classify an extracted barcode; an empty one is undetermined without scoring.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::Match` if the barcode is not the table's length.
    pub fn classify(&self, observed: &ObservedBarcode) -> Result<BarcodeMatch, RoutingError> {
        if observed.bases.is_empty() {
            return Ok(BarcodeMatch::unscored());
        }
        Ok(self
            .engine
            .classify(&observed.bases, observed.is_quality_pass)?)
    }

    /// Append `.<key>` to the read name and read group of every record in the unit
    pub fn rewrite<R: AlignmentRecord>(&self, unit: &mut ReadUnit<R>, result: &BarcodeMatch) {
        let suffix = format!(".{}", result.key());
        for record in unit.records_mut() {
            let mut name = record.read_name().map(<[u8]>::to_vec).unwrap_or_default();
            name.extend_from_slice(suffix.as_bytes());
            record.set_read_name(name);

            if let Some(id) = record.get_attribute(Tag::READ_GROUP) {
                let id = format!("{}{suffix}", String::from_utf8_lossy(id));
                record.set_attribute(Tag::READ_GROUP, &id);
            }
        }
    }

    /// Pick the stream for a unit: controls first, then vendor failures, then passed
    pub fn destination<R: AlignmentRecord>(
        &self,
        unit: &ReadUnit<R>,
        result: &BarcodeMatch,
    ) -> Destination {
        if unit.primary.has_attribute(self.config.control_tag) {
            Destination::Control
        } else if unit.primary.is_qc_fail() {
            Destination::Filtered(result.key().to_string())
        } else {
            Destination::Passed(result.key().to_string())
        }
    }

    fn dispatch<S>(
        &self,
        mut unit: ReadUnit<S::Record>,
        observed: &ObservedBarcode,
        result: &BarcodeMatch,
        sinks: &mut SinkSet<S>,
        metrics: &mut MetricsAggregator,
        summary: &mut RoutingSummary,
    ) -> Result<(), RoutingError>
    where
        S: RecordSink,
        S::Record: AlignmentRecord,
    {
        metrics.record(result, observed.is_quality_pass);
        self.rewrite(&mut unit, result);
        let destination = self.destination(&unit, result);
        sinks.write(&destination, &unit)?;

        summary.add(unit.records().count(), result, &destination);
        if summary.units % PROGRESS_INTERVAL == 0 {
            info!("Decoded {} reads", summary.units);
        }
        Ok(())
    }

    /// Run one unit through every stage
    ///
    /// # Errors
    ///
    /// Returns any extract, classify or sink error.
    pub fn route_unit<S>(
        &self,
        unit: ReadUnit<S::Record>,
        sinks: &mut SinkSet<S>,
        metrics: &mut MetricsAggregator,
        summary: &mut RoutingSummary,
    ) -> Result<(), RoutingError>
    where
        S: RecordSink,
        S::Record: AlignmentRecord,
    {
        let observed = self.extract(&unit)?;
        let result = self.classify(&observed)?;
        self.dispatch(unit, &observed, &result, sinks, metrics, summary)
    }

    /// Route every unit, then close every sink whether or not routing succeeded.
    ///
    /// Units are read in batches of `threads * 1024`. With more than one thread
    /// the barcodes of a batch are classified in parallel; everything else runs
    /// in input order on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the first routing error, or a close error if routing succeeded.
    pub fn route_all<I, S>(
        &self,
        units: I,
        sinks: &mut SinkSet<S>,
        metrics: &mut MetricsAggregator,
        threads: usize,
    ) -> Result<RoutingSummary, RoutingError>
    where
        I: Iterator<Item = Result<ReadUnit<S::Record>, RoutingError>>,
        S: RecordSink,
        S::Record: AlignmentRecord,
    {
        let routed = self.route_batches(units, sinks, metrics, threads);
        let closed = sinks.close_all();
        let summary = routed?;
        closed?;
        Ok(summary)
    }

    fn route_batches<I, S>(
        &self,
        mut units: I,
        sinks: &mut SinkSet<S>,
        metrics: &mut MetricsAggregator,
        threads: usize,
    ) -> Result<RoutingSummary, RoutingError>
    where
        I: Iterator<Item = Result<ReadUnit<S::Record>, RoutingError>>,
        S: RecordSink,
        S::Record: AlignmentRecord,
    {
        let pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| RoutingError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        let batch_size = threads.max(1) * BATCH_SIZE_PER_THREAD;
        debug!("Routing in batches of {batch_size} read units");

        let mut summary = RoutingSummary::default();
        loop {
            let mut batch = Vec::with_capacity(batch_size);
            let mut observed = Vec::with_capacity(batch_size);
            let mut failure = None;

            for unit in units.by_ref() {
                match unit.and_then(|u| self.extract(&u).map(|o| (u, o))) {
                    Ok((unit, barcode)) => {
                        batch.push(unit);
                        observed.push(barcode);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
                if batch.len() == batch_size {
                    break;
                }
            }

            if batch.is_empty() && failure.is_none() {
                return Ok(summary);
            }

            let results: Vec<Result<BarcodeMatch, RoutingError>> = match &pool {
                Some(pool) => {
                    pool.install(|| observed.par_iter().map(|o| self.classify(o)).collect())
                }
                None => observed.iter().map(|o| self.classify(o)).collect(),
            };

            // units ahead of a failure are still written
            for ((unit, barcode), result) in batch.into_iter().zip(&observed).zip(results) {
                let result = result?;
                self.dispatch(unit, barcode, &result, sinks, metrics, &mut summary)?;
            }

            if let Some(e) = failure {
                return Err(e);
            }
        }
    }
}
