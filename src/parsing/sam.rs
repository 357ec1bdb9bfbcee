use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use noodles::sam::alignment::RecordBuf;
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use noodles::{bam, sam};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::core::barcode::BarcodeTableError;

/// Value used for run information missing from the input header
pub const UNKNOWN: &str = "unknown";

/// Read-group attribute holding the run folder
pub const RUN_FOLDER_TAG: [u8; 2] = *b"rf";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Table(#[from] BarcodeTableError),
}

/// Alignment file formats read and written by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentFormat {
    Bam,
    Sam,
}

impl AlignmentFormat {
    /// Detect the format from a file extension
    ///
    /// # Errors
    ///
    /// Returns `ParseError::UnsupportedFormat` for anything but `.sam` or `.bam`.
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("sam") => Ok(Self::Sam),
            Some("bam") => Ok(Self::Bam),
            Some(ext) => Err(ParseError::UnsupportedFormat(ext.to_string())),
            None => Err(ParseError::UnsupportedFormat(path.display().to_string())),
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Bam => "bam",
            Self::Sam => "sam",
        }
    }
}

trait ReadRecordBuf {
    fn read_record_buf(&mut self, header: &sam::Header, record: &mut RecordBuf)
        -> io::Result<usize>;
}

impl<R: BufRead> ReadRecordBuf for sam::io::Reader<R> {
    fn read_record_buf(
        &mut self,
        header: &sam::Header,
        record: &mut RecordBuf,
    ) -> io::Result<usize> {
        sam::io::Reader::read_record_buf(self, header, record)
    }
}

impl<R: Read> ReadRecordBuf for bam::io::Reader<R> {
    fn read_record_buf(
        &mut self,
        header: &sam::Header,
        record: &mut RecordBuf,
    ) -> io::Result<usize> {
        bam::io::Reader::read_record_buf(self, header, record)
    }
}

/// Record iterator over any reader; ends at the first zero-length read
struct RecordBufs<T> {
    reader: T,
    header: sam::Header,
}

impl<T: ReadRecordBuf> Iterator for RecordBufs<T> {
    type Item = io::Result<RecordBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = RecordBuf::default();
        match self.reader.read_record_buf(&self.header, &mut record) {
            Ok(0) => None,
            Ok(_) => Some(Ok(record)),
            Err(e) => Some(Err(e)),
        }
    }
}

/// An opened alignment input: its header and its records in file order
pub struct AlignmentInput {
    pub header: sam::Header,
    pub format: AlignmentFormat,
    records: Box<dyn Iterator<Item = io::Result<RecordBuf>>>,
}

impl AlignmentInput {
    /// Open a SAM or BAM file, chosen by extension, and read its header
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the file cannot be opened,
    /// `ParseError::UnsupportedFormat` for unknown extensions, or
    /// `ParseError::Noodles` if the header cannot be parsed.
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let format = AlignmentFormat::from_path(path)?;
        debug!("Opening {} as {format:?}", path.display());

        let (header, records): (sam::Header, Box<dyn Iterator<Item = io::Result<RecordBuf>>>) =
            match format {
                AlignmentFormat::Sam => {
                    let mut reader = File::open(path)
                        .map(BufReader::new)
                        .map(sam::io::Reader::new)?;
                    let header = reader
                        .read_header()
                        .map_err(|e| ParseError::Noodles(e.to_string()))?;
                    let records = RecordBufs {
                        reader,
                        header: header.clone(),
                    };
                    (header, Box::new(records))
                }
                AlignmentFormat::Bam => {
                    let mut reader = File::open(path).map(bam::io::Reader::new)?;
                    let header = reader
                        .read_header()
                        .map_err(|e| ParseError::Noodles(e.to_string()))?;
                    let records = RecordBufs {
                        reader,
                        header: header.clone(),
                    };
                    (header, Box::new(records))
                }
            };

        Ok(Self {
            header,
            format,
            records,
        })
    }

    /// Split into the header and the record stream
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        sam::Header,
        Box<dyn Iterator<Item = io::Result<RecordBuf>>>,
    ) {
        (self.header, self.records)
    }
}

/// Run information carried by the input header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunInfo {
    pub flow_cell_id: String,
    pub lane: String,
    pub run_folder: String,
}

impl Default for RunInfo {
    fn default() -> Self {
        Self {
            flow_cell_id: UNKNOWN.to_string(),
            lane: UNKNOWN.to_string(),
            run_folder: UNKNOWN.to_string(),
        }
    }
}

impl RunInfo {
    /// Read the flow cell and lane from read group IDs of the form
    /// `<fcid>.<lane>[.<more>]` and the run folder from the `rf` attribute.
    ///
    /// When several read groups qualify, the last one wins.
    #[must_use]
    pub fn from_header(header: &sam::Header) -> Self {
        let mut info = Self::default();

        for (id, read_group) in header.read_groups() {
            let id = id.to_string();
            let mut fields = id.split('.');
            if let (Some(fcid), Some(lane)) = (fields.next(), fields.next()) {
                if !fcid.is_empty() && !lane.is_empty() {
                    info.flow_cell_id = fcid.to_string();
                    info.lane = lane.to_string();
                }
            }

            if let Some(run_folder) = read_group.other_fields().get(&RUN_FOLDER_TAG) {
                if !run_folder.is_empty() {
                    info.run_folder = run_folder.to_string();
                }
            }
        }

        debug!(
            "Run information: flow cell {}, lane {}, run folder {}",
            info.flow_cell_id, info.lane, info.run_folder
        );
        info
    }
}

/// Library names of the input read groups, for logging
#[must_use]
pub fn input_libraries(header: &sam::Header) -> Vec<String> {
    header
        .read_groups()
        .values()
        .filter_map(|rg| rg.other_fields().get(&rg_tag::LIBRARY))
        .map(ToString::to_string)
        .collect()
}
