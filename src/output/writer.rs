use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::Header;
use noodles::{bam, bgzf, sam};
use tracing::{debug, info};

use crate::core::barcode::BarcodeTable;
use crate::output::header::output_header;
use crate::output::layout::{barcode_paths, control_path, single_paths};
use crate::parsing::sam::{AlignmentFormat, RunInfo};
use crate::routing::sink::{RecordSink, SinkSet};

/// Where the decoded records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One passed file; filtered and control files are named after it
    Single(PathBuf),
    /// A passed and a filtered file per barcode under a directory
    Split { dir: PathBuf, format: AlignmentFormat },
}

/// The concrete writer behind an [`AlignmentWriter`]
enum Inner {
    Bam(bam::io::Writer<bgzf::Writer<File>>),
    Sam(sam::io::Writer<BufWriter<File>>),
}

impl Inner {
    fn as_alignment_writer(&mut self) -> &mut dyn AlignmentWrite {
        match self {
            Self::Bam(writer) => writer,
            Self::Sam(writer) => writer,
        }
    }

    /// Write the BGZF EOF block (BAM) and flush everything down to the file
    fn finish(self) -> io::Result<()> {
        let mut file = match self {
            Self::Bam(writer) => {
                let mut bgzf_writer = writer.into_inner();
                bgzf_writer.try_finish()?;
                bgzf_writer.into_inner()
            }
            Self::Sam(writer) => writer
                .into_inner()
                .into_inner()
                .map_err(io::IntoInnerError::into_error)?,
        };
        file.flush()
    }
}

/// A SAM or BAM file being written
pub struct AlignmentWriter {
    path: PathBuf,
    header: Header,
    /// `None` once closed
    inner: Option<Inner>,
}

impl AlignmentWriter {
    /// Create the file (and its parent directories) and write the header
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the header cannot be written.
    pub fn create(path: &Path, format: AlignmentFormat, header: Header) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create output: {}", path.display()))?;
        let mut inner = match format {
            AlignmentFormat::Bam => Inner::Bam(bam::io::Writer::new(file)),
            AlignmentFormat::Sam => Inner::Sam(sam::io::Writer::new(BufWriter::new(file))),
        };
        inner
            .as_alignment_writer()
            .write_alignment_header(&header)
            .with_context(|| format!("Failed to write header to: {}", path.display()))?;

        debug!("Opened {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            header,
            inner: Some(inner),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for AlignmentWriter {
    type Record = RecordBuf;

    fn add_record(&mut self, record: &RecordBuf) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner
                .as_alignment_writer()
                .write_alignment_record(&self.header, record),
            None => Err(io::Error::other(format!(
                "{} is already closed",
                self.path.display()
            ))),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(inner) => inner.finish(),
            None => Ok(()),
        }
    }
}

/// Open every writer, closing the ones already open if one fails
fn open_all(specs: Vec<(PathBuf, Header)>, format: AlignmentFormat) -> Result<Vec<AlignmentWriter>> {
    let mut writers = Vec::with_capacity(specs.len());
    for (path, header) in specs {
        match AlignmentWriter::create(&path, format, header) {
            Ok(writer) => writers.push(writer),
            Err(e) => {
                for writer in &mut writers {
                    if let Err(close_error) = writer.close() {
                        debug!("Failed to close {}: {close_error}", writer.path().display());
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(writers)
}

/// Open every output stream of a run.
///
/// The single layout's files and the control file carry the read groups of
/// every barcode; per-barcode files carry only their own.
///
/// # Errors
///
/// Returns an error if a path cannot be built from the barcode table, or if
/// any file cannot be created.
pub fn open_sinks(
    target: &OutputTarget,
    table: &BarcodeTable,
    input_header: &Header,
    run: &RunInfo,
    command_line: &str,
) -> Result<SinkSet<AlignmentWriter>> {
    let full_header = output_header(input_header, table.entries_with_undetermined(), command_line)?;

    match target {
        OutputTarget::Single(path) => {
            let format = AlignmentFormat::from_path(path)?;
            let paths = single_paths(path, run);
            info!("Writing decoded reads to {}", paths.streams.passed.display());

            let specs = vec![
                (paths.streams.passed, full_header.clone()),
                (paths.streams.filtered, full_header.clone()),
                (paths.control, full_header),
            ];
            let mut writers = open_all(specs, format)?.into_iter();
            match (writers.next(), writers.next(), writers.next()) {
                (Some(passed), Some(filtered), Some(control)) => {
                    Ok(SinkSet::single(passed, filtered, control))
                }
                _ => anyhow::bail!("Failed to open the single output streams"),
            }
        }
        OutputTarget::Split { dir, format } => {
            info!("Writing decoded reads under {}", dir.display());

            let mut specs = vec![(control_path(dir, run, *format)?, full_header)];
            let mut keys = Vec::with_capacity(table.len() + 1);
            for entry in table.entries_with_undetermined() {
                let paths = barcode_paths(dir, entry, run, *format).with_context(|| {
                    format!("Cannot build output paths for barcode '{}'", entry.key())
                })?;
                let header = output_header(input_header, [entry], command_line)?;
                specs.push((paths.passed, header.clone()));
                specs.push((paths.filtered, header));
                keys.push(entry.key().to_string());
            }

            let mut writers = open_all(specs, *format)?.into_iter();
            let Some(control) = writers.next() else {
                anyhow::bail!("Failed to open the control output stream");
            };
            let mut sinks = SinkSet::per_barcode(control);
            for key in keys {
                if let (Some(passed), Some(filtered)) = (writers.next(), writers.next()) {
                    sinks.add_barcode(key, passed, filtered);
                }
            }
            Ok(sinks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Destination;
    use crate::parsing::sam::AlignmentInput;
    use crate::routing::record::ReadUnit;
    use bstr::BString;
    use noodles::sam::alignment::record::Flags;
    use tempfile::TempDir;

    fn input_header() -> Header {
        "@HD\tVN:1.6\n@RG\tID:FC1.1\tSM:s\n".parse().unwrap()
    }

    fn record(name: &str) -> RecordBuf {
        RecordBuf::builder()
            .set_name(BString::from(name))
            .set_flags(Flags::UNMAPPED)
            .build()
    }

    #[test]
    fn test_writer_round_trip() {
        let dir = TempDir::new().unwrap();
        for format in [AlignmentFormat::Sam, AlignmentFormat::Bam] {
            let path = dir
                .path()
                .join("nested")
                .join(format!("out.{}", format.extension()));
            let mut writer = AlignmentWriter::create(&path, format, input_header()).unwrap();
            writer.add_record(&record("q1")).unwrap();
            writer.add_record(&record("q2")).unwrap();
            writer.close().unwrap();
            writer.close().unwrap();

            // the file is complete while the writer is still alive
            let (header, records) = AlignmentInput::open(&path).unwrap().into_parts();
            assert_eq!(header.read_groups().len(), 1);
            assert_eq!(records.count(), 2);
            assert!(writer.add_record(&record("q3")).is_err());
            drop(writer);
        }
    }

    #[test]
    fn test_bam_has_eof_block_after_close() {
        const BGZF_EOF: [u8; 28] = [
            0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43,
            0x02, 0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bam");
        let mut writer = AlignmentWriter::create(&path, AlignmentFormat::Bam, input_header()).unwrap();
        writer.add_record(&record("q1")).unwrap();
        writer.close().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.len() > BGZF_EOF.len());
        assert_eq!(&bytes[bytes.len() - BGZF_EOF.len()..], &BGZF_EOF[..]);
        drop(writer);
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_open_single_sinks() {
        let dir = TempDir::new().unwrap();
        let table = BarcodeTable::from_sequences(["ACGT", "TTTT"]).unwrap();
        let run = RunInfo::from_header(&input_header());
        let target = OutputTarget::Single(dir.path().join("out.sam"));

        let mut sinks = open_sinks(&target, &table, &input_header(), &run, "test").unwrap();
        assert_eq!(sinks.len(), 3);
        sinks
            .write(&Destination::Passed("ACGT".into()), &ReadUnit::single(record("q1")))
            .unwrap();
        sinks.close_all().unwrap();

        assert!(dir.path().join("out.sam").exists());
        assert!(dir.path().join("out_FC1_1_non_pf.sam").exists());
        assert!(dir.path().join("out_Controls_FC1_1.sam").exists());

        let (header, records) = AlignmentInput::open(&dir.path().join("out.sam"))
            .unwrap()
            .into_parts();
        // undetermined plus both barcodes
        assert_eq!(header.read_groups().len(), 3);
        assert_eq!(records.count(), 1);
    }

    #[test]
    fn test_open_split_sinks() {
        let dir = TempDir::new().unwrap();
        let table = BarcodeTable::from_sequences(["ACGT"]).unwrap();
        let run = RunInfo::from_header(&input_header());
        let target = OutputTarget::Split {
            dir: dir.path().to_path_buf(),
            format: AlignmentFormat::Bam,
        };

        let mut sinks = open_sinks(&target, &table, &input_header(), &run, "test").unwrap();
        // control plus a pair for undetermined and ACGT
        assert_eq!(sinks.len(), 5);
        sinks.close_all().unwrap();

        let barcode_file = dir.path().join("unknown/unknown/1_FC1_1_ACGT_pf.bam");
        let (header, _) = AlignmentInput::open(&barcode_file).unwrap().into_parts();
        let ids: Vec<String> = header.read_groups().keys().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["FC1.1.ACGT"]);

        assert!(dir.path().join("Undetermined/unknown/Undetermined_FC1_1_pf.bam").exists());
        assert!(dir.path().join("Undetermined/unknown/Undetermined_FC1_1_non_pf.bam").exists());
        assert!(dir.path().join("Undetermined/unknown/Controls_FC1_1.bam").exists());
    }

    #[test]
    fn test_single_output_needs_known_extension() {
        let dir = TempDir::new().unwrap();
        let table = BarcodeTable::from_sequences(["ACGT"]).unwrap();
        let target = OutputTarget::Single(dir.path().join("out.cram"));
        assert!(open_sinks(&target, &table, &input_header(), &RunInfo::default(), "test").is_err());
    }
}
