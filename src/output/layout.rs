//! Output file naming.
//!
//! | Stream | Split layout (`--output-dir`) | Single layout (`--output out.bam`) |
//! |--------|-------------------------------|------------------------------------|
//! | passed | `<project>/<run>/<library>_<fcid>_<lane>_<barcode>_pf.<ext>` | `out.bam` |
//! | filtered | `<project>/<run>/<library>_<fcid>_<lane>_<barcode>_non_pf.<ext>` | `out_<fcid>_<lane>_non_pf.bam` |
//! | undetermined | `Undetermined/<run>/Undetermined_<fcid>_<lane>_pf.<ext>` (and `_non_pf`) | shared |
//! | control | `Undetermined/<run>/Controls_<fcid>_<lane>.<ext>` | `out_Controls_<fcid>_<lane>.bam` |

use std::path::{Path, PathBuf};

use crate::core::barcode::NamedBarcode;
use crate::parsing::sam::{AlignmentFormat, RunInfo, UNKNOWN};
use crate::utils::validation::{validate_path_component, ValidationError};

/// Directory holding the undetermined and control outputs
pub const UNDETERMINED_PROJECT: &str = "Undetermined";

/// The passed and filtered paths of one stream pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPaths {
    pub passed: PathBuf,
    pub filtered: PathBuf,
}

/// Paths of the single layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePaths {
    pub streams: StreamPaths,
    pub control: PathBuf,
}

/// Paths of the single layout, derived from the passed output path
#[must_use]
pub fn single_paths(output: &Path, run: &RunInfo) -> SinglePaths {
    let with_suffix = |suffix: &str| {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match output.extension() {
            Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{suffix}"),
        };
        output.with_file_name(name)
    };

    SinglePaths {
        streams: StreamPaths {
            passed: output.to_path_buf(),
            filtered: with_suffix(&format!("{}_{}_non_pf", run.flow_cell_id, run.lane)),
        },
        control: with_suffix(&format!("Controls_{}_{}", run.flow_cell_id, run.lane)),
    }
}

/// Passed and filtered paths of one entry in the split layout.
///
/// Values missing from the entry fall back to the run information (flow cell,
/// lane), the barcode name (library) or `unknown` (project).
///
/// # Errors
///
/// Returns a `ValidationError` if a value used as a path component is empty,
/// too long, or contains a path separator or traversal.
pub fn barcode_paths(
    dir: &Path,
    entry: &NamedBarcode,
    run: &RunInfo,
    format: AlignmentFormat,
) -> Result<StreamPaths, ValidationError> {
    let ext = format.extension();
    let run_folder = validate_path_component(&run.run_folder)?;

    if entry.is_undetermined() {
        let base = dir.join(UNDETERMINED_PROJECT).join(run_folder);
        let prefix = format!(
            "Undetermined_{}_{}",
            validate_path_component(&run.flow_cell_id)?,
            validate_path_component(&run.lane)?
        );
        return Ok(StreamPaths {
            passed: base.join(format!("{prefix}_pf.{ext}")),
            filtered: base.join(format!("{prefix}_non_pf.{ext}")),
        });
    }

    let project = entry.project.as_deref().unwrap_or(UNKNOWN);
    let library = entry.library_name.as_deref().unwrap_or(&entry.name);
    let fcid = entry.flow_cell_id.as_deref().unwrap_or(&run.flow_cell_id);
    let lane = entry.lane.as_deref().unwrap_or(&run.lane);
    for value in [project, library, fcid, lane] {
        validate_path_component(value)?;
    }

    let base = dir.join(project).join(run_folder);
    let prefix = format!("{library}_{fcid}_{lane}_{}", entry.sequence);
    Ok(StreamPaths {
        passed: base.join(format!("{prefix}_pf.{ext}")),
        filtered: base.join(format!("{prefix}_non_pf.{ext}")),
    })
}

/// Control stream path of the split layout
///
/// # Errors
///
/// Returns a `ValidationError` if the run information cannot be used in a path.
pub fn control_path(
    dir: &Path,
    run: &RunInfo,
    format: AlignmentFormat,
) -> Result<PathBuf, ValidationError> {
    Ok(dir
        .join(UNDETERMINED_PROJECT)
        .join(validate_path_component(&run.run_folder)?)
        .join(format!(
            "Controls_{}_{}.{}",
            validate_path_component(&run.flow_cell_id)?,
            validate_path_component(&run.lane)?,
            format.extension()
        )))
}
