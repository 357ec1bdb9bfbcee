//! Output headers: per-barcode read groups and the @PG record.

use anyhow::Result;
use bstr::BString;
use noodles::sam::header::record::value::map::program::tag as pg_tag;
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use noodles::sam::header::record::value::map::tag::Tag as MapTag;
use noodles::sam::header::record::value::map::{Program, ReadGroup};
use noodles::sam::header::record::value::Map;
use noodles::sam::Header;
use tracing::warn;

use crate::core::barcode::NamedBarcode;
use crate::parsing::sam::RUN_FOLDER_TAG;

/// Program name written to the @PG record
pub const PROGRAM_NAME: &str = "bam-index-decoder";

/// Read-group tags defined by the SAM format; end-user tags may not replace them
const RESERVED_READ_GROUP_TAGS: [&[u8; 2]; 14] = [
    b"ID", b"BC", b"CN", b"DS", b"DT", b"FO", b"KS", b"LB", b"PG", b"PI", b"PL", b"PM", b"PU",
    b"SM",
];

/// Copies of every input read group for one barcode entry.
///
/// Each ID gains the `.<key>` suffix. `LB`, `SM`, `DS`, `PI`, `CN` and any
/// extra tags of the entry replace the input values when set; the run folder
/// attribute is dropped.
#[must_use]
pub fn barcode_read_groups(input: &Header, entry: &NamedBarcode) -> Vec<(BString, Map<ReadGroup>)> {
    input
        .read_groups()
        .iter()
        .map(|(id, read_group)| {
            let mut read_group = read_group.clone();
            let fields = read_group.other_fields_mut();
            fields.shift_remove(&RUN_FOLDER_TAG);

            let standard = [
                (rg_tag::LIBRARY, entry.library_name.clone()),
                (rg_tag::SAMPLE, entry.sample_name.clone()),
                (rg_tag::DESCRIPTION, entry.description.clone()),
                (
                    rg_tag::PREDICTED_MEDIAN_INSERT_SIZE,
                    entry.insert_size.map(|size| size.to_string()),
                ),
                (rg_tag::SEQUENCING_CENTER, entry.sequencing_center.clone()),
            ];
            for (tag, value) in standard {
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    fields.insert(tag, BString::from(value));
                }
            }

            for (name, value) in &entry.end_user_tags {
                let bytes: [u8; 2] = match name.as_bytes().try_into() {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        warn!("Skipping read-group tag '{name}': tags are two characters");
                        continue;
                    }
                };
                if RESERVED_READ_GROUP_TAGS.contains(&&bytes) {
                    warn!("Skipping read-group tag '{name}': standard tags cannot be set this way");
                    continue;
                }
                if let MapTag::Other(tag) = MapTag::<rg_tag::Standard>::from(bytes) {
                    fields.insert(tag, BString::from(value.as_str()));
                }
            }

            (BString::from(format!("{id}.{}", entry.key())), read_group)
        })
        .collect()
}

/// Build an output header carrying the read groups of the given entries and a
/// new @PG record.
///
/// # Errors
///
/// Returns an error if the @PG record cannot be built or added.
pub fn output_header<'a, I>(input: &Header, entries: I, command_line: &str) -> Result<Header>
where
    I: IntoIterator<Item = &'a NamedBarcode>,
{
    let mut header = input.clone();

    let read_groups: Vec<_> = entries
        .into_iter()
        .flat_map(|entry| barcode_read_groups(input, entry))
        .collect();
    let header_read_groups = header.read_groups_mut();
    header_read_groups.clear();
    for (id, read_group) in read_groups {
        header_read_groups.insert(id, read_group);
    }

    add_program(&mut header, command_line)?;
    Ok(header)
}

/// A program ID not yet used in the header: the program name, or the name
/// with `.1`, `.2`, ... appended
#[must_use]
pub fn unique_program_id(header: &Header) -> String {
    let programs = header.programs();
    let program_map = programs.as_ref();

    if !program_map.contains_key(PROGRAM_NAME.as_bytes()) {
        return PROGRAM_NAME.to_string();
    }
    (1..)
        .map(|i| format!("{PROGRAM_NAME}.{i}"))
        .find(|id| !program_map.contains_key(id.as_bytes()))
        .unwrap_or_else(|| PROGRAM_NAME.to_string())
}

/// Append a @PG record for this run
///
/// # Errors
///
/// Returns an error if the record cannot be built or added to the header.
pub fn add_program(header: &mut Header, command_line: &str) -> Result<()> {
    let program = Map::<Program>::builder()
        .insert(pg_tag::NAME, PROGRAM_NAME)
        .insert(pg_tag::VERSION, env!("CARGO_PKG_VERSION"))
        .insert(pg_tag::COMMAND_LINE, command_line)
        .build()?;

    let id = unique_program_id(header);
    header.programs_mut().add(BString::from(id), program)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "@HD\tVN:1.6\n\
@RG\tID:FC1.1\tSM:old\tLB:oldlib\tPL:ILLUMINA\trf:run_001\n\
@RG\tID:FC1.2\tPL:ILLUMINA\n";

    fn input() -> Header {
        INPUT.parse().unwrap()
    }

    fn field(rg: &Map<ReadGroup>, tag: &[u8; 2]) -> Option<String> {
        rg.other_fields().get(tag).map(ToString::to_string)
    }

    #[test]
    fn test_barcode_read_groups() {
        let mut entry = NamedBarcode::new("ACGT").with_library("lib1").with_sample("s1");
        entry.insert_size = Some(350);
        entry.sequencing_center = Some("Center".to_string());
        entry.end_user_tags = vec![
            ("xy".to_string(), "extra".to_string()),
            ("SM".to_string(), "ignored".to_string()),
            ("toolong".to_string(), "ignored".to_string()),
        ];

        let groups = barcode_read_groups(&input(), &entry);
        assert_eq!(groups.len(), 2);

        let (id, rg) = &groups[0];
        assert_eq!(id, "FC1.1.ACGT");
        assert_eq!(field(rg, b"LB").as_deref(), Some("lib1"));
        assert_eq!(field(rg, b"SM").as_deref(), Some("s1"));
        assert_eq!(field(rg, b"PI").as_deref(), Some("350"));
        assert_eq!(field(rg, b"CN").as_deref(), Some("Center"));
        assert_eq!(field(rg, b"PL").as_deref(), Some("ILLUMINA"));
        assert_eq!(field(rg, b"xy").as_deref(), Some("extra"));
        assert_eq!(field(rg, b"DS"), None);
        assert_eq!(field(rg, b"rf"), None);

        assert_eq!(groups[1].0, "FC1.2.ACGT");
    }

    #[test]
    fn test_undetermined_read_groups_keep_input_values() {
        let groups = barcode_read_groups(&input(), &NamedBarcode::undetermined());
        let (id, rg) = &groups[0];
        assert_eq!(id, "FC1.1.undetermined");
        assert_eq!(field(rg, b"SM").as_deref(), Some("old"));
        assert_eq!(field(rg, b"LB").as_deref(), Some("oldlib"));
    }

    #[test]
    fn test_output_header() {
        let undetermined = NamedBarcode::undetermined();
        let entry = NamedBarcode::new("ACGT");
        let header =
            output_header(&input(), [&undetermined, &entry], "bam-index-decoder decode").unwrap();

        let ids: Vec<String> = header.read_groups().keys().map(ToString::to_string).collect();
        assert_eq!(
            ids,
            vec![
                "FC1.1.undetermined",
                "FC1.2.undetermined",
                "FC1.1.ACGT",
                "FC1.2.ACGT"
            ]
        );
        assert!(header.programs().as_ref().contains_key(PROGRAM_NAME.as_bytes()));
    }

    #[test]
    fn test_unique_program_id() {
        let mut header = input();
        assert_eq!(unique_program_id(&header), PROGRAM_NAME);
        add_program(&mut header, "first").unwrap();
        assert_eq!(unique_program_id(&header), format!("{PROGRAM_NAME}.1"));
        add_program(&mut header, "second").unwrap();
        assert_eq!(header.programs().as_ref().len(), 2);
    }
}
