//! Tests of the barcodes subcommand and of barcode file handling.

use std::fs::{self, File};
use std::io::Write;

use assert_cmd::Command;
use flate2::write::GzEncoder;
use flate2::Compression;
use predicates::prelude::*;
use tempfile::TempDir;

const BARCODES: &str = "#Barcode_Sequence\tBarcode_Name\tLibrary_Name\tSample_Name\tDescription\tproject\txy:notes\n\
ACGTAC\tbc1\tlibA\tsampleA\tfirst\tProjA\tnote one\n\
\n\
# skipped comment\n\
ttggca\tbc2\tlibB\tsampleB\tsecond\tProjB\tnote two\n";

fn decoder() -> Command {
    Command::cargo_bin("bam-index-decoder").unwrap()
}

#[test]
fn test_barcodes_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("barcodes.tsv");
    fs::write(&path, BARCODES).unwrap();

    decoder()
        .args(["barcodes", "--barcode-file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 barcodes of length 6"))
        .stdout(predicate::str::contains("bc1"))
        .stdout(predicate::str::contains("TTGGCA"))
        .stdout(predicate::str::contains("ProjB"));
}

#[test]
fn test_barcodes_tsv_from_gzip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("barcodes.tsv.gz");
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(BARCODES.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let assert = decoder()
        .args(["-f", "tsv", "barcodes", "--barcode-file"])
        .arg(&path)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "ACGTAC\tbc1\tlibA\tsampleA\tfirst\tProjA");
    assert_eq!(lines[2], "TTGGCA\tbc2\tlibB\tsampleB\tsecond\tProjB");
}

#[test]
fn test_barcodes_json() {
    let assert = decoder()
        .args(["--format", "json", "barcodes", "--barcode", "ACGT", "TTTT"])
        .assert()
        .success();

    let entries: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["sequence"], "ACGT");
    assert_eq!(entries[1]["name"], "2");
}

#[test]
fn test_barcodes_rejects_invalid_tables() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing_column.tsv");
    fs::write(&missing, "barcode_name\nbc1\n").unwrap();
    decoder()
        .args(["barcodes", "--barcode-file"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("barcode_sequence"));

    let bad_insert = dir.path().join("insert.tsv");
    fs::write(&bad_insert, "barcode_sequence\tinsert_size\nACGT\tlarge\n").unwrap();
    decoder()
        .args(["barcodes", "--barcode-file"])
        .arg(&bad_insert)
        .assert()
        .failure()
        .stderr(predicate::str::contains("insert_size"));

    decoder()
        .args(["barcodes", "--barcode-file"])
        .arg(dir.path().join("absent.tsv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load barcodes"));
}

#[test]
fn test_barcodes_requires_a_source() {
    decoder().arg("barcodes").assert().failure();
    decoder()
        .args(["barcodes", "--barcode", "ACGT", "--barcode-file", "b.tsv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
