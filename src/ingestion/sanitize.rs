//! Record sanitizer: strips the header and drops rows with the wrong field count.
//!
//! Rows are split on the format's delimiter with no quote handling, so empty fields count
//! (including a trailing one: `"a\tb\t"` has three fields). Kept rows are written back
//! byte-for-byte, one per line. Field *content* is never inspected, which means a free-text
//! field containing the delimiter is mis-split and its row is kept or dropped purely on the
//! resulting count.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};
use crate::types::TableSpec;

/// Default suffix appended to the table name to form the cleaned artifact's file name.
pub const DEFAULT_CLEANED_SUFFIX: &str = ".tsv.cleaned";

/// How many dropped line numbers [`SanitizeStats`] keeps.
pub const DROPPED_LINE_SAMPLE: usize = 10;

/// Counters produced by one sanitizer pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeStats {
    /// Physical lines read after the header, blank lines included.
    pub rows_read: u64,
    pub rows_kept: u64,
    pub rows_dropped: u64,
    /// 1-based physical line numbers of the first dropped rows (the header is line 1).
    pub dropped_lines: Vec<u64>,
}

/// Cleaned, header-stripped derivative of a snapshot file.
///
/// The file is removed when this guard is dropped unless [`CleanedArtifact::retain`] was called.
#[derive(Debug)]
pub struct CleanedArtifact {
    path: PathBuf,
    stats: SanitizeStats,
    retain: bool,
}

impl CleanedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &SanitizeStats {
        &self.stats
    }

    /// Keep the file on disk after the guard is dropped.
    pub fn retain(&mut self) {
        self.retain = true;
    }
}

impl Drop for CleanedArtifact {
    fn drop(&mut self) {
        if !self.retain {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Path of the cleaned artifact for `table`: `<source dir>/<table><suffix>`.
pub fn cleaned_path(source: &Path, table: &str, suffix: &str) -> PathBuf {
    source
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{table}{suffix}"))
}

/// Sanitize `source` for `spec`, overwriting any previous artifact for the table.
///
/// Streams the file; memory use does not depend on its size.
pub fn clean(source: &Path, spec: &TableSpec, suffix: &str) -> PipelineResult<CleanedArtifact> {
    let input = File::open(source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PipelineError::MissingInput {
            table: spec.name.to_string(),
            path: source.to_path_buf(),
        },
        _ => PipelineError::Io(e),
    })?;

    let path = cleaned_path(source, spec.name, suffix);
    let output = File::create(&path)?;
    let mut artifact = CleanedArtifact {
        path,
        stats: SanitizeStats::default(),
        retain: false,
    };
    artifact.stats = sanitize_records(
        input,
        BufWriter::new(output),
        spec.format.delimiter(),
        spec.expected_column_count,
    )?;
    Ok(artifact)
}

/// Copy every line after the first from `reader` to `writer`, keeping only lines that split
/// into exactly `expected_fields` fields on `delimiter`.
///
/// The first line is discarded unconditionally. Lines may end in `\n`, `\r\n` or `\r`; output
/// lines end in `\n`. A blank line is a row with one empty field, so it is dropped unless the
/// table has a single column.
pub fn sanitize_records<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    delimiter: u8,
    expected_fields: usize,
) -> PipelineResult<SanitizeStats> {
    let mut stats = SanitizeStats::default();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    if !read_physical_line(&mut reader, &mut line)? {
        return Ok(stats);
    }

    // The header is line 1.
    let mut line_no = 1u64;
    while read_physical_line(&mut reader, &mut line)? {
        line_no += 1;
        stats.rows_read += 1;
        let fields = line.iter().filter(|&&b| b == delimiter).count() + 1;
        if fields == expected_fields {
            writer.write_all(&line)?;
            writer.write_all(b"\n")?;
            stats.rows_kept += 1;
        } else {
            stats.rows_dropped += 1;
            if stats.dropped_lines.len() < DROPPED_LINE_SAMPLE {
                stats.dropped_lines.push(line_no);
            }
        }
    }
    writer.flush()?;
    Ok(stats)
}

/// Read one physical line into `line`, without its terminator.
///
/// `\n`, `\r\n` and a lone `\r` all end a line. Returns `false` at end of input when no
/// bytes were read; a final line without a terminator is still returned.
fn read_physical_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<bool> {
    line.clear();
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            return Ok(!line.is_empty());
        }
        match buf.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(i) => {
                let carriage_return = buf[i] == b'\r';
                line.extend_from_slice(&buf[..i]);
                reader.consume(i + 1);
                if carriage_return && reader.fill_buf()?.first() == Some(&b'\n') {
                    reader.consume(1);
                }
                return Ok(true);
            }
            None => {
                let n = buf.len();
                line.extend_from_slice(buf);
                reader.consume(n);
            }
        }
    }
}
