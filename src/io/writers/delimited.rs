use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::types::ExtractionResult;

/// Append the rows of `result` to a delimited text file.
///
/// A new file gets a header built from the column labels; an existing file keeps
/// its header, so results with a different column set will not line up with it.
/// Values are written with their `Display` form, without quoting or escaping.
/// Empty results write nothing and never create the file.
pub fn append_result(output: &Path, separator: &str, result: &ExtractionResult) -> Result<usize> {
    if result.is_empty() {
        return Ok(0);
    }

    let exists = output.is_file();
    if exists {
        check_header(output, separator, result);
    }

    let file = OpenOptions::new().create(true).append(true).open(output)?;
    let mut writer = BufWriter::new(file);

    if !exists {
        let header: Vec<&str> = result.labels().collect();
        writeln!(writer, "{}", header.join(separator))?;
        debug!("Created {:?} with {} columns", output, header.len());
    }

    let columns = result.columns();
    let mut line = String::new();
    for row in 0..result.row_count() {
        line.clear();
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                line.push_str(separator);
            }
            line.push_str(&column.values[row].to_string());
        }
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    Ok(result.row_count())
}

// Warn when the existing header has a different column count
fn check_header(output: &Path, separator: &str, result: &ExtractionResult) {
    let Ok(file) = File::open(output) else {
        return;
    };
    let mut first = String::new();
    if BufReader::new(file).read_line(&mut first).is_err() {
        return;
    }
    let existing = first.trim_end_matches(['\n', '\r']).split(separator).count();
    let incoming = result.columns().len();
    if existing != incoming {
        warn!(
            "{:?} has {} header columns but the new rows have {}; rows will not align",
            output, existing, incoming
        );
    }
}
