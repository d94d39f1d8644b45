// Primitives for reading CSV files.

use survey_engine::export::RawRow;

use crate::tally::{io_common::make_default_id, *};

/// Reads a raw export (`ID, Email, Question, Answer, Submitted At`).
///
/// Rows without an identifier get one made of the file name and the line number.
pub fn read_csv_records(path: &str) -> AppResult<Vec<ResponseRecord>> {
    let default_id = make_default_id(path);
    let mut rdr = csv::ReaderBuilder::new()
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let mut res: Vec<ResponseRecord> = Vec::new();
    for (idx, line_r) in rdr.deserialize::<RawRow>().enumerate() {
        // Line 1 is the header.
        let lineno = idx + 2;
        let mut row = line_r.context(CsvLineParseSnafu { path, lineno })?;
        if row.id.trim().is_empty() {
            row.id = default_id(lineno);
        }
        debug!("read_csv_records: lineno: {:?} row: {:?}", lineno, row);
        res.push(row.into_record());
    }
    Ok(res)
}
