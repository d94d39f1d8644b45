// Reads response records exported as JSON.

use crate::tally::*;

/// The file holds a list of records, or an object with a `records` list.
pub fn read_json_records(path: &str) -> AppResult<Vec<ResponseRecord>> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    let list = match js {
        JSValue::Object(mut m) => match m.remove("records") {
            Some(l) => l,
            None => whatever!("{}: expected a list of records", path),
        },
        l => l,
    };
    let records: Vec<ResponseRecord> =
        serde_json::from_value(list).context(ParsingJsonSnafu { path })?;
    debug!("read_json_records: {} records from {}", records.len(), path);
    Ok(records)
}
