//! CSV exports of the raw records and of the aggregated results.

use std::io::{Read, Write};

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::aggregate::{AnswerValue, Aggregation, GroupStats, RecordId, ResponseRecord};
use crate::config::*;
use crate::definition::SurveyId;

pub const RAW_COLUMNS: [&str; 5] = ["ID", "Email", "Question", "Answer", "Submitted At"];

pub const SUMMARY_COLUMNS: [&str; 5] = ["Question", "Kind", "Answer", "Count", "Percentage"];

/// The conventional name of the raw export of a survey.
pub fn results_file_name(survey_id: SurveyId) -> String {
    format!("results_survey_{}.csv", survey_id)
}

/// One line of the raw export. Every field is the text written in the file.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer")]
    pub answer: String,
    #[serde(rename = "Submitted At")]
    pub submitted_at: String,
}

impl From<&ResponseRecord> for RawRow {
    fn from(r: &ResponseRecord) -> Self {
        RawRow {
            id: r.id.to_string(),
            email: r.email.clone().unwrap_or_default(),
            question: r.question.clone(),
            answer: r.answer.as_ref().map(|a| a.joined()).unwrap_or_default(),
            submitted_at: r.submitted_at.clone().unwrap_or_default(),
        }
    }
}

impl RawRow {
    /// Reads the row back as a record. Multiple choices cannot be told apart
    /// from text any more, so the answer is always text.
    pub fn into_record(self) -> ResponseRecord {
        let id = match self.id.parse::<u64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(self.id),
        };
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        ResponseRecord {
            id,
            email: non_empty(self.email),
            question: self.question,
            answer: Some(AnswerValue::Text(self.answer)),
            submitted_at: non_empty(self.submitted_at),
            question_id: None,
            question_type: None,
        }
    }
}

fn flush_error(e: &std::io::Error) -> std::io::Error {
    std::io::Error::new(e.kind(), e.to_string())
}

fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.quote_style(csv::QuoteStyle::Always);
    builder
}

/// Writes the raw export one record at a time.
pub struct RawCsvWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> RawCsvWriter<W> {
    /// Wraps `inner` and writes the header line.
    pub fn new(inner: W) -> SurveyResult<RawCsvWriter<W>> {
        let mut writer = writer_builder().from_writer(inner);
        writer.write_record(RAW_COLUMNS).context(CsvSnafu)?;
        Ok(RawCsvWriter { writer, rows: 0 })
    }

    pub fn write_record(&mut self, record: &ResponseRecord) -> SurveyResult<()> {
        let row = RawRow::from(record);
        self.writer
            .write_record([
                &row.id,
                &row.email,
                &row.question,
                &row.answer,
                &row.submitted_at,
            ])
            .context(CsvSnafu)?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes the remaining output and gives back the inner writer.
    pub fn finish(self) -> SurveyResult<W> {
        debug!("RawCsvWriter: {} rows written", self.rows);
        self.writer
            .into_inner()
            .map_err(|e| flush_error(e.error()))
            .context(IoSnafu)
    }
}

/// Serializes a table: a header line with `columns`, then one line per row.
pub fn serialize_csv<R, F>(rows: R, columns: &[&str]) -> SurveyResult<String>
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = F>,
    F: AsRef<str>,
{
    let mut writer = writer_builder().from_writer(Vec::new());
    writer.write_record(columns).context(CsvSnafu)?;
    for row in rows {
        writer
            .write_record(row.into_iter().map(|f| f.as_ref().to_string()))
            .context(CsvSnafu)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| flush_error(e.error()))
        .context(IoSnafu)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Writes the raw export of `records` into `out`.
pub fn write_raw_csv<'a, W, I>(records: I, out: W) -> SurveyResult<W>
where
    W: Write,
    I: IntoIterator<Item = &'a ResponseRecord>,
{
    let mut writer = RawCsvWriter::new(out)?;
    for r in records {
        writer.write_record(r)?;
    }
    writer.finish()
}

/// The raw export as a string, in input order.
pub fn export_raw_csv(records: &[ResponseRecord]) -> SurveyResult<String> {
    let rows = records.iter().map(|r| {
        let row = RawRow::from(r);
        vec![row.id, row.email, row.question, row.answer, row.submitted_at]
    });
    serialize_csv(rows, &RAW_COLUMNS)
}

fn format_percentage(share: f64) -> String {
    format!("{:.1}", share * 100.0)
}

/// One line per entry of every group. Text entries have no percentage.
pub fn export_summary_csv(aggregation: &Aggregation) -> SurveyResult<String> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for g in &aggregation.groups {
        let kind = match g.stats {
            GroupStats::Text(_) => "text",
            GroupStats::Choice(_) => "choice",
        };
        match &g.stats {
            GroupStats::Text(t) => {
                for e in t.entries() {
                    rows.push(vec![
                        g.label.clone(),
                        kind.to_string(),
                        e.answer.clone(),
                        e.count.to_string(),
                        String::new(),
                    ]);
                }
            }
            GroupStats::Choice(c) => {
                for e in c.entries() {
                    rows.push(vec![
                        g.label.clone(),
                        kind.to_string(),
                        e.choice.clone(),
                        e.count.to_string(),
                        format_percentage(c.share(e)),
                    ]);
                }
            }
        }
    }
    serialize_csv(rows, &SUMMARY_COLUMNS)
}

/// Parses a raw export back into rows.
pub fn read_raw_csv<R: Read>(reader: R) -> SurveyResult<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
    let mut rows: Vec<RawRow> = Vec::new();
    for result in rdr.deserialize() {
        let row: RawRow = result.context(CsvSnafu)?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;

    fn records() -> Vec<ResponseRecord> {
        vec![
            ResponseRecord {
                id: RecordId::Number(1),
                email: Some("a@x.org".to_string()),
                question: "Colors, \"favorite\"".to_string(),
                answer: Some(AnswerValue::Choices(vec![
                    "Red".to_string(),
                    "Blue".to_string(),
                ])),
                submitted_at: Some("2024-03-01T10:00:00Z".to_string()),
                question_id: None,
                question_type: None,
            },
            ResponseRecord {
                id: RecordId::Text("r-2".to_string()),
                email: None,
                question: "Comment".to_string(),
                answer: Some(AnswerValue::Text("line one\nline two".to_string())),
                submitted_at: None,
                question_id: None,
                question_type: None,
            },
        ]
    }

    #[test]
    fn raw_header_and_quoting() {
        let csv = export_raw_csv(&records()).unwrap();
        let first_line = csv.lines().next().unwrap();
        assert_eq!(
            first_line,
            "\"ID\",\"Email\",\"Question\",\"Answer\",\"Submitted At\""
        );
        assert!(csv.contains("\"Colors, \"\"favorite\"\"\",\"Red, Blue\""));
    }

    #[test]
    fn raw_export_reads_back() {
        let recs = records();
        let csv = export_raw_csv(&recs).unwrap();
        let rows = read_raw_csv(csv.as_bytes()).unwrap();
        let expected: Vec<RawRow> = recs.iter().map(RawRow::from).collect();
        assert_eq!(rows, expected);
        assert_eq!(rows[0].answer, "Red, Blue");
        assert_eq!(rows[1].email, "");
        assert_eq!(rows[1].answer, "line one\nline two");

        let back = rows[1].clone().into_record();
        assert_eq!(back.id, RecordId::Text("r-2".to_string()));
        assert_eq!(back.email, None);
    }

    #[test]
    fn streaming_writer_matches_string_export() {
        let recs = records();
        let bytes = write_raw_csv(&recs, Vec::new()).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), export_raw_csv(&recs).unwrap());
    }

    #[test]
    fn reimported_multiple_choices_keep_their_counts() {
        use crate::aggregate::aggregate_for_survey;
        use crate::builder::SurveyBuilder;
        use crate::definition::{QuestionDraft, QuestionType};

        let survey = SurveyBuilder::new("T")
            .add_question(QuestionDraft::new("Fruit", QuestionType::MultiChoice))
            .add_choice(0, "Apple")
            .unwrap()
            .add_choice(0, "Pear")
            .unwrap()
            .build()
            .unwrap();
        let mut rec = records().remove(0);
        rec.question = "Fruit".to_string();
        rec.answer = Some(AnswerValue::Choices(vec![
            "Apple".to_string(),
            "Pear".to_string(),
        ]));
        let direct = aggregate_for_survey(&survey, &[rec.clone()], &AggregationRules::DEFAULT_RULES);

        let csv = export_raw_csv(&[rec]).unwrap();
        let back: Vec<ResponseRecord> = read_raw_csv(csv.as_bytes())
            .unwrap()
            .into_iter()
            .map(RawRow::into_record)
            .collect();
        let again = aggregate_for_survey(&survey, &back, &AggregationRules::DEFAULT_RULES);
        assert_eq!(again.groups[0].stats, direct.groups[0].stats);
        assert_eq!(again.groups[0].choice_tally().unwrap().count("Pear"), Some(1));
    }

    #[test]
    fn header_only_for_no_records() {
        let csv = export_raw_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn summary_export() {
        let agg = aggregate(&records(), &AggregationRules::DEFAULT_RULES);
        let csv = export_summary_csv(&agg).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "\"Question\",\"Kind\",\"Answer\",\"Count\",\"Percentage\""
        );
        assert_eq!(
            lines[1],
            "\"Colors, \"\"favorite\"\"\",\"choice\",\"Red\",\"1\",\"50.0\""
        );
    }

    #[test]
    fn file_name() {
        assert_eq!(results_file_name(SurveyId(12)), "results_survey_12.csv");
    }
}
