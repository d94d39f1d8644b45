//! Turns a flat stream of response records into per-question statistics.
//!
//! Aggregation never fails because of one bad record: missing or empty answers
//! are replaced by a placeholder label (see [`AggregationRules::empty_label`]).

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::*;
use crate::definition::*;

// ********* Input data structures ***********

/// Identifier of a response record. Stores hand out numbers or strings.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(u64),
    Text(String),
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// The answer carried by a response record.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Choices(Vec<String>),
    /// Anything else found in the data (numbers, booleans, objects).
    Other(serde_json::Value),
}

impl AnswerValue {
    pub fn is_sequence(&self) -> bool {
        matches!(self, AnswerValue::Choices(_))
    }

    /// The answer as one string, with multiple values joined by `", "`.
    pub fn joined(&self) -> String {
        match self {
            AnswerValue::Text(s) => s.clone(),
            AnswerValue::Choices(cs) => cs.join(", "),
            AnswerValue::Other(v) => v.to_string(),
        }
    }
}

/// One flattened answer, as read back from the store.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: RecordId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: Option<AnswerValue>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum GroupKey {
    Id(QuestionId),
    Text(String),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Text,
    Choice,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TextEntry {
    pub answer: String,
    pub count: u64,
}

/// The distinct answers of a text question, most frequent first.
///
/// Answers with the same count stay in the order they were first seen.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct TextTally {
    entries: Vec<TextEntry>,
}

/// One window of a [`TextTally`].
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TextPage<'a> {
    /// The index actually served, after clamping.
    pub index: usize,
    pub page_count: usize,
    pub entries: &'a [TextEntry],
}

impl TextTally {
    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn distinct_count(&self) -> usize {
        self.entries.len()
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        let size = page_size.max(1);
        (self.entries.len() + size - 1) / size
    }

    /// Returns the page at `index` (0-based). Indexes past the end give the last page.
    /// With no answers at all, the page count is 0 and page 0 is empty.
    pub fn page(&self, index: usize, page_size: usize) -> TextPage<'_> {
        let size = page_size.max(1);
        let page_count = self.page_count(size);
        let index = index.min(page_count.saturating_sub(1));
        let start = (index * size).min(self.entries.len());
        let end = (start + size).min(self.entries.len());
        TextPage {
            index,
            page_count,
            entries: &self.entries[start..end],
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChoiceEntry {
    pub choice: String,
    pub count: u64,
}

/// Counts per choice, suitable for a proportional (pie chart) display.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ChoiceTally {
    entries: Vec<ChoiceEntry>,
}

impl ChoiceTally {
    pub fn entries(&self) -> &[ChoiceEntry] {
        &self.entries
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn count(&self, choice: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.choice == choice)
            .map(|e| e.count)
    }

    /// Share of one entry in the group, between 0 and 1. Zero when nothing was counted.
    pub fn share(&self, entry: &ChoiceEntry) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            entry.count as f64 / total as f64
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum GroupStats {
    Text(TextTally),
    Choice(ChoiceTally),
}

/// The statistics for one question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionGroup {
    pub key: GroupKey,
    /// The question text, for display.
    pub label: String,
    /// The declared type, when known.
    pub question_type: Option<QuestionType>,
    /// Number of records in the group.
    pub responses: u64,
    pub stats: GroupStats,
}

impl QuestionGroup {
    pub fn kind(&self) -> GroupKind {
        match self.stats {
            GroupStats::Text(_) => GroupKind::Text,
            GroupStats::Choice(_) => GroupKind::Choice,
        }
    }

    pub fn text_tally(&self) -> Option<&TextTally> {
        match &self.stats {
            GroupStats::Text(t) => Some(t),
            GroupStats::Choice(_) => None,
        }
    }

    pub fn choice_tally(&self) -> Option<&ChoiceTally> {
        match &self.stats {
            GroupStats::Choice(c) => Some(c),
            GroupStats::Text(_) => None,
        }
    }
}

/// Figures computed once over all the records of a survey.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveySummary {
    /// Distinct emails. Records without an email are not counted.
    pub unique_respondents: usize,
    pub total_records: usize,
    pub first_response_at: Option<DateTime<Utc>>,
    pub last_response_at: Option<DateTime<Utc>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Aggregation {
    /// `None` when there is no record at all.
    pub summary: Option<SurveySummary>,
    pub groups: Vec<QuestionGroup>,
}

impl Aggregation {
    /// True when there are no responses yet. This is a valid state, not a failure.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
    }

    pub fn group(&self, label: &str) -> Option<&QuestionGroup> {
        self.groups.iter().find(|g| g.label == label)
    }
}

// ******** Aggregation *********

struct GroupAcc<'a> {
    key: GroupKey,
    label: String,
    declared: Option<QuestionType>,
    any_sequence: bool,
    answers: Vec<Option<&'a AnswerValue>>,
}

fn group_key(record: &ResponseRecord, grouping: GroupingKey) -> GroupKey {
    match (grouping, record.question_id) {
        (GroupingKey::QuestionId, Some(id)) => GroupKey::Id(id),
        _ => GroupKey::Text(record.question.clone()),
    }
}

fn canonical<'a>(s: &'a str, rules: &'a AggregationRules) -> &'a str {
    if s.trim().is_empty() {
        rules.empty_label.as_ref()
    } else {
        s
    }
}

fn text_tally(answers: &[Option<&AnswerValue>], rules: &AggregationRules) -> TextTally {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<TextEntry> = Vec::new();
    for a in answers {
        let s: String = match a {
            None => rules.empty_label.to_string(),
            Some(v) => canonical(&v.joined(), rules).to_string(),
        };
        if let Some(&idx) = index.get(&s) {
            entries[idx].count += 1;
        } else {
            index.insert(s.clone(), entries.len());
            entries.push(TextEntry { answer: s, count: 1 });
        }
    }
    // Stable sort: ties keep their first-seen order.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    TextTally { entries }
}

fn flatten_choices(answer: Option<&AnswerValue>, rules: &AggregationRules) -> Vec<String> {
    match answer {
        None => vec![rules.empty_label.to_string()],
        Some(AnswerValue::Choices(cs)) if cs.is_empty() => vec![rules.empty_label.to_string()],
        Some(AnswerValue::Choices(cs)) => cs
            .iter()
            .map(|c| canonical(c, rules).to_string())
            .collect(),
        Some(AnswerValue::Text(s)) => vec![canonical(s, rules).to_string()],
        Some(AnswerValue::Other(v)) => vec![v.to_string()],
    }
}

fn choice_tally(answers: &[Option<&AnswerValue>], rules: &AggregationRules) -> ChoiceTally {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<ChoiceEntry> = Vec::new();
    for a in answers {
        for c in flatten_choices(*a, rules) {
            if let Some(&idx) = index.get(&c) {
                entries[idx].count += 1;
            } else {
                index.insert(c.clone(), entries.len());
                entries.push(ChoiceEntry { choice: c, count: 1 });
            }
        }
    }
    ChoiceTally { entries }
}

fn summarize(records: &[ResponseRecord]) -> SurveySummary {
    let emails: HashSet<&str> = records
        .iter()
        .filter_map(|r| r.email.as_deref())
        .filter(|e| !e.trim().is_empty())
        .collect();

    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;
    for r in records {
        let ts = match r.submitted_at.as_deref() {
            Some(s) => s,
            None => continue,
        };
        match DateTime::parse_from_rfc3339(ts) {
            Ok(t) => {
                let t = t.with_timezone(&Utc);
                first = Some(first.map_or(t, |f| f.min(t)));
                last = Some(last.map_or(t, |l| l.max(t)));
            }
            Err(e) => {
                warn!(
                    "summarize: record {}: skipping timestamp {:?}: {}",
                    r.id, ts, e
                );
            }
        }
    }

    SurveySummary {
        unique_respondents: emails.len(),
        total_records: records.len(),
        first_response_at: first,
        last_response_at: last,
    }
}

/// Groups the records by question and computes the statistics of each group.
///
/// Groups come out in the order in which their question first appears. An empty
/// input gives no group and no summary.
pub fn aggregate(records: &[ResponseRecord], rules: &AggregationRules) -> Aggregation {
    if records.is_empty() {
        info!("aggregate: no response records");
        return Aggregation::default();
    }
    info!("aggregate: processing {} records", records.len());

    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut accs: Vec<GroupAcc> = Vec::new();
    for r in records {
        let key = group_key(r, rules.grouping);
        let idx = match index.get(&key) {
            Some(&idx) => idx,
            None => {
                index.insert(key.clone(), accs.len());
                accs.push(GroupAcc {
                    key,
                    label: r.question.clone(),
                    declared: None,
                    any_sequence: false,
                    answers: Vec::new(),
                });
                accs.len() - 1
            }
        };
        let acc = &mut accs[idx];
        if let Some(t) = r.question_type {
            match acc.declared {
                None => acc.declared = Some(t),
                Some(d) if d != t => warn!(
                    "aggregate: record {}: type {:?} conflicts with {:?} for {:?}",
                    r.id, t, d, acc.label
                ),
                _ => {}
            }
        }
        acc.any_sequence |= r.answer.as_ref().map_or(false, |a| a.is_sequence());
        acc.answers.push(r.answer.as_ref());
    }

    let groups: Vec<QuestionGroup> = accs
        .into_iter()
        .map(|acc| {
            let is_choice = match acc.declared {
                Some(t) => t.is_choice(),
                None => acc.any_sequence,
            };
            debug!(
                "aggregate: group {:?}: {} records, choice: {}",
                acc.label,
                acc.answers.len(),
                is_choice
            );
            let stats = if is_choice {
                GroupStats::Choice(choice_tally(&acc.answers, rules))
            } else {
                GroupStats::Text(text_tally(&acc.answers, rules))
            };
            QuestionGroup {
                key: acc.key,
                label: acc.label,
                question_type: acc.declared,
                responses: acc.answers.len() as u64,
                stats,
            }
        })
        .collect();

    Aggregation {
        summary: Some(summarize(records)),
        groups,
    }
}

/// Aggregates the records of a survey with the help of its definition.
///
/// Compared to [`aggregate`]:
/// - records without a question id are matched to a question by their text,
/// - the declared question types are used,
/// - groups follow the survey order, followed by unknown questions,
/// - every question gets a group, and choice groups list every declared choice
///   (with a count of 0 when nobody picked it) in the declared order.
pub fn aggregate_for_survey(
    survey: &Survey,
    records: &[ResponseRecord],
    rules: &AggregationRules,
) -> Aggregation {
    if records.is_empty() {
        info!("aggregate_for_survey: no response records");
        return Aggregation::default();
    }

    let enriched: Vec<ResponseRecord> = records
        .iter()
        .map(|r| {
            let q = match r.question_id {
                Some(id) => survey.question(id),
                None => survey.question_by_text(&r.question),
            };
            match q {
                Some(q) => ResponseRecord {
                    question_id: Some(q.id()),
                    question_type: Some(q.question_type()),
                    answer: r.answer.as_ref().map(|a| split_joined_choices(q, a)),
                    ..r.clone()
                },
                None => {
                    debug!(
                        "aggregate_for_survey: record {}: question {:?} is not in the survey",
                        r.id, r.question
                    );
                    r.clone()
                }
            }
        })
        .collect();

    let mut agg = aggregate(&enriched, rules);

    let mut by_question: HashMap<QuestionId, QuestionGroup> = HashMap::new();
    let mut unknown: Vec<QuestionGroup> = Vec::new();
    for g in agg.groups.drain(..) {
        match find_question(survey, &g.key) {
            Some(q) if !by_question.contains_key(&q.id()) => {
                by_question.insert(q.id(), g);
            }
            _ => unknown.push(g),
        }
    }

    let mut groups: Vec<QuestionGroup> = Vec::new();
    for q in survey.questions() {
        let g = by_question.remove(&q.id()).unwrap_or_else(|| QuestionGroup {
            key: GroupKey::Id(q.id()),
            label: q.text().to_string(),
            question_type: Some(q.question_type()),
            responses: 0,
            stats: if q.question_type().is_choice() {
                GroupStats::Choice(ChoiceTally::default())
            } else {
                GroupStats::Text(TextTally::default())
            },
        });
        groups.push(seed_declared_choices(q, g));
    }
    groups.extend(unknown);

    Aggregation {
        summary: agg.summary,
        groups,
    }
}

/// A multiple choice answer that went through a CSV export is a single text
/// like `"Apple, Pear"`. It is split back when every part is a declared choice.
fn split_joined_choices(question: &Question, answer: &AnswerValue) -> AnswerValue {
    let s = match answer {
        AnswerValue::Text(s) if question.question_type() == QuestionType::MultiChoice => s,
        _ => return answer.clone(),
    };
    if question.choices().iter().any(|c| c == s) {
        return answer.clone();
    }
    let parts: Vec<String> = s.split(", ").map(|p| p.to_string()).collect();
    if parts.len() > 1 && parts.iter().all(|p| question.choices().contains(p)) {
        debug!("split_joined_choices: {:?} -> {:?}", s, parts);
        AnswerValue::Choices(parts)
    } else {
        answer.clone()
    }
}

fn find_question<'a>(survey: &'a Survey, key: &GroupKey) -> Option<&'a Question> {
    match key {
        GroupKey::Id(id) => survey.question(*id),
        GroupKey::Text(t) => survey.question_by_text(t),
    }
}

fn seed_declared_choices(question: &Question, group: QuestionGroup) -> QuestionGroup {
    let tally = match &group.stats {
        GroupStats::Choice(t) => t,
        GroupStats::Text(_) => return group,
    };
    let mut entries: Vec<ChoiceEntry> = question
        .choices()
        .iter()
        .map(|c| ChoiceEntry {
            choice: c.clone(),
            count: tally.count(c).unwrap_or(0),
        })
        .collect();
    for e in tally.entries() {
        if !question.choices().contains(&e.choice) {
            entries.push(e.clone());
        }
    }
    QuestionGroup {
        stats: GroupStats::Choice(ChoiceTally { entries }),
        ..group
    }
}

/// The records of one respondent, in input order.
pub fn respondent_history<'a>(records: &'a [ResponseRecord], email: &str) -> Vec<&'a ResponseRecord> {
    records
        .iter()
        .filter(|r| r.email.as_deref() == Some(email))
        .collect()
}
