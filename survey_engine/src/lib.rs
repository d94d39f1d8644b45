//! Survey authoring, submission checking and results tabulation.
//!
//! The typical flow: a [`Survey`] is put together with the
//! [`builder::SurveyBuilder`], the answers of a respondent are checked with
//! [`prepare_submission`], and the flat response records of a survey are turned
//! into per-question statistics with [`aggregate`] or [`aggregate_for_survey`].
//! See the [`manual`] for the formats.

mod config;

pub mod aggregate;
pub mod builder;
pub mod definition;
pub mod export;
pub mod manual;
pub mod service;
pub mod store;
pub mod submission;

pub use crate::config::*;

pub use crate::aggregate::{
    aggregate, aggregate_for_survey, respondent_history, Aggregation, AnswerValue, GroupKind,
    QuestionGroup, RecordId, ResponseRecord, SurveySummary,
};
pub use crate::definition::{
    validate_survey_definition, Macro, Question, QuestionDraft, QuestionId, QuestionType, Survey,
    SurveyDefinition, SurveyId, Theme,
};
pub use crate::export::{export_raw_csv, export_summary_csv, read_raw_csv, serialize_csv};
pub use crate::store::StoreError;
pub use crate::submission::{prepare_submission, validate_submission, Answer, AnswerPayload, AnswerSet};
