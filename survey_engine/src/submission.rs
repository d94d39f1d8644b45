//! Checks a respondent's answers against the required questions of a survey.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::config::*;
use crate::definition::*;

/// One submitted value for one question.
///
/// In JSON, `{"answer_text": "..."}` or `{"answer_choice": ["..."]}`.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub enum Answer {
    #[serde(rename = "answer_text")]
    Text(String),
    #[serde(rename = "answer_choice")]
    Choices(Vec<String>),
}

impl Answer {
    pub fn text(s: &str) -> Answer {
        Answer::Text(s.to_string())
    }

    pub fn choice(s: &str) -> Answer {
        Answer::Choices(vec![s.to_string()])
    }

    pub fn choices(cs: &[&str]) -> Answer {
        Answer::Choices(cs.iter().map(|c| c.to_string()).collect())
    }
}

/// The answers of one respondent, by question.
pub type AnswerSet = HashMap<QuestionId, Answer>;

/// The unit sent for persistence: one per answered question.
///
/// Both fields are always present. An unused field is empty rather than missing.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub question_id: QuestionId,
    pub answer_text: String,
    pub answer_choice: Vec<String>,
}

fn is_satisfied(question: &Question, answer: Option<&Answer>) -> bool {
    match (question.question_type(), answer) {
        (QuestionType::FreeText, Some(Answer::Text(s))) => !s.trim().is_empty(),
        (QuestionType::SingleChoice, Some(Answer::Choices(cs))) => cs.len() == 1,
        (QuestionType::MultiChoice, Some(Answer::Choices(cs))) => !cs.is_empty(),
        // Missing, or an answer of the wrong shape. Several choices on a single
        // choice question are the wrong shape.
        _ => false,
    }
}

/// Returns the required questions that are not answered, in survey order.
///
/// Optional questions are never returned, whatever their content.
pub fn validate_submission<'a>(survey: &'a Survey, answers: &AnswerSet) -> Vec<&'a Question> {
    let unsatisfied: Vec<&Question> = survey
        .questions()
        .iter()
        .filter(|q| q.is_required() && !is_satisfied(q, answers.get(&q.id())))
        .collect();
    debug!(
        "validate_submission: {} answers, {} unsatisfied questions",
        answers.len(),
        unsatisfied.len()
    );
    unsatisfied
}

/// Checks the answers and turns them into the payload to persist.
///
/// A submission is accepted entirely or not at all. The error lists the 1-based
/// positions of the missing questions.
pub fn prepare_submission(survey: &Survey, answers: &AnswerSet) -> SurveyResult<Vec<AnswerPayload>> {
    let unsatisfied = validate_submission(survey, answers);
    ensure!(
        unsatisfied.is_empty(),
        IncompleteSubmissionSnafu {
            positions: unsatisfied.iter().map(|q| q.position()).collect::<Vec<usize>>()
        }
    );

    for (qid, a) in answers.iter() {
        match (survey.question(*qid), a) {
            (None, _) => warn!(
                "prepare_submission: dropping answer for unknown question {}",
                qid
            ),
            (Some(q), Answer::Choices(cs))
                if q.question_type() == QuestionType::SingleChoice && cs.len() > 1 =>
            {
                warn!(
                    "prepare_submission: optional single choice question {} has {} choices",
                    qid,
                    cs.len()
                )
            }
            _ => {}
        }
    }

    let payload: Vec<AnswerPayload> = survey
        .questions()
        .iter()
        .filter_map(|q| {
            answers.get(&q.id()).map(|a| match a {
                Answer::Text(s) => AnswerPayload {
                    question_id: q.id(),
                    answer_text: s.clone(),
                    answer_choice: Vec::new(),
                },
                Answer::Choices(cs) => AnswerPayload {
                    question_id: q.id(),
                    answer_text: String::new(),
                    answer_choice: cs.clone(),
                },
            })
        })
        .collect();
    Ok(payload)
}
