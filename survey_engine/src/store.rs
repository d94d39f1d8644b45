//! Collaborator interfaces for persistence and authentication, and an
//! in-memory implementation of all of them.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use log::{debug, info};
use snafu::prelude::*;

use crate::aggregate::{AnswerValue, RecordId, ResponseRecord};
use crate::config::*;
use crate::definition::*;
use crate::submission::AnswerPayload;

/// Uniform error type for storage backends.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("{what} not found"))]
    NotFound { what: String },

    #[snafu(display("a response was already recorded with this token for survey {survey_id}"))]
    AlreadyResponded { survey_id: SurveyId },

    #[snafu(display("backend error: {message}"))]
    Backend { message: String },
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Role {
    Creator,
    Respondent,
    Observer,
}

/// What an invitation token resolves to.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Identity {
    pub role: Role,
    pub email: Option<String>,
    /// The survey an invitation token was issued for. Other tokens are not
    /// bound to a survey.
    pub survey_id: Option<SurveyId>,
}

impl Identity {
    pub fn may_answer(&self, survey_id: SurveyId) -> bool {
        self.survey_id.map_or(true, |s| s == survey_id)
    }
}

pub trait TokenResolver {
    /// Fails with [`SurveyError::Unauthorized`] for unknown tokens.
    fn resolve_token(&self, token: &str) -> SurveyResult<Identity>;
}

pub trait SurveyStore {
    fn load_survey(&self, survey_id: SurveyId) -> SurveyResult<Survey>;

    /// Saves a survey. A survey without identifier is given a fresh one.
    fn save_survey(&mut self, survey: Survey) -> SurveyResult<SurveyId>;
}

pub trait ResponseStore {
    /// All the records of a survey, in insertion order.
    fn load_response_records(&self, survey_id: SurveyId) -> SurveyResult<Vec<ResponseRecord>>;

    /// Persists one submission. A token can only be used once per survey.
    fn append_response(
        &mut self,
        survey_id: SurveyId,
        token: &str,
        answers: &[AnswerPayload],
    ) -> SurveyResult<()>;
}

pub trait Inviter {
    /// Creates invitations for the given addresses and returns how many were
    /// new. Addresses already invited to the survey are not counted.
    fn bulk_invite(&mut self, survey_id: SurveyId, emails: &[String]) -> SurveyResult<usize>;
}

/// Keeps everything in memory. Tokens of invited respondents are
/// `invite-<survey id>-<n>`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: HashMap<String, Identity>,
    surveys: BTreeMap<SurveyId, Survey>,
    records: HashMap<SurveyId, Vec<ResponseRecord>>,
    used_tokens: HashSet<(SurveyId, String)>,
    invitations: HashMap<SurveyId, Vec<(String, String)>>,
    next_record_id: u64,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn register_token(&mut self, token: &str, role: Role, email: Option<&str>) {
        self.tokens.insert(
            token.to_string(),
            Identity {
                role,
                email: email.map(|e| e.to_string()),
                survey_id: None,
            },
        );
    }

    /// The token handed to an invited address.
    pub fn invitation_token(&self, survey_id: SurveyId, email: &str) -> Option<&str> {
        self.invitations
            .get(&survey_id)?
            .iter()
            .find(|(e, _)| e == email)
            .map(|(_, t)| t.as_str())
    }

    fn survey(&self, survey_id: SurveyId) -> SurveyResult<&Survey> {
        self.surveys
            .get(&survey_id)
            .context(NotFoundSnafu {
                what: format!("survey {}", survey_id),
            })
            .context(StoreSnafu)
    }
}

impl TokenResolver for MemoryStore {
    fn resolve_token(&self, token: &str) -> SurveyResult<Identity> {
        self.tokens.get(token).cloned().context(UnauthorizedSnafu)
    }
}

impl SurveyStore for MemoryStore {
    fn load_survey(&self, survey_id: SurveyId) -> SurveyResult<Survey> {
        self.survey(survey_id).cloned()
    }

    fn save_survey(&mut self, survey: Survey) -> SurveyResult<SurveyId> {
        let id = match survey.id() {
            Some(id) => id,
            None => SurveyId(self.surveys.keys().map(|k| k.0).max().unwrap_or(0) + 1),
        };
        info!("save_survey: {} ({} questions)", id, survey.len());
        self.surveys.insert(id, survey.with_id(id));
        Ok(id)
    }
}

impl ResponseStore for MemoryStore {
    fn load_response_records(&self, survey_id: SurveyId) -> SurveyResult<Vec<ResponseRecord>> {
        self.survey(survey_id)?;
        Ok(self.records.get(&survey_id).cloned().unwrap_or_default())
    }

    fn append_response(
        &mut self,
        survey_id: SurveyId,
        token: &str,
        answers: &[AnswerPayload],
    ) -> SurveyResult<()> {
        let identity = self.resolve_token(token)?;
        if !identity.may_answer(survey_id) {
            debug!(
                "append_response: token issued for {:?}, not for survey {}",
                identity.survey_id, survey_id
            );
            return UnauthorizedSnafu.fail();
        }
        let key = (survey_id, token.to_string());
        if self.used_tokens.contains(&key) {
            return AlreadyRespondedSnafu { survey_id }.fail().context(StoreSnafu);
        }

        let survey = self.survey(survey_id)?;
        let submitted_at = Utc::now().to_rfc3339();
        let mut next_id = self.next_record_id;
        let mut new_records: Vec<ResponseRecord> = Vec::with_capacity(answers.len());
        for a in answers {
            let q = survey
                .question(a.question_id)
                .context(NotFoundSnafu {
                    what: format!("question {}", a.question_id),
                })
                .context(StoreSnafu)?;
            let answer = if q.question_type().is_choice() {
                AnswerValue::Choices(a.answer_choice.clone())
            } else {
                AnswerValue::Text(a.answer_text.clone())
            };
            next_id += 1;
            new_records.push(ResponseRecord {
                id: RecordId::Number(next_id),
                email: identity.email.clone(),
                question: q.text().to_string(),
                answer: Some(answer),
                submitted_at: Some(submitted_at.clone()),
                question_id: Some(q.id()),
                question_type: Some(q.question_type()),
            });
        }
        debug!(
            "append_response: survey {}: {} records",
            survey_id,
            new_records.len()
        );
        self.next_record_id = next_id;
        self.records.entry(survey_id).or_default().extend(new_records);
        self.used_tokens.insert(key);
        Ok(())
    }
}

impl Inviter for MemoryStore {
    fn bulk_invite(&mut self, survey_id: SurveyId, emails: &[String]) -> SurveyResult<usize> {
        self.survey(survey_id)?;
        let mut invited = 0;
        for email in emails {
            if self.invitation_token(survey_id, email).is_some() {
                debug!("bulk_invite: {} is already invited", email);
                continue;
            }
            let list = self.invitations.entry(survey_id).or_default();
            let token = format!("invite-{}-{}", survey_id, list.len() + 1);
            list.push((email.clone(), token.clone()));
            self.tokens.insert(
                token.clone(),
                Identity {
                    role: Role::Respondent,
                    email: Some(email.clone()),
                    survey_id: Some(survey_id),
                },
            );
            invited += 1;
        }
        info!("bulk_invite: survey {}: {} new invitations", survey_id, invited);
        Ok(invited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SurveyBuilder;

    fn store_with_survey() -> (MemoryStore, SurveyId) {
        let survey = SurveyBuilder::new("T")
            .add_question(QuestionDraft::new("Name", QuestionType::FreeText))
            .add_question(QuestionDraft::new("Happy?", QuestionType::SingleChoice))
            .apply_macro(1, Macro::YesNo)
            .unwrap()
            .build()
            .unwrap();
        let mut store = MemoryStore::new();
        let id = store.save_survey(survey).unwrap();
        (store, id)
    }

    #[test]
    fn save_assigns_identifiers() {
        let (mut store, id) = store_with_survey();
        assert_eq!(id, SurveyId(1));
        let again = store.load_survey(id).unwrap();
        assert_eq!(again.id(), Some(id));
        let id2 = store.save_survey(again.with_id(SurveyId(40))).unwrap();
        assert_eq!(id2, SurveyId(40));
        assert!(matches!(
            store.load_survey(SurveyId(2)),
            Err(SurveyError::Store {
                source: StoreError::NotFound { .. }
            })
        ));
    }

    #[test]
    fn unknown_token() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.resolve_token("nope"),
            Err(SurveyError::Unauthorized {})
        ));
    }

    #[test]
    fn one_response_per_token() {
        let (mut store, id) = store_with_survey();
        store.register_token("t1", Role::Respondent, Some("a@x.org"));
        let payload = vec![
            AnswerPayload {
                question_id: QuestionId(1),
                answer_text: "Ada".to_string(),
                answer_choice: vec![],
            },
            AnswerPayload {
                question_id: QuestionId(2),
                answer_text: String::new(),
                answer_choice: vec!["Sì".to_string()],
            },
        ];
        store.append_response(id, "t1", &payload).unwrap();
        assert!(matches!(
            store.append_response(id, "t1", &payload),
            Err(SurveyError::Store {
                source: StoreError::AlreadyResponded { .. }
            })
        ));
        let records = store.load_response_records(id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].email.as_deref(), Some("a@x.org"));
        assert_eq!(records[0].answer, Some(AnswerValue::Text("Ada".to_string())));
        assert_eq!(
            records[1].answer,
            Some(AnswerValue::Choices(vec!["Sì".to_string()]))
        );
        assert_eq!(records[1].question_type, Some(QuestionType::SingleChoice));
    }

    #[test]
    fn invitations_are_counted_once() {
        let (mut store, id) = store_with_survey();
        let emails = vec!["a@x.org".to_string(), "b@x.org".to_string()];
        assert_eq!(store.bulk_invite(id, &emails).unwrap(), 2);
        assert_eq!(store.bulk_invite(id, &emails).unwrap(), 0);
        let token = store.invitation_token(id, "b@x.org").unwrap().to_string();
        assert_eq!(token, "invite-1-2");
        let identity = store.resolve_token(&token).unwrap();
        assert_eq!(identity.role, Role::Respondent);
        assert_eq!(identity.email.as_deref(), Some("b@x.org"));
        assert_eq!(identity.survey_id, Some(id));
    }

    #[test]
    fn invitation_only_answers_its_survey() {
        let (mut store, first) = store_with_survey();
        let second = store
            .save_survey(store.load_survey(first).unwrap().with_id(SurveyId(2)))
            .unwrap();
        store.bulk_invite(first, &["a@x.org".to_string()]).unwrap();
        let token = store.invitation_token(first, "a@x.org").unwrap().to_string();
        let payload = vec![AnswerPayload {
            question_id: QuestionId(1),
            answer_text: "Ada".to_string(),
            answer_choice: vec![],
        }];
        assert!(matches!(
            store.append_response(second, &token, &payload),
            Err(SurveyError::Unauthorized {})
        ));
        assert!(store.load_response_records(second).unwrap().is_empty());
        store.append_response(first, &token, &payload).unwrap();
    }
}
