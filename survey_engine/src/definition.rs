//! Survey definitions: questions, choices and the rules that make them valid.
//!
//! There are two layers:
//! - [`QuestionDraft`] and [`SurveyDefinition`] are what an author submits. They are
//!   lenient and may be in an invalid state (a choice question with no choice yet).
//! - [`Question`] and [`Survey`] are validated values. A free text question never has
//!   choices and a choice question always has at least one.

use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt::Display;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u32);

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurveyId(pub u64);

impl Display for SurveyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The shape of the answer a question collects.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "text", alias = "free_text")]
    FreeText,
    #[serde(rename = "single", alias = "single_choice")]
    SingleChoice,
    #[serde(rename = "multi", alias = "multi_choice")]
    MultiChoice,
}

impl QuestionType {
    pub fn is_choice(&self) -> bool {
        !matches!(self, QuestionType::FreeText)
    }
}

/// Presentation tag. It has no effect on validation.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Professional,
    Light,
    Dark,
}

// ******** Macros *********

/// A named template that sets the type and the choices of a question in one step.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Macro {
    YesNo,
    TrueFalse,
    AgreementScale,
    Likert5,
}

#[derive(Eq, PartialEq, Debug)]
pub struct MacroTemplate {
    pub question_type: QuestionType,
    pub choices: &'static [&'static str],
}

struct MacroEntry {
    name: &'static str,
    aliases: &'static [&'static str],
    template: MacroTemplate,
}

static MACRO_TABLE: [(Macro, MacroEntry); 4] = [
    (
        Macro::YesNo,
        MacroEntry {
            name: "yes_no",
            aliases: &["yesno", "sino"],
            template: MacroTemplate {
                question_type: QuestionType::SingleChoice,
                choices: &["Sì", "No"],
            },
        },
    ),
    (
        Macro::TrueFalse,
        MacroEntry {
            name: "true_false",
            aliases: &["truefalse", "verofalso"],
            template: MacroTemplate {
                question_type: QuestionType::SingleChoice,
                choices: &["Vero", "Falso"],
            },
        },
    ),
    (
        Macro::AgreementScale,
        MacroEntry {
            name: "agreement_scale",
            aliases: &["agreement"],
            template: MacroTemplate {
                question_type: QuestionType::SingleChoice,
                choices: &["Poco d'accordo", "Indifferente", "Molto d'accordo"],
            },
        },
    ),
    (
        Macro::Likert5,
        MacroEntry {
            name: "likert5",
            aliases: &[],
            template: MacroTemplate {
                question_type: QuestionType::SingleChoice,
                choices: &[
                    "1 (Molto in disaccordo)",
                    "2",
                    "3",
                    "4",
                    "5 (Molto d'accordo)",
                ],
            },
        },
    ),
];

impl Macro {
    pub const ALL: [Macro; 4] = [
        Macro::YesNo,
        Macro::TrueFalse,
        Macro::AgreementScale,
        Macro::Likert5,
    ];

    fn entry(self) -> &'static MacroEntry {
        let idx = match self {
            Macro::YesNo => 0,
            Macro::TrueFalse => 1,
            Macro::AgreementScale => 2,
            Macro::Likert5 => 3,
        };
        &MACRO_TABLE[idx].1
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn template(self) -> &'static MacroTemplate {
        &self.entry().template
    }
}

impl FromStr for Macro {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        MACRO_TABLE
            .iter()
            .find(|(_, e)| e.name == wanted || e.aliases.contains(&wanted.as_str()))
            .map(|(m, _)| *m)
            .context(UnknownMacroSnafu { name: s })
    }
}

impl Display for Macro {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ******** Authoring input *********

fn default_required() -> bool {
    true
}

/// A question as edited by an author. It may be invalid.
///
/// Editing operations keep the free text invariant: switching to free text
/// clears the choices right away, and applying a macro replaces the type and
/// the choices together.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<QuestionId>,
    pub text: String,
    #[serde(alias = "type")]
    pub question_type: QuestionType,
    #[serde(default = "default_required")]
    pub is_required: bool,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl QuestionDraft {
    pub fn new(text: impl Into<String>, question_type: QuestionType) -> QuestionDraft {
        QuestionDraft {
            id: None,
            text: text.into(),
            question_type,
            is_required: true,
            choices: Vec::new(),
        }
    }

    /// Changes the type. Switching to free text drops the choices.
    pub fn set_type(&mut self, question_type: QuestionType) {
        self.question_type = question_type;
        if question_type == QuestionType::FreeText && !self.choices.is_empty() {
            debug!(
                "set_type: dropping {} choices of {:?}",
                self.choices.len(),
                self.text
            );
            self.choices.clear();
        }
    }

    pub fn apply_macro(&mut self, m: Macro) {
        let template = m.template();
        self.question_type = template.question_type;
        self.choices = template.choices.iter().map(|c| c.to_string()).collect();
    }

    /// Adds a choice after trimming it. Blank choices are ignored, and so is any
    /// choice on a free text question.
    pub fn add_choice(&mut self, choice: &str) {
        let c = choice.trim();
        if c.is_empty() {
            return;
        }
        if !self.question_type.is_choice() {
            warn!("add_choice: ignoring choice {:?} on a free text question", c);
            return;
        }
        self.choices.push(c.to_string());
    }

    pub fn remove_choice(&mut self, index: usize) -> Option<String> {
        if index < self.choices.len() {
            Some(self.choices.remove(index))
        } else {
            None
        }
    }
}

impl From<&Question> for QuestionDraft {
    fn from(q: &Question) -> Self {
        QuestionDraft {
            id: Some(q.id),
            text: q.text.clone(),
            question_type: q.question_type,
            is_required: q.is_required,
            choices: q.choices.clone(),
        }
    }
}

/// A survey as submitted by its author, before validation.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyDefinition {
    #[serde(default)]
    pub id: Option<SurveyId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

// ******** Validated structures *********

/// A validated question.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    question_type: QuestionType,
    is_required: bool,
    choices: Vec<String>,
    order: u32,
}

fn normalize_choices(choices: &[String]) -> Vec<String> {
    choices
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect()
}

impl Question {
    /// Creates a question at the given 0-based position.
    ///
    /// Choices are trimmed and blank ones dropped before the structure is checked.
    pub fn new(
        id: QuestionId,
        order: u32,
        text: &str,
        question_type: QuestionType,
        is_required: bool,
        choices: &[String],
    ) -> SurveyResult<Question> {
        let position = order as usize + 1;
        let text = text.trim();
        ensure!(
            !text.is_empty(),
            InvalidQuestionDefinitionSnafu {
                position,
                problem: DefinitionProblem::EmptyText
            }
        );
        let choices = match question_type {
            QuestionType::FreeText => {
                ensure!(
                    choices.iter().all(|c| c.trim().is_empty()),
                    InvalidQuestionDefinitionSnafu {
                        position,
                        problem: DefinitionProblem::ChoicesOnFreeText
                    }
                );
                Vec::new()
            }
            QuestionType::SingleChoice | QuestionType::MultiChoice => {
                let cs = normalize_choices(choices);
                ensure!(
                    !cs.is_empty(),
                    InvalidQuestionDefinitionSnafu {
                        position,
                        problem: DefinitionProblem::NoChoices
                    }
                );
                cs
            }
        };
        Ok(Question {
            id,
            text: text.to_string(),
            question_type,
            is_required,
            choices,
            order,
        })
    }

    pub fn from_draft(draft: &QuestionDraft, id: QuestionId, order: u32) -> SurveyResult<Question> {
        Question::new(
            id,
            order,
            &draft.text,
            draft.question_type,
            draft.is_required,
            &draft.choices,
        )
    }

    pub fn id(&self) -> QuestionId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// 0-based position in the survey.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// 1-based position, as shown to respondents.
    pub fn position(&self) -> usize {
        self.order as usize + 1
    }

    /// Returns a copy with the macro applied. The result is always valid.
    pub fn with_macro(&self, m: Macro) -> Question {
        let template = m.template();
        Question {
            question_type: template.question_type,
            choices: template.choices.iter().map(|c| c.to_string()).collect(),
            ..self.clone()
        }
    }

    /// Returns a copy with another type. Switching to free text drops the choices;
    /// switching a free text question to a choice type fails since it has none.
    pub fn with_type(&self, question_type: QuestionType) -> SurveyResult<Question> {
        let mut draft = QuestionDraft::from(self);
        draft.set_type(question_type);
        Question::from_draft(&draft, self.id, self.order)
    }
}

/// A validated survey. Questions are in display order.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SurveyDefinition")]
pub struct Survey {
    id: Option<SurveyId>,
    title: String,
    description: String,
    theme: Theme,
    questions: Vec<Question>,
}

impl Survey {
    pub fn id(&self) -> Option<SurveyId> {
        self.id
    }

    pub fn with_id(self, id: SurveyId) -> Survey {
        Survey {
            id: Some(id),
            ..self
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// The first question with exactly this text.
    pub fn question_by_text(&self, text: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.text == text)
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Back to an editable definition.
    pub fn to_definition(&self) -> SurveyDefinition {
        SurveyDefinition {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            theme: self.theme,
            questions: self.questions.iter().map(QuestionDraft::from).collect(),
        }
    }
}

impl TryFrom<SurveyDefinition> for Survey {
    type Error = SurveyError;

    fn try_from(def: SurveyDefinition) -> Result<Self, Self::Error> {
        validate_survey_definition(&def)
    }
}

/// Checks a survey definition and returns the validated survey.
///
/// Positions are assigned from the order of the questions in the definition.
/// Questions without an identifier receive fresh ones, above the largest
/// identifier already in use.
pub fn validate_survey_definition(def: &SurveyDefinition) -> SurveyResult<Survey> {
    let mut seen: HashSet<QuestionId> = HashSet::new();
    for (idx, q) in def.questions.iter().enumerate() {
        if let Some(id) = q.id {
            ensure!(
                seen.insert(id),
                InvalidQuestionDefinitionSnafu {
                    position: idx + 1,
                    problem: DefinitionProblem::DuplicateId(id)
                }
            );
        }
    }

    // None once the largest representable id has been handed out.
    let mut next_id: Option<u32> = match seen.iter().map(|id| id.0).max() {
        Some(m) => m.checked_add(1),
        None => Some(1),
    };
    let mut questions: Vec<Question> = Vec::new();
    for (idx, draft) in def.questions.iter().enumerate() {
        let id = match draft.id {
            Some(id) => id,
            None => {
                let n = next_id.context(InvalidQuestionDefinitionSnafu {
                    position: idx + 1,
                    problem: DefinitionProblem::IdSpaceExhausted,
                })?;
                next_id = n.checked_add(1);
                QuestionId(n)
            }
        };
        questions.push(Question::from_draft(draft, id, idx as u32)?);
    }
    if questions.is_empty() {
        debug!("validate_survey_definition: survey {:?} has no question", def.title);
    }
    Ok(Survey {
        id: def.id,
        title: def.title.clone(),
        description: def.description.clone(),
        theme: def.theme,
        questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn assert_free_text_invariant(q: &Question) {
        assert_eq!(
            q.question_type() == QuestionType::FreeText,
            q.choices().is_empty(),
            "{:?}",
            q
        );
    }

    #[test]
    fn free_text_with_choices_is_rejected() {
        let res = Question::new(
            QuestionId(1),
            2,
            "Comments?",
            QuestionType::FreeText,
            true,
            &strs(&["a"]),
        );
        match res {
            Err(SurveyError::InvalidQuestionDefinition { position, problem }) => {
                assert_eq!(position, 3);
                assert_eq!(problem, DefinitionProblem::ChoicesOnFreeText);
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn choice_question_needs_choices_after_normalization() {
        let res = Question::new(
            QuestionId(1),
            0,
            "Pick one",
            QuestionType::SingleChoice,
            true,
            &strs(&["  ", ""]),
        );
        assert!(matches!(
            res,
            Err(SurveyError::InvalidQuestionDefinition {
                problem: DefinitionProblem::NoChoices,
                ..
            })
        ));
    }

    #[test]
    fn choices_are_trimmed() {
        let q = Question::new(
            QuestionId(1),
            0,
            "  Pick one ",
            QuestionType::MultiChoice,
            false,
            &strs(&[" red", "", "blue  "]),
        )
        .unwrap();
        assert_eq!(q.text(), "Pick one");
        assert_eq!(q.choices().to_vec(), strs(&["red", "blue"]));
        assert_free_text_invariant(&q);
    }

    #[test]
    fn yes_no_overwrites_choices() {
        let q = Question::new(
            QuestionId(4),
            0,
            "Ok?",
            QuestionType::MultiChoice,
            true,
            &strs(&["maybe", "later", "never"]),
        )
        .unwrap();
        let q2 = q.with_macro(Macro::YesNo);
        assert_eq!(q2.question_type(), QuestionType::SingleChoice);
        assert_eq!(q2.choices().to_vec(), strs(&["Sì", "No"]));
        assert_eq!(q2.id(), QuestionId(4));
    }

    #[test]
    fn every_macro_keeps_the_invariant() {
        let base = Question::new(QuestionId(1), 0, "Q", QuestionType::FreeText, true, &[])
            .unwrap();
        for m in Macro::ALL {
            let q = base.with_macro(m);
            assert_eq!(q.question_type(), QuestionType::SingleChoice);
            assert_eq!(q.choices().len(), m.template().choices.len());
            assert_free_text_invariant(&q);
        }
        assert_eq!(
            base.with_macro(Macro::AgreementScale).choices().to_vec(),
            strs(&["Poco d'accordo", "Indifferente", "Molto d'accordo"])
        );
        assert_eq!(base.with_macro(Macro::Likert5).choices().len(), 5);
    }

    #[test]
    fn switching_to_free_text_clears_choices() {
        let q = Question::new(QuestionId(1), 0, "Q", QuestionType::FreeText, true, &[])
            .unwrap()
            .with_macro(Macro::TrueFalse);
        let q2 = q.with_type(QuestionType::FreeText).unwrap();
        assert!(q2.choices().is_empty());
        assert_free_text_invariant(&q2);
        // And there is no way back.
        assert!(q2.with_type(QuestionType::SingleChoice).is_err());
    }

    #[test]
    fn macro_names() {
        assert_eq!("yes_no".parse::<Macro>().unwrap(), Macro::YesNo);
        assert_eq!("sino".parse::<Macro>().unwrap(), Macro::YesNo);
        assert_eq!("VeroFalso".parse::<Macro>().unwrap(), Macro::TrueFalse);
        assert_eq!("agreement".parse::<Macro>().unwrap(), Macro::AgreementScale);
        assert_eq!(" likert5 ".parse::<Macro>().unwrap(), Macro::Likert5);
        assert!(matches!(
            "likert7".parse::<Macro>(),
            Err(SurveyError::UnknownMacro { .. })
        ));
        for m in Macro::ALL {
            assert_eq!(m.name().parse::<Macro>().unwrap(), m);
        }
    }

    #[test]
    fn survey_from_json() {
        let js = r#"{
            "id": 12,
            "title": "Feedback",
            "theme": "dark",
            "questions": [
                {"text": "Name", "question_type": "text", "is_required": false},
                {"id": 7, "text": "Fruit", "question_type": "multi", "choices": ["Apple", "Pear"]},
                {"text": "Happy?", "type": "single_choice", "choices": ["Sì", "No"]}
            ]
        }"#;
        let survey: Survey = serde_json::from_str(js).unwrap();
        assert_eq!(survey.id(), Some(SurveyId(12)));
        assert_eq!(survey.theme(), Theme::Dark);
        let ids: Vec<u32> = survey.questions().iter().map(|q| q.id().0).collect();
        assert_eq!(ids, vec![8, 7, 9]);
        let orders: Vec<u32> = survey.questions().iter().map(|q| q.order()).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(survey.questions()[1].is_required());
        assert!(!survey.questions()[0].is_required());
        assert_eq!(survey.question_by_text("Fruit").map(|q| q.id()), Some(QuestionId(7)));
    }

    #[test]
    fn invalid_survey_json_is_rejected() {
        let js = r#"{"title": "T", "questions": [
            {"text": "ok", "question_type": "text"},
            {"text": "bad", "question_type": "text", "choices": ["x"]}
        ]}"#;
        let err = serde_json::from_str::<Survey>(js).unwrap_err();
        assert!(err.to_string().contains("invalid question #2"), "{}", err);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut a = QuestionDraft::new("a", QuestionType::FreeText);
        a.id = Some(QuestionId(3));
        let mut b = QuestionDraft::new("b", QuestionType::FreeText);
        b.id = Some(QuestionId(3));
        let def = SurveyDefinition {
            questions: vec![a, b],
            ..SurveyDefinition::default()
        };
        assert!(matches!(
            validate_survey_definition(&def),
            Err(SurveyError::InvalidQuestionDefinition {
                position: 2,
                problem: DefinitionProblem::DuplicateId(QuestionId(3))
            })
        ));
    }

    #[test]
    fn no_id_left_above_the_largest() {
        let mut a = QuestionDraft::new("a", QuestionType::FreeText);
        a.id = Some(QuestionId(u32::MAX));
        let b = QuestionDraft::new("b", QuestionType::FreeText);
        let def = SurveyDefinition {
            questions: vec![a, b],
            ..SurveyDefinition::default()
        };
        assert!(matches!(
            validate_survey_definition(&def),
            Err(SurveyError::InvalidQuestionDefinition {
                position: 2,
                problem: DefinitionProblem::IdSpaceExhausted
            })
        ));
    }

    #[test]
    fn fresh_ids_up_to_the_last_one() {
        let mut a = QuestionDraft::new("a", QuestionType::FreeText);
        a.id = Some(QuestionId(u32::MAX - 1));
        let b = QuestionDraft::new("b", QuestionType::FreeText);
        let def = SurveyDefinition {
            questions: vec![a, b],
            ..SurveyDefinition::default()
        };
        let survey = validate_survey_definition(&def).unwrap();
        assert_eq!(survey.questions()[1].id(), QuestionId(u32::MAX));
    }

    #[test]
    fn empty_survey_is_legal() {
        let survey = validate_survey_definition(&SurveyDefinition::default()).unwrap();
        assert!(survey.is_empty());
        assert_eq!(survey.theme(), Theme::Professional);
    }

    #[test]
    fn draft_round_trip() {
        let def = SurveyDefinition {
            title: "T".to_string(),
            questions: vec![{
                let mut d = QuestionDraft::new("Fruit", QuestionType::SingleChoice);
                d.add_choice(" Apple ");
                d.add_choice("   ");
                d
            }],
            ..SurveyDefinition::default()
        };
        let survey = validate_survey_definition(&def).unwrap();
        let again = validate_survey_definition(&survey.to_definition()).unwrap();
        assert_eq!(survey, again);
    }
}
