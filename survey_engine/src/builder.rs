pub use crate::config::*;
use crate::definition::*;

use snafu::prelude::*;

/// A builder for authoring surveys.
///
/// Every edit consumes the builder and returns a new one, so a half-edited
/// survey is never shared. Questions are addressed by their 0-based index.
///
/// ```
/// use survey_engine::builder::SurveyBuilder;
/// use survey_engine::{Macro, QuestionDraft, QuestionType, SurveyError};
///
/// let survey = SurveyBuilder::new("Customer satisfaction")
///     .add_question(QuestionDraft::new("How was your visit?", QuestionType::FreeText))
///     .add_question(QuestionDraft::new("Would you come back?", QuestionType::SingleChoice))
///     .apply_macro(1, Macro::YesNo)?
///     .build()?;
///
/// assert_eq!(survey.questions()[1].choices().len(), 2);
/// # Ok::<(), SurveyError>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SurveyBuilder {
    pub(crate) _definition: SurveyDefinition,
}

impl SurveyBuilder {
    pub fn new(title: &str) -> SurveyBuilder {
        SurveyBuilder {
            _definition: SurveyDefinition {
                title: title.to_string(),
                ..SurveyDefinition::default()
            },
        }
    }

    /// Starts editing an existing survey.
    pub fn from_survey(survey: &Survey) -> SurveyBuilder {
        SurveyBuilder {
            _definition: survey.to_definition(),
        }
    }

    pub fn id(self, id: SurveyId) -> SurveyBuilder {
        self.map_definition(|d| d.id = Some(id))
    }

    pub fn description(self, description: &str) -> SurveyBuilder {
        self.map_definition(|d| d.description = description.to_string())
    }

    pub fn theme(self, theme: Theme) -> SurveyBuilder {
        self.map_definition(|d| d.theme = theme)
    }

    pub fn questions(&self) -> &[QuestionDraft] {
        &self._definition.questions
    }

    pub fn add_question(self, draft: QuestionDraft) -> SurveyBuilder {
        self.map_definition(|d| d.questions.push(draft))
    }

    /// Replaces the question at `position`. The identifier of the replaced
    /// question is kept when the new draft does not carry one.
    pub fn update_question(self, position: usize, draft: QuestionDraft) -> SurveyResult<SurveyBuilder> {
        self.edit_question(position, |q| {
            let id = draft.id.or(q.id);
            *q = draft;
            q.id = id;
        })
    }

    pub fn remove_question(self, position: usize) -> SurveyResult<SurveyBuilder> {
        let mut def = self._definition;
        ensure!(
            position < def.questions.len(),
            NoSuchQuestionSnafu { position }
        );
        def.questions.remove(position);
        Ok(SurveyBuilder { _definition: def })
    }

    pub fn set_text(self, position: usize, text: &str) -> SurveyResult<SurveyBuilder> {
        self.edit_question(position, |q| q.text = text.to_string())
    }

    pub fn set_required(self, position: usize, is_required: bool) -> SurveyResult<SurveyBuilder> {
        self.edit_question(position, |q| q.is_required = is_required)
    }

    /// Changes the type of a question. Switching to free text drops its choices.
    pub fn set_type(self, position: usize, question_type: QuestionType) -> SurveyResult<SurveyBuilder> {
        self.edit_question(position, |q| q.set_type(question_type))
    }

    pub fn apply_macro(self, position: usize, m: Macro) -> SurveyResult<SurveyBuilder> {
        self.edit_question(position, |q| q.apply_macro(m))
    }

    pub fn add_choice(self, position: usize, choice: &str) -> SurveyResult<SurveyBuilder> {
        self.edit_question(position, |q| q.add_choice(choice))
    }

    /// Removes a choice. An out of range choice index leaves the question as is.
    pub fn remove_choice(self, position: usize, choice_index: usize) -> SurveyResult<SurveyBuilder> {
        self.edit_question(position, |q| {
            q.remove_choice(choice_index);
        })
    }

    /// Validates the current state into a survey.
    pub fn build(&self) -> SurveyResult<Survey> {
        validate_survey_definition(&self._definition)
    }

    fn map_definition(self, f: impl FnOnce(&mut SurveyDefinition)) -> SurveyBuilder {
        let mut def = self._definition;
        f(&mut def);
        SurveyBuilder { _definition: def }
    }

    fn edit_question(
        self,
        position: usize,
        f: impl FnOnce(&mut QuestionDraft),
    ) -> SurveyResult<SurveyBuilder> {
        let mut def = self._definition;
        let q = def
            .questions
            .get_mut(position)
            .context(NoSuchQuestionSnafu { position })?;
        f(q);
        Ok(SurveyBuilder { _definition: def })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builder_edits_are_independent() {
        let b1 = SurveyBuilder::new("T")
            .add_question(QuestionDraft::new("Q1", QuestionType::SingleChoice));
        let b2 = b1.clone().add_choice(0, "A").unwrap();
        assert!(b1.questions()[0].choices.is_empty());
        assert_eq!(b2.questions()[0].choices, strs(&["A"]));
        // b1 is still an invalid survey: a choice question without choices.
        assert!(b1.build().is_err());
        assert!(b2.build().is_ok());
    }

    #[test]
    fn macro_replaces_choices() {
        let b = SurveyBuilder::new("T")
            .add_question(QuestionDraft::new("Q1", QuestionType::MultiChoice))
            .add_choice(0, "x")
            .unwrap()
            .add_choice(0, "y")
            .unwrap()
            .apply_macro(0, Macro::TrueFalse)
            .unwrap();
        let q = &b.questions()[0];
        assert_eq!(q.question_type, QuestionType::SingleChoice);
        assert_eq!(q.choices, strs(&["Vero", "Falso"]));
    }

    #[test]
    fn set_type_to_free_text_drops_choices() {
        let b = SurveyBuilder::new("T")
            .add_question(QuestionDraft::new("Q1", QuestionType::SingleChoice))
            .apply_macro(0, Macro::Likert5)
            .unwrap()
            .set_type(0, QuestionType::FreeText)
            .unwrap();
        assert!(b.questions()[0].choices.is_empty());
        // Switching back does not restore anything.
        let b = b.set_type(0, QuestionType::SingleChoice).unwrap();
        assert!(b.questions()[0].choices.is_empty());
    }

    #[test]
    fn remove_renumbers_positions() {
        let survey = SurveyBuilder::new("T")
            .add_question(QuestionDraft::new("Q1", QuestionType::FreeText))
            .add_question(QuestionDraft::new("Q2", QuestionType::FreeText))
            .add_question(QuestionDraft::new("Q3", QuestionType::FreeText))
            .remove_question(0)
            .unwrap()
            .build()
            .unwrap();
        let texts: Vec<&str> = survey.questions().iter().map(|q| q.text()).collect();
        assert_eq!(texts, vec!["Q2", "Q3"]);
        assert_eq!(survey.questions()[0].position(), 1);
    }

    #[test]
    fn out_of_range_positions() {
        let b = SurveyBuilder::new("T");
        assert!(matches!(
            b.clone().remove_question(0),
            Err(SurveyError::NoSuchQuestion { position: 0 })
        ));
        assert!(matches!(
            b.apply_macro(3, Macro::YesNo),
            Err(SurveyError::NoSuchQuestion { position: 3 })
        ));
    }

    #[test]
    fn update_keeps_identifier() {
        let survey = SurveyBuilder::new("T")
            .add_question(QuestionDraft::new("Q1", QuestionType::FreeText))
            .build()
            .unwrap();
        let id = survey.questions()[0].id();
        let edited = SurveyBuilder::from_survey(&survey)
            .update_question(0, QuestionDraft::new("Q1 bis", QuestionType::FreeText))
            .unwrap()
            .set_required(0, false)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(edited.questions()[0].id(), id);
        assert_eq!(edited.questions()[0].text(), "Q1 bis");
        assert!(!edited.questions()[0].is_required());
    }
}
