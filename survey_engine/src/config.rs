// ********* Errors ***********

use std::borrow::Cow;
use std::fmt::Display;

use snafu::Snafu;

use crate::definition::QuestionId;
use crate::store::StoreError;

/// What is structurally wrong with a question at authoring time.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DefinitionProblem {
    /// A free text question was given a list of choices.
    ChoicesOnFreeText,
    /// A single or multiple choice question has no usable choice.
    NoChoices,
    /// The question text is blank.
    EmptyText,
    /// Two questions of the same survey carry the same identifier.
    DuplicateId(QuestionId),
    /// No identifier is left above the largest one in use.
    IdSpaceExhausted,
}

impl Display for DefinitionProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionProblem::ChoicesOnFreeText => {
                write!(f, "free text questions cannot have choices")
            }
            DefinitionProblem::NoChoices => {
                write!(f, "choice questions need at least one non-blank choice")
            }
            DefinitionProblem::EmptyText => write!(f, "the question text is empty"),
            DefinitionProblem::DuplicateId(id) => write!(f, "duplicate question id {}", id),
            DefinitionProblem::IdSpaceExhausted => {
                write!(f, "no question id left to assign")
            }
        }
    }
}

fn display_positions(positions: &[usize]) -> String {
    positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Errors that stop a survey operation.
///
/// An empty result set is not an error: see [`crate::aggregate::Aggregation::is_empty`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    /// Structural violation in a survey definition. `position` is 1-based.
    #[snafu(display("invalid question #{position}: {problem}"))]
    InvalidQuestionDefinition {
        position: usize,
        problem: DefinitionProblem,
    },

    /// Required questions left unanswered, by 1-based position.
    #[snafu(display(
        "please answer the following required questions: {}",
        display_positions(positions)
    ))]
    IncompleteSubmission { positions: Vec<usize> },

    #[snafu(display("access denied"))]
    Unauthorized {},

    #[snafu(display("unknown macro {name:?}"))]
    UnknownMacro { name: String },

    /// The builder was asked about a question index that does not exist (0-based).
    #[snafu(display("no question at index {position}"))]
    NoSuchQuestion { position: usize },

    #[snafu(display("storage failure"))]
    Store { source: StoreError },

    #[snafu(display("CSV failure"))]
    Csv { source: csv::Error },

    #[snafu(display("I/O failure while writing CSV"))]
    Io { source: std::io::Error },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

// ********* Configuration **********

/// How response records are put together into one question group.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum GroupingKey {
    /// Use the question identifier carried by the record, and fall back on the
    /// question text when the record has none.
    QuestionId,
    /// Only use the literal question text. Two questions sharing the same text
    /// end up in the same group.
    QuestionText,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AggregationRules {
    /// Number of entries per page of a text answer table.
    pub page_size: usize,
    /// The label substituted for empty or missing answers.
    pub empty_label: Cow<'static, str>,
    pub grouping: GroupingKey,
}

impl AggregationRules {
    pub const DEFAULT_RULES: AggregationRules = AggregationRules {
        page_size: 7,
        empty_label: Cow::Borrowed("(Empty)"),
        grouping: GroupingKey::QuestionId,
    };
}

impl Default for AggregationRules {
    fn default() -> Self {
        AggregationRules::DEFAULT_RULES
    }
}
