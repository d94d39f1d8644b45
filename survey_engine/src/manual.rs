/*!

This is the long-form manual for `survey_engine` and `surveytally`.

## Survey definitions

A survey is written in JSON. Question identifiers are optional: questions
without one get the next free number. The position of a question in the list
is its display order.

```text
{
  "id": 3,
  "title": "Customer satisfaction",
  "description": "Two minutes of your time",
  "theme": "professional",
  "questions": [
    {"id": 1, "text": "Your name", "type": "text", "is_required": false},
    {"text": "Would you come back?", "type": "single", "choices": ["Sì", "No"]},
    {"text": "What did you try?", "type": "multi", "choices": ["Pasta", "Pizza"]}
  ]
}
```

Question types are `text` (free text), `single` (one choice) and `multi`
(several choices). `is_required` defaults to `true`. A free text question
cannot have choices, and choice questions need at least one non-blank choice.
Choices are trimmed and blank entries are dropped.

Themes are `professional` (the default), `light` and `dark`.

### Macros

A macro replaces the choices of a question with a predefined list and makes
it a single choice question:

| macro             | aliases             | choices                                            |
|-------------------|---------------------|----------------------------------------------------|
| `yes_no`          | `yesno`, `sino`     | Sì, No                                             |
| `true_false`      | `truefalse`, `verofalso` | Vero, Falso                                   |
| `agreement_scale` | `agreement`         | Poco d'accordo, Indifferente, Molto d'accordo      |
| `likert5`         |                     | 1 (Molto in disaccordo), 2, 3, 4, 5 (Molto d'accordo) |

## Answers

The answers of one respondent are keyed by question identifier:

```text
{"1": {"answer_text": "Ada"}, "2": {"answer_choice": ["Sì"]}}
```

A required free text question is answered when its text is not blank. A
required choice question is answered when at least one choice is selected.
An answer of the wrong kind counts as missing.

## Response records

The store hands back one record per answered question. In JSON:

```text
{"id": 1, "email": "a@x.org", "question": "Would you come back?",
 "answer": ["Sì"], "submitted_at": "2024-03-01T10:00:00Z",
 "question_id": 2, "question_type": "single"}
```

`answer` is a string or a list of strings. `question_id` and `question_type`
are optional; without them, records are grouped by question text and a group
is treated as a choice question as soon as one of its answers is a list.

The raw CSV export has the columns `ID, Email, Question, Answer, Submitted At`,
with multiple choices joined by `", "`. It can be read back as records: the
answers then are plain text.

## Configuration

`surveytally` reads a JSON configuration file:

```text
{
  "outputSettings": {"surveyName": "Feedback", "outputDirectory": "output"},
  "surveyId": 3,
  "surveyFile": "survey.json",
  "responseSources": [
    {"provider": "json", "filePath": "responses.json"},
    {"provider": "csv", "filePath": "results_survey_3.csv"}
  ],
  "rules": {"pageSize": 7, "emptyLabel": "(Empty)", "groupBy": "questionId"}
}
```

Paths are relative to the configuration file. `surveyFile`, `surveyId`,
`outputDirectory` and `rules` are optional. `groupBy` is `questionId` (the
default) or `questionText`.

*/
