//! Quiz model, ingestion and validation.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::MIN_OPTIONS;

/// Fields a question record may carry.
const QUESTION_FIELDS: [&str; 3] = ["question", "options", "correct_option"];

/// Errors that can occur while ingesting a quiz payload.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Payload is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("The JSON must be a list of questions (found {found})")]
    NotAnArray { found: &'static str },

    #[error("The quiz contains no questions")]
    NoQuestions,

    #[error("Question at index {index} is not an object")]
    NotAnObject { index: usize },

    #[error("Question at index {index} is missing field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Question at index {index} has invalid '{field}': expected {expected}")]
    WrongType {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },

    #[error("Question at index {index} has unknown field '{field}'")]
    UnknownField { index: usize, field: String },

    #[error("Question at index {index} has an empty 'question' text")]
    EmptyQuestion { index: usize },

    #[error(
        "Question at index {index} has {count} option(s), at least {min} are required",
        min = MIN_OPTIONS
    )]
    TooFewOptions { index: usize, count: usize },

    #[error("Question at index {index} has an empty option at position {option}")]
    EmptyOption { index: usize, option: usize },

    #[error("Question at index {index} has 'correct_option' {value} outside of 0..{len}")]
    CorrectOptionOutOfRange { index: usize, value: i128, len: usize },

    #[error("Failed to access quiz file: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidationError {
    /// Index of the offending question, if the error concerns one.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::NotAnObject { index }
            | Self::MissingField { index, .. }
            | Self::WrongType { index, .. }
            | Self::UnknownField { index, .. }
            | Self::EmptyQuestion { index }
            | Self::TooFewOptions { index, .. }
            | Self::EmptyOption { index, .. }
            | Self::CorrectOptionOutOfRange { index, .. } => Some(*index),
            Self::Syntax(_) | Self::NotAnArray { .. } | Self::NoQuestions | Self::Io(_) => None,
        }
    }

    /// Name of the offending field, if the error concerns one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. } | Self::WrongType { field, .. } => Some(*field),
            Self::UnknownField { field, .. } => Some(field.as_str()),
            Self::EmptyQuestion { .. } => Some("question"),
            Self::TooFewOptions { .. } | Self::EmptyOption { .. } => Some("options"),
            Self::CorrectOptionOutOfRange { .. } => Some("correct_option"),
            _ => None,
        }
    }
}

/// A single validated question.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuizQuestion {
    /// Question text shown to the player.
    pub question: String,

    /// Answer choices in presentation order.
    pub options: Vec<String>,

    /// Zero-based index of the correct entry in `options`.
    pub correct_option: usize,
}

impl QuizQuestion {
    /// Creates a question without validating it.
    #[must_use]
    pub const fn new(question: String, options: Vec<String>, correct_option: usize) -> Self {
        Self {
            question,
            options,
            correct_option,
        }
    }

    /// Returns the text of the correct option, or `None` when
    /// `correct_option` points outside `options`.
    #[must_use]
    pub fn correct_answer(&self) -> Option<&str> {
        self.options.get(self.correct_option).map(String::as_str)
    }

    /// Checks whether `choice` is the correct option.
    #[must_use]
    pub const fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_option
    }

    /// Validates a single JSON record at position `index`.
    fn from_record(index: usize, record: &Value) -> Result<Self, ValidationError> {
        let Value::Object(fields) = record else {
            return Err(ValidationError::NotAnObject { index });
        };

        if let Some(field) = fields.keys().find(|key| !QUESTION_FIELDS.contains(&key.as_str())) {
            return Err(ValidationError::UnknownField {
                index,
                field: field.clone(),
            });
        }

        let question = require(fields, index, "question")?
            .as_str()
            .ok_or(ValidationError::WrongType {
                index,
                field: "question",
                expected: "text",
            })?;
        if question.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion { index });
        }

        let options = require(fields, index, "options")?
            .as_array()
            .ok_or(ValidationError::WrongType {
                index,
                field: "options",
                expected: "a list of text",
            })?
            .iter()
            .enumerate()
            .map(|(option, value)| match value.as_str() {
                Some(text) if text.trim().is_empty() => {
                    Err(ValidationError::EmptyOption { index, option })
                }
                Some(text) => Ok(text.to_owned()),
                None => Err(ValidationError::WrongType {
                    index,
                    field: "options",
                    expected: "a list of text",
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if options.len() < MIN_OPTIONS {
            return Err(ValidationError::TooFewOptions {
                index,
                count: options.len(),
            });
        }

        let raw = require(fields, index, "correct_option")?;
        let value = raw
            .as_i64()
            .map(i128::from)
            .or_else(|| raw.as_u64().map(i128::from))
            .ok_or(ValidationError::WrongType {
                index,
                field: "correct_option",
                expected: "an integer",
            })?;
        let correct_option = usize::try_from(value)
            .ok()
            .filter(|&i| i < options.len())
            .ok_or(ValidationError::CorrectOptionOutOfRange {
                index,
                value,
                len: options.len(),
            })?;

        Ok(Self::new(question.to_owned(), options, correct_option))
    }
}

fn require<'a>(
    fields: &'a Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    fields
        .get(field)
        .ok_or(ValidationError::MissingField { index, field })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// An ordered, validated list of questions.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Quiz {
    questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Parses and validates a quiz from raw JSON text.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn ingest(payload: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(&value)
    }

    /// Parses and validates a quiz from raw bytes (e.g. a downloaded document).
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered. Invalid UTF-8 is
    /// reported as a syntax error.
    pub fn ingest_slice(payload: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(payload)?;
        Self::from_value(&value)
    }

    /// Validates an already parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let records = records(value)?;
        let questions = records
            .iter()
            .enumerate()
            .map(|(index, record)| QuizQuestion::from_record(index, record))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { questions })
    }

    /// Returns validation results for every record of the payload.
    ///
    /// # Errors
    ///
    /// Fails only when the payload itself is unusable (not JSON, not a list,
    /// or empty); per-question problems are reported in the returned list.
    pub fn inspect(
        payload: &str,
    ) -> Result<Vec<Result<QuizQuestion, ValidationError>>, ValidationError> {
        let value: Value = serde_json::from_str(payload)?;
        let records = records(&value)?;
        Ok(records
            .iter()
            .enumerate()
            .map(|(index, record)| QuizQuestion::from_record(index, record))
            .collect())
    }

    /// Loads and validates a quiz from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path)?;
        Self::ingest(&content)
    }

    /// Saves the quiz to a JSON file in the upload format.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ValidationError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Serializes the quiz back to the upload format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ValidationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Gets a question by its position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&QuizQuestion> {
        self.questions.get(index)
    }

    /// Returns the questions in presentation order.
    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    /// Returns the number of questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks if there are no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Creates an example quiz for users to reference.
    #[must_use]
    pub fn example() -> Self {
        let question = |text: &str, options: [&str; 4], correct| {
            QuizQuestion::new(
                text.to_owned(),
                options.iter().map(|&o| o.to_owned()).collect(),
                correct,
            )
        };
        Self {
            questions: vec![
                question(
                    "What is the capital of France?",
                    ["London", "Paris", "Berlin", "Rome"],
                    1,
                ),
                question(
                    "John 3:16",
                    ["Matthew 5:14", "John 3:16", "Luke 1:2", "Acts 2:38"],
                    1,
                ),
                question(
                    "Point from notes on Romans 12",
                    ["Romans 12:1", "Romans 12:2", "Romans 12:3", "Romans 12:4"],
                    0,
                ),
            ],
        }
    }
}

fn records(value: &Value) -> Result<&[Value], ValidationError> {
    let Value::Array(records) = value else {
        return Err(ValidationError::NotAnArray {
            found: json_kind(value),
        });
    };
    if records.is_empty() {
        return Err(ValidationError::NoQuestions);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRANCE: &str = r#"[{
        "question": "What is the capital of France?",
        "options": ["Paris", "London", "Berlin", "Madrid"],
        "correct_option": 0
    }]"#;

    fn record(question: &str, options: &[&str], correct: i64) -> Value {
        serde_json::json!({
            "question": question,
            "options": options,
            "correct_option": correct,
        })
    }

    #[test]
    fn test_ingest_single_question() {
        let quiz = Quiz::ingest(FRANCE).unwrap();
        assert_eq!(quiz.len(), 1);
        let question = quiz.get(0).unwrap();
        assert_eq!(question.correct_option, 0);
        assert_eq!(question.correct_answer(), Some("Paris"));
        assert!(question.is_correct(0));
        assert!(!question.is_correct(1));
    }

    #[test]
    fn test_ingest_preserves_order() {
        let payload = Value::Array(
            (0..10)
                .map(|i| record(&format!("Question {i}"), &["a", "b", "c"], i % 3))
                .collect(),
        );
        let quiz = Quiz::from_value(&payload).unwrap();
        let texts: Vec<_> = quiz.questions().iter().map(|q| q.question.as_str()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("Question {i}")).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_correct_option_equal_to_len_is_rejected() {
        let payload = FRANCE.replace(r#""correct_option": 0"#, r#""correct_option": 4"#);
        let err = Quiz::ingest(&payload).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::CorrectOptionOutOfRange { index: 0, value: 4, len: 4 }
        ));
        assert_eq!(err.field(), Some("correct_option"));
    }

    #[test]
    fn test_correct_option_beyond_i64_is_out_of_range() {
        let payload =
            r#"[{"question":"q","options":["a","b"],"correct_option":18446744073709551615}]"#;
        let err = Quiz::ingest(payload).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::CorrectOptionOutOfRange {
                index: 0,
                value: 18_446_744_073_709_551_615,
                len: 2
            }
        ));
        assert_eq!(err.field(), Some("correct_option"));
    }

    #[test]
    fn test_unchecked_question_has_no_correct_answer() {
        let question = QuizQuestion::new("q".to_owned(), vec!["a".to_owned(), "b".to_owned()], 5);
        assert_eq!(question.correct_answer(), None);
        assert!(!question.is_correct(0));
    }

    #[test]
    fn test_negative_correct_option_is_rejected() {
        let payload = Value::Array(vec![
            record("fine", &["a", "b"], 1),
            record("negative", &["a", "b"], -1),
        ]);
        let err = Quiz::from_value(&payload).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::CorrectOptionOutOfRange { index: 1, value: -1, .. }
        ));
    }

    #[test]
    fn test_missing_fields_name_the_element() {
        for field in QUESTION_FIELDS {
            let mut element = record("q", &["a", "b"], 0);
            element.as_object_mut().unwrap().remove(field);
            let payload = Value::Array(vec![record("ok", &["a", "b"], 0), element]);

            let err = Quiz::from_value(&payload).unwrap_err();
            assert_eq!(err.index(), Some(1), "field {field}");
            assert_eq!(err.field(), Some(field));
            assert!(matches!(err, ValidationError::MissingField { .. }));
        }
    }

    #[test]
    fn test_too_few_options() {
        let payload = Value::Array(vec![record("lonely", &["only"], 0)]);
        assert!(matches!(
            Quiz::from_value(&payload),
            Err(ValidationError::TooFewOptions { index: 0, count: 1 })
        ));

        let payload = Value::Array(vec![record("none", &[], 0)]);
        assert!(matches!(
            Quiz::from_value(&payload),
            Err(ValidationError::TooFewOptions { index: 0, count: 0 })
        ));
    }

    #[test]
    fn test_wrong_types() {
        let payload = r#"[{"question":42,"options":["a","b"],"correct_option":0}]"#;
        assert!(matches!(
            Quiz::ingest(payload),
            Err(ValidationError::WrongType { field: "question", .. })
        ));

        let payload = r#"[{"question":"q","options":"a,b","correct_option":0}]"#;
        assert!(matches!(
            Quiz::ingest(payload),
            Err(ValidationError::WrongType { field: "options", .. })
        ));

        let payload = r#"[{"question":"q","options":["a",2],"correct_option":0}]"#;
        assert!(matches!(
            Quiz::ingest(payload),
            Err(ValidationError::WrongType { field: "options", .. })
        ));

        let payload = r#"[{"question":"q","options":["a","b"],"correct_option":"0"}]"#;
        assert!(matches!(
            Quiz::ingest(payload),
            Err(ValidationError::WrongType { field: "correct_option", .. })
        ));

        let payload = r#"[{"question":"q","options":["a","b"],"correct_option":1.5}]"#;
        assert!(matches!(
            Quiz::ingest(payload),
            Err(ValidationError::WrongType { field: "correct_option", .. })
        ));
    }

    #[test]
    fn test_payload_shape_errors() {
        assert!(matches!(Quiz::ingest("not json"), Err(ValidationError::Syntax(_))));
        assert!(matches!(
            Quiz::ingest(r#"{"question":"q"}"#),
            Err(ValidationError::NotAnArray { found: "an object" })
        ));
        assert!(matches!(Quiz::ingest("[]"), Err(ValidationError::NoQuestions)));
        assert!(matches!(
            Quiz::ingest(r#"[{"question":"q","options":["a","b"],"correct_option":0}, 7]"#),
            Err(ValidationError::NotAnObject { index: 1 })
        ));
        assert!(matches!(
            Quiz::ingest_slice(b"[\xff]"),
            Err(ValidationError::Syntax(_))
        ));
    }

    #[test]
    fn test_empty_texts_and_unknown_fields() {
        let payload = r#"[{"question":"   ","options":["a","b"],"correct_option":0}]"#;
        assert!(matches!(
            Quiz::ingest(payload),
            Err(ValidationError::EmptyQuestion { index: 0 })
        ));

        let payload = r#"[{"question":"q","options":["a",""],"correct_option":0}]"#;
        assert!(matches!(
            Quiz::ingest(payload),
            Err(ValidationError::EmptyOption { index: 0, option: 1 })
        ));

        let payload = r#"[{"question":"q","options":["a","b"],"correct_option":0,"hint":"x"}]"#;
        let err = Quiz::ingest(payload).unwrap_err();
        assert_eq!(err.field(), Some("hint"));
    }

    #[test]
    fn test_serialized_quiz_reingests_equal() {
        let quiz = Quiz::example();
        let json = quiz.to_json_pretty().unwrap();
        assert_eq!(Quiz::ingest(&json).unwrap(), quiz);
    }

    #[test]
    fn test_escaped_and_unicode_texts_survive_reingest() {
        let payload = r#"[
            {
                "question": "Quote: \"To be\" \\ or not?\nLine two\ttab",
                "options": ["Yes", "No"],
                "correct_option": 1
            },
            {
                "question": "Столица Японии? 🗾",
                "options": ["東京", "大阪", "<b>Kyoto</b> & co"],
                "correct_option": 0
            },
            {
                "question": "Escaped \u00e9t\u00e9",
                "options": ["\u2713", "\u2717"],
                "correct_option": 0
            }
        ]"#;
        let quiz = Quiz::ingest(payload).unwrap();
        assert_eq!(quiz.get(0).unwrap().question, "Quote: \"To be\" \\ or not?\nLine two\ttab");
        assert_eq!(quiz.get(1).unwrap().correct_answer(), Some("東京"));
        assert_eq!(quiz.get(2).unwrap().question, "Escaped été");
        assert_eq!(quiz.get(2).unwrap().options, ["✓", "✗"]);

        let json = quiz.to_json_pretty().unwrap();
        let again = Quiz::ingest(&json).unwrap();
        assert_eq!(again, quiz);
        let sizes: Vec<_> = again.questions().iter().map(|q| q.options.len()).collect();
        assert_eq!(sizes, [2, 3, 2]);
    }

    #[test]
    fn test_file_round_trip() {
        let file_name = format!("quiz_bot_example_{}.json", std::process::id());
        let path = std::env::temp_dir().join(file_name);
        let quiz = Quiz::example();
        quiz.save_to_file(&path).unwrap();
        let loaded = Quiz::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, quiz);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Quiz::load_from_file("/nonexistent/quiz.json"),
            Err(ValidationError::Io(_))
        ));
    }

    #[test]
    fn test_inspect_reports_every_element() {
        let payload = r#"[
            {"question":"good","options":["a","b"],"correct_option":1},
            {"question":"bad","options":["a"],"correct_option":0},
            {"question":"worse","options":["a","b"],"correct_option":9}
        ]"#;
        let results = Quiz::inspect(payload).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ValidationError::TooFewOptions { index: 1, .. })));
        assert!(matches!(
            results[2],
            Err(ValidationError::CorrectOptionOutOfRange { index: 2, .. })
        ));
    }
}
