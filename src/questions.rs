//! Question bank loading and validation

use crate::types::{Question, QuestionId};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum QuestionBankError {
    #[error("Failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid question bank: {0}")]
    Invalid(String),
}

/// Load a bank from a JSON file containing an array of questions
pub fn load_from_file(path: &Path) -> Result<Vec<Question>, QuestionBankError> {
    let data = std::fs::read_to_string(path)?;
    let questions: Vec<Question> = serde_json::from_str(&data)?;
    validate(&questions)?;
    tracing::info!(
        "Loaded {} questions from {}",
        questions.len(),
        path.display()
    );
    Ok(questions)
}

/// Check the invariants the round engine relies on
pub fn validate(questions: &[Question]) -> Result<(), QuestionBankError> {
    if questions.is_empty() {
        return Err(QuestionBankError::Invalid(
            "bank contains no questions".to_string(),
        ));
    }

    let mut seen: HashSet<QuestionId> = HashSet::new();
    for q in questions {
        if !seen.insert(q.id) {
            return Err(QuestionBankError::Invalid(format!(
                "duplicate question id {}",
                q.id
            )));
        }
        if q.prompt.trim().is_empty() {
            return Err(QuestionBankError::Invalid(format!(
                "question {} has an empty prompt",
                q.id
            )));
        }
        if q.options.len() < 2 {
            return Err(QuestionBankError::Invalid(format!(
                "question {} needs at least two options",
                q.id
            )));
        }
        if q.correct >= q.options.len() {
            return Err(QuestionBankError::Invalid(format!(
                "question {} marks option {} as correct but has only {} options",
                q.id,
                q.correct,
                q.options.len()
            )));
        }
    }
    Ok(())
}

/// Bank used when no file is configured
pub fn default_bank() -> Vec<Question> {
    let raw: [(&str, [&str; 4], usize); 6] = [
        (
            "What is the capital of France?",
            ["Paris", "Lyon", "Marseille", "Nice"],
            0,
        ),
        (
            "Which planet is known as the red planet?",
            ["Venus", "Mars", "Jupiter", "Mercury"],
            1,
        ),
        (
            "What is the chemical symbol for water?",
            ["O2", "CO2", "H2O", "NaCl"],
            2,
        ),
        (
            "How many sides does a hexagon have?",
            ["Five", "Seven", "Eight", "Six"],
            3,
        ),
        (
            "Who wrote 'Romeo and Juliet'?",
            ["Shakespeare", "Dickens", "Austen", "Tolstoy"],
            0,
        ),
        (
            "What is the largest ocean on Earth?",
            ["Atlantic", "Pacific", "Indian", "Arctic"],
            1,
        ),
    ];

    raw.iter()
        .enumerate()
        .map(|(i, (prompt, options, correct))| Question {
            id: i as QuestionId + 1,
            prompt: prompt.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct: *correct,
        })
        .collect()
}
