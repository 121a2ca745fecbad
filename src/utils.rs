//! Utility functions for common operations.

use crate::error::LoaderError;

/// Sentence terminators used to split cleaned prose.
const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？'];

/// Converts CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Splits cleaned text into sentences.
///
/// Each sentence keeps its terminator (`。`, `！` or `？`). Line breaks end a
/// sentence as well; surrounding whitespace is trimmed and empty pieces are
/// dropped. This is the sentence stream a Markov-chain generator consumes.
///
/// # Arguments
/// * `text` - Cleaned text, usually the output of [`crate::normalize`]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c == '\n' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Checks if an HTTP response is successful.
///
/// # Returns
/// Ok(response) if successful, or `LoaderError::Transport` carrying the status otherwise
pub fn check_response_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, LoaderError> {
    Ok(response.error_for_status()?)
}
