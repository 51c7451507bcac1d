//! Result of a completion as it flows through the dispatch path.

// Author: kelexine (https://github.com/kelexine)

/// Either a message for the user or the reason none could be produced.
///
/// This is the only value placed on a worker reply channel or returned by
/// the upstream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_message(self) -> Option<String> {
        match self {
            Outcome::Success(message) => Some(message),
            Outcome::Failure(_) => None,
        }
    }
}
