use thiserror::Error;

/// Errors surfaced by the conversation engine and its boundary layers.
#[derive(Debug, Error)]
pub enum BotError {
    /// Malformed constructor arguments (bad URL, bad button tag, empty
    /// question list). Raised at construction time, never coerced.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The inbound webhook batch is missing its expected structure.
    /// Translation aborts for the whole batch.
    #[error("unable to parse inbound payload: {0}")]
    MalformedPayload(String),

    /// A conversation references a step machine name absent from the
    /// workflow graph. Fatal for that turn.
    #[error("unable to load step with key '{0}'")]
    UnknownStep(String),

    /// The workflow or a step is wired up inconsistently, e.g. routing
    /// fell through to a wildcard handler that was never registered.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure reported by the conversation store.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
