#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenErrorKind {
    Parse,
    Resolve,
    Tags,
    Emit,
    Io,
    Internal,
}

#[derive(Debug, Clone)]
pub struct GenError {
    pub kind: GenErrorKind,
    pub message: String,
}

impl GenError {
    pub fn new(kind: GenErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Prefixes the message, keeping the kind. Used to thread the offending
    /// record name through nested resolution failures.
    pub fn context(self, prefix: &str) -> Self {
        Self {
            kind: self.kind,
            message: format!("{prefix}: {}", self.message),
        }
    }
}
