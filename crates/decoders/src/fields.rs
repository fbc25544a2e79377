use core_types::LinkId;

use crate::ClassifyError;

/// Field access for one whitespace-tokenized line.
pub(crate) struct Fields<'a> {
    category: &'static str,
    line: &'a str,
    tokens: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(category: &'static str, line: &'a str) -> Self {
        Self {
            category,
            line,
            tokens: line.split_whitespace().collect(),
        }
    }

    pub(crate) fn error(&self, reason: impl Into<String>) -> ClassifyError {
        ClassifyError::Format {
            category: self.category,
            line: self.line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&'a str> {
        self.tokens.get(index).copied()
    }

    pub(crate) fn require(&self, index: usize, what: &str) -> Result<&'a str, ClassifyError> {
        self.get(index)
            .ok_or_else(|| self.error(format!("missing {}", what)))
    }

    pub(crate) fn link_id(&self, index: usize) -> Result<LinkId, ClassifyError> {
        let raw = self.require(index, "link id")?;
        raw.parse()
            .map_err(|_| self.error(format!("invalid link id '{}'", raw)))
    }

    pub(crate) fn rest(&self, from: usize) -> Vec<String> {
        self.tokens
            .get(from..)
            .unwrap_or_default()
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    /// Value between `[` and `]` of the token at `index`, e.g. `CONNECTED[2]`.
    pub(crate) fn bracketed(&self, index: usize, what: &str) -> Result<&'a str, ClassifyError> {
        let token = self.require(index, what)?;
        token
            .split_once('[')
            .and_then(|(_, tail)| tail.split_once(']'))
            .map(|(value, _)| value)
            .ok_or_else(|| self.error(format!("{} has no bracketed value", what)))
    }
}
