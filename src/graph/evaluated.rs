//! Evaluation records for links and paths.

use super::{Link, Path};
use crate::instance::TypedInstance;

/// The outcome of evaluating one link. Successful iff `error` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedLink {
    /// The link that was evaluated.
    pub link: Link,
    /// The value the link started from.
    pub starting: TypedInstance,
    /// The value produced, if the link succeeded.
    pub result: Option<TypedInstance>,
    /// Why the link failed, if it did.
    pub error: Option<String>,
}

impl EvaluatedLink {
    /// A link that produced `result`.
    #[must_use]
    pub const fn success(link: Link, starting: TypedInstance, result: TypedInstance) -> Self {
        Self {
            link,
            starting,
            result: Some(result),
            error: None,
        }
    }

    /// A link that failed with `error`.
    #[must_use]
    pub fn failed(link: Link, starting: TypedInstance, error: impl Into<String>) -> Self {
        Self {
            link,
            starting,
            result: None,
            error: Some(error.into()),
        }
    }

    /// True if the link produced a value.
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// `link (starting) -> result | error`
    #[must_use]
    pub fn description(&self) -> String {
        match (&self.result, &self.error) {
            (_, Some(error)) => format!("{} ({}) failed: {error}", self.link, self.starting),
            (Some(result), None) => format!("{} ({}) -> {result}", self.link, self.starting),
            (None, None) => format!("{} ({})", self.link, self.starting),
        }
    }
}

/// A path walked against a starting instance, truncated at the first failure.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedPath {
    /// The path that was walked.
    pub path: Path,
    /// The value the walk started from.
    pub starting: TypedInstance,
    /// Evaluated links, in order, up to and including the first failure.
    pub links: Vec<EvaluatedLink>,
}

impl EvaluatedPath {
    /// True when every link of the path was evaluated successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.path.exists
            && self.links.len() == self.path.links.len()
            && self.links.iter().all(EvaluatedLink::is_success)
    }

    /// The final value. A zero-link path yields the starting instance.
    pub fn result(&self) -> Option<&TypedInstance> {
        if !self.is_success() {
            return None;
        }
        match self.links.last() {
            Some(last) => last.result.as_ref(),
            None => Some(&self.starting),
        }
    }

    /// The link that ended the walk, if any.
    pub fn failed_link(&self) -> Option<&EvaluatedLink> {
        self.links.iter().find(|l| !l.is_success())
    }

    /// Descriptions of every evaluated link, in order.
    #[must_use]
    pub fn trace(&self) -> Vec<String> {
        self.links.iter().map(EvaluatedLink::description).collect()
    }
}
