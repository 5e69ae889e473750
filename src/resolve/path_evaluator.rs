//! Walks a path link by link.

use tracing::debug;

use crate::context::{QueryContext, TraceEventKind};
use crate::error::{ResolutionError, WeftError, WeftResult};
use crate::evaluator::EvaluatorRegistry;
use crate::graph::{EvaluatedLink, EvaluatedPath, Path};
use crate::instance::TypedInstance;

/// Walks a path link by link, feeding each result into the next link.
#[derive(Debug, Clone, Copy)]
pub struct PathEvaluator<'a> {
    evaluators: &'a EvaluatorRegistry,
}

impl<'a> PathEvaluator<'a> {
    /// An evaluator dispatching through `evaluators`.
    #[must_use]
    pub const fn new(evaluators: &'a EvaluatorRegistry) -> Self {
        Self { evaluators }
    }

    /// Evaluates `path` from `starting`, stopping at the first failed link.
    ///
    /// Schema errors, cancellation and internal errors abort the walk. Any
    /// other evaluator error becomes a failed link.
    pub fn evaluate(
        &self,
        path: &Path,
        starting: &TypedInstance,
        context: &dyn QueryContext,
    ) -> WeftResult<EvaluatedPath> {
        let mut evaluated = Vec::with_capacity(path.links.len());
        let mut current = starting.clone();

        for link in &path.links {
            context.check_cancelled()?;
            let outcome = match self.evaluators.evaluate(link, &current, context) {
                Ok(outcome) => outcome,
                Err(e) if Self::aborts(&e) => return Err(e),
                Err(e) => EvaluatedLink::failed(link.clone(), current.clone(), failure_message(e)),
            };

            let description = outcome.description();
            debug!(link = %link, success = outcome.is_success(), "link evaluated");
            let next = outcome.result.clone();
            let succeeded = outcome.is_success();
            evaluated.push(outcome);

            if !succeeded {
                context.record(TraceEventKind::LinkFailed, description);
                break;
            }
            context.record(TraceEventKind::LinkEvaluated, description);
            match next {
                Some(value) => current = value,
                None => break,
            }
        }

        Ok(EvaluatedPath {
            path: path.clone(),
            starting: starting.clone(),
            links: evaluated,
        })
    }

    const fn aborts(error: &WeftError) -> bool {
        matches!(
            error,
            WeftError::Schema(_)
                | WeftError::Resolution(ResolutionError::Cancelled)
                | WeftError::Runtime(_)
                | WeftError::Internal { .. }
        )
    }
}

fn failure_message(error: WeftError) -> String {
    match error {
        WeftError::Resolution(ResolutionError::UnresolvedOperationParameters { message, .. }) => message,
        other => other.to_string(),
    }
}
