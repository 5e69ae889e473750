//! Path evaluation and node resolution.

mod path_evaluator;
mod strategy;

pub use path_evaluator::PathEvaluator;
pub use strategy::GraphResolutionStrategy;
