//! Selector engine: decides which resources are in scope for a run.

pub mod expression;

use std::sync::Arc;

use crate::error::SelectorError;
use crate::model::{ObjectMeta, Resource, ResourceChange};

pub use expression::{ExpressionSelector, SelectorKey, SelectorOperator};

/// Anything a selector can be evaluated against.
pub trait Selectable {
    fn kind(&self) -> &str;
    fn api_version(&self) -> String;
    fn metadata(&self) -> &ObjectMeta;
}

impl Selectable for Resource {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn api_version(&self) -> String {
        self.api_version.clone()
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl Selectable for ResourceChange {
    fn kind(&self) -> &str {
        &self.resource_type().kind
    }

    fn api_version(&self) -> String {
        self.resource_type().api_version()
    }

    fn metadata(&self) -> &ObjectMeta {
        ResourceChange::metadata(self)
    }
}

/// A predicate over resource metadata. Missing fields never raise; they don't match.
pub trait Selector: Send + Sync {
    fn matches(&self, item: &dyn Selectable) -> bool;
}

/// How the results of several selectors combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectorMatchingStrategy {
    /// Every selector must match.
    #[default]
    All,
    /// At least one selector must match.
    Any,
    /// No selector may match.
    None,
}

impl std::str::FromStr for SelectorMatchingStrategy {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(SelectorMatchingStrategy::All),
            "any" => Ok(SelectorMatchingStrategy::Any),
            "none" => Ok(SelectorMatchingStrategy::None),
            _ => Err(SelectorError::UnknownStrategy(s.to_string())),
        }
    }
}

/// A set of selectors combined under one strategy. An empty set matches everything.
#[derive(Clone, Default)]
pub struct AggregateSelector {
    selectors: Vec<Arc<dyn Selector>>,
    strategy: SelectorMatchingStrategy,
}

impl AggregateSelector {
    pub fn new(strategy: SelectorMatchingStrategy) -> Self {
        Self {
            selectors: Vec::new(),
            strategy,
        }
    }

    /// Parses each expression into an [`ExpressionSelector`].
    pub fn parse<S: AsRef<str>>(
        expressions: &[S],
        strategy: SelectorMatchingStrategy,
    ) -> Result<Self, SelectorError> {
        let mut aggregate = Self::new(strategy);
        for expression in expressions {
            aggregate = aggregate.with(ExpressionSelector::parse(expression.as_ref())?);
        }
        Ok(aggregate)
    }

    pub fn with(mut self, selector: impl Selector + 'static) -> Self {
        self.selectors.push(Arc::new(selector));
        self
    }

    pub fn strategy(&self) -> SelectorMatchingStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl Selector for AggregateSelector {
    fn matches(&self, item: &dyn Selectable) -> bool {
        if self.selectors.is_empty() {
            return true;
        }
        match self.strategy {
            SelectorMatchingStrategy::All => self.selectors.iter().all(|s| s.matches(item)),
            SelectorMatchingStrategy::Any => self.selectors.iter().any(|s| s.matches(item)),
            SelectorMatchingStrategy::None => !self.selectors.iter().any(|s| s.matches(item)),
        }
    }
}

impl std::fmt::Debug for AggregateSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateSelector")
            .field("selectors", &self.selectors.len())
            .field("strategy", &self.strategy)
            .finish()
    }
}
