//! Conflict detector & resolver (§4.4): when the server reports state
//! incompatible with the client's local view, classify the conflict
//! and resolve it per the strategy registered for that operation's
//! entity type — never per individual incident.
//!
//! Grounded on `sync::conflict::ConflictResolver` in the reference
//! workspace: a default strategy plus a per-pattern override map,
//! specialised here to `entity_type` instead of a resource pattern and
//! to the four §4.4 strategies instead of OT/LWW.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use core::types::Money;

/// §4.4 conflict types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    StaleEntity,
    DuplicateSubmission,
    ServerAuthoritative,
    ConcurrentMutation,
}

/// §4.4 resolution strategies, chosen per operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionStrategy {
    /// Catalogue reads, product updates: client overwrites cache with
    /// server state.
    ServerWins,
    /// Never used for money.
    ClientWins,
    /// Append-only collections (transaction history): union by `id`.
    Merge,
    /// Surfaced to the user via a failure event; item moved to `failed`.
    Manual,
}

/// What a handler reported back alongside a `ServerAuthoritative`
/// conflict, when the underlying operation was monetary.
#[derive(Debug, Clone)]
pub struct ServerAuthoritativeDetail {
    pub reported_balance: Money,
    pub failure_note: String,
}

/// Maps an entity type to its resolution strategy. `entity_type` plays
/// the role the reference workspace's `resource_pattern` plays for
/// operational-transform resources.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    default_strategy: ResolutionStrategy,
    entity_strategies: HashMap<String, ResolutionStrategy>,
}

impl ConflictResolver {
    #[must_use]
    pub fn new(default_strategy: ResolutionStrategy) -> Self {
        Self { default_strategy, entity_strategies: HashMap::new() }
    }

    #[must_use]
    pub fn with_entity_strategy(mut self, entity_type: impl Into<String>, strategy: ResolutionStrategy) -> Self {
        self.entity_strategies.insert(entity_type.into(), strategy);
        self
    }

    pub fn set_entity_strategy(&mut self, entity_type: impl Into<String>, strategy: ResolutionStrategy) {
        self.entity_strategies.insert(entity_type.into(), strategy);
    }

    /// The strategy registered for `entity_type`, or the default.
    ///
    /// Monetary entities (`pending_transaction`) are never looked up
    /// here: the sync queue handles `ServerAuthoritative` rejections of
    /// money via the dedicated, mandatory reversal procedure in §4.4,
    /// never via a configurable strategy — the invariant "ClientWins is
    /// never used for money" has to be enforced structurally, not by
    /// trusting every caller to configure the map correctly.
    #[must_use]
    pub fn strategy_for(&self, entity_type: &str) -> ResolutionStrategy {
        self.entity_strategies.get(entity_type).copied().unwrap_or(self.default_strategy)
    }
}

impl Default for ConflictResolver {
    /// Catalogue rows are server-authoritative; transaction history
    /// merges by id; everything unrecognised is surfaced to a human
    /// rather than guessed at.
    fn default() -> Self {
        Self::new(ResolutionStrategy::Manual)
            .with_entity_strategy("cached_product", ResolutionStrategy::ServerWins)
            .with_entity_strategy("cached_stand", ResolutionStrategy::ServerWins)
            .with_entity_strategy("cached_wallet", ResolutionStrategy::ServerWins)
            .with_entity_strategy("cached_transaction", ResolutionStrategy::Merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolver_uses_server_wins_for_catalogue() {
        let resolver = ConflictResolver::default();
        assert_eq!(resolver.strategy_for("cached_product"), ResolutionStrategy::ServerWins);
        assert_eq!(resolver.strategy_for("cached_stand"), ResolutionStrategy::ServerWins);
    }

    #[test]
    fn default_resolver_merges_transaction_history() {
        let resolver = ConflictResolver::default();
        assert_eq!(resolver.strategy_for("cached_transaction"), ResolutionStrategy::Merge);
    }

    #[test]
    fn unknown_entity_types_fall_back_to_manual() {
        let resolver = ConflictResolver::default();
        assert_eq!(resolver.strategy_for("something_unregistered"), ResolutionStrategy::Manual);
    }

    #[test]
    fn override_replaces_default_for_one_entity_type() {
        let resolver = ConflictResolver::default().with_entity_strategy("cached_product", ResolutionStrategy::Manual);
        assert_eq!(resolver.strategy_for("cached_product"), ResolutionStrategy::Manual);
        assert_eq!(resolver.strategy_for("cached_stand"), ResolutionStrategy::ServerWins, "others are untouched");
    }
}
