//! Subscription Tracking Types
//!
//! Domain types for the set of symbols subscribed on a streaming connection.
//!
//! # Design
//!
//! The streaming client owns one `SubscriptionSet`. When the coordinator
//! hands it a new desired symbol list, the set computes the minimal
//! `SubscriptionChanges`: one unsubscribe per symbol no longer wanted and one
//! subscribe per newly wanted symbol. Symbols present on both sides produce
//! no traffic, and no symbol is ever subscribed twice.

use std::collections::BTreeSet;

use crate::domain::quote::normalize_symbols;

// =============================================================================
// Types
// =============================================================================

/// A normalized ticker symbol.
pub type Symbol = String;

// =============================================================================
// Subscription Changes
// =============================================================================

/// Changes to upstream subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChanges {
    /// Symbols to subscribe to, in the caller's order.
    pub subscribe: Vec<Symbol>,
    /// Symbols to unsubscribe from, in sorted order.
    pub unsubscribe: Vec<Symbol>,
}

impl SubscriptionChanges {
    /// Check if there are any changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }

    /// Create changes with only subscribes.
    #[must_use]
    pub fn subscribe_only(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            subscribe: symbols.into_iter().collect(),
            unsubscribe: Vec::new(),
        }
    }

    /// Create changes with only unsubscribes.
    #[must_use]
    pub fn unsubscribe_only(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            subscribe: Vec::new(),
            unsubscribe: symbols.into_iter().collect(),
        }
    }
}

// =============================================================================
// Subscription Set
// =============================================================================

/// Symbols currently subscribed on the live connection.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    symbols: BTreeSet<Symbol>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbols: BTreeSet::new(),
        }
    }

    /// Compute the changes needed to move from this set to `desired`.
    ///
    /// `desired` is normalized (trimmed, uppercased, de-duplicated) first.
    /// The set itself is not modified.
    #[must_use]
    pub fn diff<S: AsRef<str>>(&self, desired: &[S]) -> SubscriptionChanges {
        let desired = normalize_symbols(desired);
        let wanted: BTreeSet<&str> = desired.iter().map(String::as_str).collect();

        let unsubscribe = self
            .symbols
            .iter()
            .filter(|s| !wanted.contains(s.as_str()))
            .cloned()
            .collect();
        let subscribe = desired
            .iter()
            .filter(|s| !self.symbols.contains(*s))
            .cloned()
            .collect();

        SubscriptionChanges {
            subscribe,
            unsubscribe,
        }
    }

    /// Record a symbol as subscribed. Returns `false` if it already was.
    pub fn insert(&mut self, symbol: impl Into<Symbol>) -> bool {
        self.symbols.insert(symbol.into())
    }

    /// Forget a symbol. Returns `false` if it was not subscribed.
    pub fn remove(&mut self, symbol: &str) -> bool {
        self.symbols.remove(symbol)
    }

    /// Whether `symbol` is subscribed.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    /// Forget every symbol.
    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    /// Number of subscribed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Subscribed symbols in sorted order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Symbol> {
        self.symbols.iter().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
