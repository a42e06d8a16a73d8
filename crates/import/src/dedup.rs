use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use taxlens_core::{CategorizedTransaction, ParsedTransaction, TransactionType};

pub const DEFAULT_DESCRIPTION_CHARS: usize = 40;

/// Composite identity of a transaction across imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub tx_type: TransactionType,
}

impl DedupKey {
    pub fn new(tx: &ParsedTransaction, description_chars: usize) -> Self {
        DedupKey {
            date: tx.date,
            description: normalize(&tx.description)
                .chars()
                .take(description_chars)
                .collect(),
            // 10.5 and 10.50 must collide.
            amount: tx.amount.normalize(),
            tx_type: tx.tx_type,
        }
    }
}

/// Keys of every transaction already imported for one account. Passed
/// explicitly into each import so unrelated accounts never share state.
#[derive(Debug, Clone)]
pub struct DedupIndex {
    keys: HashSet<DedupKey>,
    description_chars: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub accepted: Vec<ParsedTransaction>,
    pub duplicates: usize,
}

impl Default for DedupIndex {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIPTION_CHARS)
    }
}

impl DedupIndex {
    pub fn new(description_chars: usize) -> Self {
        Self {
            keys: HashSet::new(),
            description_chars: description_chars.max(1),
        }
    }

    pub fn from_transactions<'a>(
        existing: impl IntoIterator<Item = &'a ParsedTransaction>,
        description_chars: usize,
    ) -> Self {
        let mut index = Self::new(description_chars);
        for tx in existing {
            index.insert(tx);
        }
        index
    }

    pub fn from_categorized(existing: &[CategorizedTransaction], description_chars: usize) -> Self {
        Self::from_transactions(existing.iter().map(|c| &c.transaction), description_chars)
    }

    pub fn key_for(&self, tx: &ParsedTransaction) -> DedupKey {
        DedupKey::new(tx, self.description_chars)
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, tx: &ParsedTransaction) -> bool {
        let key = self.key_for(tx);
        self.keys.insert(key)
    }

    pub fn contains(&self, tx: &ParsedTransaction) -> bool {
        self.keys.contains(&self.key_for(tx))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keeps only transactions not seen before. Accepted keys are added as
    /// they pass, so repeats inside `incoming` are caught too.
    pub fn filter_new(&mut self, incoming: Vec<ParsedTransaction>) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();
        for tx in incoming {
            if self.insert(&tx) {
                outcome.accepted.push(tx);
            } else {
                outcome.duplicates += 1;
            }
        }
        outcome
    }
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
