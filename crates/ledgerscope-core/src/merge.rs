//! Merge engine: the reducer that combines two knowledge indices.
//!
//! The algebra is expressed once through the [`Merge`] trait: sets union,
//! counters add, and maps merge their values key-wise with the same rules.
//! Fields with "first value wins" or "latest wins" semantics use the small
//! helpers below instead. Templates are merged per payee and signature, then
//! capped again.

use std::collections::{BTreeMap, BTreeSet};

use crate::index::{IndexData, KnowledgeIndex};
use crate::template::{MAX_TEMPLATES_PER_PAYEE, Template, enforce_cap};

/// Combine another value of the same shape into `self`.
pub(crate) trait Merge {
    fn merge_from(&mut self, other: &Self);
}

impl Merge for u64 {
    fn merge_from(&mut self, other: &Self) {
        *self = self.saturating_add(*other);
    }
}

impl<T: Ord + Clone> Merge for BTreeSet<T> {
    fn merge_from(&mut self, other: &Self) {
        self.extend(other.iter().cloned());
    }
}

impl<K: Ord + Clone, V: Merge + Clone> Merge for BTreeMap<K, V> {
    fn merge_from(&mut self, other: &Self) {
        for (key, value) in other {
            match self.get_mut(key) {
                Some(existing) => existing.merge_from(value),
                None => {
                    self.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Adopt `source` only when `target` is still empty.
pub(crate) fn first_wins<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

/// Per-key [`first_wins`] for maps of singleton values.
pub(crate) fn first_wins_entries<K: Ord + Clone, V: Clone>(
    target: &mut BTreeMap<K, V>,
    source: &BTreeMap<K, V>,
) {
    for (key, value) in source {
        target
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Keep the greater of two optional values (`None` is smallest).
pub(crate) fn keep_greatest<T: Ord + Clone>(target: &mut Option<T>, source: &Option<T>) {
    if source > target {
        target.clone_from(source);
    }
}

/// Merge `source` into `target` in place.
pub(crate) fn merge_into(target: &mut IndexData, source: &IndexData) {
    target.accounts.merge_from(&source.accounts);
    target.defined_accounts.merge_from(&source.defined_accounts);
    target.used_accounts.merge_from(&source.used_accounts);
    target.amount_accounts.merge_from(&source.amount_accounts);
    target.payees.merge_from(&source.payees);
    target.tags.merge_from(&source.tags);
    target.commodities.merge_from(&source.commodities);

    target.tag_values.merge_from(&source.tag_values);
    target.payee_accounts.merge_from(&source.payee_accounts);

    target.account_usage.merge_from(&source.account_usage);
    target.payee_usage.merge_from(&source.payee_usage);
    target.tag_usage.merge_from(&source.tag_usage);
    target.commodity_usage.merge_from(&source.commodity_usage);
    target.tag_value_usage.merge_from(&source.tag_value_usage);
    target
        .payee_account_pair_usage
        .merge_from(&source.payee_account_pair_usage);

    first_wins_entries(&mut target.commodity_formats, &source.commodity_formats);
    first_wins_entries(&mut target.aliases, &source.aliases);
    first_wins(&mut target.decimal_mark, &source.decimal_mark);
    first_wins(&mut target.default_commodity, &source.default_commodity);
    keep_greatest(&mut target.last_date, &source.last_date);

    merge_templates(
        &mut target.transaction_templates,
        &source.transaction_templates,
    );
}

fn merge_templates(
    target: &mut BTreeMap<String, BTreeMap<String, Template>>,
    source: &BTreeMap<String, BTreeMap<String, Template>>,
) {
    for (payee, incoming) in source {
        let slot = target.entry(payee.clone()).or_default();
        for (key, template) in incoming {
            match slot.get_mut(key) {
                Some(existing) => {
                    existing.usage_count =
                        existing.usage_count.saturating_add(template.usage_count);
                    if template.last_used_date > existing.last_used_date {
                        existing.postings.clone_from(&template.postings);
                        existing.last_used_date.clone_from(&template.last_used_date);
                    }
                }
                None => {
                    slot.insert(key.clone(), template.clone());
                }
            }
        }
        enforce_cap(slot, MAX_TEMPLATES_PER_PAYEE);
    }
}

/// Running accumulator for folding many indices sequentially.
#[derive(Debug, Default)]
pub(crate) struct IndexAccumulator {
    data: IndexData,
}

impl IndexAccumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fold(&mut self, index: &KnowledgeIndex) {
        merge_into(&mut self.data, index.data());
    }

    pub(crate) fn finish(self) -> KnowledgeIndex {
        KnowledgeIndex::from_data(self.data)
    }
}
