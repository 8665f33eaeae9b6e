//! The knowledge index: accounts, payees, tags, commodities, usage counts and
//! transaction templates gathered from ledger files.
//!
//! [`IndexData`] is the mutable accumulator used by the builder and the merge
//! engine; it never leaves this crate. Consumers receive a [`KnowledgeIndex`],
//! an immutable, cheaply clonable snapshot that also carries the derived
//! [`FormattingProfile`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::merge;
use crate::profile::FormattingProfile;
use crate::template::Template;

/// Composite key for `tag_value_usage`.
pub fn tag_value_key(tag: &str, value: &str) -> String {
    format!("{tag}:{value}")
}

/// Composite key for `payee_account_pair_usage`.
pub fn payee_account_key(payee: &str, account: &str) -> String {
    format!("{payee}::{account}")
}

/// Mutable index state shared by the builder and the merge engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct IndexData {
    pub(crate) accounts: BTreeSet<String>,
    pub(crate) defined_accounts: BTreeSet<String>,
    pub(crate) used_accounts: BTreeSet<String>,
    /// Accounts seen on postings that carry an amount.
    pub(crate) amount_accounts: BTreeSet<String>,
    pub(crate) payees: BTreeSet<String>,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) tag_values: BTreeMap<String, BTreeSet<String>>,
    pub(crate) tag_value_usage: BTreeMap<String, u64>,
    pub(crate) commodities: BTreeSet<String>,
    pub(crate) commodity_formats: BTreeMap<String, String>,
    pub(crate) aliases: BTreeMap<String, String>,
    pub(crate) account_usage: BTreeMap<String, u64>,
    pub(crate) payee_usage: BTreeMap<String, u64>,
    pub(crate) tag_usage: BTreeMap<String, u64>,
    pub(crate) commodity_usage: BTreeMap<String, u64>,
    pub(crate) payee_accounts: BTreeMap<String, BTreeSet<String>>,
    pub(crate) payee_account_pair_usage: BTreeMap<String, u64>,
    pub(crate) transaction_templates: BTreeMap<String, BTreeMap<String, Template>>,
    pub(crate) decimal_mark: Option<char>,
    pub(crate) default_commodity: Option<String>,
    pub(crate) last_date: Option<String>,
}

/// Immutable snapshot of everything learned from a set of ledger files.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    data: Arc<IndexData>,
    profile: FormattingProfile,
}

impl PartialEq for KnowledgeIndex {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

/// Counts of the main index collections, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub accounts: usize,
    pub defined_accounts: usize,
    pub undefined_accounts: usize,
    pub payees: usize,
    pub tags: usize,
    pub commodities: usize,
    pub templates: usize,
    pub amount_alignment_column: usize,
}

impl KnowledgeIndex {
    /// An index with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Publish accumulated data, deriving the formatting profile.
    pub(crate) fn from_data(data: IndexData) -> Self {
        let profile = FormattingProfile::compute(&data.amount_accounts);
        Self {
            data: Arc::new(data),
            profile,
        }
    }

    pub(crate) fn data(&self) -> &IndexData {
        &self.data
    }

    /// Merge `other` into a copy of this index.
    ///
    /// Sets are unioned, usage counters summed, singleton values keep the
    /// first non-empty value, and the formatting profile is recomputed.
    pub fn merge(&self, other: &KnowledgeIndex) -> KnowledgeIndex {
        let mut data = IndexData::clone(&self.data);
        merge::merge_into(&mut data, &other.data);
        Self::from_data(data)
    }

    /// Fold several indices, in order, into one.
    pub fn merge_all<'a, I>(indices: I) -> KnowledgeIndex
    where
        I: IntoIterator<Item = &'a KnowledgeIndex>,
    {
        let mut acc = merge::IndexAccumulator::new();
        for index in indices {
            acc.fold(index);
        }
        acc.finish()
    }

    pub fn is_empty(&self) -> bool {
        *self.data == IndexData::default()
    }

    pub fn accounts(&self) -> &BTreeSet<String> {
        &self.data.accounts
    }

    /// Accounts declared with an `account` directive.
    pub fn defined_accounts(&self) -> &BTreeSet<String> {
        &self.data.defined_accounts
    }

    /// Accounts that appear on postings.
    pub fn used_accounts(&self) -> &BTreeSet<String> {
        &self.data.used_accounts
    }

    /// Used accounts that were never declared.
    pub fn undefined_accounts(&self) -> Vec<&str> {
        self.data
            .used_accounts
            .difference(&self.data.defined_accounts)
            .map(String::as_str)
            .collect()
    }

    pub fn payees(&self) -> &BTreeSet<String> {
        &self.data.payees
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.data.tags
    }

    pub fn tag_values(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.data.tag_values
    }

    /// Usage counts keyed by [`tag_value_key`].
    pub fn tag_value_usage(&self) -> &BTreeMap<String, u64> {
        &self.data.tag_value_usage
    }

    pub fn commodities(&self) -> &BTreeSet<String> {
        &self.data.commodities
    }

    /// First formatting sample seen for each commodity.
    pub fn commodity_formats(&self) -> &BTreeMap<String, String> {
        &self.data.commodity_formats
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.data.aliases
    }

    pub fn account_usage(&self) -> &BTreeMap<String, u64> {
        &self.data.account_usage
    }

    pub fn payee_usage(&self) -> &BTreeMap<String, u64> {
        &self.data.payee_usage
    }

    pub fn tag_usage(&self) -> &BTreeMap<String, u64> {
        &self.data.tag_usage
    }

    pub fn commodity_usage(&self) -> &BTreeMap<String, u64> {
        &self.data.commodity_usage
    }

    pub fn payee_accounts(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.data.payee_accounts
    }

    /// Usage counts keyed by [`payee_account_key`].
    pub fn payee_account_pair_usage(&self) -> &BTreeMap<String, u64> {
        &self.data.payee_account_pair_usage
    }

    pub fn transaction_templates(&self) -> &BTreeMap<String, BTreeMap<String, Template>> {
        &self.data.transaction_templates
    }

    /// Templates for a payee, most used first.
    pub fn templates_for(&self, payee: &str) -> Vec<&Template> {
        let mut templates: Vec<&Template> = self
            .data
            .transaction_templates
            .get(payee)
            .map(|t| t.values().collect())
            .unwrap_or_default();
        templates.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| b.last_used_date.cmp(&a.last_used_date))
        });
        templates
    }

    /// The `limit` accounts most often posted against `payee`.
    pub fn top_accounts_for_payee(&self, payee: &str, limit: usize) -> Vec<(&str, u64)> {
        let Some(accounts) = self.data.payee_accounts.get(payee) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&str, u64)> = accounts
            .iter()
            .map(|account| {
                let count = self
                    .data
                    .payee_account_pair_usage
                    .get(&payee_account_key(payee, account))
                    .copied()
                    .unwrap_or(0);
                (account.as_str(), count)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn decimal_mark(&self) -> Option<char> {
        self.data.decimal_mark
    }

    pub fn default_commodity(&self) -> Option<&str> {
        self.data.default_commodity.as_deref()
    }

    /// Greatest transaction date seen, normalised to `-` separators.
    pub fn last_date(&self) -> Option<&str> {
        self.data.last_date.as_deref()
    }

    pub fn formatting_profile(&self) -> FormattingProfile {
        self.profile
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            accounts: self.data.accounts.len(),
            defined_accounts: self.data.defined_accounts.len(),
            undefined_accounts: self.undefined_accounts().len(),
            payees: self.data.payees.len(),
            tags: self.data.tags.len(),
            commodities: self.data.commodities.len(),
            templates: self
                .data
                .transaction_templates
                .values()
                .map(BTreeMap::len)
                .sum(),
            amount_alignment_column: self.profile.amount_alignment_column,
        }
    }

    /// Render the whole index as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for KnowledgeIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            #[serde(flatten)]
            data: &'a IndexData,
            formatting_profile: &'a FormattingProfile,
        }

        Snapshot {
            data: &self.data,
            formatting_profile: &self.profile,
        }
        .serialize(serializer)
    }
}
