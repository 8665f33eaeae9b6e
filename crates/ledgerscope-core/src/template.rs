//! Transaction templates: remembered posting combinations per payee.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum number of templates kept for a single payee.
pub const MAX_TEMPLATES_PER_PAYEE: usize = 5;

/// One posting of a template, as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePosting {
    pub account: String,
    pub amount: Option<String>,
    pub commodity: Option<String>,
}

/// A posting combination previously used with a payee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub payee: String,
    pub postings: Vec<TemplatePosting>,
    pub usage_count: u64,
    pub last_used_date: Option<String>,
}

/// Order-independent signature of a posting list: the sorted account names
/// joined with `|`.
pub fn template_key(postings: &[TemplatePosting]) -> String {
    let mut accounts: Vec<&str> = postings.iter().map(|p| p.account.as_str()).collect();
    accounts.sort_unstable();
    accounts.join("|")
}

/// Evict templates until at most `cap` remain, returning the evicted keys.
///
/// The victim is the template with the lowest usage count; ties go to the
/// oldest `last_used_date` (a missing date is oldest), then to the smallest
/// key.
pub(crate) fn enforce_cap(templates: &mut BTreeMap<String, Template>, cap: usize) -> Vec<String> {
    let mut evicted = Vec::new();
    while templates.len() > cap {
        let victim = templates
            .iter()
            .min_by(|(key_a, a), (key_b, b)| {
                a.usage_count
                    .cmp(&b.usage_count)
                    .then_with(|| a.last_used_date.cmp(&b.last_used_date))
                    .then_with(|| key_a.cmp(key_b))
            })
            .map(|(key, _)| key.clone());
        let Some(victim) = victim else {
            break;
        };
        templates.remove(&victim);
        evicted.push(victim);
    }
    evicted
}
