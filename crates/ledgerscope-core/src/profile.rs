//! Formatting profile: the amount alignment column derived from an index.

use serde::{Deserialize, Serialize};

/// Posting indentation assumed when laying out amounts.
pub const INDENT_WIDTH: usize = 4;

/// Minimum gap between the account name and its amount.
pub const MIN_SPACING: usize = 2;

/// Amounts are never aligned left of this column.
pub const MIN_ALIGNMENT_COLUMN: usize = 40;

/// Layout statistics for postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingProfile {
    pub amount_alignment_column: usize,
    /// Longest account name among postings that carry an amount.
    pub max_account_name_length: usize,
    /// True when no amount-bearing posting has been seen.
    pub is_default_alignment: bool,
}

impl Default for FormattingProfile {
    fn default() -> Self {
        Self::from_max_length(0)
    }
}

impl FormattingProfile {
    /// Compute the profile from the accounts of amount-bearing postings.
    pub fn compute<'a, I>(amount_accounts: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let max = amount_accounts
            .into_iter()
            .map(|account| account.chars().count())
            .max()
            .unwrap_or(0);
        Self::from_max_length(max)
    }

    fn from_max_length(max_account_name_length: usize) -> Self {
        Self {
            amount_alignment_column: (INDENT_WIDTH + max_account_name_length + MIN_SPACING)
                .max(MIN_ALIGNMENT_COLUMN),
            max_account_name_length,
            is_default_alignment: max_account_name_length == 0,
        }
    }
}
