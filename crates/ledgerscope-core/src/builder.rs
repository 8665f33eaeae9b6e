//! Knowledge builder: turns one file's token stream into index data.
//!
//! The builder never fails: tokens it cannot use are skipped. Include
//! directives are left to the include resolver, which feeds the included
//! file's data back through [`IndexBuilder::absorb`] at the point where the
//! directive appeared.

use std::collections::BTreeMap;

use tracing::trace;

use crate::index::{IndexData, KnowledgeIndex, payee_account_key, tag_value_key};
use crate::merge;
use crate::template::{
    MAX_TEMPLATES_PER_PAYEE, Template, TemplatePosting, enforce_cap, template_key,
};
use crate::token::{Token, TokenKind, tokenize};

/// Build an index from a token sequence. Include directives are ignored.
pub fn build_index(tokens: &[Token]) -> KnowledgeIndex {
    let mut builder = IndexBuilder::new();
    for token in tokens {
        builder.apply(token);
    }
    KnowledgeIndex::from_data(builder.finish())
}

/// Tokenize and index journal text in one step. Include directives are ignored.
pub fn build_index_from_str(content: &str) -> KnowledgeIndex {
    build_index(&tokenize(content))
}

/// Transient state while scanning one token stream.
#[derive(Debug, Default)]
struct BuildingContext {
    in_transaction: bool,
    payee: Option<String>,
    postings: Vec<TemplatePosting>,
    date: Option<String>,
    /// `format` directive waiting for the next `commodity` directive.
    pending_format: Option<String>,
}

/// Mutable accumulator for a single file.
#[derive(Debug, Default)]
pub(crate) struct IndexBuilder {
    data: IndexData,
    ctx: BuildingContext,
}

impl IndexBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one token.
    pub(crate) fn apply(&mut self, token: &Token) {
        match token.kind {
            TokenKind::TransactionStart => self.start_transaction(token),
            TokenKind::Posting => self.posting(token),
            TokenKind::AccountDirective => {
                if let Some(account) = complete_account(token.account.as_deref()) {
                    self.data.accounts.insert(account.to_string());
                    self.data.defined_accounts.insert(account.to_string());
                }
            }
            TokenKind::AliasDirective => {
                // First definition wins, here and across includes.
                if let Some((from, to)) = &token.alias {
                    self.data
                        .aliases
                        .entry(from.clone())
                        .or_insert_with(|| to.clone());
                }
            }
            TokenKind::CommodityDirective => self.commodity_directive(token),
            TokenKind::FormatDirective => {
                if let Some(format) = non_blank(token.format.as_deref()) {
                    self.ctx.pending_format = Some(format.to_string());
                }
            }
            TokenKind::DecimalMarkDirective => {
                merge::first_wins(&mut self.data.decimal_mark, &token.decimal_mark);
            }
            TokenKind::DefaultCommodityDirective => self.default_commodity(token),
            TokenKind::PayeeDirective => {
                if let Some(payee) = non_blank(token.payee.as_deref()) {
                    self.data.payees.insert(payee.to_string());
                }
            }
            TokenKind::TagDirective => {
                for name in token.tags.keys() {
                    if let Some(name) = non_blank(Some(name)) {
                        self.data.tags.insert(name.to_string());
                    }
                }
            }
            TokenKind::IncludeDirective
            | TokenKind::Empty
            | TokenKind::Comment
            | TokenKind::Unknown => {}
        }
    }

    /// Merge an included file's data at the current position.
    pub(crate) fn absorb(&mut self, included: &IndexData) {
        merge::merge_into(&mut self.data, included);
    }

    /// Close any open transaction and hand back the data.
    pub(crate) fn finish(mut self) -> IndexData {
        self.finalize_transaction();
        self.data
    }

    fn start_transaction(&mut self, token: &Token) {
        self.finalize_transaction();

        let date = extract_date(&token.raw);
        merge::keep_greatest(&mut self.data.last_date, &date);

        let payee = non_blank(token.payee.as_deref()).map(str::to_string);
        if let Some(payee) = &payee {
            self.data.payees.insert(payee.clone());
            bump(&mut self.data.payee_usage, payee);
        }
        self.record_tags(token);

        self.ctx.in_transaction = true;
        self.ctx.payee = payee;
        self.ctx.date = date;
    }

    fn posting(&mut self, token: &Token) {
        self.record_tags(token);

        let Some(account) = complete_account(token.account.as_deref()) else {
            return;
        };
        let account = account.to_string();

        self.data.accounts.insert(account.clone());
        self.data.used_accounts.insert(account.clone());
        bump(&mut self.data.account_usage, &account);

        if self.ctx.in_transaction
            && let Some(payee) = &self.ctx.payee
        {
            self.data
                .payee_accounts
                .entry(payee.clone())
                .or_default()
                .insert(account.clone());
            bump(
                &mut self.data.payee_account_pair_usage,
                &payee_account_key(payee, &account),
            );
        }

        let amount = non_blank(token.amount.as_deref()).map(str::to_string);
        let commodity = non_blank(token.commodity.as_deref()).map(str::to_string);

        if amount.is_some() {
            self.data.amount_accounts.insert(account.clone());
            if let Some(commodity) = &commodity {
                self.data.commodities.insert(commodity.clone());
                bump(&mut self.data.commodity_usage, commodity);
            }
        }

        if self.ctx.in_transaction {
            self.ctx.postings.push(TemplatePosting {
                account,
                amount,
                commodity,
            });
        }
    }

    fn commodity_directive(&mut self, token: &Token) {
        let staged = self.ctx.pending_format.take();
        let symbol = non_blank(token.commodity_symbol.as_deref())
            .or_else(|| non_blank(token.commodity.as_deref()));
        let Some(symbol) = symbol else {
            return;
        };

        self.data.commodities.insert(symbol.to_string());
        let format = non_blank(token.format.as_deref())
            .map(str::to_string)
            .or(staged);
        if let Some(format) = format {
            self.data
                .commodity_formats
                .entry(symbol.to_string())
                .or_insert(format);
        }
    }

    fn default_commodity(&mut self, token: &Token) {
        let symbol = non_blank(token.commodity_symbol.as_deref())
            .or_else(|| non_blank(token.commodity.as_deref()));
        let Some(symbol) = symbol else {
            return;
        };

        merge::first_wins(&mut self.data.default_commodity, &Some(symbol.to_string()));
        self.data.commodities.insert(symbol.to_string());
        if let Some(format) = non_blank(token.format.as_deref()) {
            self.data
                .commodity_formats
                .entry(symbol.to_string())
                .or_insert_with(|| format.to_string());
        }
    }

    fn record_tags(&mut self, token: &Token) {
        for (name, values) in &token.tags {
            let Some(name) = non_blank(Some(name)) else {
                continue;
            };
            self.data.tags.insert(name.to_string());
            bump(&mut self.data.tag_usage, name);

            for value in values {
                let Some(value) = non_blank(Some(value)) else {
                    continue;
                };
                self.data
                    .tag_values
                    .entry(name.to_string())
                    .or_default()
                    .insert(value.to_string());
                bump(&mut self.data.tag_value_usage, &tag_value_key(name, value));
            }
        }
    }

    /// Turn the open transaction into a template, if it has at least two
    /// postings and a payee.
    fn finalize_transaction(&mut self) {
        let ctx = std::mem::take(&mut self.ctx);
        self.ctx.pending_format = ctx.pending_format;

        if !ctx.in_transaction || ctx.postings.len() < 2 {
            return;
        }
        let Some(payee) = ctx.payee else {
            return;
        };

        let key = template_key(&ctx.postings);
        let templates = self
            .data
            .transaction_templates
            .entry(payee.clone())
            .or_default();

        match templates.get_mut(&key) {
            Some(existing) => {
                existing.usage_count += 1;
                existing.postings = ctx.postings;
                existing.last_used_date = ctx.date;
            }
            None => {
                templates.insert(
                    key,
                    Template {
                        payee: payee.clone(),
                        postings: ctx.postings,
                        usage_count: 1,
                        last_used_date: ctx.date,
                    },
                );
                let evicted = enforce_cap(templates, MAX_TEMPLATES_PER_PAYEE);
                if !evicted.is_empty() {
                    trace!(payee = %payee, evicted = ?evicted, "template cap reached");
                }
            }
        }
    }
}

/// An account that is empty or ends with `:` is still being typed.
fn complete_account(account: Option<&str>) -> Option<&str> {
    let account = account?.trim();
    if account.is_empty() || account.ends_with(':') {
        None
    } else {
        Some(account)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn bump(counter: &mut BTreeMap<String, u64>, key: &str) {
    *counter.entry(key.to_string()).or_insert(0) += 1;
}

/// Extract the leading date of a transaction line.
///
/// Accepts `YYYY-MM-DD` and year-less `MM-DD`, with `-`, `/` or `.` as the
/// separator, and normalises to zero-padded `-` separated form so that
/// lexicographic order matches chronological order.
pub(crate) fn extract_date(raw: &str) -> Option<String> {
    let candidate = raw
        .split(|c: char| c.is_whitespace() || c == '=')
        .next()?;
    let separator = candidate.chars().find(|c| matches!(c, '-' | '/' | '.'))?;
    let parts: Vec<&str> = candidate.split(separator).collect();
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.len() <= 4 && p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    match parts.as_slice() {
        [year, month, day] if year.len() == 4 && month.len() <= 2 && day.len() <= 2 => {
            Some(format!("{year}-{month:0>2}-{day:0>2}"))
        }
        [month, day] if month.len() <= 2 && day.len() <= 2 => {
            Some(format!("{month:0>2}-{day:0>2}"))
        }
        _ => None,
    }
}
