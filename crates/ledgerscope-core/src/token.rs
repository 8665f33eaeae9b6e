//! Typed ledger tokens and a line-oriented tokenizer.
//!
//! The index builder consumes an ordered sequence of [`Token`]s and never
//! looks at file text itself. [`tokenize`] is a small hledger-style line
//! classifier that produces that sequence; any other producer of tokens can
//! be plugged in instead.
//!
//! ## Recognised lines
//!
//! ```text
//! 2024-03-01 * (42) Grocery Store | weekly  ; trip:japan
//!     Expenses:Food        $12.50  ; meal:lunch
//!     Assets:Cash
//! account Assets:Cash
//! alias checking = Assets:Bank:Checking
//! commodity 1,000.00 EUR
//!     format 1.000,00 EUR
//! decimal-mark ,
//! D $1,000.00
//! payee Grocery Store
//! tag trip
//! include accounts/2024.journal
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a tokenized line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    TransactionStart,
    Posting,
    IncludeDirective,
    AliasDirective,
    CommodityDirective,
    FormatDirective,
    DecimalMarkDirective,
    DefaultCommodityDirective,
    AccountDirective,
    PayeeDirective,
    TagDirective,
    Empty,
    Comment,
    #[default]
    Unknown,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::TransactionStart => "transaction-start",
            TokenKind::Posting => "posting",
            TokenKind::IncludeDirective => "include",
            TokenKind::AliasDirective => "alias",
            TokenKind::CommodityDirective => "commodity",
            TokenKind::FormatDirective => "format",
            TokenKind::DecimalMarkDirective => "decimal-mark",
            TokenKind::DefaultCommodityDirective => "default-commodity",
            TokenKind::AccountDirective => "account",
            TokenKind::PayeeDirective => "payee",
            TokenKind::TagDirective => "tag",
            TokenKind::Empty => "empty",
            TokenKind::Comment => "comment",
            TokenKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One classified source line with the fields extracted from it.
///
/// Which fields are populated depends on [`kind`](Token::kind); everything
/// else stays `None` or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Account name (postings, `account` directives).
    pub account: Option<String>,
    /// Numeric part of a posting amount, e.g. `-12.50`.
    pub amount: Option<String>,
    /// Commodity attached to the amount, e.g. `$` or `EUR`.
    pub commodity: Option<String>,
    /// Transaction description or `payee` directive argument.
    pub payee: Option<String>,
    /// Tag name to observed values, from inline comments or `tag` directives.
    pub tags: BTreeMap<String, Vec<String>>,
    /// `alias FROM = TO` pair.
    pub alias: Option<(String, String)>,
    /// Symbol named by `commodity` / `D` directives.
    pub commodity_symbol: Option<String>,
    /// Sample amount used as a number-formatting template.
    pub format: Option<String>,
    pub decimal_mark: Option<char>,
    /// The trimmed source line.
    pub raw: String,
}

impl Token {
    /// Create a token of the given kind with only the raw line set.
    pub fn new(kind: TokenKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            ..Default::default()
        }
    }

    /// A transaction header token.
    pub fn transaction(raw: impl Into<String>, payee: Option<&str>) -> Self {
        Self {
            payee: payee.map(str::to_string),
            ..Self::new(TokenKind::TransactionStart, raw)
        }
    }

    /// A posting token with an optional amount and commodity.
    pub fn posting(account: &str, amount: Option<&str>, commodity: Option<&str>) -> Self {
        Self {
            account: Some(account.to_string()),
            amount: amount.map(str::to_string),
            commodity: commodity.map(str::to_string),
            ..Self::new(TokenKind::Posting, account)
        }
    }

    /// Attach a tag (and optional value) to this token.
    pub fn with_tag(mut self, name: &str, value: Option<&str>) -> Self {
        let values = self.tags.entry(name.to_string()).or_default();
        if let Some(value) = value {
            values.push(value.to_string());
        }
        self
    }

    /// The path argument of an `include` / `!include` directive.
    pub fn include_target(&self) -> Option<&str> {
        if self.kind != TokenKind::IncludeDirective {
            return None;
        }
        let line = self.raw.strip_prefix('!').unwrap_or(&self.raw);
        let rest = line.strip_prefix("include")?;
        let target = split_comment(rest).0.trim();
        if target.is_empty() { None } else { Some(target) }
    }
}

/// What kind of entry the indented lines currently belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Transaction,
    Commodity,
    CommentBlock,
    Other,
}

/// Tokenize a whole journal into one token per line.
pub fn tokenize(content: &str) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new();
    content.lines().map(|line| tokenizer.line(line)).collect()
}

/// Stateful line classifier.
///
/// Indented lines are interpreted relative to the last top-level line, so
/// the tokenizer remembers which block it is in.
#[derive(Debug)]
pub struct Tokenizer {
    block: Block,
    commodity: Option<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            block: Block::None,
            commodity: None,
        }
    }

    /// Classify the next source line.
    pub fn line(&mut self, line: &str) -> Token {
        let raw = line.trim();

        if self.block == Block::CommentBlock {
            if raw == "end comment" {
                self.block = Block::None;
            }
            return Token::new(TokenKind::Comment, raw);
        }

        if raw.is_empty() {
            self.block = Block::None;
            return Token::new(TokenKind::Empty, raw);
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            return self.indented(raw);
        }

        self.block = Block::Other;
        self.commodity = None;

        if raw.starts_with([';', '#', '*', '%']) {
            self.block = Block::None;
            return Token::new(TokenKind::Comment, raw);
        }
        if raw == "comment" {
            self.block = Block::CommentBlock;
            return Token::new(TokenKind::Comment, raw);
        }
        if raw.starts_with(|c: char| c.is_ascii_digit()) {
            self.block = Block::Transaction;
            return transaction_token(raw);
        }

        self.directive(raw)
    }

    fn indented(&mut self, raw: &str) -> Token {
        if raw.starts_with([';', '#']) {
            return Token::new(TokenKind::Comment, raw);
        }
        match self.block {
            Block::Transaction => posting_token(raw),
            Block::Commodity => match directive_arg(raw, "format") {
                Some(sample) => Token {
                    commodity_symbol: self.commodity.clone(),
                    format: non_empty(sample),
                    ..Token::new(TokenKind::CommodityDirective, raw)
                },
                None => Token::new(TokenKind::Unknown, raw),
            },
            _ => Token::new(TokenKind::Unknown, raw),
        }
    }

    fn directive(&mut self, raw: &str) -> Token {
        // The target is read back from the raw line by `include_target`.
        if directive_arg(raw, "include").is_some() || directive_arg(raw, "!include").is_some() {
            return Token::new(TokenKind::IncludeDirective, raw);
        }

        if let Some(arg) = directive_arg(raw, "account") {
            let (body, _) = split_comment(arg);
            let (name, _) = split_account(body);
            return Token {
                account: non_empty(name),
                ..Token::new(TokenKind::AccountDirective, raw)
            };
        }

        if let Some(arg) = directive_arg(raw, "alias") {
            let alias = arg.split_once('=').and_then(|(from, to)| {
                let (from, to) = (from.trim(), to.trim());
                if from.is_empty() || to.is_empty() {
                    None
                } else {
                    Some((from.to_string(), to.to_string()))
                }
            });
            return Token {
                alias,
                ..Token::new(TokenKind::AliasDirective, raw)
            };
        }

        if let Some(arg) = directive_arg(raw, "commodity") {
            let (body, _) = split_comment(arg);
            let body = body.trim();
            let (symbol, format) = match parse_amount(body) {
                Some((_, commodity)) => (commodity, non_empty(body)),
                None => (non_empty(body.trim_matches('"')), None),
            };
            self.block = Block::Commodity;
            self.commodity = symbol.clone();
            return Token {
                commodity_symbol: symbol,
                format,
                ..Token::new(TokenKind::CommodityDirective, raw)
            };
        }

        if let Some(arg) = directive_arg(raw, "format") {
            return Token {
                format: non_empty(split_comment(arg).0),
                ..Token::new(TokenKind::FormatDirective, raw)
            };
        }

        if let Some(arg) = directive_arg(raw, "decimal-mark") {
            return Token {
                decimal_mark: arg.chars().next(),
                ..Token::new(TokenKind::DecimalMarkDirective, raw)
            };
        }

        if let Some(arg) = directive_arg(raw, "D") {
            let sample = split_comment(arg).0.trim();
            let commodity = parse_amount(sample).and_then(|(_, commodity)| commodity);
            return Token {
                commodity: commodity.clone(),
                commodity_symbol: commodity,
                format: non_empty(sample),
                ..Token::new(TokenKind::DefaultCommodityDirective, raw)
            };
        }

        if let Some(arg) = directive_arg(raw, "payee") {
            return Token {
                payee: non_empty(split_comment(arg).0),
                ..Token::new(TokenKind::PayeeDirective, raw)
            };
        }

        if let Some(arg) = directive_arg(raw, "tag") {
            let mut token = Token::new(TokenKind::TagDirective, raw);
            if let Some(name) = split_comment(arg).0.split_whitespace().next() {
                token.tags.insert(name.to_string(), Vec::new());
            }
            return token;
        }

        Token::new(TokenKind::Unknown, raw)
    }
}

fn transaction_token(raw: &str) -> Token {
    let (body, comment) = split_comment(raw);

    // Skip the date (and any `=secondary` date glued to it).
    let date_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let mut rest = body[date_end..].trim_start();

    if let Some(stripped) = rest.strip_prefix(['*', '!']) {
        rest = stripped.trim_start();
    }
    if rest.starts_with('(')
        && let Some(close) = rest.find(')')
    {
        rest = rest[close + 1..].trim_start();
    }

    let description = rest.split('|').next().unwrap_or("");
    Token {
        payee: non_empty(description),
        tags: comment.map(parse_tags).unwrap_or_default(),
        ..Token::new(TokenKind::TransactionStart, raw)
    }
}

fn posting_token(raw: &str) -> Token {
    let (body, comment) = split_comment(raw);
    let mut body = body.trim();
    if let Some(stripped) = body.strip_prefix(['*', '!'])
        && stripped.starts_with(char::is_whitespace)
    {
        body = stripped.trim_start();
    }

    let (account, amount_text) = split_account(body);
    let account = strip_virtual(account.trim());

    let amount_text = amount_text
        .split(['@', '='])
        .next()
        .unwrap_or("")
        .trim();
    let (amount, commodity) = match parse_amount(amount_text) {
        Some((number, commodity)) => (Some(number), commodity),
        None => (None, None),
    };

    Token {
        account: Some(account.to_string()),
        amount,
        commodity,
        tags: comment.map(parse_tags).unwrap_or_default(),
        ..Token::new(TokenKind::Posting, raw)
    }
}

/// Return the argument following `keyword` if the line starts with it as a
/// whole word.
fn directive_arg<'a>(raw: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = raw.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Split a line at its first `;` into body and comment text.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.split_once(';') {
        Some((body, comment)) => (body.trim_end(), Some(comment)),
        None => (line, None),
    }
}

/// Account names end at two consecutive spaces or a tab.
fn split_account(body: &str) -> (&str, &str) {
    let end = [body.find("  "), body.find('\t')]
        .into_iter()
        .flatten()
        .min();
    match end {
        Some(idx) => (&body[..idx], &body[idx..]),
        None => (body, ""),
    }
}

fn strip_virtual(account: &str) -> &str {
    let unwrapped = account
        .strip_prefix('(')
        .and_then(|a| a.strip_suffix(')'))
        .or_else(|| account.strip_prefix('[').and_then(|a| a.strip_suffix(']')));
    unwrapped.unwrap_or(account).trim()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Split an amount like `$-12.50`, `1.000,00 EUR` or `10 "AAPL 2"` into its
/// numeric text and commodity. Returns `None` when there is no digit.
pub(crate) fn parse_amount(text: &str) -> Option<(String, Option<String>)> {
    let text = text.trim();
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut number = String::new();
    let mut commodity = String::new();
    let mut in_word = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for quoted in chars.by_ref() {
                    if quoted == '"' {
                        break;
                    }
                    commodity.push(quoted);
                }
                in_word = false;
            }
            c if c.is_whitespace() => in_word = false,
            c if c.is_ascii_digit() && in_word => commodity.push(c),
            c if c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+') => number.push(c),
            c => {
                in_word = c.is_alphabetic();
                commodity.push(c);
            }
        }
    }

    if !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let commodity = commodity.trim();
    let commodity = if commodity.is_empty() {
        None
    } else {
        Some(commodity.to_string())
    };
    Some((number, commodity))
}

/// Extract `name:value` tags from comment text.
///
/// Tags are comma separated; the tag name is the last word before the first
/// colon of each part.
pub(crate) fn parse_tags(comment: &str) -> BTreeMap<String, Vec<String>> {
    let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for part in comment.split(',') {
        let Some((head, value)) = part.split_once(':') else {
            continue;
        };
        if head.ends_with(char::is_whitespace) {
            continue;
        }
        let Some(name) = head.split_whitespace().last() else {
            continue;
        };
        let values = tags.entry(name.to_string()).or_default();
        let value = value.trim();
        if !value.is_empty() && !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    tags
}
