//! Ledger parser implementation

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::directives::{AccountDetails, Directive, MetadataBlock, Posting, SpannedDirective, Transaction};
use crate::error::ParseError;
use crate::types::{account_root, account_segments, Amount, Meta, Price, SpanInfo};

/// Keywords of ledger directives that carry nothing for the analysis
const IGNORED_DIRECTIVES: &[&str] = &[
    "include", "commodity", "payee", "tag", "alias", "apply", "end", "year", "bucket",
    "define", "assert", "check", "capture", "def", "eval", "expr", "python", "value",
    "P", "D", "Y", "N", "A", "C", "I", "O", "i", "o", "b", "h", "=", "~",
];

/// Directives and per-entry issues collected in one pass over the text
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub directives: Vec<SpannedDirective>,
    pub issues: Vec<ParseError>,
}

impl ParseOutput {
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.directives.iter().filter_map(|d| match &d.data {
            Directive::Transaction(txn) => Some(txn),
            _ => None,
        })
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountDetails> {
        self.directives.iter().filter_map(|d| match &d.data {
            Directive::Account(account) => Some(account),
            _ => None,
        })
    }

    pub fn metadata_blocks(&self) -> impl Iterator<Item = (&MetadataBlock, SpanInfo)> {
        self.directives.iter().filter_map(|d| match &d.data {
            Directive::Metadata(block) => Some((block, d.span)),
            _ => None,
        })
    }
}

/// Line-based parser for ledger-cli style files
pub struct LedgerParser;

impl LedgerParser {
    /// Parse ledger content.
    ///
    /// Malformed entries are reported in `issues` and skipped; the rest of
    /// the text is still parsed.
    pub fn parse(content: &str) -> ParseOutput {
        let lines: Vec<&str> = content.lines().map(str::trim_end).collect();
        let mut output = ParseOutput::default();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();
            // Line number is 1-indexed (i starts from 0)
            let line_number = i + 1;

            if trimmed.is_empty() {
                i += 1;
                continue;
            }

            if line == "---" {
                let (block, consumed) = Self::collect_metadata(&lines, i);
                output.directives.push(SpannedDirective {
                    data: Directive::Metadata(block),
                    span: SpanInfo { start: line_number, end: line_number + consumed - 1 },
                });
                i += consumed;
                continue;
            }

            if Self::is_comment_line(line) {
                i += 1;
                continue;
            }

            if line == "comment" || line == "test" {
                i += Self::skip_comment_block(&lines, i);
                continue;
            }

            if line.starts_with(char::is_whitespace) {
                output.issues.push(ParseError::SyntaxError {
                    line: line_number,
                    message: "indented line outside of a transaction or account declaration".to_string(),
                });
                i += 1;
                continue;
            }

            let block_len = Self::block_len(&lines, i);
            let block = &lines[i..i + block_len];
            let span = SpanInfo { start: line_number, end: line_number + block_len - 1 };

            if Self::date_regex().is_match(trimmed) {
                match Self::parse_transaction(block, line_number) {
                    Ok(txn) => output.directives.push(SpannedDirective { data: Directive::Transaction(txn), span }),
                    Err(e) => {
                        log::warn!(target: "ledgerlens::parser", "Skipping transaction: {}", e);
                        output.issues.push(e);
                    }
                }
            } else if let Some(rest) = Self::strip_keyword(trimmed, "account") {
                match Self::parse_account(rest, block, line_number) {
                    Ok(account) => output.directives.push(SpannedDirective { data: Directive::Account(account), span }),
                    Err(e) => {
                        log::warn!(target: "ledgerlens::parser", "Skipping account declaration: {}", e);
                        output.issues.push(e);
                    }
                }
            } else if Self::is_ignored_directive(trimmed) {
                log::debug!(target: "ledgerlens::parser", "Ignoring directive at line {}: {}", line_number, trimmed);
            } else if Self::is_valid_account(Self::split_comment(trimmed).0.trim()) {
                // Bare account path on its own line
                match Self::parse_account(trimmed, block, line_number) {
                    Ok(account) => output.directives.push(SpannedDirective { data: Directive::Account(account), span }),
                    Err(e) => output.issues.push(e),
                }
            } else {
                output.issues.push(ParseError::SyntaxError {
                    line: line_number,
                    message: format!("unrecognised line '{}'", trimmed),
                });
            }

            i += block_len;
        }

        output
    }

    fn date_regex() -> &'static Regex {
        static DATE_PATTERN: OnceCell<Regex> = OnceCell::new();
        DATE_PATTERN.get_or_init(|| Regex::new(r"^\d{4}[-/.]\d{1,2}[-/.]\d{1,2}").expect("valid date regex"))
    }

    fn is_comment_line(line: &str) -> bool {
        matches!(line.chars().next(), Some(';' | '#' | '%' | '|' | '*'))
    }

    fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
        let rest = line.strip_prefix(keyword)?;
        if rest.starts_with(char::is_whitespace) {
            Some(rest.trim())
        } else {
            None
        }
    }

    fn is_ignored_directive(line: &str) -> bool {
        let keyword = line.split_whitespace().next().unwrap_or_default();
        IGNORED_DIRECTIVES.contains(&keyword) || keyword.starts_with('!') || keyword.starts_with('@')
    }

    /// Number of lines in the entry starting at `start`: the line itself plus
    /// the indented lines that follow it
    fn block_len(lines: &[&str], start: usize) -> usize {
        let mut len = 1;
        for line in &lines[start + 1..] {
            if !line.trim().is_empty() && line.starts_with(char::is_whitespace) {
                len += 1;
            } else {
                break;
            }
        }
        len
    }

    fn skip_comment_block(lines: &[&str], start: usize) -> usize {
        let end_marker = format!("end {}", lines[start].trim());
        lines[start + 1..]
            .iter()
            .position(|line| line.trim() == end_marker)
            .map(|pos| pos + 2)
            .unwrap_or(lines.len() - start)
    }

    /// Collect a `---` fenced YAML block. An unterminated fence only consumes
    /// its own line so the rest of the file still parses.
    fn collect_metadata(lines: &[&str], start: usize) -> (MetadataBlock, usize) {
        match lines[start + 1..].iter().position(|line| *line == "---") {
            Some(pos) => {
                let yaml = lines[start + 1..start + 1 + pos].join("\n");
                (MetadataBlock { yaml, terminated: true }, pos + 2)
            }
            None => (MetadataBlock { yaml: String::new(), terminated: false }, 1),
        }
    }

    /// Split `text ; comment` into its parts
    fn split_comment(text: &str) -> (&str, Option<&str>) {
        match text.find(';') {
            Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
            None => (text, None),
        }
    }

    /// Parse a transaction header and its indented postings
    fn parse_transaction(block: &[&str], line_number: usize) -> Result<Transaction, ParseError> {
        static TXN_HEADER: OnceCell<Regex> = OnceCell::new();
        let header_regex = TXN_HEADER.get_or_init(|| {
            Regex::new(r"^(\d{4}[-/.]\d{1,2}[-/.]\d{1,2})(?:=(\d{4}[-/.]\d{1,2}[-/.]\d{1,2}))?(?:\s+|$)([*!])?\s*(?:\(([^)]*)\))?\s*(.*)$")
                .expect("valid transaction header regex")
        });

        let header = block[0].trim();
        let caps = header_regex.captures(header).ok_or_else(|| ParseError::SyntaxError {
            line: line_number,
            message: format!("malformed transaction header '{}'", header),
        })?;

        let date = Self::parse_date(&caps[1], line_number)?;
        let aux_date = caps.get(2).map(|m| Self::parse_date(m.as_str(), line_number)).transpose()?;
        let flag = caps.get(3).map(|m| m.as_str().to_string());
        let code = caps.get(4).map(|m| m.as_str().trim().to_string());
        let (description, comment) = Self::split_comment(caps.get(5).map_or("", |m| m.as_str()));

        let mut tags = Vec::new();
        let mut meta = Meta::default();
        if let Some(comment) = comment {
            Self::apply_comment(comment, &mut tags, &mut meta);
        }

        let mut postings: Vec<Posting> = Vec::new();
        for (offset, raw) in block[1..].iter().enumerate() {
            let posting_line = line_number + offset + 1;
            let trimmed = raw.trim();

            if let Some(comment) = trimmed.strip_prefix(';') {
                // Comment lines annotate the previous posting, or the transaction itself
                match postings.last_mut() {
                    Some(posting) => Self::apply_comment(comment, &mut posting.tags, &mut posting.meta),
                    None => Self::apply_comment(comment, &mut tags, &mut meta),
                }
                continue;
            }

            postings.push(Self::parse_posting(trimmed, posting_line)?);
        }

        if postings.is_empty() {
            return Err(ParseError::SyntaxError {
                line: line_number,
                message: "transaction has no postings".to_string(),
            });
        }

        Ok(Transaction {
            date,
            aux_date,
            flag,
            code,
            description: description.trim().to_string(),
            postings,
            tags,
            meta,
            line: line_number,
        })
    }

    /// Parse a single posting line: `[FLAG] ACCOUNT  [AMOUNT] [@ PRICE] [= ASSERTION] [; COMMENT]`
    fn parse_posting(line: &str, line_number: usize) -> Result<Posting, ParseError> {
        let (body, comment) = Self::split_comment(line);
        let mut body = body.trim();

        let mut flag = None;
        if let Some(first @ ('*' | '!')) = body.chars().next() {
            flag = Some(first.to_string());
            body = body[1..].trim_start();
        }

        // The account ends at the first tab or run of two spaces
        let separator = [body.find('\t'), body.find("  ")].into_iter().flatten().min();
        let (account, amount_text) = match separator {
            Some(pos) => (body[..pos].trim(), body[pos..].trim()),
            None => (body, ""),
        };

        if account.starts_with('(') || account.starts_with('[') {
            return Err(ParseError::UnsupportedPosting {
                line: line_number,
                message: format!("virtual posting '{}'", account),
            });
        }
        if !Self::is_valid_account(account) {
            return Err(ParseError::InvalidAccount { line: line_number, value: account.to_string() });
        }

        // Balance assertions are not checked
        let amount_text = amount_text.split('=').next().unwrap_or_default().trim();

        let (amount_part, price) = if let Some(pos) = amount_text.find("@@") {
            let total = Self::parse_amount_at(&amount_text[pos + 2..], line_number)?;
            (&amount_text[..pos], Some(Price::Total(total)))
        } else if let Some(pos) = amount_text.find('@') {
            let unit = Self::parse_amount_at(&amount_text[pos + 1..], line_number)?;
            (&amount_text[..pos], Some(Price::Single(unit)))
        } else {
            (amount_text, None)
        };

        let amount_part = amount_part.trim();
        let amount = if amount_part.is_empty() {
            None
        } else {
            Some(Self::parse_amount_at(amount_part, line_number)?)
        };

        if amount.is_none() && price.is_some() {
            return Err(ParseError::InvalidAmount { line: line_number, value: amount_text.to_string() });
        }

        let mut tags = Vec::new();
        let mut meta = Meta::default();
        if let Some(comment) = comment {
            Self::apply_comment(comment, &mut tags, &mut meta);
        }

        Ok(Posting {
            flag,
            account: account.to_string(),
            amount,
            price,
            tags,
            meta,
        })
    }

    /// Parse an `account` declaration and its sub-directives
    fn parse_account(header: &str, block: &[&str], line_number: usize) -> Result<AccountDetails, ParseError> {
        let (path, comment) = Self::split_comment(header);
        let path = path.trim();
        if !Self::is_valid_account(path) {
            return Err(ParseError::InvalidAccount { line: line_number, value: path.to_string() });
        }

        let mut details = AccountDetails::new(path, line_number);
        let mut tags = Vec::new();
        if let Some(comment) = comment {
            Self::apply_comment(comment, &mut tags, &mut details.meta);
        }

        for (offset, raw) in block[1..].iter().enumerate() {
            let sub_line = line_number + offset + 1;
            let trimmed = raw.trim();

            if let Some(comment) = trimmed.strip_prefix(';') {
                Self::apply_comment(comment, &mut tags, &mut details.meta);
                continue;
            }

            let (keyword, value) = match trimmed.split_once(char::is_whitespace) {
                Some((keyword, value)) => (keyword, value.trim()),
                None => (trimmed, ""),
            };
            match keyword {
                "alias" => details.alias = Some(value.to_string()),
                "note" => details.note = Some(value.to_string()),
                "currency" | "commodity" => details.currency = Some(value.trim_matches('"').to_string()),
                "opening" => details.opening_balance = Some(Self::parse_amount_at(value, sub_line)?),
                _ => {
                    log::debug!(target: "ledgerlens::parser", "Ignoring account sub-directive '{}' at line {}", keyword, sub_line);
                }
            }
        }

        if details.currency.is_none() {
            details.currency = details.meta.get("currency").map(str::to_string);
        }
        if details.opening_balance.is_none() {
            if let Some(opening) = details.meta.get("opening").map(str::to_string) {
                details.opening_balance = Some(Self::parse_amount_at(&opening, line_number)?);
            }
        }

        Ok(details)
    }

    /// Apply a comment to tags (`:a:b:`) or metadata (`key: value`)
    fn apply_comment(comment: &str, tags: &mut Vec<String>, meta: &mut Meta) {
        static TAGS: OnceCell<Regex> = OnceCell::new();
        static META: OnceCell<Regex> = OnceCell::new();
        let tags_regex = TAGS.get_or_init(|| Regex::new(r"^:(?:[^:\s]+:)+$").expect("valid tags regex"));
        let meta_regex = META.get_or_init(|| Regex::new(r"^([A-Za-z_][\w-]*)::?\s*(.*)$").expect("valid meta regex"));

        let text = comment.trim();
        if tags_regex.is_match(text) {
            for tag in text.split(':').filter(|t| !t.is_empty()) {
                if !tags.iter().any(|existing| existing == tag) {
                    tags.push(tag.to_string());
                }
            }
        } else if let Some(caps) = meta_regex.captures(text) {
            meta.insert(caps[1].to_string(), caps[2].trim().trim_matches('"').to_string());
        }
    }

    fn parse_date(date_str: &str, line_number: usize) -> Result<NaiveDate, ParseError> {
        let normalized = date_str.replace(['/', '.'], "-");
        NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").map_err(|_| ParseError::InvalidDate {
            line: line_number,
            value: date_str.to_string(),
        })
    }

    fn parse_amount_at(text: &str, line_number: usize) -> Result<Amount, ParseError> {
        parse_amount(text).ok_or_else(|| ParseError::InvalidAmount {
            line: line_number,
            value: text.trim().to_string(),
        })
    }

    /// Check if a string is usable as an account path
    pub fn is_valid_account(path: &str) -> bool {
        if path.is_empty() || path.contains('\t') || path.contains("  ") || path != path.trim() {
            return false;
        }
        let root = account_root(path);
        root.chars().next().map_or(false, char::is_alphabetic)
            && !root.contains(char::is_whitespace)
            && account_segments(path).iter().all(|segment| !segment.trim().is_empty())
    }
}

/// Parse an amount such as `$100.00`, `-$5`, `1,250.50 MXN`, `MXN 100` or `42`
pub fn parse_amount(text: &str) -> Option<Amount> {
    static PREFIX: OnceCell<Regex> = OnceCell::new();
    static SUFFIX: OnceCell<Regex> = OnceCell::new();
    let prefix_regex = PREFIX.get_or_init(|| {
        Regex::new(r"^(-)?\s*([^\d\s+\-.,;@=()]+)\s*([-+]?(?:\d[\d,]*(?:\.\d+)?|\.\d+))$").expect("valid prefix amount regex")
    });
    let suffix_regex = SUFFIX.get_or_init(|| {
        Regex::new(r"^([-+]?(?:\d[\d,]*(?:\.\d+)?|\.\d+))\s*([^\d\s+\-.,;@=()]*)$").expect("valid suffix amount regex")
    });

    let text = text.trim();
    if let Some(caps) = prefix_regex.captures(text) {
        let mut quantity = parse_number(&caps[3])?;
        if caps.get(1).is_some() {
            quantity = -quantity;
        }
        return Some(Amount::new(quantity, &caps[2]));
    }
    if let Some(caps) = suffix_regex.captures(text) {
        let quantity = parse_number(&caps[1])?;
        return Some(Amount::new(quantity, &caps[2]));
    }
    None
}

fn parse_number(text: &str) -> Option<Decimal> {
    let cleaned = text.replace(',', "");
    Decimal::from_str(cleaned.trim_start_matches('+')).ok()
}

// ==================== Tests ====================
