use chrono::NaiveDate;
use rust_decimal::Decimal;
use taxlens_core::{ParsedTransaction, TransactionType};

use super::{AccountKind, StatementError, StatementLayout, StatementSummary};
use crate::util::{
    clean_description, collapse_whitespace, extract_amounts, infer_year, month_to_num, parse_date,
    parse_month_day, split_trailing_amounts,
};

// ── Sections and sign conventions ────────────────────────────────────────────

/// Sub-section of a statement's transaction area. Sections with an implied
/// direction type unsigned amounts found inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    General,
    Deposits,
    Withdrawals,
    Checks,
    Payments,
    Purchases,
    Fees,
    Interest,
}

impl Section {
    pub(crate) fn direction(self) -> Option<TransactionType> {
        match self {
            Section::General => None,
            Section::Deposits | Section::Payments => Some(TransactionType::Credit),
            Section::Withdrawals
            | Section::Checks
            | Section::Purchases
            | Section::Fees
            | Section::Interest => Some(TransactionType::Debit),
        }
    }
}

/// How a layout prints direction: what a leading minus means, and what an
/// unsigned amount means when nothing else decides it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SignConvention {
    pub negative: TransactionType,
    pub unsigned: TransactionType,
}

impl SignConvention {
    /// Deposit accounts: minus is money out.
    pub(crate) const BANK: Self = Self {
        negative: TransactionType::Debit,
        unsigned: TransactionType::Credit,
    };
    /// Cards print charges unsigned and payments/refunds negative.
    pub(crate) const CARD: Self = Self {
        negative: TransactionType::Credit,
        unsigned: TransactionType::Debit,
    };
    /// Column ledgers: unsigned amounts without other evidence are spending.
    pub(crate) const LEDGER: Self = Self {
        negative: TransactionType::Debit,
        unsigned: TransactionType::Debit,
    };
}

// ── Direction keywords ───────────────────────────────────────────────────────

const CREDIT_KEYWORDS: &[&str] = &[
    "payment received",
    "payment thank you",
    "payment - thank you",
    "thank you for your payment",
    "deposit",
    "direct dep",
    "refund",
    "return credit",
    "interest paid",
    "interest earned",
    "transfer from",
    "zelle from",
    "zelle payment from",
    "credit adjustment",
    "cash back reward",
    "reversal",
];

const DEBIT_KEYWORDS: &[&str] = &[
    "purchase authorized",
    "debit card purchase",
    "pos purchase",
    "monthly service fee",
    "service charge",
    "withdrawal",
    "transfer to",
    "zelle to",
    "zelle payment to",
    "bill pay",
    "overdraft",
    "interest charge",
    "late fee",
    "annual fee",
];

/// Direction implied by the description, when exactly one keyword family
/// matches. Descriptions matching both families decide nothing.
pub(crate) fn keyword_direction(description: &str) -> Option<TransactionType> {
    let text = description.to_lowercase();
    let credit = CREDIT_KEYWORDS.iter().any(|k| contains_phrase(&text, k));
    let debit = DEBIT_KEYWORDS.iter().any(|k| contains_phrase(&text, k));
    match (credit, debit) {
        (true, false) => Some(TransactionType::Credit),
        (false, true) => Some(TransactionType::Debit),
        _ => None,
    }
}

/// `phrase` occurs in `text` as whole words, so "deposit" does not match
/// "depositphotos".
fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

// ── Noise ────────────────────────────────────────────────────────────────────

const NOISE_PREFIXES: &[&str] = &[
    "date description",
    "date check",
    "date of",
    "date posted",
    "date amount",
    "transaction date",
    "posting date",
    "post date",
    "trans date",
    "transaction merchant name",
    "merchant name",
    "account number",
    "account #",
    "continued on next page",
    "this page intentionally left blank",
];

/// Page furniture and column headers that never carry a transaction.
pub(crate) fn is_noise_line(line: &str) -> bool {
    let lower = collapse_whitespace(line).to_lowercase();
    if lower.is_empty() {
        return true;
    }
    if let Some(rest) = lower.strip_prefix("page ") {
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            return true;
        }
    }
    NOISE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

// ── Dates ────────────────────────────────────────────────────────────────────

/// Resolves the date token that opens a transaction line. Full dates parse
/// directly; month/day tokens (`12/18`, `Jan 05`) take their year from the
/// closing date, which must be known.
pub(crate) fn resolve_date(
    token: &str,
    closing: Option<NaiveDate>,
    layout: StatementLayout,
) -> Result<Option<NaiveDate>, StatementError> {
    if let Some(date) = parse_date(token) {
        return Ok(Some(date));
    }
    let Some((month, day)) = parse_month_day(token).or_else(|| parse_month_name_day(token)) else {
        return Ok(None);
    };
    let closing = closing.ok_or(StatementError::MissingStatementPeriod(layout))?;
    Ok(infer_year(month, day, closing))
}

fn parse_month_name_day(token: &str) -> Option<(u32, u32)> {
    let mut parts = token.split_whitespace();
    let month = month_to_num(parts.next()?.trim_end_matches('.'))?;
    let day: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(1..=31).contains(&day) {
        return None;
    }
    Some((month, day))
}

// ── Transaction assembly ─────────────────────────────────────────────────────

/// A transaction whose start line has been seen but which may still pick
/// up continuation lines.
#[derive(Debug)]
struct PendingTransaction {
    date: NaiveDate,
    section: Section,
    text: String,
    amounts: Vec<Decimal>,
    raw: Vec<String>,
}

/// Reading of the trailing numbers on a transaction line.
#[derive(Debug, PartialEq)]
pub(crate) struct AmountReading {
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    /// Direction fixed by the numbers themselves (a printed sign or the
    /// credit/debit column position).
    pub signed: Option<TransactionType>,
}

/// Interprets one, two or three trailing numbers:
/// `[amount]`, `[amount, balance]` or `[credit, debit, balance]`.
pub(crate) fn read_amounts(
    amounts: &[Decimal],
    convention: SignConvention,
) -> Option<AmountReading> {
    let signed = |v: Decimal| v.is_sign_negative().then_some(convention.negative);
    match amounts {
        [] => None,
        [amount] => Some(AmountReading {
            amount: amount.abs(),
            balance: None,
            signed: signed(*amount),
        }),
        [amount, balance] => Some(AmountReading {
            amount: amount.abs(),
            balance: Some(*balance),
            signed: signed(*amount),
        }),
        [.., credit, debit, balance] => {
            let net = credit.abs() - debit.abs();
            let direction = if net.is_sign_negative() {
                TransactionType::Debit
            } else {
                TransactionType::Credit
            };
            Some(AmountReading {
                amount: net.abs(),
                balance: Some(*balance),
                signed: Some(direction),
            })
        }
    }
}

/// Accumulates transactions for one statement, handling multi-line
/// entries and tracking the running balance where the layout prints one.
pub(crate) struct TransactionCollector {
    convention: SignConvention,
    pending: Option<PendingTransaction>,
    running_balance: Option<Decimal>,
    transactions: Vec<ParsedTransaction>,
    dropped: usize,
}

impl TransactionCollector {
    pub(crate) fn new(convention: SignConvention) -> Self {
        Self {
            convention,
            pending: None,
            running_balance: None,
            transactions: Vec::new(),
            dropped: 0,
        }
    }

    /// Sets the balance before the first transaction, if not already known.
    pub(crate) fn seed_balance(&mut self, balance: Option<Decimal>) {
        if self.running_balance.is_none() {
            self.running_balance = balance;
        }
    }

    /// Opens a new transaction; `rest` is the line after its date token.
    pub(crate) fn start(&mut self, date: NaiveDate, section: Section, rest: &str, raw_line: &str) {
        self.flush();
        let (text, amounts) = split_trailing_amounts(rest);
        self.pending = Some(PendingTransaction {
            date,
            section,
            text: text.to_string(),
            amounts,
            raw: vec![raw_line.trim().to_string()],
        });
    }

    /// Feeds a line without a leading date to the open transaction. Returns
    /// `false` when there is nothing to continue.
    pub(crate) fn continue_with(&mut self, line: &str) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        let line = line.trim();
        pending.raw.push(line.to_string());

        let (text, amounts) = split_trailing_amounts(line);
        let appended = if pending.amounts.is_empty() && !amounts.is_empty() {
            pending.amounts = amounts;
            text
        } else {
            line
        };
        if !appended.is_empty() {
            pending.text.push(' ');
            pending.text.push_str(appended);
        }
        true
    }

    /// Finishes the open transaction, if any.
    pub(crate) fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let raw_line = pending.raw.join("\n");
        match self.finish(pending) {
            Some(tx) => self.transactions.push(tx),
            None => {
                tracing::debug!("Dropping statement entry without a usable amount: {}", raw_line);
                self.dropped += 1;
            }
        }
    }

    pub(crate) fn into_parts(mut self) -> (Vec<ParsedTransaction>, usize) {
        self.flush();
        (self.transactions, self.dropped)
    }

    fn finish(&mut self, pending: PendingTransaction) -> Option<ParsedTransaction> {
        let original = collapse_whitespace(&pending.text);
        if original.is_empty() {
            return None;
        }
        let reading = read_amounts(&pending.amounts, self.convention)?;
        if reading.amount.is_zero() {
            return None;
        }

        // A printed sign or a matching balance delta is final; keywords only
        // outrank the section default and the layout's unsigned convention.
        let tx_type = reading
            .signed
            .or_else(|| self.direction_from_balance(&reading))
            .or_else(|| keyword_direction(&original))
            .or_else(|| pending.section.direction())
            .unwrap_or(self.convention.unsigned);

        self.running_balance = match (reading.balance, self.running_balance) {
            (Some(balance), _) => Some(balance),
            (None, Some(running)) => Some(match tx_type {
                TransactionType::Credit => running + reading.amount,
                TransactionType::Debit => running - reading.amount,
            }),
            (None, None) => None,
        };

        let description = match clean_description(&original) {
            d if d.is_empty() => original.clone(),
            d => d,
        };
        Some(ParsedTransaction {
            date: pending.date,
            description,
            original_description: original,
            amount: reading.amount,
            tx_type,
            balance: reading.balance,
            raw_line: pending.raw.join("\n"),
        })
    }

    /// A printed balance settles direction when it differs from the running
    /// balance by exactly the amount.
    fn direction_from_balance(&self, reading: &AmountReading) -> Option<TransactionType> {
        let running = self.running_balance?;
        let balance = reading.balance?;
        if running + reading.amount == balance {
            Some(TransactionType::Credit)
        } else if running - reading.amount == balance {
            Some(TransactionType::Debit)
        } else {
            None
        }
    }
}

// ── Summary block ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub(crate) enum SummaryField {
    Beginning,
    Ending,
    Deposits,
    Withdrawals,
}

/// Picks summary figures out of labelled lines. Each label is used once,
/// and the last amount on the line is taken as its value. Deposit and
/// withdrawal labels may repeat across several lines (fees, checks, ...)
/// and are summed as magnitudes.
pub(crate) struct SummaryCollector {
    labels: &'static [(&'static str, SummaryField)],
    seen: Vec<bool>,
    summary: StatementSummary,
}

impl SummaryCollector {
    pub(crate) fn new(labels: &'static [(&'static str, SummaryField)], kind: AccountKind) -> Self {
        Self {
            labels,
            seen: vec![false; labels.len()],
            summary: StatementSummary::new(kind),
        }
    }

    pub(crate) fn set_period(&mut self, period: Option<(Option<NaiveDate>, NaiveDate)>) {
        if let Some((start, closing)) = period {
            self.summary.period_start = start;
            self.summary.closing_date = Some(closing);
        }
    }

    pub(crate) fn closing_date(&self) -> Option<NaiveDate> {
        self.summary.closing_date
    }

    pub(crate) fn beginning_balance(&self) -> Option<Decimal> {
        self.summary.beginning_balance
    }

    /// Returns `true` when the line was consumed as a summary figure.
    pub(crate) fn observe(&mut self, line: &str) -> bool {
        let lower = line.trim().to_lowercase();
        for (i, (label, field)) in self.labels.iter().enumerate() {
            if self.seen[i] || !lower.starts_with(label) {
                continue;
            }
            let Some(value) = extract_amounts(line).last().copied() else {
                continue;
            };
            self.seen[i] = true;
            let s = &mut self.summary;
            match field {
                SummaryField::Beginning => s.beginning_balance = Some(value),
                SummaryField::Ending => s.ending_balance = Some(value),
                SummaryField::Deposits => {
                    *s.total_deposits.get_or_insert(Decimal::ZERO) += value.abs();
                }
                SummaryField::Withdrawals => {
                    *s.total_withdrawals.get_or_insert(Decimal::ZERO) += value.abs();
                }
            }
            return true;
        }
        false
    }

    pub(crate) fn finish(self) -> StatementSummary {
        self.summary
    }
}
