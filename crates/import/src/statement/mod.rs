mod bank_of_america;
mod chase_checking;
mod credit_card;
mod generic;
mod ledger_columns;
pub(crate) mod lines;

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taxlens_core::{ParsedTransaction, TransactionType};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatementError {
    #[error("{0} statement has month/day dates but no statement period to infer the year from")]
    MissingStatementPeriod(StatementLayout),
    #[error("No transactions found in {0} statement")]
    NoTransactions(StatementLayout),
}

/// Institution layouts with a dedicated parser. `Generic` accepts any
/// date-led line and is the fallback for unknown statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementLayout {
    ChaseChecking,
    BankOfAmerica,
    CreditCard,
    LedgerColumns,
    Generic,
}

impl StatementLayout {
    pub const ALL: [StatementLayout; 5] = [
        StatementLayout::ChaseChecking,
        StatementLayout::BankOfAmerica,
        StatementLayout::CreditCard,
        StatementLayout::LedgerColumns,
        StatementLayout::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementLayout::ChaseChecking => "chase_checking",
            StatementLayout::BankOfAmerica => "bank_of_america",
            StatementLayout::CreditCard => "credit_card",
            StatementLayout::LedgerColumns => "ledger_columns",
            StatementLayout::Generic => "generic",
        }
    }

    pub fn account_kind(&self) -> AccountKind {
        match self {
            StatementLayout::CreditCard => AccountKind::Liability,
            _ => AccountKind::Asset,
        }
    }

    pub fn parse(&self, text: &str) -> Result<ParsedStatement, StatementError> {
        let statement = match self {
            StatementLayout::ChaseChecking => chase_checking::parse(text)?,
            StatementLayout::BankOfAmerica => bank_of_america::parse(text)?,
            StatementLayout::CreditCard => credit_card::parse(text)?,
            StatementLayout::LedgerColumns => ledger_columns::parse(text)?,
            StatementLayout::Generic => generic::parse(text)?,
        };
        if statement.transactions.is_empty() {
            return Err(StatementError::NoTransactions(*self));
        }
        tracing::info!(
            "Parsed {} transactions from {} statement ({} lines dropped)",
            statement.transactions.len(),
            self,
            statement.dropped_lines
        );
        Ok(statement)
    }
}

impl fmt::Display for StatementLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatementLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatementLayout::ALL
            .into_iter()
            .find(|l| l.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown statement layout: {s}"))
    }
}

/// Deposit accounts grow with credits; card balances grow with debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Asset,
    Liability,
}

/// Totals printed on the statement itself, used to check the parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub account_kind: AccountKind,
    pub period_start: Option<NaiveDate>,
    pub closing_date: Option<NaiveDate>,
    pub beginning_balance: Option<Decimal>,
    pub ending_balance: Option<Decimal>,
    pub total_deposits: Option<Decimal>,
    pub total_withdrawals: Option<Decimal>,
}

impl StatementSummary {
    pub fn new(account_kind: AccountKind) -> Self {
        Self {
            account_kind,
            period_start: None,
            closing_date: None,
            beginning_balance: None,
            ending_balance: None,
            total_deposits: None,
            total_withdrawals: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub parsed_deposits: Decimal,
    pub parsed_withdrawals: Decimal,
    /// Ending minus beginning balance as printed.
    pub expected_delta: Decimal,
    /// The same movement computed from parsed transactions.
    pub parsed_delta: Decimal,
    pub difference: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatement {
    pub layout: StatementLayout,
    pub transactions: Vec<ParsedTransaction>,
    pub summary: StatementSummary,
    /// Transaction lines discarded because no usable amount was found.
    pub dropped_lines: usize,
}

impl ParsedStatement {
    /// Compares parsed movement with the printed balances. `None` when the
    /// statement does not print both a beginning and an ending balance.
    pub fn reconcile(&self) -> Option<Reconciliation> {
        let beginning = self.summary.beginning_balance?;
        let ending = self.summary.ending_balance?;

        let mut deposits = Decimal::ZERO;
        let mut withdrawals = Decimal::ZERO;
        for tx in &self.transactions {
            match tx.tx_type {
                TransactionType::Credit => deposits += tx.amount,
                TransactionType::Debit => withdrawals += tx.amount,
            }
        }

        let expected_delta = ending - beginning;
        let parsed_delta = match self.summary.account_kind {
            AccountKind::Asset => deposits - withdrawals,
            AccountKind::Liability => withdrawals - deposits,
        };
        Some(Reconciliation {
            parsed_deposits: deposits,
            parsed_withdrawals: withdrawals,
            expected_delta,
            parsed_delta,
            difference: parsed_delta - expected_delta,
        })
    }

    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        self.reconcile()
            .is_some_and(|r| r.difference.abs() <= tolerance)
    }
}
