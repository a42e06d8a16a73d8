use std::sync::OnceLock;

use regex::Regex;

use super::lines::{
    is_noise_line, resolve_date, Section, SignConvention, SummaryCollector, SummaryField,
    TransactionCollector,
};
use super::{ParsedStatement, StatementError, StatementLayout};
use crate::util::find_statement_period;

const LAYOUT: StatementLayout = StatementLayout::LedgerColumns;

const SUMMARY_LABELS: &[(&str, SummaryField)] = &[
    ("beginning balance on", SummaryField::Beginning),
    ("deposits/credits", SummaryField::Deposits),
    ("deposits/additions", SummaryField::Deposits),
    ("withdrawals/debits", SummaryField::Withdrawals),
    ("withdrawals/subtractions", SummaryField::Withdrawals),
    ("ending balance on", SummaryField::Ending),
];

fn row_start() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,2}/\d{1,2}(?:/\d{2,4})?)\s+(\S.*)$").expect("invalid regex")
    })
}

/// Column-ledger statements (Wells Fargo style): a "Transaction history"
/// table with separate deposit/withdrawal columns and an ending daily
/// balance that is only printed on the last row of each day.
pub(crate) fn parse(text: &str) -> Result<ParsedStatement, StatementError> {
    let mut summary = SummaryCollector::new(SUMMARY_LABELS, LAYOUT.account_kind());
    summary.set_period(find_statement_period(text));
    let mut collector = TransactionCollector::new(SignConvention::LEDGER);
    let mut in_history = false;

    for line in text.lines() {
        let lower = line.trim().to_lowercase();

        if !in_history {
            if lower.starts_with("transaction history") {
                collector.seed_balance(summary.beginning_balance());
                in_history = true;
            } else {
                summary.observe(line);
            }
            continue;
        }

        if lower.starts_with("ending balance on") || lower.starts_with("totals") {
            collector.flush();
            in_history = false;
            summary.observe(line);
            continue;
        }
        if is_noise_line(line) {
            continue;
        }
        if let Some(c) = row_start().captures(line) {
            if let Some(date) = resolve_date(&c[1], summary.closing_date(), LAYOUT)? {
                collector.start(date, Section::General, &c[2], line);
                continue;
            }
        }
        collector.continue_with(line);
    }

    let (transactions, dropped_lines) = collector.into_parts();
    Ok(ParsedStatement {
        layout: LAYOUT,
        transactions,
        summary: summary.finish(),
        dropped_lines,
    })
}
