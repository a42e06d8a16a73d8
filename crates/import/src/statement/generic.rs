use std::sync::OnceLock;

use regex::Regex;

use super::lines::{
    is_noise_line, resolve_date, Section, SignConvention, SummaryCollector, SummaryField,
    TransactionCollector,
};
use super::{ParsedStatement, StatementError, StatementLayout};
use crate::util::find_statement_period;

const LAYOUT: StatementLayout = StatementLayout::Generic;

const SUMMARY_LABELS: &[(&str, SummaryField)] = &[
    ("beginning balance", SummaryField::Beginning),
    ("opening balance", SummaryField::Beginning),
    ("previous balance", SummaryField::Beginning),
    ("total deposits", SummaryField::Deposits),
    ("total credits", SummaryField::Deposits),
    ("total withdrawals", SummaryField::Withdrawals),
    ("total debits", SummaryField::Withdrawals),
    ("ending balance", SummaryField::Ending),
    ("closing balance", SummaryField::Ending),
    ("new balance", SummaryField::Ending),
];

fn row_start() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(
            r"^\s*(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4}|\d{1,2}-\d{1,2}-\d{4}|\d{1,2}/\d{1,2}|[A-Za-z]{3}\.?\s+\d{1,2})\s+(\S.*)$",
        )
        .expect("invalid regex")
    })
}

/// Fallback for statements with no dedicated layout: every line that opens
/// with a date starts a transaction, and labelled balance lines anywhere in
/// the text feed the summary.
pub(crate) fn parse(text: &str) -> Result<ParsedStatement, StatementError> {
    let mut summary = SummaryCollector::new(SUMMARY_LABELS, LAYOUT.account_kind());
    summary.set_period(find_statement_period(text));
    let mut collector = TransactionCollector::new(SignConvention::BANK);
    let mut seeded = false;
    let mut undated_rows = 0usize;

    for line in text.lines() {
        if summary.observe(line) {
            collector.flush();
            continue;
        }
        if is_noise_line(line) {
            continue;
        }
        if let Some(c) = row_start().captures(line) {
            match resolve_date(&c[1], summary.closing_date(), LAYOUT) {
                Ok(Some(date)) => {
                    if !seeded {
                        collector.seed_balance(summary.beginning_balance());
                        seeded = true;
                    }
                    collector.start(date, Section::General, &c[2], line);
                    continue;
                }
                Ok(None) => {}
                // Prose such as "Jan 31 is the deadline" looks like a
                // month/day row; only fatal if nothing else dated.
                Err(StatementError::MissingStatementPeriod(_)) => {
                    tracing::debug!("Skipping line with an undatable month/day: {}", line);
                    undated_rows += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        collector.continue_with(line);
    }

    let (transactions, dropped_lines) = collector.into_parts();
    if transactions.is_empty() && undated_rows > 0 {
        return Err(StatementError::MissingStatementPeriod(LAYOUT));
    }
    Ok(ParsedStatement {
        layout: LAYOUT,
        transactions,
        summary: summary.finish(),
        dropped_lines,
    })
}
