use std::sync::OnceLock;

use regex::Regex;

use super::lines::{
    is_noise_line, resolve_date, Section, SignConvention, SummaryCollector, SummaryField,
    TransactionCollector,
};
use super::{ParsedStatement, StatementError, StatementLayout};
use crate::util::find_statement_period;

const LAYOUT: StatementLayout = StatementLayout::CreditCard;

const SUMMARY_LABELS: &[(&str, SummaryField)] = &[
    ("previous balance", SummaryField::Beginning),
    ("payment, credits", SummaryField::Deposits),
    ("payments and credits", SummaryField::Deposits),
    ("payments", SummaryField::Deposits),
    ("other credits", SummaryField::Deposits),
    ("purchases", SummaryField::Withdrawals),
    ("cash advances", SummaryField::Withdrawals),
    ("balance transfers", SummaryField::Withdrawals),
    ("fees charged", SummaryField::Withdrawals),
    ("interest charged", SummaryField::Withdrawals),
    ("new balance", SummaryField::Ending),
];

fn row_start() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^\s*(\d{1,2}/\d{1,2})\s+(\S.*)$").expect("invalid regex"))
}

fn sub_section(lower: &str) -> Option<Section> {
    match lower {
        "payments and other credits" | "payments and credits" | "payments" => {
            Some(Section::Payments)
        }
        "purchase" | "purchases" | "purchases and adjustments" | "cash advances" => {
            Some(Section::Purchases)
        }
        "fees charged" | "fees" => Some(Section::Fees),
        "interest charged" | "interest" => Some(Section::Interest),
        _ => None,
    }
}

fn ends_activity(lower: &str) -> bool {
    lower.contains("totals year-to-date") || lower.starts_with("interest charges")
}

/// Card statements (Chase, Capital One and similar issuers): an account
/// summary of previous/new balance, then ACCOUNT ACTIVITY split into
/// payments, purchases, fees and interest. Rows are `MM/DD description
/// amount`, charges unsigned and credits negative.
pub(crate) fn parse(text: &str) -> Result<ParsedStatement, StatementError> {
    let mut summary = SummaryCollector::new(SUMMARY_LABELS, LAYOUT.account_kind());
    summary.set_period(find_statement_period(text));
    let mut collector = TransactionCollector::new(SignConvention::CARD);
    let mut in_activity = false;
    let mut section = Section::General;

    for line in text.lines() {
        let lower = line.trim().to_lowercase();

        if !in_activity {
            if lower.starts_with("account activity") {
                in_activity = true;
                section = Section::General;
            } else {
                summary.observe(line);
            }
            continue;
        }

        if ends_activity(&lower) {
            collector.flush();
            in_activity = false;
            continue;
        }
        if lower.starts_with("account activity") {
            // Repeated on each page as "ACCOUNT ACTIVITY (CONTINUED)".
            continue;
        }
        if let Some(next) = sub_section(&lower) {
            collector.flush();
            section = next;
            continue;
        }
        if lower.starts_with("total ") {
            collector.flush();
            section = Section::General;
            continue;
        }
        if is_noise_line(line) {
            continue;
        }
        if let Some(c) = row_start().captures(line) {
            if let Some(date) = resolve_date(&c[1], summary.closing_date(), LAYOUT)? {
                collector.start(date, section, &c[2], line);
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
