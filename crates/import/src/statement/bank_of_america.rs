use std::sync::OnceLock;

use regex::Regex;

use super::lines::{
    is_noise_line, resolve_date, Section, SignConvention, SummaryCollector, SummaryField,
    TransactionCollector,
};
use super::{ParsedStatement, StatementError, StatementLayout};
use crate::util::{extract_amounts, find_statement_period};

const LAYOUT: StatementLayout = StatementLayout::BankOfAmerica;

const SUMMARY_LABELS: &[(&str, SummaryField)] = &[
    ("beginning balance on", SummaryField::Beginning),
    ("deposits and other additions", SummaryField::Deposits),
    ("withdrawals and other subtractions", SummaryField::Withdrawals),
    ("checks", SummaryField::Withdrawals),
    ("service fees", SummaryField::Withdrawals),
    ("ending balance on", SummaryField::Ending),
];

const SECTION_HEADERS: &[(&str, Section)] = &[
    ("deposits and other additions", Section::Deposits),
    ("withdrawals and other subtractions", Section::Withdrawals),
    ("atm and debit card subtractions", Section::Withdrawals),
    ("other subtractions", Section::Withdrawals),
    ("checks", Section::Checks),
    ("service fees", Section::Fees),
];

fn row_start() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^\s*(\d{1,2}/\d{1,2}/\d{2,4})\s+(\S.*)$").expect("invalid regex"))
}

/// A header is the label alone (optionally "- continued"), never with an amount.
fn section_header(line: &str) -> Option<Section> {
    let lower = line.trim().to_lowercase();
    if !extract_amounts(&lower).is_empty() {
        return None;
    }
    SECTION_HEADERS
        .iter()
        .find(|(label, _)| lower.starts_with(label))
        .map(|(_, section)| *section)
}

/// Bank of America checking: an account summary, then one block per
/// activity kind (deposits, withdrawals, checks, service fees), each closed
/// by a "Total ..." line. Rows carry full MM/DD/YY dates.
pub(crate) fn parse(text: &str) -> Result<ParsedStatement, StatementError> {
    let mut summary = SummaryCollector::new(SUMMARY_LABELS, LAYOUT.account_kind());
    summary.set_period(find_statement_period(text));
    let mut collector = TransactionCollector::new(SignConvention::BANK);
    let mut section: Option<Section> = None;

    for line in text.lines() {
        if let Some(next) = section_header(line) {
            collector.flush();
            section = Some(next);
            continue;
        }

        let Some(current) = section else {
            summary.observe(line);
            continue;
        };

        let lower = line.trim().to_lowercase();
        if lower.starts_with("total ") {
            collector.flush();
            section = None;
            continue;
        }
        if is_noise_line(line) {
            continue;
        }
        if let Some(c) = row_start().captures(line) {
            if let Some(date) = resolve_date(&c[1], summary.closing_date(), LAYOUT)? {
                collector.start(date, current, &c[2], line);
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use taxlens_core::TransactionType;

    const SAMPLE: &str = "\
Bank of America, N.A.
Your Business Advantage Checking
for December 1, 2023 to December 31, 2023
Account number: 0000 1234 5678

Account summary
Beginning balance on December 1, 2023 $2,000.00
Deposits and other additions 4,800.00
Withdrawals and other subtractions -1,345.67
Checks -0.00
Service fees -16.00
Ending balance on December 31, 2023 $5,438.33

Deposits and other additions
Date Description Amount
12/04/23 STRIPE DES:TRANSFER ID:ST-XYZ INDN:ACME LLC CO ID:1800948598 CCD 4,500.00
12/15/23 Zelle payment from JANE CLIENT Conf# abc123 300.00
Total deposits and other additions $4,800.00

Withdrawals and other subtractions
Date Description Amount
12/05/23 CHECKCARD 1204 ADOBE *CREATIVE CLD SAN JOSE CA
24801973338
-54.99
12/11/23 ONLINE BANKING TRANSFER TO CHK 9876 -1,000.00
Page 2 of 3
Withdrawals and other subtractions - continued
Date Description Amount
12/20/23 PURCHASE 1219 DELTA AIR LINES ATLANTA GA -290.68
Total withdrawals and other subtractions -$1,345.67

Service fees
12/31/23 Monthly Maintenance Fee -16.00
Total service fees -$16.00
";

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_each_section() {
        let s = parse(SAMPLE).unwrap();
        assert_eq!(s.transactions.len(), 6);

        let stripe = &s.transactions[0];
        assert_eq!(stripe.date, NaiveDate::from_ymd_opt(2023, 12, 4).unwrap());
        assert_eq!(stripe.tx_type, TransactionType::Credit);
        assert_eq!(stripe.amount, d("4500.00"));
        assert_eq!(stripe.description, "STRIPE DES:TRANSFER ID:ST-XYZ INDN:ACME LLC CO ID:1800948598 CCD");

        let fee = s.transactions.last().unwrap();
        assert_eq!(fee.tx_type, TransactionType::Debit);
        assert_eq!(fee.amount, d("16.00"));
    }

    #[test]
    fn wrapped_row_collects_reference_and_amount() {
        let s = parse(SAMPLE).unwrap();
        let adobe = &s.transactions[2];
        assert_eq!(adobe.description, "CHECKCARD 1204 ADOBE *CREATIVE CLD SAN JOSE CA");
        assert!(adobe.original_description.ends_with("24801973338"));
        assert_eq!(adobe.amount, d("54.99"));
        assert_eq!(adobe.tx_type, TransactionType::Debit);
    }

    #[test]
    fn continued_header_keeps_section() {
        let s = parse(SAMPLE).unwrap();
        let delta = &s.transactions[4];
        assert!(delta.description.contains("DELTA AIR LINES"));
        assert_eq!(delta.tx_type, TransactionType::Debit);
    }

    #[test]
    fn reconciles_against_summary() {
        let s = parse(SAMPLE).unwrap();
        assert_eq!(s.summary.beginning_balance, Some(d("2000.00")));
        assert_eq!(s.summary.ending_balance, Some(d("5438.33")));
        assert_eq!(s.summary.total_deposits, Some(d("4800.00")));
        assert_eq!(s.summary.total_withdrawals, Some(d("1361.67")));
        assert!(s.is_balanced(Decimal::ZERO));
    }

    #[test]
    fn unsigned_amount_follows_section() {
        let text = "\
Withdrawals and other subtractions
12/05/23 WIRE OUT VENDOR 200.00
Total withdrawals and other subtractions -$200.00
";
        let s = parse(text).unwrap();
        assert_eq!(s.transactions[0].tx_type, TransactionType::Debit);
    }
}
