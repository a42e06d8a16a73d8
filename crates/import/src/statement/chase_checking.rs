use std::sync::OnceLock;

use regex::Regex;

use super::lines::{
    is_noise_line, resolve_date, Section, SignConvention, SummaryCollector, SummaryField,
    TransactionCollector,
};
use super::{ParsedStatement, StatementError, StatementLayout};
use crate::util::find_statement_period;

const LAYOUT: StatementLayout = StatementLayout::ChaseChecking;

const SUMMARY_LABELS: &[(&str, SummaryField)] = &[
    ("beginning balance", SummaryField::Beginning),
    ("deposits and additions", SummaryField::Deposits),
    ("checks paid", SummaryField::Withdrawals),
    ("atm & debit card withdrawals", SummaryField::Withdrawals),
    ("electronic withdrawals", SummaryField::Withdrawals),
    ("other withdrawals", SummaryField::Withdrawals),
    ("fees", SummaryField::Withdrawals),
    ("ending balance", SummaryField::Ending),
];

fn row_start() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^\s*(\d{1,2}/\d{1,2})\s+(\S.*)$").expect("invalid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    Detail,
    Done,
}

/// Chase business/personal checking: a CHECKING SUMMARY block followed by
/// TRANSACTION DETAIL rows of `MM/DD description signed-amount balance`.
pub(crate) fn parse(text: &str) -> Result<ParsedStatement, StatementError> {
    let mut summary = SummaryCollector::new(SUMMARY_LABELS, LAYOUT.account_kind());
    summary.set_period(find_statement_period(text));
    let mut collector = TransactionCollector::new(SignConvention::BANK);
    let mut state = State::Preamble;

    for line in text.lines() {
        let lower = line.trim().to_lowercase();
        match state {
            State::Preamble => {
                if lower.contains("transaction detail") {
                    collector.seed_balance(summary.beginning_balance());
                    state = State::Detail;
                } else {
                    summary.observe(line);
                }
            }
            State::Detail => {
                if lower.contains("*end*transaction detail")
                    || lower.starts_with("ending balance")
                {
                    collector.flush();
                    state = State::Done;
                    continue;
                }
                if lower.contains("transaction detail")
                    || lower.starts_with("beginning balance")
                    || is_noise_line(line)
                {
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
            State::Done => {
                summary.observe(line);
            }
        }
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
JPMorgan Chase Bank, N.A.
December 15, 2023 through January 12, 2024
Account Number: 000000123456789

CHECKING SUMMARY
                              INSTANCES        AMOUNT
Beginning Balance                              $1,000.00
Deposits and Additions               2          3,250.00
ATM & Debit Card Withdrawals         2           -265.40
Electronic Withdrawals               1           -500.00
Fees                                 1            -12.00
Ending Balance                       6          $3,472.60

*start*transaction detail
TRANSACTION DETAIL
DATE        DESCRIPTION                                   AMOUNT       BALANCE
            Beginning Balance                                       $1,000.00
12/18       Card Purchase 12/16 Starbucks Store 1234 Seattle WA  -15.40     984.60
12/22       Remote Online Deposit 1                        250.00      1,234.60
12/29       ATM Withdrawal 12/29 123 Main St                -250.00       984.60
01/02       Stripe Transfer St-A1B2C3 Payout               3,000.00     3,984.60
01/05       Online Transfer To Sav ...1234 Transaction#: 9876543210
                                                            -500.00     3,484.60
01/12       Monthly Service Fee                              -12.00     3,472.60
            Ending Balance                                          $3,472.60
*end*transaction detail
";

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_detail_rows() {
        let s = parse(SAMPLE).unwrap();
        assert_eq!(s.transactions.len(), 6);
        assert_eq!(s.dropped_lines, 0);

        let first = &s.transactions[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 12, 18).unwrap());
        assert_eq!(first.amount, d("15.40"));
        assert_eq!(first.tx_type, TransactionType::Debit);
        assert_eq!(first.balance, Some(d("984.60")));

        let payout = &s.transactions[3];
        assert_eq!(payout.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(payout.tx_type, TransactionType::Credit);
        assert_eq!(payout.amount, d("3000.00"));
    }

    #[test]
    fn wrapped_row_takes_amount_from_next_line() {
        let s = parse(SAMPLE).unwrap();
        let transfer = &s.transactions[4];
        assert_eq!(transfer.amount, d("500.00"));
        assert_eq!(transfer.tx_type, TransactionType::Debit);
        assert_eq!(transfer.description, "Online Transfer To Sav ...1234 Transaction#:");
        assert!(transfer.original_description.contains("9876543210"));
    }

    #[test]
    fn reads_summary_and_reconciles() {
        let s = parse(SAMPLE).unwrap();
        assert_eq!(s.summary.beginning_balance, Some(d("1000.00")));
        assert_eq!(s.summary.ending_balance, Some(d("3472.60")));
        assert_eq!(s.summary.total_deposits, Some(d("3250.00")));
        assert_eq!(s.summary.total_withdrawals, Some(d("777.40")));
        assert_eq!(s.summary.closing_date, NaiveDate::from_ymd_opt(2024, 1, 12));
        assert_eq!(s.summary.period_start, NaiveDate::from_ymd_opt(2023, 12, 15));

        let r = s.reconcile().unwrap();
        assert_eq!(r.parsed_deposits, d("3250.00"));
        assert_eq!(r.parsed_withdrawals, d("777.40"));
        assert!(s.is_balanced(Decimal::ZERO));
    }

    #[test]
    fn signed_fee_mentioning_deposit_stays_debit() {
        let text = "\
December 15, 2023 through January 12, 2024
Beginning Balance $1,000.00
Ending Balance $988.00
TRANSACTION DETAIL
12/20 Deposited Item Returned Fee -12.00 988.00
*end*transaction detail
";
        let s = parse(text).unwrap();
        assert_eq!(s.transactions.len(), 1);
        assert_eq!(s.transactions[0].tx_type, TransactionType::Debit);
        assert_eq!(s.transactions[0].amount, d("12.00"));
        assert!(s.is_balanced(Decimal::ZERO));
    }

    #[test]
    fn single_spaced_rows_reconcile() {
        let text = "\
December 15, 2023 through January 12, 2024
Beginning Balance $500.00
Deposits and Additions 1 1,200.00
Electronic Withdrawals 2 -104.00
Ending Balance $1,596.00
TRANSACTION DETAIL
12/19 GITHUB INC SAN FRANCISCO CA -4.00 496.00
12/27 Zelle Payment From Dana Rios 1,200.00 1,696.00
01/03 Adobe Creative Cloud -100.00 1,596.00
*end*transaction detail
";
        let s = parse(text).unwrap();
        assert_eq!(s.transactions.len(), 3);
        assert_eq!(s.dropped_lines, 0);
        assert_eq!(s.transactions[0].description, "GITHUB INC SAN FRANCISCO CA");
        assert_eq!(s.transactions[1].tx_type, TransactionType::Credit);
        assert_eq!(s.transactions[2].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert!(s.is_balanced(Decimal::ZERO));
    }

    #[test]
    fn missing_period_is_an_error() {
        let text = SAMPLE.replace("December 15, 2023 through January 12, 2024", "");
        assert_eq!(
            parse(&text).unwrap_err(),
            StatementError::MissingStatementPeriod(StatementLayout::ChaseChecking)
        );
    }
}
