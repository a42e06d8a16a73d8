use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        pub(crate) fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_money_token,
    r"\(?[-+]?(?:\$\s?)?\d{1,3}(?:,\d{3})*\.\d{2}\)?-?|\(?[-+]?(?:\$\s?)?\d+\.\d{2}\)?-?");
re!(re_iso,
    r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T\s].*)?$");
re!(re_us_long,
    r"^(\d{1,2})/(\d{1,2})/(\d{4})$");
re!(re_us_short,
    r"^(\d{1,2})/(\d{1,2})/(\d{2})$");
re!(re_us_dash,
    r"^(\d{1,2})-(\d{1,2})-(\d{4})$");
re!(re_month_first,
    r"(?i)^([a-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})$");
re!(re_day_first,
    r"(?i)^(\d{1,2})\s+([a-z]{3,9})\.?,?\s+(\d{4})$");
re!(re_period_words,
    r"(?i)\b([a-z]{3,9})\s+(\d{1,2}),\s+(\d{4})\s+(?:through|to|-)\s+([a-z]{3,9})\s+(\d{1,2}),\s+(\d{4})\b");
re!(re_period_slash,
    r"\b(\d{1,2}/\d{1,2}/\d{2,4})\s*(?:-|to|through)\s*(\d{1,2}/\d{1,2}/\d{2,4})\b");
re!(re_closing_date,
    r"(?i)\bclosing\s+date:?\s+(\d{1,2}/\d{1,2}/\d{2,4})\b");
re!(re_reference_token,
    r"^#?\d{6,}$");

// ── Amounts ──────────────────────────────────────────────────────────────────

/// Parses a monetary string such as `$1,234.56`, `(75.25)`, `45.00-` or `+12`.
/// Parentheses and a trailing minus both mean negative.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let mut s = s.trim().replace("USD", "");
    let mut negative = false;

    if s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    let mut s: String = s.chars().filter(|c| !matches!(c, ',' | '$' | ' ')).collect();
    if s.ends_with('-') {
        negative = !negative;
        s.pop();
    }
    if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }
    if s.is_empty() {
        return None;
    }

    let dec = Decimal::from_str(&s).ok()?;
    Some(if negative { -dec } else { dec })
}

/// All monetary tokens (values with exactly two decimals) in `fragment`,
/// in order of appearance.
pub fn extract_amounts(fragment: &str) -> Vec<Decimal> {
    re_money_token()
        .find_iter(fragment)
        .filter_map(|m| parse_amount(m.as_str()))
        .collect()
}

/// Splits a line into its leading text and the run of monetary tokens that
/// ends it. Amounts inside the description (e.g. "REF 12.50 CREDIT") are
/// left in the text.
pub fn split_trailing_amounts(line: &str) -> (&str, Vec<Decimal>) {
    let trimmed = line.trim_end();
    let mut cut = trimmed.len();
    let mut amounts = Vec::new();

    let matches: Vec<_> = re_money_token().find_iter(trimmed).collect();
    for m in matches.iter().rev() {
        let between = &trimmed[m.end()..cut];
        if !between.trim().is_empty() {
            break;
        }
        // Require a separator before the token so "ID1234.56" stays text.
        let preceded_ok = m.start() == 0
            || trimmed[..m.start()]
                .chars()
                .last()
                .is_some_and(char::is_whitespace);
        if !preceded_ok {
            break;
        }
        match parse_amount(m.as_str()) {
            Some(v) => amounts.push(v),
            None => break,
        }
        cut = m.start();
    }

    amounts.reverse();
    (trimmed[..cut].trim_end(), amounts)
}

// ── Dates ────────────────────────────────────────────────────────────────────

/// Parses the date shapes found in statements and CSV exports:
/// MM/DD/YYYY, YYYY-MM-DD (optionally with a time), M/D/YY, MM-DD-YYYY,
/// `Jan 5, 2024`, `January 5, 2024` and `5 Jan 2024`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Some(c) = re_us_long().captures(s) {
        return ymd(c[3].parse().ok()?, c[1].parse().ok()?, c[2].parse().ok()?);
    }
    if let Some(c) = re_iso().captures(s) {
        return ymd(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?);
    }
    if let Some(c) = re_us_short().captures(s) {
        let year = expand_year(c[3].parse().ok()?);
        return ymd(year, c[1].parse().ok()?, c[2].parse().ok()?);
    }
    if let Some(c) = re_us_dash().captures(s) {
        return ymd(c[3].parse().ok()?, c[1].parse().ok()?, c[2].parse().ok()?);
    }
    if let Some(c) = re_month_first().captures(s) {
        let month = month_to_num(&c[1])?;
        return ymd(c[3].parse().ok()?, month, c[2].parse().ok()?);
    }
    if let Some(c) = re_day_first().captures(s) {
        let month = month_to_num(&c[2])?;
        return ymd(c[3].parse().ok()?, month, c[1].parse().ok()?);
    }
    None
}

/// Parses a bare `MM/DD` token.
pub fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let (m, d) = s.trim().split_once('/')?;
    let m: u32 = m.parse().ok()?;
    let d: u32 = d.parse().ok()?;
    if (1..=12).contains(&m) && (1..=31).contains(&d) {
        Some((m, d))
    } else {
        None
    }
}

/// Dates a month/day pair using the statement closing date. A month more
/// than one past the closing month belongs to the previous year, so a
/// December purchase on a January statement lands in December of last year.
pub fn infer_year(month: u32, day: u32, closing: NaiveDate) -> Option<NaiveDate> {
    let mut year = closing.year();
    if month > closing.month() + 1 {
        year -= 1;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Finds the statement period (start, end) in extracted statement text.
/// The start is `None` when only a closing date is printed.
pub fn find_statement_period(text: &str) -> Option<(Option<NaiveDate>, NaiveDate)> {
    if let Some(c) = re_period_words().captures(text) {
        let start = month_to_num(&c[1])
            .and_then(|m| ymd(c[3].parse().ok()?, m, c[2].parse().ok()?));
        let end_month = month_to_num(&c[4])?;
        let end = ymd(c[6].parse().ok()?, end_month, c[5].parse().ok()?)?;
        return Some((start, end));
    }
    if let Some(c) = re_period_slash().captures(text) {
        let start = parse_date(&c[1]);
        let end = parse_date(&c[2])?;
        return Some((start, end));
    }
    if let Some(c) = re_closing_date().captures(text) {
        return Some((None, parse_date(&c[1])?));
    }
    None
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_year(y: i32) -> i32 {
    if y < 100 { 2000 + y } else { y }
}

pub(crate) fn month_to_num(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let key = lower.get(..3)?;
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    MONTHS
        .iter()
        .position(|m| *m == key)
        .map(|i| i as u32 + 1)
}

// ── Descriptions ─────────────────────────────────────────────────────────────

/// Collapses whitespace, drops long reference numbers and trims stray
/// `*`/`-` separators from the edges.
pub fn clean_description(s: &str) -> String {
    let words: Vec<&str> = s
        .split_whitespace()
        .filter(|w| !re_reference_token().is_match(w))
        .collect();
    words
        .join(" ")
        .trim_matches(|c: char| c == '*' || c == '-' || c.is_whitespace())
        .to_string()
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_plain_and_symbols() {
        assert_eq!(parse_amount("123.45"), Some(d("123.45")));
        assert_eq!(parse_amount("$99.99"), Some(d("99.99")));
        assert_eq!(parse_amount("1,234.56"), Some(d("1234.56")));
        assert_eq!(parse_amount("USD 10.00"), Some(d("10.00")));
    }

    #[test]
    fn parse_amount_negative_forms() {
        assert_eq!(parse_amount("-50.00"), Some(d("-50.00")));
        assert_eq!(parse_amount("(75.25)"), Some(d("-75.25")));
        assert_eq!(parse_amount("45.00-"), Some(d("-45.00")));
        assert_eq!(parse_amount("-$1,200.00"), Some(d("-1200.00")));
        assert_eq!(parse_amount("+$845.20"), Some(d("845.20")));
    }

    #[test]
    fn parse_amount_invalid() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("   "), None);
        assert_eq!(parse_amount("not_a_number"), None);
    }

    // ── extract_amounts ───────────────────────────────────────────────────────

    #[test]
    fn extract_amounts_in_order() {
        let v = extract_amounts("Deposit 1,500.00 then fee -12.00 and (3.50)");
        assert_eq!(v, vec![d("1500.00"), d("-12.00"), d("-3.50")]);
    }

    #[test]
    fn extract_amounts_ignores_integers() {
        assert!(extract_amounts("Card 1234 Store 567").is_empty());
    }

    #[test]
    fn split_trailing_amounts_separates_columns() {
        let (text, amounts) = split_trailing_amounts("01/05 COFFEE SHOP 4.50 1,020.25");
        assert_eq!(text, "01/05 COFFEE SHOP");
        assert_eq!(amounts, vec![d("4.50"), d("1020.25")]);
    }

    #[test]
    fn split_trailing_amounts_single_space() {
        let (text, amounts) = split_trailing_amounts("GITHUB INC SAN FRANCISCO CA 4.00");
        assert_eq!(text, "GITHUB INC SAN FRANCISCO CA");
        assert_eq!(amounts, vec![d("4.00")]);

        let (text, amounts) = split_trailing_amounts("Fee -12.00 988.00");
        assert_eq!(text, "Fee");
        assert_eq!(amounts, vec![d("-12.00"), d("988.00")]);

        let (text, amounts) = split_trailing_amounts("Deposit $ 1,500.00");
        assert_eq!(text, "Deposit");
        assert_eq!(amounts, vec![d("1500.00")]);
    }

    #[test]
    fn split_trailing_amounts_needs_separator() {
        let (text, amounts) = split_trailing_amounts("PAYPAL ID1234.56");
        assert_eq!(text, "PAYPAL ID1234.56");
        assert!(amounts.is_empty());
    }

    #[test]
    fn split_trailing_amounts_none() {
        let (text, amounts) = split_trailing_amounts("SEATTLE WA");
        assert_eq!(text, "SEATTLE WA");
        assert!(amounts.is_empty());
    }

    #[test]
    fn split_trailing_amounts_keeps_embedded_amount() {
        let (text, amounts) = split_trailing_amounts("01/05 REFUND 12.50 ADJ 12.50");
        assert_eq!(text, "01/05 REFUND 12.50 ADJ");
        assert_eq!(amounts, vec![d("12.50")]);
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_numeric_shapes() {
        assert_eq!(parse_date("01/15/2024"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T08:30:00Z"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("1/5/24"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("01-15-2024"), Some(date(2024, 1, 15)));
    }

    #[test]
    fn parse_date_month_names() {
        assert_eq!(parse_date("Jan 5, 2024"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("January 5, 2024"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("5 Jan 2024"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("Sept. 30, 2023"), Some(date(2023, 9, 30)));
    }

    #[test]
    fn parse_date_invalid() {
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("13/45/2024"), None);
    }

    // ── year inference ────────────────────────────────────────────────────────

    #[test]
    fn infer_year_same_year() {
        assert_eq!(infer_year(1, 10, date(2024, 1, 14)), Some(date(2024, 1, 10)));
        assert_eq!(infer_year(2, 2, date(2024, 1, 14)), Some(date(2024, 2, 2)));
    }

    #[test]
    fn infer_year_rolls_back_across_new_year() {
        assert_eq!(infer_year(12, 20, date(2024, 1, 14)), Some(date(2023, 12, 20)));
        assert_eq!(infer_year(11, 30, date(2024, 1, 14)), Some(date(2023, 11, 30)));
    }

    #[test]
    fn parse_month_day_bounds() {
        assert_eq!(parse_month_day("12/31"), Some((12, 31)));
        assert_eq!(parse_month_day("13/01"), None);
        assert_eq!(parse_month_day("1/2/24"), None);
    }

    // ── statement period ──────────────────────────────────────────────────────

    #[test]
    fn find_period_words() {
        let text = "Account activity\nDecember 15, 2023 through January 12, 2024\n";
        assert_eq!(
            find_statement_period(text),
            Some((Some(date(2023, 12, 15)), date(2024, 1, 12)))
        );
    }

    #[test]
    fn find_period_slash_range() {
        let text = "Opening/Closing Date 12/03/23 - 01/02/24";
        assert_eq!(
            find_statement_period(text),
            Some((Some(date(2023, 12, 3)), date(2024, 1, 2)))
        );
    }

    #[test]
    fn find_period_closing_only() {
        let text = "Closing Date: 03/14/2024\nPayment Due 04/10/2024";
        assert_eq!(find_statement_period(text), Some((None, date(2024, 3, 14))));
    }

    // ── descriptions ──────────────────────────────────────────────────────────

    #[test]
    fn clean_description_drops_references() {
        assert_eq!(
            clean_description("  ZELLE   PAYMENT TO  JOHN  #12345678 "),
            "ZELLE PAYMENT TO JOHN"
        );
        assert_eq!(clean_description("*AMAZON MKTPL -"), "AMAZON MKTPL");
    }
}
