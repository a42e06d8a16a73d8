use rust_decimal::Decimal;
use serde::Serialize;
use taxlens_core::{ParsedTransaction, TransactionType};
use thiserror::Error;

use crate::detect::{detect_csv_format, CsvFormat};
use crate::util::{clean_description, collapse_whitespace, parse_amount, parse_date};

/// Exports such as Bank of America's open with a summary block; the header
/// row is searched for within this many leading lines.
const HEADER_SEARCH_LINES: usize = 15;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unrecognized CSV format: no date and description columns in the leading lines")]
    UnrecognizedFormat,
    #[error("{format} export has neither an amount column nor a credit/debit pair")]
    MissingAmountColumn { format: &'static str },
    #[error("No data rows")]
    NoDataRows,
}

#[derive(Debug, Clone, Serialize)]
pub struct CsvImport {
    pub format: &'static str,
    pub transactions: Vec<ParsedTransaction>,
    /// Rows without a date, description or non-zero amount.
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountColumns {
    Signed(usize),
    Split { credit: usize, debit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    date: usize,
    description: usize,
    amount: AmountColumns,
    balance: Option<usize>,
}

/// Exact match over the candidates in order, then substring match; a column
/// already claimed by another field is never reused.
fn find_column(headers: &[String], candidates: &[&str], taken: &[usize]) -> Option<usize> {
    let free = |i: &usize| !taken.contains(i);
    candidates
        .iter()
        .find_map(|c| (0..headers.len()).filter(free).find(|&i| headers[i] == *c))
        .or_else(|| {
            candidates
                .iter()
                .find_map(|c| (0..headers.len()).filter(free).find(|&i| headers[i].contains(c)))
        })
}

/// Why a leading row is not a usable header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderMiss {
    NotHeader,
    /// Date and description columns resolved but no amount column did.
    NoAmount,
}

fn resolve_columns(format: &CsvFormat, headers: &[String]) -> Result<ColumnMap, HeaderMiss> {
    let date = find_column(headers, format.date_columns, &[]).ok_or(HeaderMiss::NotHeader)?;
    let description = find_column(headers, format.description_columns, &[date])
        .ok_or(HeaderMiss::NotHeader)?;
    let mut taken = vec![date, description];

    let credit = find_column(headers, format.credit_columns, &taken);
    taken.extend(credit);
    let debit = find_column(headers, format.debit_columns, &taken);
    taken.extend(debit);

    let amount = match (credit, debit) {
        (Some(credit), Some(debit)) => AmountColumns::Split { credit, debit },
        _ => match find_column(headers, format.amount_columns, &taken) {
            Some(col) => {
                taken.push(col);
                AmountColumns::Signed(col)
            }
            None => return Err(HeaderMiss::NoAmount),
        },
    };
    let balance = find_column(headers, format.balance_columns, &taken);

    Ok(ColumnMap {
        date,
        description,
        amount,
        balance,
    })
}

pub struct CsvImporter;

impl CsvImporter {
    /// Parses CSV text from any supported bank export.
    pub fn parse(text: &str) -> Result<CsvImport, CsvError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let mut header = None;
        let mut missing_amount = None;
        for (i, result) in records.by_ref().enumerate() {
            if i >= HEADER_SEARCH_LINES {
                break;
            }
            let record = result?;
            let headers: Vec<String> = record.iter().map(|h| h.trim().to_lowercase()).collect();
            let format = detect_csv_format(&headers);
            match resolve_columns(format, &headers) {
                Ok(columns) => {
                    header = Some((format, columns));
                    break;
                }
                Err(HeaderMiss::NoAmount) => {
                    missing_amount.get_or_insert(format.name);
                }
                Err(HeaderMiss::NotHeader) => {}
            }
        }
        let (format, columns) = match (header, missing_amount) {
            (Some(found), _) => found,
            (None, Some(format)) => return Err(CsvError::MissingAmountColumn { format }),
            (None, None) => return Err(CsvError::UnrecognizedFormat),
        };

        let mut transactions = Vec::new();
        let mut skipped_rows = 0;
        let mut data_rows = 0;
        for result in records {
            let record = result?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            data_rows += 1;
            match parse_row(&record, format, columns) {
                Some(tx) => transactions.push(tx),
                None => {
                    tracing::debug!("Skipping CSV row: {:?}", record);
                    skipped_rows += 1;
                }
            }
        }
        if data_rows == 0 {
            return Err(CsvError::NoDataRows);
        }

        tracing::info!(
            "Parsed {} transactions from {} CSV ({} rows skipped)",
            transactions.len(),
            format.name,
            skipped_rows
        );
        Ok(CsvImport {
            format: format.id,
            transactions,
            skipped_rows,
        })
    }
}

fn parse_row(
    record: &csv::StringRecord,
    format: &CsvFormat,
    columns: ColumnMap,
) -> Option<ParsedTransaction> {
    let date = parse_date(record.get(columns.date)?)?;
    let original = collapse_whitespace(record.get(columns.description)?);
    if original.is_empty() {
        return None;
    }

    let cell = |i: usize| record.get(i).and_then(parse_amount);
    let (amount, tx_type) = match columns.amount {
        AmountColumns::Signed(col) => {
            let value = cell(col)?;
            let value = if format.negate_amounts { -value } else { value };
            let tx_type = if value.is_sign_negative() {
                TransactionType::Debit
            } else {
                TransactionType::Credit
            };
            (value.abs(), tx_type)
        }
        AmountColumns::Split { credit, debit } => {
            let credit = cell(credit).map(|v| v.abs()).unwrap_or(Decimal::ZERO);
            let debit = cell(debit).map(|v| v.abs()).unwrap_or(Decimal::ZERO);
            if !credit.is_zero() && credit >= debit {
                (credit, TransactionType::Credit)
            } else {
                (debit, TransactionType::Debit)
            }
        }
    };
    if amount.is_zero() {
        return None;
    }

    let description = match clean_description(&original) {
        d if d.is_empty() => original.clone(),
        d => d,
    };
    Some(ParsedTransaction {
        date,
        description,
        original_description: original,
        amount,
        tx_type,
        balance: columns.balance.and_then(cell),
        raw_line: record.iter().collect::<Vec<_>>().join(","),
    })
}
