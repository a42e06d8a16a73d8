use crate::statement::StatementLayout;

// ── Statement text ───────────────────────────────────────────────────────────

/// Checked in order; every marker must appear (case-insensitive). Chase
/// checking comes before the card layout because Chase card statements
/// also say "chase".
const LAYOUT_MARKERS: &[(StatementLayout, &[&str])] = &[
    (StatementLayout::ChaseChecking, &["chase", "checking summary"]),
    (StatementLayout::BankOfAmerica, &["bank of america", "deposits and other additions"]),
    (StatementLayout::CreditCard, &["account activity", "new balance"]),
    (StatementLayout::LedgerColumns, &["transaction history", "ending daily balance"]),
];

pub fn detect_statement_layout(text: &str) -> StatementLayout {
    let lower = text.to_lowercase();
    let layout = LAYOUT_MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().all(|m| lower.contains(m)))
        .map(|(layout, _)| *layout)
        .unwrap_or(StatementLayout::Generic);
    tracing::debug!("Detected statement layout: {}", layout);
    layout
}

// ── CSV exports ──────────────────────────────────────────────────────────────

/// Column map for one bank's CSV export. Candidate names are tried exactly
/// first, then as substrings of the (lower-cased) headers.
#[derive(Debug)]
pub struct CsvFormat {
    pub id: &'static str,
    pub name: &'static str,
    /// Alternative header fingerprints; a format matches when every token of
    /// any one fingerprint is contained in some header.
    signatures: &'static [&'static [&'static str]],
    pub date_columns: &'static [&'static str],
    pub description_columns: &'static [&'static str],
    pub amount_columns: &'static [&'static str],
    pub credit_columns: &'static [&'static str],
    pub debit_columns: &'static [&'static str],
    pub balance_columns: &'static [&'static str],
    /// The export prints charges as positive numbers.
    pub negate_amounts: bool,
}

impl CsvFormat {
    fn matches(&self, headers: &[String]) -> bool {
        self.signatures.iter().any(|signature| {
            signature
                .iter()
                .all(|token| headers.iter().any(|h| h.contains(token)))
        })
    }
}

const DATE_COLUMNS: &[&str] = &[
    "date",
    "transaction date",
    "posting date",
    "posted date",
    "trans. date",
    "post date",
];
const DESCRIPTION_COLUMNS: &[&str] = &[
    "description",
    "payee",
    "transaction description",
    "details",
    "merchant",
    "name",
    "memo",
];
const AMOUNT_COLUMNS: &[&str] = &["amount", "transaction amount"];
const CREDIT_COLUMNS: &[&str] = &["credit", "credits", "deposit", "deposits", "money in"];
const DEBIT_COLUMNS: &[&str] = &["debit", "debits", "withdrawal", "withdrawals", "money out"];
const BALANCE_COLUMNS: &[&str] = &["balance", "running bal", "running balance"];

pub static CHASE: CsvFormat = CsvFormat {
    id: "chase",
    name: "Chase",
    signatures: &[
        &["details", "posting date", "check or slip"],
        &["transaction date", "post date", "category", "memo"],
    ],
    date_columns: &["posting date", "transaction date"],
    description_columns: &["description"],
    amount_columns: &["amount"],
    credit_columns: &[],
    debit_columns: &[],
    balance_columns: &["balance"],
    negate_amounts: false,
};

pub static BANK_OF_AMERICA: CsvFormat = CsvFormat {
    id: "bank_of_america",
    name: "Bank of America",
    signatures: &[&["running bal"], &["reference number", "payee", "address"]],
    date_columns: &["date", "posted date"],
    description_columns: &["description", "payee"],
    amount_columns: &["amount"],
    credit_columns: &[],
    debit_columns: &[],
    balance_columns: &["running bal"],
    negate_amounts: false,
};

pub static AMERICAN_EXPRESS: CsvFormat = CsvFormat {
    id: "american_express",
    name: "American Express",
    signatures: &[&["card member"]],
    date_columns: &["date"],
    description_columns: &["description"],
    amount_columns: &["amount"],
    credit_columns: &[],
    debit_columns: &[],
    balance_columns: &[],
    negate_amounts: true,
};

pub static CAPITAL_ONE: CsvFormat = CsvFormat {
    id: "capital_one",
    name: "Capital One",
    signatures: &[&["card no."]],
    date_columns: &["transaction date", "posted date"],
    description_columns: &["description"],
    amount_columns: &[],
    credit_columns: &["credit"],
    debit_columns: &["debit"],
    balance_columns: &[],
    negate_amounts: false,
};

pub static CITI: CsvFormat = CsvFormat {
    id: "citi",
    name: "Citi",
    signatures: &[&["status", "debit", "credit"]],
    date_columns: &["date"],
    description_columns: &["description"],
    amount_columns: &[],
    credit_columns: &["credit"],
    debit_columns: &["debit"],
    balance_columns: &[],
    negate_amounts: false,
};

pub static DISCOVER: CsvFormat = CsvFormat {
    id: "discover",
    name: "Discover",
    signatures: &[&["trans. date", "post date"]],
    date_columns: &["trans. date", "post date"],
    description_columns: &["description"],
    amount_columns: &["amount"],
    credit_columns: &[],
    debit_columns: &[],
    balance_columns: &[],
    negate_amounts: true,
};

pub static GENERIC: CsvFormat = CsvFormat {
    id: "generic",
    name: "Generic",
    signatures: &[],
    date_columns: DATE_COLUMNS,
    description_columns: DESCRIPTION_COLUMNS,
    amount_columns: AMOUNT_COLUMNS,
    credit_columns: CREDIT_COLUMNS,
    debit_columns: DEBIT_COLUMNS,
    balance_columns: BALANCE_COLUMNS,
    negate_amounts: false,
};

/// Known exports, most specific fingerprint first.
static KNOWN_FORMATS: [&CsvFormat; 6] = [
    &AMERICAN_EXPRESS,
    &CAPITAL_ONE,
    &CITI,
    &DISCOVER,
    &BANK_OF_AMERICA,
    &CHASE,
];

/// Picks the export format whose fingerprint matches `headers`, falling back
/// to the generic column map. Headers are compared lower-cased and trimmed.
pub fn detect_csv_format(headers: &[String]) -> &'static CsvFormat {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    KNOWN_FORMATS
        .iter()
        .copied()
        .find(|format| format.matches(&normalized))
        .unwrap_or(&GENERIC)
}
