use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use taxlens_core::{Money, Quarter, TaxYear};

use crate::opportunities::DeductionOpportunity;

/// Expenses whose category carries no line land here.
pub const OTHER_EXPENSES_LINE: &str = "line_27a";

const LINE_LABELS: &[(&str, &str)] = &[
    ("line_1", "Gross receipts or sales"),
    ("line_2", "Returns and allowances"),
    ("line_4", "Cost of goods sold"),
    ("line_6", "Other income"),
    ("line_8", "Advertising"),
    ("line_9", "Car and truck expenses"),
    ("line_10", "Commissions and fees"),
    ("line_11", "Contract labor"),
    ("line_12", "Depletion"),
    ("line_13", "Depreciation and section 179 expense"),
    ("line_14", "Employee benefit programs"),
    ("line_15", "Insurance (other than health)"),
    ("line_16a", "Interest: mortgage"),
    ("line_16b", "Interest: other"),
    ("line_17", "Legal and professional services"),
    ("line_18", "Office expense"),
    ("line_19", "Pension and profit-sharing plans"),
    ("line_20a", "Rent or lease: vehicles, machinery, and equipment"),
    ("line_20b", "Rent or lease: other business property"),
    ("line_21", "Repairs and maintenance"),
    ("line_22", "Supplies"),
    ("line_23", "Taxes and licenses"),
    ("line_24a", "Travel"),
    ("line_24b", "Deductible meals"),
    ("line_25", "Utilities"),
    ("line_26", "Wages"),
    ("line_27a", "Other expenses"),
    ("line_30", "Expenses for business use of your home"),
    ("schedule_1_line_17", "Self-employed health insurance deduction"),
];

pub fn schedule_c_line_label(line: &str) -> Option<&'static str> {
    LINE_LABELS
        .iter()
        .find(|(id, _)| *id == line)
        .map(|(_, label)| *label)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    /// Trades that buy materials and hold licenses: contractors, repair, cleaning.
    ServiceTrade,
    Professional,
    Creative,
    Retail,
    Other,
}

impl fmt::Display for BusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessType::ServiceTrade => write!(f, "service_trade"),
            BusinessType::Professional => write!(f, "professional"),
            BusinessType::Creative => write!(f, "creative"),
            BusinessType::Retail => write!(f, "retail"),
            BusinessType::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub name: String,
    pub business_type: BusinessType,
}

impl BusinessProfile {
    pub fn new(name: impl Into<String>, business_type: BusinessType) -> Self {
        Self {
            name: name.into(),
            business_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleCLine {
    pub label: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyPayment {
    pub quarter: Quarter,
    pub due_date: NaiveDate,
    pub amount: Money,
}

/// Derived Schedule-C view of one tax year. Recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxSummary {
    pub business: BusinessProfile,
    pub tax_year: TaxYear,
    pub gross_income: Money,
    /// Schedule-C expense lines only; above-the-line items are reported apart.
    pub total_deductions: Money,
    pub net_profit: Money,
    pub self_employment_tax: Money,
    pub se_tax_deduction: Money,
    pub schedule_c_lines: BTreeMap<String, ScheduleCLine>,
    pub above_the_line_deductions: BTreeMap<String, ScheduleCLine>,
    /// Per quarter.
    pub estimated_quarterly_payments: Money,
    pub quarterly_schedule: Vec<QuarterlyPayment>,
    pub deduction_opportunities: Vec<DeductionOpportunity>,
    pub transaction_count: usize,
    pub uncategorized_count: usize,
    /// Transfers, personal items and transactions dated outside the tax year.
    pub excluded_count: usize,
}

impl TaxSummary {
    pub fn line_amount(&self, line: &str) -> Money {
        self.schedule_c_lines
            .get(line)
            .or_else(|| self.above_the_line_deductions.get(line))
            .map(|l| l.amount)
            .unwrap_or_else(Money::zero)
    }
}

/// The four estimated-payment installments for `year`, each `amount`.
pub fn quarterly_schedule(year: TaxYear, amount: Money) -> Vec<QuarterlyPayment> {
    Quarter::ALL
        .iter()
        .filter_map(|&quarter| {
            Some(QuarterlyPayment {
                quarter,
                due_date: quarter.estimated_payment_due(year)?,
                amount,
            })
        })
        .collect()
}
