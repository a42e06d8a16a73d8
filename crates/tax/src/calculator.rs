use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taxlens_core::{
    CategorizedTransaction, Category, CategoryTaxonomy, CategoryType, Money, TaxYear,
    TaxonomyError, TransactionType, MEALS_LINE, SCHEDULE_1_PREFIX,
};
use thiserror::Error;

use crate::opportunities::find_opportunities;
use crate::summary::{
    quarterly_schedule, schedule_c_line_label, BusinessProfile, ScheduleCLine, TaxSummary,
    OTHER_EXPENSES_LINE,
};

#[derive(Debug, Error, PartialEq)]
pub enum TaxError {
    #[error("Categorized transaction references a category outside the taxonomy: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

/// Social Security wage bases by year; later years reuse the last entry.
const SS_WAGE_BASES: &[(i32, i64)] = &[
    (2022, 147_000),
    (2023, 160_200),
    (2024, 168_600),
    (2025, 176_100),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxParameters {
    pub year: TaxYear,
    pub ss_wage_base: Decimal,
    pub ss_rate: Decimal,
    pub medicare_rate: Decimal,
    pub additional_medicare_rate: Decimal,
    pub additional_medicare_threshold: Decimal,
    /// Share of net profit subject to SE tax.
    pub se_factor: Decimal,
    /// Flat income-tax rate used only for the quarterly estimate.
    pub estimate_income_tax_rate: Decimal,
}

impl TaxParameters {
    pub fn for_year(year: TaxYear) -> Self {
        let wage_base = SS_WAGE_BASES
            .iter()
            .rev()
            .find(|(y, _)| *y <= year.year())
            .or_else(|| SS_WAGE_BASES.first())
            .map(|(_, base)| *base)
            .unwrap_or(168_600);
        Self {
            year,
            ss_wage_base: Decimal::from(wage_base),
            ss_rate: Decimal::new(124, 3),
            medicare_rate: Decimal::new(29, 3),
            additional_medicare_rate: Decimal::new(9, 3),
            additional_medicare_threshold: Decimal::from(200_000),
            se_factor: Decimal::new(9235, 4),
            estimate_income_tax_rate: Decimal::new(22, 2),
        }
    }
}

/// Unrounded SE tax components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfEmploymentTax {
    pub taxable_base: Decimal,
    pub social_security: Decimal,
    pub medicare: Decimal,
    pub additional_medicare: Decimal,
    pub total: Decimal,
    /// Half of the total, deductible above the line.
    pub deduction: Decimal,
}

pub fn self_employment_tax(net_profit: Decimal, params: &TaxParameters) -> SelfEmploymentTax {
    if net_profit <= Decimal::ZERO {
        return SelfEmploymentTax {
            taxable_base: Decimal::ZERO,
            social_security: Decimal::ZERO,
            medicare: Decimal::ZERO,
            additional_medicare: Decimal::ZERO,
            total: Decimal::ZERO,
            deduction: Decimal::ZERO,
        };
    }
    let base = net_profit * params.se_factor;
    let social_security = base.min(params.ss_wage_base) * params.ss_rate;
    let medicare = base * params.medicare_rate;
    let additional_medicare = (base - params.additional_medicare_threshold).max(Decimal::ZERO)
        * params.additional_medicare_rate;
    let total = social_security + medicare + additional_medicare;
    SelfEmploymentTax {
        taxable_base: base,
        social_security,
        medicare,
        additional_medicare,
        total,
        deduction: total / Decimal::TWO,
    }
}

/// Rough per-quarter estimate: SE tax plus a flat income-tax share of profit.
pub fn estimated_quarterly_payment(
    net_profit: Decimal,
    se_tax: Decimal,
    params: &TaxParameters,
) -> Decimal {
    if net_profit <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (se_tax + net_profit * params.estimate_income_tax_rate) / Decimal::from(4)
}

pub struct TaxCalculator<'t> {
    taxonomy: &'t CategoryTaxonomy,
    params: TaxParameters,
}

impl<'t> TaxCalculator<'t> {
    pub fn new(taxonomy: &'t CategoryTaxonomy, year: TaxYear) -> Self {
        Self::with_parameters(taxonomy, TaxParameters::for_year(year))
    }

    pub fn with_parameters(taxonomy: &'t CategoryTaxonomy, params: TaxParameters) -> Self {
        Self { taxonomy, params }
    }

    pub fn parameters(&self) -> &TaxParameters {
        &self.params
    }

    /// Builds the Schedule-C summary for the calculator's tax year. Fails only
    /// when a transaction names a category the taxonomy does not know.
    pub fn summarize(
        &self,
        business: &BusinessProfile,
        transactions: &[CategorizedTransaction],
    ) -> Result<TaxSummary, TaxError> {
        let year = self.params.year;
        let mut gross_income = Decimal::ZERO;
        let mut schedule_c: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut schedule_1: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut labels: BTreeMap<String, String> = BTreeMap::new();
        let mut uncategorized_count = 0;
        let mut excluded_count = 0;

        for tx in transactions {
            let Some(category_id) = tx.category_id.as_deref() else {
                uncategorized_count += 1;
                continue;
            };
            let category = self.taxonomy.require(category_id)?;
            if tx.is_transfer || tx.is_personal || !year.contains(tx.transaction.date) {
                excluded_count += 1;
                continue;
            }

            let amount = tx.transaction.amount;
            match tx.transaction.tx_type {
                TransactionType::Credit => gross_income += amount,
                TransactionType::Debit => {
                    let line = expense_line(tx, category);
                    let amount = if line == MEALS_LINE {
                        amount / Decimal::TWO
                    } else {
                        amount
                    };
                    labels
                        .entry(line.clone())
                        .or_insert_with(|| line_label(&line, category));
                    let bucket = if line.starts_with(SCHEDULE_1_PREFIX) {
                        &mut schedule_1
                    } else {
                        &mut schedule_c
                    };
                    *bucket.entry(line).or_insert(Decimal::ZERO) += amount;
                }
            }
        }

        let total_deductions: Decimal = schedule_c.values().sum();
        let net_profit = gross_income - total_deductions;
        let se = self_employment_tax(net_profit, &self.params);
        let quarterly = Money::from_decimal(estimated_quarterly_payment(
            net_profit,
            se.total,
            &self.params,
        ));

        let mut all_lines = schedule_c.clone();
        all_lines.extend(schedule_1.iter().map(|(k, v)| (k.clone(), *v)));
        let deduction_opportunities = find_opportunities(&all_lines, business.business_type);

        tracing::info!(
            "Computed {} summary for {}: net profit {}, SE tax {} ({} uncategorized, {} excluded)",
            year,
            business.name,
            Money::from_decimal(net_profit),
            Money::from_decimal(se.total),
            uncategorized_count,
            excluded_count
        );

        Ok(TaxSummary {
            business: business.clone(),
            tax_year: year,
            gross_income: Money::from_decimal(gross_income),
            total_deductions: Money::from_decimal(total_deductions),
            net_profit: Money::from_decimal(net_profit),
            self_employment_tax: Money::from_decimal(se.total),
            se_tax_deduction: Money::from_decimal(se.deduction),
            schedule_c_lines: rounded_lines(schedule_c, &labels),
            above_the_line_deductions: rounded_lines(schedule_1, &labels),
            estimated_quarterly_payments: quarterly,
            quarterly_schedule: quarterly_schedule(year, quarterly),
            deduction_opportunities,
            transaction_count: transactions.len(),
            uncategorized_count,
            excluded_count,
        })
    }
}

/// Income categories carry income lines, so money going out under one is
/// filed as an other expense.
fn expense_line(tx: &CategorizedTransaction, category: &Category) -> String {
    if category.category_type == CategoryType::Income {
        return OTHER_EXPENSES_LINE.to_string();
    }
    tx.schedule_c_line
        .clone()
        .or_else(|| category.schedule_c_line.clone())
        .unwrap_or_else(|| OTHER_EXPENSES_LINE.to_string())
}

fn line_label(line: &str, category: &Category) -> String {
    schedule_c_line_label(line)
        .map(str::to_string)
        .unwrap_or_else(|| category.label.clone())
}

fn rounded_lines(
    totals: BTreeMap<String, Decimal>,
    labels: &BTreeMap<String, String>,
) -> BTreeMap<String, ScheduleCLine> {
    totals
        .into_iter()
        .map(|(line, amount)| {
            let label = labels.get(&line).cloned().unwrap_or_else(|| line.clone());
            (
                line,
                ScheduleCLine {
                    label,
                    amount: Money::from_decimal(amount),
                },
            )
        })
        .collect()
}
