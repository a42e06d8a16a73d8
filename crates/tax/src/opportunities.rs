use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taxlens_core::Money;

use crate::summary::{schedule_c_line_label, BusinessType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionOpportunity {
    pub category: String,
    pub description: String,
    pub potential_savings: Money,
    pub action_required: String,
    pub schedule_c_line: String,
}

struct OpportunityRule {
    line: &'static str,
    category: &'static str,
    /// Line total below this (in dollars) triggers the suggestion.
    threshold: i64,
    /// A modest claim for a small business on this line.
    typical_claim: i64,
    description: &'static str,
    action: &'static str,
    /// `None` applies to every business type.
    business_types: Option<&'static [BusinessType]>,
}

fn effective_rate() -> Decimal {
    Decimal::new(30, 2)
}

// Deterministic checklist of commonly missed deductions. A rule fires when
// its line total is below the rule's threshold; the savings estimate is the
// gap to a typical claim at a flat effective rate.
const RULES: &[OpportunityRule] = &[
    OpportunityRule {
        line: "line_30",
        category: "Home Office",
        threshold: 1,
        typical_claim: 1_500,
        description: "No home office deduction recorded.",
        action: "If you use part of your home regularly and exclusively for work, claim the simplified method: $5 per square foot, up to 300 square feet.",
        business_types: None,
    },
    OpportunityRule {
        line: "line_9",
        category: "Vehicle",
        threshold: 1,
        typical_claim: 2_500,
        description: "No car or truck expenses recorded.",
        action: "Keep a mileage log for client visits and supply runs and claim the standard mileage rate.",
        business_types: None,
    },
    OpportunityRule {
        line: "schedule_1_line_17",
        category: "Health Insurance",
        threshold: 1,
        typical_claim: 6_000,
        description: "No self-employed health insurance premiums recorded.",
        action: "Premiums you pay for yourself and your family are deductible above the line if you were not eligible for an employer plan.",
        business_types: None,
    },
    OpportunityRule {
        line: "line_25",
        category: "Phone & Internet",
        threshold: 600,
        typical_claim: 1_200,
        description: "Phone and internet costs look low for a business.",
        action: "Deduct the business-use share of your mobile and home internet bills.",
        business_types: None,
    },
    OpportunityRule {
        line: "line_22",
        category: "Supplies",
        threshold: 500,
        typical_claim: 1_500,
        description: "Supplies look low for a trade business.",
        action: "Make sure materials, small tools and consumables bought for jobs are categorized as supplies.",
        business_types: Some(&[BusinessType::ServiceTrade]),
    },
    OpportunityRule {
        line: "line_23",
        category: "Licenses",
        threshold: 1,
        typical_claim: 300,
        description: "No license or permit fees recorded.",
        action: "Contractor licenses, permits and renewal fees are deductible under taxes and licenses.",
        business_types: Some(&[BusinessType::ServiceTrade]),
    },
    OpportunityRule {
        line: "line_15",
        category: "Business Insurance",
        threshold: 1,
        typical_claim: 1_000,
        description: "No business insurance recorded.",
        action: "General or professional liability premiums are deductible; check whether they were paid from a personal account.",
        business_types: Some(&[BusinessType::ServiceTrade, BusinessType::Professional]),
    },
    OpportunityRule {
        line: "line_17",
        category: "Professional Services",
        threshold: 1,
        typical_claim: 500,
        description: "No accounting or legal fees recorded.",
        action: "Tax preparation and bookkeeping fees for the business belong on line 17.",
        business_types: None,
    },
    OpportunityRule {
        line: "line_8",
        category: "Advertising",
        threshold: 1,
        typical_claim: 500,
        description: "No advertising recorded.",
        action: "Portfolio hosting, promoted posts and printed marketing count as advertising.",
        business_types: Some(&[BusinessType::Creative, BusinessType::Retail]),
    },
];

/// Suggestions for the lines in `line_totals` (unrounded, Schedule C and
/// Schedule 1 combined) that look under-claimed for `business_type`.
pub fn find_opportunities(
    line_totals: &BTreeMap<String, Decimal>,
    business_type: BusinessType,
) -> Vec<DeductionOpportunity> {
    RULES
        .iter()
        .filter(|rule| {
            rule.business_types
                .map_or(true, |types| types.contains(&business_type))
        })
        .filter_map(|rule| {
            let current = line_totals.get(rule.line).copied().unwrap_or(Decimal::ZERO);
            if current >= Decimal::from(rule.threshold) {
                return None;
            }
            let gap = (Decimal::from(rule.typical_claim) - current).max(Decimal::ZERO);
            let line_label = schedule_c_line_label(rule.line).unwrap_or(rule.line);
            Some(DeductionOpportunity {
                category: rule.category.to_string(),
                description: format!("{} ({})", rule.description, line_label),
                potential_savings: Money::from_decimal(gap * effective_rate()),
                action_required: rule.action.to_string(),
                schedule_c_line: rule.line.to_string(),
            })
        })
        .collect()
}
