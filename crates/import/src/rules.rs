use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use taxlens_core::{
    CategorizedBy, CategorizedTransaction, CategoryTaxonomy, Classification, ParsedTransaction,
};
use thiserror::Error;

/// Declarative table of built-in rules, checked in file order.
const BUILTIN_RULES_TOML: &str = include_str!("../data/builtin_rules.toml");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorizationRule {
    pub pattern: String,
    #[serde(default)]
    pub match_type: MatchType,
    pub category_id: String,
    #[serde(default)]
    pub is_personal: bool,
    #[serde(default)]
    pub is_transfer: bool,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Only meaningful for user rules; higher is checked first.
    #[serde(default)]
    pub priority: i32,
}

fn default_confidence() -> f32 {
    0.8
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Contains,
    StartsWith,
    Exact,
    Regex,
}

impl std::str::FromStr for MatchType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(MatchType::Contains),
            "starts_with" => Ok(MatchType::StartsWith),
            "exact" => Ok(MatchType::Exact),
            "regex" => Ok(MatchType::Regex),
            other => Err(RuleError::UnknownMatchType(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to parse rules TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Unknown match type: '{0}'")]
    UnknownMatchType(String),
    #[error("Rule '{pattern}' references unknown category '{category_id}'")]
    UnknownCategory { pattern: String, category_id: String },
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<CategorizationRule>,
}

pub fn parse_rules_toml(toml_content: &str) -> Result<Vec<CategorizationRule>, RuleError> {
    let file: RuleFile = toml::from_str(toml_content)?;
    Ok(file.rule)
}

/// The built-in rule table. The file ships with the crate, so a parse
/// failure is a build defect and panics on first use.
pub fn builtin_rules() -> &'static [CategorizationRule] {
    static RULES: OnceLock<Vec<CategorizationRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        parse_rules_toml(BUILTIN_RULES_TOML).expect("builtin_rules.toml is malformed")
    })
}

/// Rules whose category is missing from `taxonomy`.
pub fn validate_rules(
    rules: &[CategorizationRule],
    taxonomy: &CategoryTaxonomy,
) -> Vec<RuleError> {
    rules
        .iter()
        .filter(|r| !taxonomy.contains(&r.category_id))
        .map(|r| RuleError::UnknownCategory {
            pattern: r.pattern.clone(),
            category_id: r.category_id.clone(),
        })
        .collect()
}

/// Internal pairing of a rule with its lower-cased pattern and precompiled
/// regex (if applicable).
struct CompiledRule {
    rule: CategorizationRule,
    pattern: String,
    compiled_regex: Option<regex::Regex>,
}

impl CompiledRule {
    fn new(rule: CategorizationRule) -> Self {
        let compiled_regex = if rule.match_type == MatchType::Regex {
            // A pattern that fails to compile simply never matches.
            regex::RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .ok()
        } else {
            None
        };
        let pattern = rule.pattern.to_lowercase();
        CompiledRule {
            rule,
            pattern,
            compiled_regex,
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self.rule.match_type {
            MatchType::Contains => text.contains(&self.pattern),
            MatchType::StartsWith => text.starts_with(&self.pattern),
            MatchType::Exact => text == self.pattern,
            MatchType::Regex => self
                .compiled_regex
                .as_ref()
                .is_some_and(|re| re.is_match(text)),
        }
    }
}

/// Deterministic, first-match-wins categorizer: user rules by descending
/// priority, then built-in rules in table order.
pub struct RuleEngine<'t> {
    taxonomy: &'t CategoryTaxonomy,
    user_rules: Vec<CompiledRule>,
    builtin: Vec<CompiledRule>,
}

impl<'t> RuleEngine<'t> {
    pub fn new(taxonomy: &'t CategoryTaxonomy, user_rules: Vec<CategorizationRule>) -> Self {
        Self::with_builtin(taxonomy, user_rules, builtin_rules().to_vec())
    }

    pub fn with_builtin(
        taxonomy: &'t CategoryTaxonomy,
        user_rules: Vec<CategorizationRule>,
        builtin: Vec<CategorizationRule>,
    ) -> Self {
        let mut user: Vec<CompiledRule> = user_rules.into_iter().map(CompiledRule::new).collect();
        // Stable sort keeps declaration order among equal priorities.
        user.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        Self {
            taxonomy,
            user_rules: user,
            builtin: builtin.into_iter().map(CompiledRule::new).collect(),
        }
    }

    pub fn from_toml(
        taxonomy: &'t CategoryTaxonomy,
        user_rules_toml: &str,
    ) -> Result<Self, RuleError> {
        let rules = parse_rules_toml(user_rules_toml)?;
        Ok(Self::new(taxonomy, rules))
    }

    pub fn find_match(&self, tx: &ParsedTransaction) -> Option<&CategorizationRule> {
        let text = tx.description.to_lowercase();
        self.user_rules
            .iter()
            .chain(self.builtin.iter())
            .find(|cr| cr.matches(&text))
            .map(|cr| &cr.rule)
    }

    pub fn categorize_one(&self, tx: &ParsedTransaction) -> CategorizedTransaction {
        let mut out = CategorizedTransaction::unresolved(tx.clone());
        if let Some(rule) = self.find_match(tx) {
            out.apply(
                Classification {
                    category_id: rule.category_id.clone(),
                    is_personal: rule.is_personal,
                    is_transfer: rule.is_transfer,
                    confidence: rule.confidence,
                    categorized_by: CategorizedBy::Rule,
                },
                self.taxonomy.get(&rule.category_id),
            );
        }
        out
    }

    pub fn categorize(&self, transactions: &[ParsedTransaction]) -> Vec<CategorizedTransaction> {
        transactions.iter().map(|tx| self.categorize_one(tx)).collect()
    }

    pub fn rule_count(&self) -> usize {
        self.user_rules.len() + self.builtin.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::str::FromStr;
    use taxlens_core::{default_taxonomy, TransactionType};

    fn make_tx(desc: &str, amount: &str) -> ParsedTransaction {
        ParsedTransaction::from_signed(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            desc.to_string(),
            desc.to_string(),
            Decimal::from_str(amount).unwrap(),
            desc.to_string(),
        )
    }

    fn make_rule(pattern: &str, match_type: MatchType, category: &str, priority: i32) -> CategorizationRule {
        CategorizationRule {
            pattern: pattern.to_string(),
            match_type,
            category_id: category.to_string(),
            is_personal: false,
            is_transfer: false,
            confidence: 0.9,
            priority,
        }
    }

    fn engine_with<'t>(
        taxonomy: &'t CategoryTaxonomy,
        rules: Vec<CategorizationRule>,
    ) -> RuleEngine<'t> {
        RuleEngine::with_builtin(taxonomy, vec![], rules)
    }

    #[test]
    fn builtin_rules_load() {
        assert!(builtin_rules().len() > 50);
    }

    #[test]
    fn builtin_categories_resolve_in_taxonomy() {
        let taxonomy = default_taxonomy();
        let errors = validate_rules(builtin_rules(), &taxonomy);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn builtin_confidence_in_range() {
        for rule in builtin_rules() {
            assert!((0.0..=1.0).contains(&rule.confidence), "{}", rule.pattern);
        }
    }

    #[test]
    fn builtin_regexes_compile() {
        for rule in builtin_rules().iter().filter(|r| r.match_type == MatchType::Regex) {
            assert!(regex::Regex::new(&rule.pattern).is_ok(), "{}", rule.pattern);
        }
    }

    #[test]
    fn contains_match_case_insensitive() {
        let taxonomy = default_taxonomy();
        let rule = make_rule("Whole Foods", MatchType::Contains, "personal_expense", 0);
        let engine = engine_with(&taxonomy, vec![rule]);
        assert!(engine.find_match(&make_tx("WHOLE FOODS MARKET 123", "-50.00")).is_some());
        assert!(engine.find_match(&make_tx("STARBUCKS", "-5.00")).is_none());
    }

    #[test]
    fn starts_with_match() {
        let taxonomy = default_taxonomy();
        let engine = engine_with(&taxonomy, vec![make_rule("sq *", MatchType::StartsWith, "meals", 0)]);
        assert!(engine.find_match(&make_tx("SQ *BLUE BOTTLE", "-6.00")).is_some());
        assert!(engine.find_match(&make_tx("PAID VIA SQ *", "-6.00")).is_none());
    }

    #[test]
    fn exact_match() {
        let taxonomy = default_taxonomy();
        let engine = engine_with(&taxonomy, vec![make_rule("starbucks", MatchType::Exact, "meals", 0)]);
        assert!(engine.find_match(&make_tx("STARBUCKS", "-5.00")).is_some());
        assert!(engine.find_match(&make_tx("STARBUCKS RESERVE", "-5.00")).is_none());
    }

    #[test]
    fn regex_match() {
        let taxonomy = default_taxonomy();
        let rule = make_rule(r"^AMZN|AMAZON", MatchType::Regex, "office_expense", 0);
        let engine = engine_with(&taxonomy, vec![rule]);
        assert!(engine.find_match(&make_tx("AMAZON MARKETPLACE", "-19.99")).is_some());
        assert!(engine.find_match(&make_tx("AMZN*PRIME", "-13.99")).is_some());
        assert!(engine.find_match(&make_tx("WHOLE FOODS", "-10.00")).is_none());
    }

    #[test]
    fn invalid_regex_never_matches() {
        let taxonomy = default_taxonomy();
        let engine = engine_with(
            &taxonomy,
            vec![
                make_rule(r"([unclosed", MatchType::Regex, "meals", 0),
                make_rule("unclosed", MatchType::Contains, "supplies", 0),
            ],
        );
        let rule = engine.find_match(&make_tx("[UNCLOSED THING", "-1.00")).unwrap();
        assert_eq!(rule.category_id, "supplies");
    }

    #[test]
    fn first_builtin_match_wins() {
        let taxonomy = default_taxonomy();
        let engine = engine_with(
            &taxonomy,
            vec![
                make_rule("uber eats", MatchType::Contains, "meals", 0),
                make_rule("uber", MatchType::Contains, "travel", 0),
            ],
        );
        let tx = engine.categorize_one(&make_tx("UBER EATS ORDER", "-30.00"));
        assert_eq!(tx.category_id.as_deref(), Some("meals"));
        let tx = engine.categorize_one(&make_tx("UBER TRIP HELP.UBER.COM", "-18.00"));
        assert_eq!(tx.category_id.as_deref(), Some("travel"));
    }

    #[test]
    fn user_priority_ordering_highest_wins() {
        let taxonomy = default_taxonomy();
        let engine = RuleEngine::with_builtin(
            &taxonomy,
            vec![
                make_rule("amazon", MatchType::Contains, "office_expense", 1),
                make_rule("amazon", MatchType::Contains, "supplies", 10),
            ],
            vec![],
        );
        let rule = engine.find_match(&make_tx("AMAZON MARKETPLACE", "-9.99")).unwrap();
        assert_eq!(rule.category_id, "supplies");
    }

    #[test]
    fn user_rules_beat_more_specific_builtin() {
        let taxonomy = default_taxonomy();
        let engine = RuleEngine::new(
            &taxonomy,
            vec![make_rule("a", MatchType::Contains, "personal_expense", -100)],
        );
        let tx = engine.categorize_one(&make_tx("ADOBE CREATIVE CLOUD", "-54.99"));
        assert_eq!(tx.category_id.as_deref(), Some("personal_expense"));
        assert!(tx.is_personal);
    }

    #[test]
    fn unmatched_is_unresolved() {
        let taxonomy = default_taxonomy();
        let engine = RuleEngine::new(&taxonomy, vec![]);
        let tx = engine.categorize_one(&make_tx("QWXZ 9981 LLC", "-42.00"));
        assert_eq!(tx.category_id, None);
        assert_eq!(tx.confidence, 0.0);
        assert_eq!(tx.categorized_by, None);
    }

    #[test]
    fn categorize_preserves_transaction_fields() {
        let taxonomy = default_taxonomy();
        let engine = RuleEngine::new(&taxonomy, vec![]);
        let input = make_tx("GITHUB INC", "-4.00");
        let out = engine.categorize_one(&input);
        assert_eq!(out.transaction, input);
        assert_eq!(out.transaction.tx_type, TransactionType::Debit);
        assert_eq!(out.categorized_by, Some(CategorizedBy::Rule));
        assert_eq!(out.schedule_c_line.as_deref(), Some("line_27a"));
    }

    #[test]
    fn categorization_is_deterministic() {
        let taxonomy = default_taxonomy();
        let engine = RuleEngine::new(&taxonomy, vec![]);
        let samples = [
            "DELTA AIR LINES 0062345",
            "ATM WITHDRAWAL 123 MAIN ST",
            "ONLINE TRANSFER TO SAV 1234",
            "STRIPE PAYOUT",
            "MONTHLY SERVICE FEE",
            "NOTHING KNOWN HERE",
        ];
        for desc in samples {
            let tx = make_tx(desc, "-10.00");
            let first = engine.categorize_one(&tx);
            for _ in 0..5 {
                assert_eq!(engine.categorize_one(&tx), first);
            }
            assert!((0.0..=1.0).contains(&first.confidence));
        }
    }

    #[test]
    fn atm_withdrawal_is_personal_draw() {
        let taxonomy = default_taxonomy();
        let engine = RuleEngine::new(&taxonomy, vec![]);
        let tx = engine.categorize_one(&make_tx("ATM WITHDRAWAL 123 MAIN ST", "-200.00"));
        assert_eq!(tx.category_id.as_deref(), Some("owner_draw"));
        assert!(tx.is_personal);
    }

    #[test]
    fn transfers_flagged() {
        let taxonomy = default_taxonomy();
        let engine = RuleEngine::new(&taxonomy, vec![]);
        let tx = engine.categorize_one(&make_tx("ONLINE TRANSFER TO SAV 1234", "-500.00"));
        assert!(tx.is_transfer);
    }

    #[test]
    fn every_rule_category_has_a_type() {
        let taxonomy = default_taxonomy();
        let types: HashSet<_> = builtin_rules()
            .iter()
            .map(|r| taxonomy.get(&r.category_id).map(|c| c.category_type))
            .collect();
        assert!(!types.contains(&None));
    }

    #[test]
    fn from_toml_user_rules() {
        let taxonomy = default_taxonomy();
        let toml = r#"
            [[rule]]
            pattern = "acme corp"
            category_id = "business_income"
            priority = 5
            confidence = 1.0

            [[rule]]
            pattern = "^sq \\*"
            match_type = "regex"
            category_id = "meals"
        "#;
        let engine = RuleEngine::from_toml(&taxonomy, toml).unwrap();
        let tx = engine.categorize_one(&make_tx("ACME CORP ACH PMT", "1500.00"));
        assert_eq!(tx.category_id.as_deref(), Some("business_income"));
        assert_eq!(tx.confidence, 1.0);
        let tx = engine.categorize_one(&make_tx("SQ *CORNER CAFE", "-7.25"));
        assert_eq!(tx.category_id.as_deref(), Some("meals"));
    }

    #[test]
    fn from_toml_rejects_bad_match_type() {
        let taxonomy = default_taxonomy();
        let toml = r#"
            [[rule]]
            pattern = "x"
            match_type = "fuzzy"
            category_id = "meals"
        "#;
        assert!(matches!(RuleEngine::from_toml(&taxonomy, toml), Err(RuleError::Toml(_))));
    }

    #[test]
    fn match_type_from_str() {
        assert_eq!(MatchType::from_str("starts_with").unwrap(), MatchType::StartsWith);
        assert!(MatchType::from_str("fuzzy").is_err());
    }
}
