use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Income,
    Expense,
    Transfer,
    Personal,
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryType::Income => write!(f, "income"),
            CategoryType::Expense => write!(f, "expense"),
            CategoryType::Transfer => write!(f, "transfer"),
            CategoryType::Personal => write!(f, "personal"),
        }
    }
}

impl std::str::FromStr for CategoryType {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(CategoryType::Income),
            "expense" => Ok(CategoryType::Expense),
            "transfer" => Ok(CategoryType::Transfer),
            "personal" => Ok(CategoryType::Personal),
            other => Err(TaxonomyError::UnknownType(other.to_string())),
        }
    }
}

/// Prefix marking a line that lives on Schedule 1 rather than Schedule C.
pub const SCHEDULE_1_PREFIX: &str = "schedule_1";

/// Schedule-C line that receives only half its expense total.
pub const MEALS_LINE: &str = "line_24b";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub label: String,
    pub category_type: CategoryType,
    /// Schedule-C line id (`line_8`, `line_24b`, ...) or a `schedule_1_*`
    /// marker for above-the-line items.
    pub schedule_c_line: Option<String>,
}

impl Category {
    pub fn new(id: &str, label: &str, category_type: CategoryType, line: Option<&str>) -> Self {
        Category {
            id: id.to_string(),
            label: label.to_string(),
            category_type,
            schedule_c_line: line.map(str::to_string),
        }
    }

    pub fn is_above_the_line(&self) -> bool {
        self.schedule_c_line
            .as_deref()
            .is_some_and(|l| l.starts_with(SCHEDULE_1_PREFIX))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaxonomyError {
    #[error("Unknown category type: '{0}'")]
    UnknownType(String),
    #[error("Duplicate category id: {0}")]
    DuplicateId(String),
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
}

/// Caller-supplied mapping from category id to its label, type and tax line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTaxonomy {
    categories: BTreeMap<String, Category>,
}

impl CategoryTaxonomy {
    pub fn new(categories: Vec<Category>) -> Result<Self, TaxonomyError> {
        let mut map = BTreeMap::new();
        for category in categories {
            if map.contains_key(&category.id) {
                return Err(TaxonomyError::DuplicateId(category.id));
            }
            map.insert(category.id.clone(), category);
        }
        Ok(CategoryTaxonomy { categories: map })
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&Category, TaxonomyError> {
        self.get(id)
            .ok_or_else(|| TaxonomyError::CategoryNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.categories.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

pub const DEFAULT_CATEGORIES: &[(&str, &str, CategoryType, &str)] = &[
    ("business_income", "Business Income", CategoryType::Income, "line_1"),
    ("other_income", "Other Income", CategoryType::Income, "line_6"),
    ("advertising", "Advertising & Marketing", CategoryType::Expense, "line_8"),
    ("car_truck", "Car & Truck Expenses", CategoryType::Expense, "line_9"),
    ("commissions_fees", "Commissions & Fees", CategoryType::Expense, "line_10"),
    ("contract_labor", "Contract Labor", CategoryType::Expense, "line_11"),
    ("insurance", "Business Insurance", CategoryType::Expense, "line_15"),
    ("interest_business", "Business Interest", CategoryType::Expense, "line_16b"),
    (
        "legal_professional",
        "Legal & Professional Services",
        CategoryType::Expense,
        "line_17",
    ),
    ("office_expense", "Office Expense", CategoryType::Expense, "line_18"),
    ("rent_lease", "Rent & Lease", CategoryType::Expense, "line_20b"),
    (
        "repairs_maintenance",
        "Repairs & Maintenance",
        CategoryType::Expense,
        "line_21",
    ),
    ("supplies", "Supplies", CategoryType::Expense, "line_22"),
    ("taxes_licenses", "Taxes & Licenses", CategoryType::Expense, "line_23"),
    ("travel", "Travel", CategoryType::Expense, "line_24a"),
    (
        "meals",
        "Business Meals (50% deductible)",
        CategoryType::Expense,
        "line_24b",
    ),
    ("utilities", "Utilities", CategoryType::Expense, "line_25"),
    ("phone_internet", "Phone & Internet", CategoryType::Expense, "line_25"),
    ("wages", "Wages", CategoryType::Expense, "line_26"),
    (
        "software_subscriptions",
        "Software & Subscriptions",
        CategoryType::Expense,
        "line_27a",
    ),
    ("bank_fees", "Bank Fees", CategoryType::Expense, "line_27a"),
    ("education", "Education & Training", CategoryType::Expense, "line_27a"),
    ("home_office", "Home Office", CategoryType::Expense, "line_30"),
    (
        "health_insurance",
        "Self-Employed Health Insurance",
        CategoryType::Expense,
        "schedule_1_line_17",
    ),
    ("owner_transfer", "Transfer Between Accounts", CategoryType::Transfer, ""),
    ("credit_card_payment", "Credit Card Payment", CategoryType::Transfer, ""),
    ("loan_payment", "Loan Payment", CategoryType::Transfer, ""),
    ("owner_draw", "Owner's Draw", CategoryType::Personal, ""),
    ("personal_expense", "Personal Expense", CategoryType::Personal, ""),
    ("tax_payment", "Income Tax Payment", CategoryType::Personal, ""),
];

/// The taxonomy shipped with the crate; callers may supply their own instead.
pub fn default_taxonomy() -> CategoryTaxonomy {
    let categories = DEFAULT_CATEGORIES
        .iter()
        .map(|(id, label, ty, line)| {
            let line = if line.is_empty() { None } else { Some(*line) };
            Category::new(id, label, *ty, line)
        })
        .collect();
    CategoryTaxonomy::new(categories).expect("DEFAULT_CATEGORIES ids are unique")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_taxonomy_has_unique_ids() {
        let ids: HashSet<_> = DEFAULT_CATEGORIES.iter().map(|c| c.0).collect();
        assert_eq!(ids.len(), DEFAULT_CATEGORIES.len());
        assert_eq!(default_taxonomy().len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn expense_categories_have_lines() {
        for cat in default_taxonomy().iter() {
            if cat.category_type == CategoryType::Expense {
                assert!(cat.schedule_c_line.is_some(), "{} has no line", cat.id);
            }
        }
    }

    #[test]
    fn health_insurance_is_above_the_line() {
        let tax = default_taxonomy();
        assert!(tax.get("health_insurance").unwrap().is_above_the_line());
        assert!(!tax.get("meals").unwrap().is_above_the_line());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let result = CategoryTaxonomy::new(vec![
            Category::new("a", "A", CategoryType::Expense, None),
            Category::new("a", "A again", CategoryType::Income, None),
        ]);
        assert_eq!(result, Err(TaxonomyError::DuplicateId("a".to_string())));
    }

    #[test]
    fn require_missing_category() {
        let tax = default_taxonomy();
        assert!(tax.require("meals").is_ok());
        assert!(matches!(
            tax.require("nope"),
            Err(TaxonomyError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn category_type_roundtrip() {
        use std::str::FromStr;
        for ty in [
            CategoryType::Income,
            CategoryType::Expense,
            CategoryType::Transfer,
            CategoryType::Personal,
        ] {
            assert_eq!(CategoryType::from_str(&ty.to_string()).unwrap(), ty);
        }
        assert!(CategoryType::from_str("asset").is_err());
    }
}
