use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::{Category, CategoryType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Credit => write!(f, "credit"),
            TransactionType::Debit => write!(f, "debit"),
        }
    }
}

/// One transaction as read from a statement or CSV export.
///
/// `amount` is always non-negative; direction lives only in `tx_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub original_description: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub balance: Option<Decimal>,
    pub raw_line: String,
}

impl ParsedTransaction {
    /// Builds a transaction from a signed amount: negative becomes a debit,
    /// anything else a credit.
    pub fn from_signed(
        date: NaiveDate,
        description: String,
        original_description: String,
        signed_amount: Decimal,
        raw_line: String,
    ) -> Self {
        let tx_type = if signed_amount.is_sign_negative() && !signed_amount.is_zero() {
            TransactionType::Debit
        } else {
            TransactionType::Credit
        };
        ParsedTransaction {
            date,
            description,
            original_description,
            amount: signed_amount.abs(),
            tx_type,
            balance: None,
            raw_line,
        }
    }

    /// Positive for credits, negative for debits.
    pub fn signed_amount(&self) -> Decimal {
        match self.tx_type {
            TransactionType::Credit => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.tx_type == TransactionType::Credit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizedBy {
    Rule,
    Ai,
    User,
}

impl fmt::Display for CategorizedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategorizedBy::Rule => write!(f, "rule"),
            CategorizedBy::Ai => write!(f, "ai"),
            CategorizedBy::User => write!(f, "user"),
        }
    }
}

/// The classification fields attached to a parsed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category_id: String,
    pub is_personal: bool,
    pub is_transfer: bool,
    pub confidence: f32,
    pub categorized_by: CategorizedBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedTransaction {
    #[serde(flatten)]
    pub transaction: ParsedTransaction,
    /// `None` means no rule or model resolved this transaction.
    pub category_id: Option<String>,
    pub schedule_c_line: Option<String>,
    pub is_personal: bool,
    pub is_transfer: bool,
    pub confidence: f32,
    pub categorized_by: Option<CategorizedBy>,
}

impl CategorizedTransaction {
    pub fn unresolved(transaction: ParsedTransaction) -> Self {
        CategorizedTransaction {
            transaction,
            category_id: None,
            schedule_c_line: None,
            is_personal: false,
            is_transfer: false,
            confidence: 0.0,
            categorized_by: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.category_id.is_some()
    }

    /// Attaches a classification. The schedule line comes from `category` when
    /// the taxonomy knows it; transfer/personal category types force the flag.
    pub fn apply(&mut self, classification: Classification, category: Option<&Category>) {
        let (is_personal, is_transfer) = match category.map(|c| c.category_type) {
            Some(CategoryType::Personal) => (true, classification.is_transfer),
            Some(CategoryType::Transfer) => (classification.is_personal, true),
            _ => (classification.is_personal, classification.is_transfer),
        };
        self.schedule_c_line = category.and_then(|c| c.schedule_c_line.clone());
        self.category_id = Some(classification.category_id);
        self.is_personal = is_personal;
        self.is_transfer = is_transfer;
        self.confidence = classification.confidence.clamp(0.0, 1.0);
        self.categorized_by = Some(classification.categorized_by);
    }

    /// Manual recategorization by the user; always full confidence.
    pub fn assign_category(&mut self, category: &Category) {
        self.apply(
            Classification {
                category_id: category.id.clone(),
                is_personal: category.category_type == CategoryType::Personal,
                is_transfer: category.category_type == CategoryType::Transfer,
                confidence: 1.0,
                categorized_by: CategorizedBy::User,
            },
            Some(category),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::default_taxonomy;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parsed(amount: &str) -> ParsedTransaction {
        ParsedTransaction::from_signed(
            date(2024, 1, 15),
            "STARBUCKS".to_string(),
            "STARBUCKS #1234".to_string(),
            Decimal::from_str(amount).unwrap(),
            "01/15 STARBUCKS #1234 -5.75".to_string(),
        )
    }

    #[test]
    fn from_signed_stores_magnitude() {
        let tx = parsed("-5.75");
        assert_eq!(tx.amount, Decimal::from_str("5.75").unwrap());
        assert_eq!(tx.tx_type, TransactionType::Debit);
        assert_eq!(tx.signed_amount(), Decimal::from_str("-5.75").unwrap());

        let tx = parsed("100.00");
        assert_eq!(tx.tx_type, TransactionType::Credit);
        assert!(tx.is_credit());
    }

    #[test]
    fn unresolved_has_no_classification() {
        let tx = CategorizedTransaction::unresolved(parsed("-5.75"));
        assert!(!tx.is_resolved());
        assert_eq!(tx.confidence, 0.0);
        assert_eq!(tx.categorized_by, None);
    }

    #[test]
    fn apply_takes_line_from_category() {
        let taxonomy = default_taxonomy();
        let mut tx = CategorizedTransaction::unresolved(parsed("-5.75"));
        tx.apply(
            Classification {
                category_id: "meals".to_string(),
                is_personal: false,
                is_transfer: false,
                confidence: 1.7,
                categorized_by: CategorizedBy::Rule,
            },
            taxonomy.get("meals"),
        );
        assert_eq!(tx.schedule_c_line.as_deref(), Some("line_24b"));
        assert_eq!(tx.confidence, 1.0);
        assert_eq!(tx.categorized_by, Some(CategorizedBy::Rule));
    }

    #[test]
    fn transfer_category_forces_flag() {
        let taxonomy = default_taxonomy();
        let mut tx = CategorizedTransaction::unresolved(parsed("-500.00"));
        tx.apply(
            Classification {
                category_id: "owner_transfer".to_string(),
                is_personal: false,
                is_transfer: false,
                confidence: 0.9,
                categorized_by: CategorizedBy::Ai,
            },
            taxonomy.get("owner_transfer"),
        );
        assert!(tx.is_transfer);
        assert_eq!(tx.schedule_c_line, None);
    }

    #[test]
    fn assign_category_marks_user() {
        let taxonomy = default_taxonomy();
        let mut tx = CategorizedTransaction::unresolved(parsed("-5.75"));
        tx.assign_category(taxonomy.get("owner_draw").unwrap());
        assert_eq!(tx.categorized_by, Some(CategorizedBy::User));
        assert_eq!(tx.confidence, 1.0);
        assert!(tx.is_personal);
        // amount/date/description untouched
        assert_eq!(tx.transaction, parsed("-5.75"));
    }

    #[test]
    fn serializes_type_key() {
        let tx = CategorizedTransaction::unresolved(parsed("-5.75"));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "debit");
        assert_eq!(json["date"], "2024-01-15");
        assert_eq!(json["amount"], "5.75");
        assert!(json["category_id"].is_null());
    }
}
