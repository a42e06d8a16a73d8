pub mod category;
pub mod money;
pub mod period;
pub mod transaction;

pub use category::{
    default_taxonomy, Category, CategoryTaxonomy, CategoryType, TaxonomyError, DEFAULT_CATEGORIES,
    MEALS_LINE, SCHEDULE_1_PREFIX,
};
pub use money::Money;
pub use period::{Quarter, TaxYear};
pub use transaction::{
    CategorizedBy, CategorizedTransaction, Classification, ParsedTransaction, TransactionType,
};
