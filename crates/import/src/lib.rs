pub mod ai;
pub mod config;
pub mod csv;
pub mod dedup;
pub mod detect;
pub mod pipeline;
pub mod rules;
pub mod statement;
pub mod util;

pub use ai::{
    AiFallback, ClassificationRequest, ClassificationService, ClassifierError, FallbackOutcome,
    HttpClassificationService, MockClassificationService,
};
pub use config::{ClassifierConfig, ConfigError, DedupConfig, ImportConfig};
pub use csv::{CsvError, CsvImport, CsvImporter};
pub use dedup::{DedupIndex, DedupKey, DedupOutcome};
pub use detect::{detect_csv_format, detect_statement_layout, CsvFormat};
pub use pipeline::{ImportError, ImportPipeline, ImportReport, ImportSource};
pub use rules::{CategorizationRule, MatchType, RuleEngine, RuleError};
pub use statement::{
    AccountKind, ParsedStatement, Reconciliation, StatementError, StatementLayout, StatementSummary,
};

pub mod import {
    use crate::*;
    use taxlens_core::{CategorizedTransaction, CategoryTaxonomy, ParsedTransaction};

    /// Detects the layout and parses statement text.
    pub fn import_statement(text: &str) -> Result<ParsedStatement, StatementError> {
        detect_statement_layout(text).parse(text)
    }

    pub fn import_csv(text: &str) -> Result<CsvImport, CsvError> {
        CsvImporter::parse(text)
    }

    /// Rule-only categorization with the built-in table.
    pub fn categorize(
        taxonomy: &CategoryTaxonomy,
        transactions: &[ParsedTransaction],
    ) -> Vec<CategorizedTransaction> {
        RuleEngine::new(taxonomy, Vec::new()).categorize(transactions)
    }

    pub fn create_dedup_index(config: &ImportConfig) -> DedupIndex {
        DedupIndex::new(config.dedup.description_chars)
    }
}
