use serde::Serialize;
use taxlens_core::{CategorizedTransaction, CategoryTaxonomy, ParsedTransaction};
use thiserror::Error;

use crate::ai::{AiFallback, ClassifierError};
use crate::config::ImportConfig;
use crate::csv::{CsvError, CsvImporter};
use crate::dedup::DedupIndex;
use crate::detect::detect_statement_layout;
use crate::rules::{CategorizationRule, RuleEngine};
use crate::statement::{StatementError, StatementLayout, StatementSummary};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Statement(#[from] StatementError),
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// One file's worth of input. Statement text is whatever the PDF extractor
/// produced; `layout` skips detection when the caller already knows it.
#[derive(Debug, Clone)]
pub enum ImportSource {
    Statement {
        text: String,
        layout: Option<StatementLayout>,
    },
    Csv {
        text: String,
    },
}

impl ImportSource {
    pub fn statement(text: impl Into<String>) -> Self {
        ImportSource::Statement {
            text: text.into(),
            layout: None,
        }
    }

    pub fn csv(text: impl Into<String>) -> Self {
        ImportSource::Csv { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// `statement:<layout>` or `csv:<format>`.
    pub source: String,
    pub transactions: Vec<CategorizedTransaction>,
    pub duplicates_skipped: usize,
    pub dropped_lines: usize,
    pub skipped_rows: usize,
    pub statement_summary: Option<StatementSummary>,
    pub ai_categorized: usize,
    pub unresolved: usize,
}

struct Parsed {
    source: String,
    transactions: Vec<ParsedTransaction>,
    dropped_lines: usize,
    skipped_rows: usize,
    summary: Option<StatementSummary>,
}

/// Parse, dedup and categorize, in that order. Holds no state between runs
/// apart from what the caller passes in.
pub struct ImportPipeline<'t> {
    taxonomy: &'t CategoryTaxonomy,
    rules: RuleEngine<'t>,
    fallback: AiFallback,
}

impl<'t> ImportPipeline<'t> {
    pub fn new(
        taxonomy: &'t CategoryTaxonomy,
        user_rules: Vec<CategorizationRule>,
        fallback: AiFallback,
    ) -> Self {
        Self {
            taxonomy,
            rules: RuleEngine::new(taxonomy, user_rules),
            fallback,
        }
    }

    pub fn from_config(
        taxonomy: &'t CategoryTaxonomy,
        user_rules: Vec<CategorizationRule>,
        config: &ImportConfig,
    ) -> Result<Self, ImportError> {
        let fallback = AiFallback::from_config(&config.classifier)?;
        Ok(Self::new(taxonomy, user_rules, fallback))
    }

    pub fn run(
        &self,
        source: ImportSource,
        dedup: &mut DedupIndex,
    ) -> Result<ImportReport, ImportError> {
        let parsed = parse_source(source)?;
        let outcome = dedup.filter_new(parsed.transactions);
        if outcome.duplicates > 0 {
            tracing::info!(
                "Skipped {} duplicate transactions from {}",
                outcome.duplicates,
                parsed.source
            );
        }

        let categorized = self.rules.categorize(&outcome.accepted);
        let fallback = self.fallback.categorize(categorized, self.taxonomy);
        let unresolved = fallback.transactions.iter().filter(|t| !t.is_resolved()).count();

        tracing::info!(
            "Imported {} transactions from {} ({} unresolved)",
            fallback.transactions.len(),
            parsed.source,
            unresolved
        );
        Ok(ImportReport {
            source: parsed.source,
            transactions: fallback.transactions,
            duplicates_skipped: outcome.duplicates,
            dropped_lines: parsed.dropped_lines,
            skipped_rows: parsed.skipped_rows,
            statement_summary: parsed.summary,
            ai_categorized: fallback.categorized,
            unresolved,
        })
    }

    /// Runs every file against the same dedup index. A failing file yields
    /// its error in place and the rest still run.
    pub fn run_batch(
        &self,
        sources: Vec<ImportSource>,
        dedup: &mut DedupIndex,
    ) -> Vec<Result<ImportReport, ImportError>> {
        sources
            .into_iter()
            .enumerate()
            .map(|(i, source)| {
                let result = self.run(source, dedup);
                if let Err(e) = &result {
                    tracing::warn!("Import of file {} failed: {}", i + 1, e);
                }
                result
            })
            .collect()
    }
}

fn parse_source(source: ImportSource) -> Result<Parsed, ImportError> {
    match source {
        ImportSource::Statement { text, layout } => {
            let layout = layout.unwrap_or_else(|| detect_statement_layout(&text));
            let statement = layout.parse(&text)?;
            if let Some(r) = statement.reconcile() {
                if !r.difference.is_zero() {
                    tracing::warn!(
                        "{} statement does not reconcile: parsed {} vs printed {}",
                        layout,
                        r.parsed_delta,
                        r.expected_delta
                    );
                }
            }
            Ok(Parsed {
                source: format!("statement:{}", layout),
                transactions: statement.transactions,
                dropped_lines: statement.dropped_lines,
                skipped_rows: 0,
                summary: Some(statement.summary),
            })
        }
        ImportSource::Csv { text } => {
            let import = CsvImporter::parse(&text)?;
            Ok(Parsed {
                source: format!("csv:{}", import.format),
                transactions: import.transactions,
                dropped_lines: 0,
                skipped_rows: import.skipped_rows,
                summary: None,
            })
        }
    }
}
