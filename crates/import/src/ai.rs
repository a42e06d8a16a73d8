use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use taxlens_core::{
    CategorizedBy, CategorizedTransaction, CategoryTaxonomy, Classification, ParsedTransaction,
};
use thiserror::Error;

use crate::config::{ClassifierConfig, DEFAULT_BATCH_SIZE};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier not configured: no API key")]
    NotConfigured,
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse classifier response: {0}")]
    Parse(String),
    #[error("Classifier returned no choices")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// External text-classification backend. One blocking call per batch.
pub trait ClassificationService: Send + Sync {
    fn is_configured(&self) -> bool;
    fn complete(&self, request: &ClassificationRequest) -> Result<String, ClassifierError>;
}

// ── Mock service (always available, used for tests) ──────────────────────────

/// Returns canned responses in order and records every request.
pub struct MockClassificationService {
    configured: bool,
    responses: Mutex<VecDeque<Result<String, ClassifierError>>>,
    calls: Mutex<Vec<ClassificationRequest>>,
}

impl MockClassificationService {
    pub fn new(responses: Vec<Result<String, ClassifierError>>) -> Self {
        Self {
            configured: true,
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> Vec<ClassificationRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClassificationService for MockClassificationService {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn complete(&self, request: &ClassificationRequest) -> Result<String, ClassifierError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(ClassifierError::Parse("no canned response left".to_string())))
    }
}

// ── HTTP service ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible chat-completions client.
pub struct HttpClassificationService {
    config: ClassifierConfig,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpClassificationService {
    /// Reads the API key from the environment variable named in `config`.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        let api_key = config.api_key();
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: ClassifierConfig,
        api_key: Option<String>,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn request_body(&self, request: &ClassificationRequest) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

impl ClassificationService for HttpClassificationService {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn complete(&self, request: &ClassificationRequest) -> Result<String, ClassifierError> {
        let api_key = self.api_key.as_deref().ok_or(ClassifierError::NotConfigured)?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(request))
            .send()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ClassifierError::EmptyResponse)
    }
}

// ── Fallback categorizer ─────────────────────────────────────────────────────

const SYSTEM_PROMPT: &str = "\
You categorize bank and credit-card transactions for a self-employed \
person's US Schedule C tax return. Choose exactly one category id from the \
list provided for each transaction.

Rules:
- ATM and cash withdrawals are owner draws: personal, not a business expense.
- Transfers between the owner's own accounts and credit-card payments are \
transfers: neither income nor expense.
- Federal and state income-tax payments are personal.
- Groceries, streaming and other household spending are personal.
- Only mark income for money received from customers or payment processors.
- Use a lower confidence when the description is ambiguous.

Respond with a JSON array only. Each element: {\"transaction_index\": number, \
\"category_id\": string, \"is_personal\": bool, \"is_transfer\": bool, \
\"confidence\": number between 0 and 1, \"reasoning\": short string}.";

#[derive(Debug, Clone, Deserialize)]
struct AiSuggestion {
    transaction_index: usize,
    category_id: String,
    #[serde(default)]
    is_personal: bool,
    #[serde(default)]
    is_transfer: bool,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Clone, Default)]
pub struct FallbackOutcome {
    pub transactions: Vec<CategorizedTransaction>,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    /// Transactions that received an AI classification.
    pub categorized: usize,
}

/// Sends transactions the rule engine left unresolved to a
/// [`ClassificationService`], one sequential batch at a time. Failures leave
/// the batch untouched.
pub struct AiFallback {
    service: Option<Box<dyn ClassificationService>>,
    batch_size: usize,
}

impl AiFallback {
    pub fn new(service: Box<dyn ClassificationService>, batch_size: usize) -> Self {
        Self {
            service: Some(service),
            batch_size: batch_size.max(1),
        }
    }

    /// Builds the HTTP-backed fallback from config.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let service = HttpClassificationService::new(config.clone())?;
        Ok(Self::new(Box::new(service), config.batch_size))
    }

    /// A fallback that never calls out; every transaction stays as the rules left it.
    pub fn disabled() -> Self {
        Self {
            service: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.service.as_ref().is_some_and(|s| s.is_configured())
    }

    pub fn categorize(
        &self,
        mut transactions: Vec<CategorizedTransaction>,
        taxonomy: &CategoryTaxonomy,
    ) -> FallbackOutcome {
        let unresolved: Vec<usize> = transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| !tx.is_resolved())
            .map(|(i, _)| i)
            .collect();

        let mut outcome = FallbackOutcome::default();
        let service = match &self.service {
            Some(service) if service.is_configured() => service,
            _ => {
                if !unresolved.is_empty() {
                    tracing::warn!(
                        "AI classifier not configured; leaving {} transactions unresolved",
                        unresolved.len()
                    );
                }
                outcome.transactions = transactions;
                return outcome;
            }
        };

        for batch in unresolved.chunks(self.batch_size) {
            outcome.batches_attempted += 1;
            let items: Vec<&ParsedTransaction> =
                batch.iter().map(|&i| &transactions[i].transaction).collect();
            let request = build_request(&items, taxonomy);

            let reply = service
                .complete(&request)
                .and_then(|text| parse_suggestions(&text));
            let suggestions = match reply {
                Ok(suggestions) => suggestions,
                Err(e) => {
                    tracing::warn!(
                        "AI classification batch {} failed: {}",
                        outcome.batches_attempted,
                        e
                    );
                    outcome.batches_failed += 1;
                    continue;
                }
            };

            let mut applied = vec![false; batch.len()];
            for suggestion in suggestions {
                let slot = suggestion.transaction_index;
                let Some(&index) = batch.get(slot) else {
                    tracing::debug!("Ignoring AI suggestion for index {}", slot);
                    continue;
                };
                if applied[slot] {
                    tracing::debug!("Ignoring repeated AI suggestion for index {}", slot);
                    continue;
                }
                let Some(category) = taxonomy.get(&suggestion.category_id) else {
                    tracing::debug!(
                        "Ignoring AI suggestion with unknown category {}",
                        suggestion.category_id
                    );
                    continue;
                };
                tracing::debug!(
                    "AI categorized '{}' as {}: {}",
                    transactions[index].transaction.description,
                    suggestion.category_id,
                    suggestion.reasoning
                );
                applied[slot] = true;
                transactions[index].apply(
                    Classification {
                        category_id: suggestion.category_id,
                        is_personal: suggestion.is_personal,
                        is_transfer: suggestion.is_transfer,
                        confidence: suggestion.confidence,
                        categorized_by: CategorizedBy::Ai,
                    },
                    Some(category),
                );
                outcome.categorized += 1;
            }
        }

        tracing::info!(
            "AI fallback categorized {} of {} transactions ({} of {} batches failed)",
            outcome.categorized,
            unresolved.len(),
            outcome.batches_failed,
            outcome.batches_attempted
        );
        outcome.transactions = transactions;
        outcome
    }
}

fn build_request(
    batch: &[&ParsedTransaction],
    taxonomy: &CategoryTaxonomy,
) -> ClassificationRequest {
    let categories: Vec<String> = taxonomy
        .iter()
        .map(|c| match &c.schedule_c_line {
            Some(line) => format!("- {}: {} ({}, {})", c.id, c.label, c.category_type, line),
            None => format!("- {}: {} ({})", c.id, c.label, c.category_type),
        })
        .collect();
    let items: Vec<serde_json::Value> = batch
        .iter()
        .enumerate()
        .map(|(i, tx)| {
            json!({
                "index": i,
                "date": tx.date.to_string(),
                "description": tx.description,
                "amount": tx.amount.to_string(),
                "type": tx.tx_type.to_string(),
            })
        })
        .collect();

    ClassificationRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: format!(
            "Categories:\n{}\n\nTransactions:\n{}",
            categories.join("\n"),
            serde_json::Value::Array(items)
        ),
    }
}

/// Reads the first JSON array of suggestions in `text`, ignoring any prose
/// or code fences around it.
fn parse_suggestions(text: &str) -> Result<Vec<AiSuggestion>, ClassifierError> {
    let mut last_error = None;
    for (start, _) in text.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<AiSuggestion>>();
        match stream.next() {
            Some(Ok(suggestions)) => return Ok(suggestions),
            Some(Err(e)) => last_error = Some(e.to_string()),
            None => {}
        }
    }
    Err(ClassifierError::Parse(
        last_error.unwrap_or_else(|| "no JSON array in response".to_string()),
    ))
}
