//! Question answering and hypothesis generation over a loaded index.

use crate::config::{ModelRole, PipelineConfig, RetrievalConfig};
use crate::rag::completion::complete_prompt;
use crate::rag::context::build_context;
use crate::rag::hypothesis::HypothesisWorkflow;
use crate::rag::service::KnowledgeService;
use crate::rag::types::{
    HypothesisOutcome, QueryContext, RagAnswer, RagSourceRef, RoleSettings, SearchHit,
};
use metalrag_core::{AppError, AppResult};
use metalrag_llm::LlmClient;
use metalrag_prompt::PromptSet;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

/// Request-level entry point: retrieval, prompt assembly and model calls.
///
/// Holds no per-request state; one instance can serve concurrent requests.
pub struct RagAssistant {
    service: Arc<KnowledgeService>,
    llm: Arc<dyn LlmClient>,
    prompts: PromptSet,
    retrieval: RetrievalConfig,
    qa: RoleSettings,
    generator: RoleSettings,
    critic: RoleSettings,
}

impl RagAssistant {
    /// `default_model` is used by roles that do not name their own model.
    pub fn new(
        service: Arc<KnowledgeService>,
        llm: Arc<dyn LlmClient>,
        prompts: PromptSet,
        config: &PipelineConfig,
        default_model: &str,
    ) -> Self {
        let resolve = |role: &ModelRole| RoleSettings {
            model: role
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            temperature: role.temperature,
            max_tokens: role.max_tokens,
        };

        Self {
            service,
            llm,
            prompts,
            retrieval: config.retrieval.clone(),
            qa: resolve(&config.qa),
            generator: resolve(&config.generator),
            critic: resolve(&config.critic),
        }
    }

    pub fn service(&self) -> &KnowledgeService {
        &self.service
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Nearest chunks for `query`; `k` defaults to the QA retrieval size.
    pub async fn search(&self, query: &str, k: Option<usize>) -> AppResult<Vec<SearchHit>> {
        self.service
            .search(query, k.unwrap_or(self.retrieval.qa_top_k))
            .await
    }

    /// Answer `question` from an already assembled context.
    pub async fn answer(&self, question: &str, context: &QueryContext) -> AppResult<String> {
        let mut variables = HashMap::new();
        variables.insert("context".to_string(), context.text.clone());
        variables.insert("question".to_string(), question.to_string());

        complete_prompt(
            self.llm.as_ref(),
            &self.prompts.qa,
            &variables,
            &self.qa,
            "question answering",
        )
        .await
    }

    /// Retrieve, assemble context and answer. Empty retrieval gives the
    /// "no information" answer without calling the model.
    pub async fn ask(&self, question: &str, k: Option<usize>) -> AppResult<RagAnswer> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("rag_request", request_id = %request_id, kind = "ask");
        self.ask_in_span(&request_id, question, k)
            .instrument(span)
            .await
    }

    async fn ask_in_span(
        &self,
        request_id: &str,
        question: &str,
        k: Option<usize>,
    ) -> AppResult<RagAnswer> {
        tracing::info!("Answering question: {}", question);

        let hits = self
            .service
            .search(question, k.unwrap_or(self.retrieval.qa_top_k))
            .await?;
        if hits.is_empty() {
            tracing::info!("No relevant chunks found");
            return Ok(RagAnswer::no_information(request_id, question));
        }

        let context = build_context(hits, self.retrieval.qa_chunk_chars);
        let answer = self.answer(question, &context).await?;
        let sources = context.hits.iter().map(RagSourceRef::from).collect();

        tracing::info!(sources = context.hits.len(), "Answer ready");
        Ok(RagAnswer {
            request_id: request_id.to_string(),
            question: question.to_string(),
            answer,
            sources,
            no_information: false,
        })
    }

    /// Retrieve context for `problem`, then run generate -> critique.
    pub async fn generate_hypotheses(
        &self,
        problem: &str,
        k: Option<usize>,
    ) -> AppResult<HypothesisOutcome> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span =
            tracing::info_span!("rag_request", request_id = %request_id, kind = "hypotheses");
        self.hypotheses_in_span(&request_id, problem, k)
            .instrument(span)
            .await
    }

    async fn hypotheses_in_span(
        &self,
        request_id: &str,
        problem: &str,
        k: Option<usize>,
    ) -> AppResult<HypothesisOutcome> {
        tracing::info!("Generating hypotheses for: {}", problem);

        let hits = self
            .service
            .search(problem, k.unwrap_or(self.retrieval.hypothesis_top_k))
            .await?;
        if hits.is_empty() {
            return Err(AppError::Knowledge(
                "No relevant articles found for this problem".to_string(),
            ));
        }

        let context = build_context(hits, self.retrieval.hypothesis_chunk_chars);
        let workflow = HypothesisWorkflow::new(
            self.llm.as_ref(),
            &self.prompts.generator,
            &self.prompts.critic,
            &self.generator,
            &self.critic,
        );
        let (raw, final_set) = workflow.run(problem, &context).await?;

        let sources_used = context
            .hits
            .iter()
            .take(self.retrieval.sources_shown)
            .map(RagSourceRef::from)
            .collect();

        Ok(HypothesisOutcome {
            request_id: request_id.to_string(),
            problem: problem.to_string(),
            final_text: final_set.text,
            raw_text: raw.text,
            final_items: final_set.items,
            raw_items: raw.items,
            sources_used,
        })
    }
}
