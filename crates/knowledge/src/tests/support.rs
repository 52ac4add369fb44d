//! Shared fixtures: a scripted chat model and a tiny metallurgy corpus.

use crate::chunker::{Chunker, ChunkingConfig};
use crate::config::{chunk_store_path, index_dir, raw_corpus_path};
use crate::embeddings::{EmbeddingConfig, EmbeddingEngine};
use crate::index::IndexConfig;
use crate::indexer::build_index;
use crate::ingest::ingest_corpus;
use crate::progress::ProgressReporter;
use crate::rag::KnowledgeService;
use crate::types::Article;
use async_trait::async_trait;
use metalrag_core::{AppError, AppResult};
use metalrag_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

pub const DIMS: usize = 256;

pub const TITANIUM_QUESTION: &str = "Как титан влияет на неметаллические включения в стали?";

/// Replays canned completions in order and records every request.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<AppResult<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<AppResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Llm("script exhausted".to_string())));
        next.map(|content| LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(10, 10),
            done: true,
        })
    }
}

fn article(source: &str, title: &str, text: &str, year: i32) -> Article {
    Article {
        title: title.to_string(),
        abstract_text: text.to_string(),
        source: source.to_string(),
        pdf_url: Some(format!("https://example.org/{}.pdf", source)),
        year: Some(year),
        country: None,
    }
}

/// Short abstracts, one chunk each.
pub fn sample_articles() -> Vec<Article> {
    vec![
        article(
            "arxiv:2101.00001",
            "Влияние титана на неметаллические включения в стали",
            "Титан в алюминий-раскисленной стали изменяет состав неметаллических включений. \
             При содержании титана 0,015–0,03% образуются комплексные включения Ti-Al-O и \
             нитриды TiN, которые измельчают структуру и снижают зарастание стаканов-дозаторов \
             при непрерывной разливке. Избыток титана приводит к скоплениям крупных нитридов.",
            2021,
        ),
        article(
            "arxiv:2102.00002",
            "Кальциевая обработка и модифицирование глинозёмистых включений",
            "Обработка стали силикокальцием переводит твёрдые включения глинозёма в жидкие \
             алюминаты кальция. Отношение Ca/Al около 0,1 обеспечивает глобуляризацию \
             включений и улучшает разливаемость. При избытке кальция образуются сульфиды \
             кальция, которые также вызывают зарастание погружных стаканов.",
            2021,
        ),
        article(
            "W3001",
            "Desulfurization kinetics under high-basicity ladle slag",
            "Ladle furnace desulfurization was studied for slags with CaO/SiO2 basicity \
             between 2.5 and 4.0. Sulfur removal follows first order kinetics, and argon \
             stirring at 300 l/min shortens the treatment to twelve minutes. Slag viscosity \
             above 0.3 Pa s limits the mass transfer of sulfur to the slag phase.",
            2019,
        ),
        article(
            "W3002",
            "Hydrogen and nitrogen removal during vacuum degassing",
            "Vacuum degassing at 67 Pa for fifteen minutes lowers hydrogen to below 2 ppm. \
             Nitrogen removal is slower because surface active oxygen and sulfur block the \
             reaction sites on the melt surface. Deep deoxidation before degassing improves \
             nitrogen removal rates in heavy plate steel grades.",
            2020,
        ),
        article(
            "arxiv:2103.00003",
            "Раскисление стали алюминием и образование кластеров",
            "Раскисление алюминием при 1600 °C даёт кластеры корунда размером до 100 мкм. \
             Продувка аргоном и выдержка после раскисления в течение 8–10 минут позволяют \
             удалить крупные кластеры в шлак. Повторное окисление струи при разливке \
             снова увеличивает число оксидных включений в заготовке.",
            2022,
        ),
        article(
            "W3003",
            "Rare earth treatment of sulfide inclusions",
            "Cerium and lanthanum additions of 0.01 to 0.02 percent transform elongated \
             manganese sulfides into fine globular rare earth oxysulfides. The modified \
             inclusions improve transverse impact toughness of rolled plates, but excessive \
             additions form large clusters that clog the submerged entry nozzle.",
            2018,
        ),
    ]
}

pub fn write_articles(path: &Path, articles: &[Article]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let lines: Vec<String> = articles
        .iter()
        .map(|a| serde_json::to_string(a).unwrap())
        .collect();
    fs::write(path, lines.join("\n")).unwrap();
}

pub fn embedding_config() -> EmbeddingConfig {
    EmbeddingConfig::trigram(DIMS)
}

/// Run ingest and index over the sample corpus inside `workspace`.
pub async fn build_workspace(workspace: &Path, index_config: &IndexConfig) {
    write_articles(&raw_corpus_path(workspace), &sample_articles());

    let chunker = Chunker::from_config(&ChunkingConfig::default()).unwrap();
    let report = ingest_corpus(
        &raw_corpus_path(workspace),
        &chunk_store_path(workspace),
        &chunker,
        &ProgressReporter::noop(),
    )
    .unwrap();
    assert_eq!(report.chunks_written, sample_articles().len());

    let engine = EmbeddingEngine::from_config(&embedding_config()).await.unwrap();
    build_index(
        &chunk_store_path(workspace),
        &index_dir(workspace),
        &engine,
        index_config,
        &ProgressReporter::noop(),
    )
    .await
    .unwrap();
}

/// Build the sample workspace and open it as a service.
pub async fn open_service(workspace: &Path) -> KnowledgeService {
    build_workspace(workspace, &IndexConfig::default()).await;
    KnowledgeService::open(&index_dir(workspace), &embedding_config())
        .await
        .unwrap()
}
