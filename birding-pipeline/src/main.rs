mod error;
mod pipeline;
mod publish;
mod search;
mod spout;
mod stages;

use anyhow::Context;
use birding_core::{
    BirdingConfig, Collection, DedupGuard, DocumentIndex, IndexConfig, MemoryIndex, PublishOutput, Shelf,
    ShelfRegistry,
};
use birding_index_client::{ElasticsearchClient, IndexClientOptions};
use pipeline::Pipeline;
use publish::{IndexPublisher, JsonLinesPublisher, Publisher};
use search::GnipSearch;
use spout::TermCycle;
use stages::{publish_shelf_config, PublishStage, SearchStage};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Where durable shelves and indexed statuses live.
enum IndexBackend {
    Remote(IndexClientOptions),
    InProcess(Arc<MemoryIndex>),
}

impl IndexBackend {
    /// An explicit `index.url` wins; otherwise `BIRDING_INDEX_URL` selects a
    /// remote index; otherwise everything stays in this process.
    fn from_config(config: &IndexConfig) -> Self {
        if config.url.is_some() {
            IndexBackend::Remote(IndexClientOptions::from_config(config))
        } else if std::env::var("BIRDING_INDEX_URL").is_ok() {
            IndexBackend::Remote(IndexClientOptions::from_env())
        } else {
            IndexBackend::InProcess(Arc::new(MemoryIndex::new()))
        }
    }

    fn register(&self, registry: &mut ShelfRegistry) {
        match self {
            IndexBackend::Remote(options) => {
                birding_index_client::register(registry, options.clone());
            }
            IndexBackend::InProcess(index) => {
                registry.register_memory_index(Arc::clone(index));
            }
        }
    }

    fn client(&self) -> anyhow::Result<Box<dyn DocumentIndex>> {
        let client: Box<dyn DocumentIndex> = match self {
            IndexBackend::Remote(options) => Box::new(ElasticsearchClient::with_options(options.clone())?),
            IndexBackend::InProcess(index) => Box::new(Arc::clone(index)),
        };
        Ok(client)
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "birding_pipeline=info,birding_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BirdingConfig::load().context("loading configuration")?;

    let backend = IndexBackend::from_config(&config.index);
    let mut registry = ShelfRegistry::new();
    backend.register(&mut registry);

    let search_shelf = registry
        .build(&config.search_stage.shelf)
        .context("building search stage shelf")?;
    let publish_shelf = registry
        .build(&publish_shelf_config(&config.publish_stage.shelf))
        .context("building publish stage shelf")?;

    let publisher: Box<dyn Publisher> = match &config.publish_stage.output {
        PublishOutput::Stdout => Box::new(JsonLinesPublisher::new(std::io::stdout())),
        PublishOutput::Index { index, doc_type } => Box::new(IndexPublisher::new(
            backend.client().context("connecting publish index")?,
            Collection::new(index.as_str(), doc_type.as_str()),
        )),
    };

    let api = Arc::new(GnipSearch::new(&config.search).context("creating search client")?);

    tracing::info!("🐦 Birding pipeline starting");
    tracing::info!("   Search URL: {}", api.url());
    tracing::info!("   Terms: {:?}", config.term_cycle.terms);
    tracing::info!("   Search shelf: {}", search_shelf.kind());
    tracing::info!("   Publish shelf: {}", publish_shelf.kind());

    let mut pipeline = Pipeline::new(
        SearchStage::new(DedupGuard::new(search_shelf), Arc::clone(&api)),
        PublishStage::new(DedupGuard::new(publish_shelf), publisher),
        api,
    );

    let stats = pipeline.run(TermCycle::new(config.term_cycle.terms.clone()), config.term_cycle.interval());
    tracing::info!(
        terms = stats.terms,
        failed = stats.failed,
        published = stats.published,
        "Term cycle ended"
    );

    Ok(())
}
