use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::publish::Publisher;
use crate::search::SearchApi;
use crate::spout::Term;
use crate::stages::{truncate_key_for_log, LookupStage, PublishStage, SearchStage};

/// Search, lookup and publish, wired in sequence.
///
/// Each term is fully processed before the next one is taken.
pub struct Pipeline<A, P> {
    search: SearchStage<A>,
    lookup: LookupStage<A>,
    publish: PublishStage<P>,
}

/// Counters kept while running.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub terms: usize,
    pub failed: usize,
    pub published: usize,
}

impl<A: SearchApi, P: Publisher> Pipeline<A, P> {
    pub fn new(search: SearchStage<A>, publish: PublishStage<P>, api: Arc<A>) -> Self {
        Self {
            search,
            lookup: LookupStage::new(api),
            publish,
        }
    }

    /// Processes one term through every stage, returning the number of
    /// statuses published.
    pub fn process(&mut self, term: &Term) -> Result<usize, PipelineError> {
        let Some(hit) = self.search.process(term)? else {
            return Ok(0);
        };
        let statuses = self.lookup.process(&hit)?;
        self.publish.process(statuses)
    }

    /// Runs until `terms` is exhausted, pausing `interval` between terms.
    ///
    /// A failure on one term is logged and the term dropped. If the search
    /// itself failed, the term stays unmarked and is searched again when the
    /// cycle comes back to it. Once the search succeeds the term is marked,
    /// so a later lookup or publish failure is not retried; statuses that
    /// were not published stay unmarked on the publish shelf.
    pub fn run<T>(&mut self, terms: T, interval: Duration) -> RunStats
    where
        T: IntoIterator<Item = Term>,
    {
        let mut stats = RunStats::default();
        for term in terms {
            stats.terms += 1;
            match self.process(&term) {
                Ok(published) => stats.published += published,
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!("Dropping term {}: {}", truncate_key_for_log(&term.term), e);
                }
            }
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
        stats
    }
}
