use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::{error::RecommendError, models::Movie};

use super::MovieStore;

/// Process-wide snapshot of the movie catalog
///
/// The catalog is fetched on first use and kept for the lifetime of the
/// process. Population is serialized through a `OnceCell`, so concurrent
/// first callers wait on a single fetch instead of racing. An empty or
/// failed fetch leaves the cell unset and the next caller tries again.
pub struct MovieCorpusCache {
    store: Arc<dyn MovieStore>,
    movies: OnceCell<Arc<Vec<Movie>>>,
}

impl MovieCorpusCache {
    pub fn new(store: Arc<dyn MovieStore>) -> Self {
        Self {
            store,
            movies: OnceCell::new(),
        }
    }

    /// Returns the cached catalog, fetching it on first use
    ///
    /// `None` means no recommendations are possible right now: the store
    /// was empty or could not be queried. Store faults never propagate.
    pub async fn get_corpus(&self) -> Option<Arc<Vec<Movie>>> {
        let result = self
            .movies
            .get_or_try_init(|| async {
                let movies = self
                    .store
                    .fetch_movies()
                    .await
                    .map_err(|e| RecommendError::Store(e.to_string()))?;

                if movies.is_empty() {
                    return Err(RecommendError::InsufficientCorpus("empty movie corpus"));
                }

                tracing::info!(count = movies.len(), "Movie corpus cached");
                Ok::<_, RecommendError>(Arc::new(movies))
            })
            .await;

        match result {
            Ok(movies) => Some(Arc::clone(movies)),
            Err(RecommendError::Store(e)) => {
                tracing::error!(error = %e, "Failed to load movie corpus");
                None
            }
            Err(e) => {
                tracing::warn!(reason = %e, "Movie corpus unavailable");
                None
            }
        }
    }

    #[cfg(test)]
    fn is_populated(&self) -> bool {
        self.movies.initialized()
    }
}
