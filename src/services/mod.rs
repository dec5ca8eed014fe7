use std::sync::Arc;

use crate::{
    db::{MovieCorpusCache, MovieStore},
    error::RecommendError,
    models::MovieId,
};

pub mod collaborative;
pub mod content_based;
pub mod svd;

pub use collaborative::CollaborativeRecommender;
pub use content_based::ContentBasedRecommender;

/// Number of recommendations returned when the caller does not ask otherwise
pub const DEFAULT_RECOMMENDATION_COUNT: usize = 10;

/// How a recommender arrived at its answer
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The requested strategy produced the list itself
    Computed(Vec<MovieId>),
    /// The requested strategy gave up and the content-based result was used
    Fallback {
        reason: RecommendError,
        recommendations: Vec<MovieId>,
    },
    /// Nothing could be recommended
    Empty(RecommendError),
}

impl Outcome {
    pub fn recommendations(&self) -> &[MovieId] {
        match self {
            Outcome::Computed(ids) => ids,
            Outcome::Fallback {
                recommendations, ..
            } => recommendations,
            Outcome::Empty(_) => &[],
        }
    }

    pub fn into_recommendations(self) -> Vec<MovieId> {
        match self {
            Outcome::Computed(ids) => ids,
            Outcome::Fallback {
                recommendations, ..
            } => recommendations,
            Outcome::Empty(_) => Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback { .. })
    }
}

/// Both recommendation strategies over one shared movie corpus
pub struct Recommender {
    content: Arc<ContentBasedRecommender>,
    collaborative: CollaborativeRecommender,
}

impl Recommender {
    pub fn new(store: Arc<dyn MovieStore>) -> Self {
        let cache = Arc::new(MovieCorpusCache::new(Arc::clone(&store)));
        let content = Arc::new(ContentBasedRecommender::new(cache));
        let collaborative = CollaborativeRecommender::new(store, Arc::clone(&content));

        Self {
            content,
            collaborative,
        }
    }

    /// Recommend movies sharing genres and rating with `movie_ids`
    pub async fn content_based(&self, movie_ids: &[MovieId], n: usize) -> Outcome {
        self.content.recommend(movie_ids, n).await
    }

    /// Recommend movies from aggregate watchlists, falling back to content-based
    pub async fn collaborative(&self, movie_ids: &[MovieId], n: usize) -> Outcome {
        self.collaborative.recommend(movie_ids, n).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_recommendations() {
        let computed = Outcome::Computed(vec![MovieId(1), MovieId(2)]);
        assert_eq!(computed.recommendations(), &[MovieId(1), MovieId(2)]);
        assert!(!computed.is_fallback());

        let fallback = Outcome::Fallback {
            reason: RecommendError::NoInputResolved,
            recommendations: vec![MovieId(3)],
        };
        assert!(fallback.is_fallback());
        assert_eq!(fallback.into_recommendations(), vec![MovieId(3)]);

        let empty = Outcome::Empty(RecommendError::InsufficientCorpus("empty movie corpus"));
        assert!(empty.recommendations().is_empty());
        assert!(empty.into_recommendations().is_empty());
    }
}
