use std::sync::Arc;

use crate::services::Recommender;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    /// How many recommendations each request asks for
    pub recommendation_count: usize,
}

impl AppState {
    pub fn new(recommender: Recommender, recommendation_count: usize) -> Self {
        Self {
            recommender: Arc::new(recommender),
            recommendation_count,
        }
    }
}
