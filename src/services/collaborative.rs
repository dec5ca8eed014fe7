use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};

use crate::{
    db::MovieStore,
    error::RecommendError,
    models::{MovieId, UserWatchlist},
};

use super::{svd, ContentBasedRecommender, Outcome};

/// Upper bound on the number of latent factors
pub const MAX_RANK: usize = 20;

/// Recommends from the low-rank structure of all users' watchlists
///
/// Whenever it cannot compute a result of its own it returns the
/// content-based result for the same input, tagged as a fallback.
pub struct CollaborativeRecommender {
    store: Arc<dyn MovieStore>,
    fallback: Arc<ContentBasedRecommender>,
}

impl CollaborativeRecommender {
    pub fn new(store: Arc<dyn MovieStore>, fallback: Arc<ContentBasedRecommender>) -> Self {
        Self { store, fallback }
    }

    pub async fn recommend(&self, movie_ids: &[MovieId], n: usize) -> Outcome {
        match self.try_recommend(movie_ids, n).await {
            Ok(ids) => {
                tracing::info!(
                    input_count = movie_ids.len(),
                    result_count = ids.len(),
                    "Collaborative recommendations computed"
                );
                Outcome::Computed(ids)
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Falling back to content-based recommendations");
                let recommendations = self
                    .fallback
                    .recommend(movie_ids, n)
                    .await
                    .into_recommendations();

                Outcome::Fallback {
                    reason,
                    recommendations,
                }
            }
        }
    }

    async fn try_recommend(
        &self,
        movie_ids: &[MovieId],
        n: usize,
    ) -> Result<Vec<MovieId>, RecommendError> {
        let users = self.store.fetch_watchlists().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load user watchlists");
            RecommendError::Store(e.to_string())
        })?;

        if users.is_empty() {
            return Err(RecommendError::InsufficientCorpus("empty user corpus"));
        }

        let movie_ids = movie_ids.to_vec();
        run_blocking(move || rank_by_interactions(&users, &movie_ids, n)).await
    }
}

/// Runs CPU-bound scoring on the blocking thread pool
///
/// A panicking task is reported as a computation fault.
async fn run_blocking<T, F>(task: F) -> Result<T, RecommendError>
where
    F: FnOnce() -> Result<T, RecommendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| RecommendError::Computation(format!("scoring task failed: {e}")))?
}

/// Sorted index over every movie that appears in some watchlist
#[derive(Debug)]
pub struct ItemVocabulary {
    items: Vec<MovieId>,
    positions: HashMap<MovieId, usize>,
}

impl ItemVocabulary {
    pub fn from_watchlists(users: &[UserWatchlist]) -> Self {
        let items: Vec<MovieId> = users
            .iter()
            .flat_map(|user| user.watchlist.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let positions = items
            .iter()
            .enumerate()
            .map(|(position, &id)| (id, position))
            .collect();

        Self { items, positions }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, id: &MovieId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id(&self, position: usize) -> Option<MovieId> {
        self.items.get(position).copied()
    }

    /// Binary users-by-items matrix of watchlist membership
    pub fn interaction_matrix(&self, users: &[UserWatchlist]) -> Array2<f64> {
        let mut matrix = Array2::zeros((users.len(), self.len()));

        for (row, user) in users.iter().enumerate() {
            for id in &user.watchlist {
                if let Some(col) = self.position(id) {
                    matrix[[row, col]] = 1.0;
                }
            }
        }

        matrix
    }
}

/// Scores every watched movie against `movie_ids` through a truncated-SVD
/// reconstruction of the interaction matrix
///
/// Each user's affinity is their mean reconstructed value over the input
/// columns. An item's score is the affinity-weighted mean of its
/// reconstructed column. Input movies are excluded and ties keep
/// vocabulary order.
pub fn rank_by_interactions(
    users: &[UserWatchlist],
    movie_ids: &[MovieId],
    n: usize,
) -> Result<Vec<MovieId>, RecommendError> {
    let vocabulary = ItemVocabulary::from_watchlists(users);
    if vocabulary.len() < 2 {
        return Err(RecommendError::InsufficientCorpus(
            "fewer than two distinct watched movies",
        ));
    }

    let interactions = vocabulary.interaction_matrix(users);
    let rank = MAX_RANK.min(vocabulary.len() - 1);
    let reconstructed = svd::reconstruct(&interactions, rank)?;

    let input_columns: Vec<usize> = movie_ids
        .iter()
        .filter_map(|id| vocabulary.position(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if input_columns.is_empty() {
        return Err(RecommendError::NoInputResolved);
    }

    let affinity: Array1<f64> = reconstructed
        .select(Axis(1), &input_columns)
        .mean_axis(Axis(1))
        .ok_or_else(|| RecommendError::Computation("no input columns to average".to_string()))?;

    let item_scores = reconstructed.t().dot(&affinity) / users.len() as f64;

    let excluded: HashSet<MovieId> = movie_ids.iter().copied().collect();
    let mut candidates: Vec<(MovieId, f64)> = item_scores
        .iter()
        .enumerate()
        .filter_map(|(position, &score)| vocabulary.id(position).map(|id| (id, score)))
        .filter(|(id, _)| !excluded.contains(id))
        .collect();

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    let recommended: Vec<MovieId> = candidates.into_iter().take(n).map(|(id, _)| id).collect();
    if recommended.is_empty() {
        return Err(RecommendError::InsufficientCorpus(
            "no watched movies beyond the input",
        ));
    }

    Ok(recommended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{store::MockMovieStore, MovieCorpusCache},
        error::AppError,
        models::Movie,
    };

    fn ids(raw: &[i64]) -> Vec<MovieId> {
        raw.iter().copied().map(MovieId).collect()
    }

    fn user(raw: &[i64]) -> UserWatchlist {
        UserWatchlist {
            watchlist: ids(raw),
        }
    }

    fn catalog() -> Vec<Movie> {
        [(1, vec![1, 2], 8.0), (2, vec![2, 3], 6.0), (3, vec![1], 9.0)]
            .into_iter()
            .map(|(id, genres, vote)| Movie {
                id: MovieId(id),
                genre_ids: Some(genres),
                vote_average: Some(vote),
                title: format!("Movie {}", id),
                overview: None,
                poster_path: None,
                release_date: None,
            })
            .collect()
    }

    fn recommender(store: MockMovieStore) -> CollaborativeRecommender {
        let store: Arc<dyn MovieStore> = Arc::new(store);
        let cache = Arc::new(MovieCorpusCache::new(Arc::clone(&store)));
        let content = Arc::new(ContentBasedRecommender::new(cache));
        CollaborativeRecommender::new(store, content)
    }

    #[test]
    fn test_vocabulary_is_sorted_and_deduplicated() {
        let users = vec![user(&[30, 10, 10]), user(&[20, 30])];
        let vocabulary = ItemVocabulary::from_watchlists(&users);

        assert_eq!(vocabulary.len(), 3);
        assert_eq!(vocabulary.id(0), Some(MovieId(10)));
        assert_eq!(vocabulary.position(&MovieId(30)), Some(2));
        assert_eq!(vocabulary.position(&MovieId(99)), None);

        let matrix = vocabulary.interaction_matrix(&users);
        assert_eq!(
            matrix,
            ndarray::array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]
        );
    }

    #[test]
    fn test_co_watched_movies_rank_first() {
        // Full-rank case (rank 3 of a rank-3 matrix): reconstruction is exact.
        // Affinity for movie 1 is [1, 1, 0, 1]; item scores are
        // [3, 2, 1, 0] / 4 for movies 1..=4.
        let users = vec![user(&[1, 2]), user(&[1, 2]), user(&[3, 4]), user(&[1, 3])];

        let result = rank_by_interactions(&users, &ids(&[1]), 2).unwrap();
        assert_eq!(result, ids(&[2, 3]));

        let result = rank_by_interactions(&users, &ids(&[1]), 10).unwrap();
        assert_eq!(result, ids(&[2, 3, 4]));
    }

    #[test]
    fn test_unknown_inputs_are_not_resolved() {
        let users = vec![user(&[1, 2]), user(&[2, 3])];
        assert_eq!(
            rank_by_interactions(&users, &ids(&[42]), 10),
            Err(RecommendError::NoInputResolved)
        );
    }

    #[test]
    fn test_single_item_vocabulary_is_insufficient() {
        let users = vec![user(&[7])];
        assert!(matches!(
            rank_by_interactions(&users, &ids(&[7]), 10),
            Err(RecommendError::InsufficientCorpus(_))
        ));

        let users = vec![user(&[])];
        assert!(matches!(
            rank_by_interactions(&users, &ids(&[7]), 10),
            Err(RecommendError::InsufficientCorpus(_))
        ));
    }

    #[test]
    fn test_only_input_movies_watched_is_insufficient() {
        let users = vec![user(&[1, 2])];
        assert!(matches!(
            rank_by_interactions(&users, &ids(&[1, 2]), 10),
            Err(RecommendError::InsufficientCorpus(_))
        ));
    }

    #[tokio::test]
    async fn test_panicking_scoring_task_is_a_computation_fault() {
        let result: Result<Vec<MovieId>, RecommendError> =
            run_blocking(|| panic!("matrix index out of bounds")).await;

        assert!(matches!(result, Err(RecommendError::Computation(_))));
    }

    #[tokio::test]
    async fn test_blocking_task_result_is_passed_through() {
        let result = run_blocking(|| Ok(ids(&[5]))).await;
        assert_eq!(result, Ok(ids(&[5])));

        let result: Result<Vec<MovieId>, _> =
            run_blocking(|| Err(RecommendError::NoInputResolved)).await;
        assert_eq!(result, Err(RecommendError::NoInputResolved));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scoring_runs_off_the_async_workers() {
        let mut store = MockMovieStore::new();
        store.expect_fetch_watchlists().returning(|| {
            Ok(vec![user(&[1, 2]), user(&[1, 2]), user(&[3, 4]), user(&[1, 3])])
        });
        store.expect_fetch_movies().never();

        let collaborative = Arc::new(recommender(store));
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let collaborative = Arc::clone(&collaborative);
                tokio::spawn(async move { collaborative.recommend(&ids(&[1]), 2).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Outcome::Computed(ids(&[2, 3])));
        }
    }

    #[tokio::test]
    async fn test_empty_user_corpus_falls_back_to_content_based() {
        let mut store = MockMovieStore::new();
        store.expect_fetch_watchlists().returning(|| Ok(vec![]));
        store.expect_fetch_movies().returning(|| Ok(catalog()));

        let collaborative = recommender(store);
        let outcome = collaborative.recommend(&ids(&[1]), 2).await;

        let expected = collaborative
            .fallback
            .recommend(&ids(&[1]), 2)
            .await
            .into_recommendations();

        assert_eq!(
            outcome,
            Outcome::Fallback {
                reason: RecommendError::InsufficientCorpus("empty user corpus"),
                recommendations: expected,
            }
        );
        assert_eq!(outcome.recommendations(), ids(&[3, 2]).as_slice());
    }

    #[tokio::test]
    async fn test_one_user_one_item_falls_back_with_same_n() {
        let mut store = MockMovieStore::new();
        store
            .expect_fetch_watchlists()
            .returning(|| Ok(vec![user(&[1])]));
        store.expect_fetch_movies().returning(|| Ok(catalog()));

        let outcome = recommender(store).recommend(&ids(&[1]), 1).await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.into_recommendations(), ids(&[3]));
    }

    #[tokio::test]
    async fn test_store_fault_falls_back() {
        let mut store = MockMovieStore::new();
        store
            .expect_fetch_watchlists()
            .returning(|| Err(AppError::Internal("connection reset".to_string())));
        store.expect_fetch_movies().returning(|| Ok(catalog()));

        let outcome = recommender(store).recommend(&ids(&[2]), 10).await;

        match outcome {
            Outcome::Fallback {
                reason: RecommendError::Store(_),
                recommendations,
            } => assert_eq!(recommendations.len(), 2),
            other => panic!("expected store fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_everywhere_falls_back_to_nothing() {
        let mut store = MockMovieStore::new();
        store
            .expect_fetch_watchlists()
            .returning(|| Ok(vec![user(&[1, 2]), user(&[2, 3])]));
        store.expect_fetch_movies().returning(|| Ok(catalog()));

        let outcome = recommender(store).recommend(&ids(&[404]), 10).await;

        assert_eq!(
            outcome,
            Outcome::Fallback {
                reason: RecommendError::NoInputResolved,
                recommendations: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_computed_result_skips_the_catalog() {
        let mut store = MockMovieStore::new();
        store.expect_fetch_watchlists().returning(|| {
            Ok(vec![user(&[1, 2]), user(&[1, 2]), user(&[3, 4]), user(&[1, 3])])
        });
        store.expect_fetch_movies().never();

        let outcome = recommender(store).recommend(&ids(&[1]), 2).await;
        assert_eq!(outcome, Outcome::Computed(ids(&[2, 3])));
    }
}
