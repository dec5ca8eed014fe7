use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};

use crate::{
    db::MovieCorpusCache,
    error::RecommendError,
    models::{Movie, MovieId},
};

use super::Outcome;

/// Scores the catalog against the genre and rating profile of the input movies
pub struct ContentBasedRecommender {
    cache: Arc<MovieCorpusCache>,
}

impl ContentBasedRecommender {
    pub fn new(cache: Arc<MovieCorpusCache>) -> Self {
        Self { cache }
    }

    /// Recommends up to `n` movies similar to `movie_ids`
    ///
    /// Never fails: a missing corpus, unknown input or numeric fault all
    /// end in `Outcome::Empty`.
    pub async fn recommend(&self, movie_ids: &[MovieId], n: usize) -> Outcome {
        let Some(movies) = self.cache.get_corpus().await else {
            return Outcome::Empty(RecommendError::InsufficientCorpus("empty movie corpus"));
        };

        match rank_by_content(&movies, movie_ids, n) {
            Ok(ids) => {
                tracing::info!(
                    input_count = movie_ids.len(),
                    result_count = ids.len(),
                    "Content-based recommendations computed"
                );
                Outcome::Computed(ids)
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Content-based recommendation produced nothing");
                Outcome::Empty(reason)
            }
        }
    }
}

/// Ranks every eligible movie by the dot product of its features with the
/// mean features of `movie_ids`
///
/// A movie is eligible when it has a genre list. Its feature row is
/// `[vote_average / 10, one-hot genres...]` over the sorted set of genres in
/// the eligible catalog. Scores are not length-normalized. Equal scores keep
/// catalog order.
pub fn rank_by_content(
    movies: &[Movie],
    movie_ids: &[MovieId],
    n: usize,
) -> Result<Vec<MovieId>, RecommendError> {
    let eligible: Vec<&Movie> = movies.iter().filter(|movie| movie.has_genres()).collect();
    let inputs: HashSet<MovieId> = movie_ids.iter().copied().collect();

    // Rows of the feature matrix, in catalog order
    let target_rows: Vec<usize> = eligible
        .iter()
        .enumerate()
        .filter(|(_, movie)| inputs.contains(&movie.id))
        .map(|(row, _)| row)
        .collect();

    if target_rows.is_empty() {
        return Err(RecommendError::NoInputResolved);
    }

    let features = feature_matrix(&eligible);
    let target: Array1<f64> = features
        .select(Axis(0), &target_rows)
        .mean_axis(Axis(0))
        .ok_or_else(|| RecommendError::Computation("no target rows to average".to_string()))?;

    let scores = features.dot(&target);
    if scores.iter().any(|score| !score.is_finite()) {
        return Err(RecommendError::Computation(
            "non-finite similarity score".to_string(),
        ));
    }

    let mut candidates: Vec<(MovieId, f64)> = eligible
        .iter()
        .zip(scores.iter())
        .filter(|(movie, _)| !inputs.contains(&movie.id))
        .map(|(movie, &score)| (movie.id, score))
        .collect();

    // Stable sort: ties stay in catalog order
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(candidates.into_iter().take(n).map(|(id, _)| id).collect())
}

/// Sorted set of every genre code across `movies`
pub fn genre_vocabulary(movies: &[&Movie]) -> Vec<i32> {
    movies
        .iter()
        .filter_map(|movie| movie.genre_ids.as_ref())
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One feature row per movie: normalized rating followed by genre indicators
pub fn feature_matrix(movies: &[&Movie]) -> Array2<f64> {
    let vocabulary = genre_vocabulary(movies);
    let mut features = Array2::zeros((movies.len(), vocabulary.len() + 1));

    for (row, movie) in movies.iter().enumerate() {
        features[[row, 0]] = movie.vote_or_default() / 10.0;

        for genre in movie.genre_ids.iter().flatten() {
            if let Ok(position) = vocabulary.binary_search(genre) {
                features[[row, position + 1]] = 1.0;
            }
        }
    }

    features
}
