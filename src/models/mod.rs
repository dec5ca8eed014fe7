use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier shared by the movie catalog and user watchlists
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct MovieId(pub i64);

impl Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MovieId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Rating assumed for movies that have none
pub const DEFAULT_VOTE_AVERAGE: f64 = 5.0;

/// A catalog entry as read from the movie store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Movie {
    pub id: MovieId,
    /// Genre codes; movies without them never take part in content scoring
    #[serde(default)]
    pub genre_ids: Option<Vec<i32>>,
    /// Rating on a 0-10 scale
    #[serde(default)]
    pub vote_average: Option<f64>,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl Movie {
    pub fn has_genres(&self) -> bool {
        self.genre_ids.is_some()
    }

    pub fn vote_or_default(&self) -> f64 {
        self.vote_average.unwrap_or(DEFAULT_VOTE_AVERAGE)
    }
}

/// The movies a single user has put on their watchlist
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserWatchlist {
    #[serde(default)]
    pub watchlist: Vec<MovieId>,
}

/// Body of both recommendation endpoints
#[derive(Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub movie_ids: Option<Vec<MovieId>>,
}

/// Successful recommendation payload
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub recommendations: Vec<MovieId>,
}
