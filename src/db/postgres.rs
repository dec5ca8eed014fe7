use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    error::AppResult,
    models::{Movie, MovieId, UserWatchlist},
};

use super::MovieStore;

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Movie store backed by the `movies` and `users` tables
#[derive(Clone)]
pub struct PgMovieStore {
    pool: PgPool,
}

impl PgMovieStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MovieStore for PgMovieStore {
    async fn fetch_movies(&self) -> AppResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, genre_ids, vote_average, title, overview, poster_path, release_date
            FROM movies
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(movies)
    }

    async fn fetch_watchlists(&self) -> AppResult<Vec<UserWatchlist>> {
        let rows = sqlx::query_as::<_, (Vec<i64>,)>("SELECT watchlist FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(watchlist,)| UserWatchlist {
                watchlist: watchlist.into_iter().map(MovieId).collect(),
            })
            .collect())
    }
}
