use crate::{
    error::AppResult,
    models::{Movie, UserWatchlist},
};

/// Read-only access to the movie catalog and the users' watchlists
///
/// Both queries return a point-in-time snapshot. Nothing in this crate
/// writes through this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieStore: Send + Sync {
    /// Fetch the full movie catalog
    async fn fetch_movies(&self) -> AppResult<Vec<Movie>>;

    /// Fetch every user's watchlist, in store order
    async fn fetch_watchlists(&self) -> AppResult<Vec<UserWatchlist>>;
}
