pub mod cache;
pub mod postgres;
pub mod store;

pub use cache::MovieCorpusCache;
pub use postgres::{create_pool, PgMovieStore};
pub use store::MovieStore;
