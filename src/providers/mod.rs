pub mod base;
pub mod github_provider;

pub use base::{CommitFetcher, FetchError};
pub use github_provider::{GithubFetcher, GithubFetcherConfig};
