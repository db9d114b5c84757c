pub mod commit;
pub mod repository;

pub use commit::{CommitListEntry, CommitObservation, SHORT_SHA_LEN};
pub use repository::{RepositoryParseError, RepositoryTarget};
