mod catalog;
mod directory;
mod jobs;

pub use catalog::PermissionCatalog;
pub use directory::DirectoryService;
pub use jobs::{
    ReviewJob, ReviewJobId, ReviewJobListQuery, ReviewJobOutcome, ReviewJobRepository,
    ReviewJobStatus,
};
