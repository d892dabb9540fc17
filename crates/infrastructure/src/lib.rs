//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod directory_snapshot;
mod in_memory_directory_service;
mod in_memory_permission_catalog;
mod in_memory_review_job_repository;

pub use directory_snapshot::{
    DirectorySnapshot, SnapshotAuditEntry, SnapshotGroup, SnapshotOwnership, SnapshotUser,
    TenantSnapshot,
};
pub use in_memory_directory_service::InMemoryDirectoryService;
pub use in_memory_permission_catalog::InMemoryPermissionCatalog;
pub use in_memory_review_job_repository::InMemoryReviewJobRepository;
