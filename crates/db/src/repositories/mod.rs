//! Repositories for the knowledge store tables.

pub mod action_repo;
pub mod detection_repo;

pub use action_repo::ActionRepo;
pub use detection_repo::DetectionRepo;
