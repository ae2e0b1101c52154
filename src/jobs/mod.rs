pub mod status_sync_job;

pub use status_sync_job::StatusSyncJob;
