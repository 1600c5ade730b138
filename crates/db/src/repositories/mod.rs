//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod ntp_sample_repo;
pub mod partition_repo;

pub use ntp_sample_repo::NtpSampleRepo;
pub use partition_repo::PartitionRepo;
