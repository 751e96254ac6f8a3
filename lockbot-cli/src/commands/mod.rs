pub mod daemon;
pub mod init;
pub mod reconcile;
pub mod repo;
