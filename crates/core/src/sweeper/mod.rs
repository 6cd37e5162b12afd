//! Background reclamation of expired jobs and their artifacts.

mod sweeper;

pub use sweeper::RetentionSweeper;
