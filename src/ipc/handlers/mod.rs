pub mod attendance;
pub mod charts;
pub mod core;
pub mod enrollment;
pub mod reports;
pub mod stats;
pub mod students;
pub mod subjects;
pub mod teachers;
