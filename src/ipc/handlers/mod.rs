pub mod attendance;
pub mod backup;
pub mod classes;
pub mod core;
pub mod earnings;
pub mod holidays;
pub mod reports;
pub mod students;
