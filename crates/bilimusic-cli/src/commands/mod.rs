pub mod config;
pub mod doctor;
pub mod extract;
pub mod serve;
