pub mod analyzer;
pub mod config;
pub mod model;
pub mod report;
pub mod storage;
