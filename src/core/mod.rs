pub mod book;
pub mod browse;
pub mod dataset;
pub mod settings;
pub mod stats;
