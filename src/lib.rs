pub mod catalog;
pub mod cleaner;
pub mod config;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod matcher;
pub mod monitoring;
pub mod pipeline;
pub mod scheduler;
pub mod scoring;
