pub mod config;
pub mod datasource;
pub mod graph;
pub mod graph_cache;
