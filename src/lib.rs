pub mod app;
pub mod core;
pub mod identity;
pub mod pipeline;
pub mod quota;
pub mod repo;
pub mod scan;
pub mod service;
pub mod store;
