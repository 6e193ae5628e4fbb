pub mod config;
pub mod error;
pub mod fact;
pub mod factstore;
pub mod harvest;
pub mod params;
pub mod processor;
pub mod processors;
pub mod runner;
pub mod translator;
pub mod workspace;
