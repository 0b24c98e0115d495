pub mod cli;
pub mod collect;
pub mod config;
pub mod core;
pub mod engine;
pub mod enumerate;
pub mod exit;
pub mod logs;
pub mod platform;
pub mod pwned;
pub mod report;
pub mod rules;
pub mod ui;
