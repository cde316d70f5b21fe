pub mod ai;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod oauth2;
pub mod smtp;
pub mod templates;
