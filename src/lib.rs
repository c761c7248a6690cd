pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod google_translate;
pub mod i18n;
pub mod models;
pub mod provider;
pub mod retry;
pub mod security;
pub mod translation;
