//! Folio: a personal site rendered from a Notion workspace.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
