//! Inkwell - A blog platform with a moderated content pipeline
//!
//! This library provides the storage, services, HTTP API and content
//! validation pipeline behind the `inkwell` server binary.

pub mod ai;
pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
