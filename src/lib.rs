//! Blogicum - a server-rendered blog
//!
//! This library provides the core functionality of the Blogicum site:
//! posts with images, categories, locations, comments and user profiles.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
pub mod theme;
