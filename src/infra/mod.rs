//! Service plumbing shared by every route: errors, state, config, auth and bootstrapping.

pub mod app_error;
pub mod app_state;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod middleware;
pub mod swagger;
pub mod validation;
