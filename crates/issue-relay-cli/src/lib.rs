//! Relays recently created or changed drupal.org issues to email.
//!
//! - `config`: option/secret loading, default merge and validation.
//! - `query` + `drupal_api`: `node.json` query parameters and the fetch.
//! - `filter`: trailing time-window selection.
//! - `template` + `render`: mustache subject/body rendering.
//! - `providers` + `dispatch`: provider lookup and per-item sends.
//! - `service`: one fetch -> filter -> dispatch pass.

pub mod config;
pub mod dispatch;
pub mod drupal_api;
pub mod error;
pub mod filter;
pub mod model;
pub mod providers;
pub mod query;
pub mod render;
pub mod service;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;
