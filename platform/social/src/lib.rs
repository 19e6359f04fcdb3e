//! Social graph core of the review platform: who follows whom, who blocked
//! whom, what happened to a user, and who the users are.

pub mod config;
pub mod database;
pub mod error;
pub mod global;
pub mod pagination;
pub mod service;
pub mod store;
pub mod verification;

#[cfg(test)]
mod tests;
