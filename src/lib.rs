//! sigsync: bulk email-signature updates through the Yandex 360 admin API.

pub mod api;
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod ratelimit;
pub mod signature;
