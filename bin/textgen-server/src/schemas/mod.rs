//! Request / response types for the HTTP API.

pub mod admin;
pub mod chat;
pub mod generate;
