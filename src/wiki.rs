//! Main module for wikiflow library functionality

pub mod config;
pub mod formats;
pub mod lexing;
pub mod pipeline;
pub mod testing;
pub mod token;
pub mod transforms;
