#![doc = include_str!("../README.md")]

pub mod server;

pub use server::{
    config::{CliArgs, ServerConfig, SessionOptions},
    extract::{DefaultExtractor, TextExtractor, default_extractor},
    service::handler::OcrStreamService,
};
