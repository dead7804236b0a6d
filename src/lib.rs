//! Sermitsiaq ingestion: crawl the Danish and Greenlandic news sites into a
//! trilingual (DA / KL / EN) SQLite corpus.
//!
//! The crate is split into pure HTML extraction (`extract`), persistence
//! (`repository`), the browser seam (`scrapers`), per-article services
//! (`services`: assets, linking, translation, sitemaps) and the two crawl
//! pipelines (`pipeline`) that tie them together. `cli` holds the `smq`
//! command surface.

pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
pub mod utils;
