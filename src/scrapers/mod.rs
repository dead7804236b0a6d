//! Upstream page rendering.
//!
//! The sites render their card grids and article bodies with JavaScript and
//! gate paywalled bodies behind a login, so every fetch goes through a
//! logged-in Chromium session.

pub mod browser;

pub use browser::{
    BrowserConfig, BrowserError, BrowserSession, PageRenderer, ScrollPolicy, CARD_SELECTOR,
};
