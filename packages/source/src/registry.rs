//! Feed registry: loads every feed definition from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/feeds/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a feed means adding a TOML
//! file and listing it below.

use crate::feed_def::{FeedDefinition, FeedRole, parse_feed_toml};

/// TOML configs embedded at compile time.
const FEED_TOMLS: &[(&str, &str)] = &[
    (
        "jhu_confirmed_us",
        include_str!("../feeds/jhu_confirmed_us.toml"),
    ),
    (
        "nyt_us_counties",
        include_str!("../feeds/nyt_us_counties.toml"),
    ),
];

/// Returns all configured feed definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so
/// this is caught by the tests below).
#[must_use]
pub fn all_feeds() -> Vec<FeedDefinition> {
    FEED_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_feed_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// The feed that supplies every county.
#[must_use]
pub fn primary_feed() -> Option<FeedDefinition> {
    all_feeds().into_iter().find(|f| f.role == FeedRole::Primary)
}

/// Feeds that override the primary for their allowlisted counties.
#[must_use]
pub fn secondary_feeds() -> Vec<FeedDefinition> {
    all_feeds()
        .into_iter()
        .filter(|f| f.role == FeedRole::Secondary)
        .collect()
}
