//! Core pipelines and domain logic for SignalWatch.
//!
//! Ties together term matching, source planning, fetching, filtering, and the
//! incremental cache into end-to-end workflows: [`scan::scan`],
//! [`news::collect_news`], [`dedup::update_weekly`], [`cards::update_cards`],
//! and [`manual::manual_scan`].

pub mod cache;
pub mod cards;
pub mod conference;
pub mod dedup;
pub mod filter;
pub mod manual;
pub mod news;
pub mod planner;
pub mod progress;
pub mod scan;
pub mod terms;

#[cfg(test)]
pub(crate) mod testing;
