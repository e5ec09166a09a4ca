//! # Benefit Scout
//!
//! A crawl, embedding, and retrieval pipeline that grounds benefit
//! recommendations in content scraped from government websites.
//!
//! The pipeline crawls a bounded, same-domain slice of each seed site,
//! extracts and normalizes its text (HTML and PDF), embeds the lines into a
//! namespaced vector index, and at request time retrieves the passages
//! closest to a user profile to ground an LLM completion.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌───────────┐   ┌──────────────┐
//! │ Crawler │──▶│ Extract + │──▶│ Embedding │──▶│ Vector Index │
//! │ (seeds) │   │ Normalize │   │ (passage) │   │  (namespace) │
//! └─────────┘   └───────────┘   └───────────┘   └──────┬───────┘
//!                                                      │
//!                              ┌───────────┐   ┌───────▼──────┐
//!                              │ Completion│◀──│  Retriever   │
//!                              │  (prompt) │   │   (query)    │
//!                              └───────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bscout init                                  # create the vector index
//! bscout index https://benefits.va.gov/benefits/
//! bscout query "veteran housing benefits"
//! bscout recommend "veteran with two children"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | HTTP fetching with failure isolation |
//! | [`extract`] | HTML and PDF text extraction |
//! | [`normalize`] | Line normalization |
//! | [`links`] | Same-domain link discovery |
//! | [`crawl`] | Bounded depth-first traversal |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index abstraction and backends |
//! | [`retrieve`] | Top-k passage retrieval |
//! | [`pipeline`] | Batch crawl-and-index orchestration |
//! | [`completion`] | Completion model client |
//! | [`recommend`] | Profile-grounded recommendation boundary |

pub mod completion;
pub mod config;
pub mod crawl;
pub mod embedding;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod links;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod recommend;
pub mod retrieve;
