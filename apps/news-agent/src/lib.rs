//! LLM-assisted news scraping agent.
//!
//! For each configured source the agent fetches HTML, cuts out the content
//! region with a CSS selector, asks a generative model for structured article
//! data, validates the model's JSON, and upserts the results into the content
//! store keyed by source URL.

pub mod extractor;
pub mod fetcher;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod validator;
