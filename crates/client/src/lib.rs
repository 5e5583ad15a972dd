//! Client code for labelgate.
//!
//! This crate provides the Brave web search client and the label search
//! pipeline (scoring, fallback query, retrying provider calls) used by the
//! server.

pub mod brave;
pub mod search;

pub use brave::{BraveClient, BraveConfig, BraveError, SearchRequest};
pub use search::{
    LabelSearch, LabelSearchOutcome, SearchCandidate, SearchProvider, build_fallback_query, score_candidate,
    score_results,
};
