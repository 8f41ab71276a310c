//! Matching engine: reference ingestion and forwarding decisions.
//!
//! A [`Matcher`] per route turns reference payloads into cached values
//! (field-scoped, via [`fields::extract_match_values`]) and answers
//! whether a source payload should be forwarded (payload-wide, via
//! [`fields::flatten_values`]). Both sides pass every value through
//! [`variants::year_variants`] so short and long year prefixes meet.

pub mod fields;
pub mod matcher;
pub mod variants;

pub use fields::FieldError;
pub use matcher::{FeedMatcher, MatchError, Matcher};
