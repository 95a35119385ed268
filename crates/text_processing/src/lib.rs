//! Text processing for transcripts
//!
//! This crate provides:
//! - **Script detection**: classify text by Unicode script and infer a language
//! - **Sanity filter**: decide whether a transcript is plausible for an expected language
//!
//! # Example
//!
//! ```ignore
//! use voice_order_text_processing::SanityFilter;
//! use voice_order_core::{Language, LanguagePreference};
//!
//! let filter = SanityFilter::default();
//! assert!(filter.looks_sane("আমি চা চাই", LanguagePreference::Explicit(Language::Bengali)));
//! assert!(!filter.looks_sane("ok", LanguagePreference::Explicit(Language::English)));
//! ```

pub mod sanity;
pub mod script;

pub use sanity::SanityFilter;
pub use script::ScriptDetector;
