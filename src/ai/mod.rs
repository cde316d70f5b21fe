//! AI-assisted drafting.
//!
//! A generative model writes a subject and HTML body from a short prompt.
//! The model's reply is free text, so [`draft::extract_draft`] pulls the first
//! usable JSON object out of it.

pub mod draft;
pub mod error;
pub mod provider;
pub mod providers;

pub use draft::{Draft, DraftBranding, DraftComposer, DraftLanguage, DraftRequest};
pub use error::{AIError, AIResult};
pub use provider::AIProvider;
pub use providers::GoogleProvider;
