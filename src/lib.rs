//! Field Service Copilot library.
//!
//! Validates the caller's Entra ID token, exchanges it on behalf of the user
//! for a Dataverse token, has a language model write FetchXML for the user's
//! question, runs it, and renders the rows as a chat reply.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod identity;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod reply;
