#![doc = "textrack-core: source-control access and change detection for TexTrack."]

//! This crate unifies GitHub, GitLab (cloud and self-hosted) and Overleaf
//! behind one [`contract::Provider`] trait, resolves raw repository URLs to
//! a concrete adapter, and answers "what changed upstream" with as few
//! round-trips as possible. It owns no persistence, scheduling or retry
//! policy; the sync/compile orchestrator supplies those.
//!
//! # Usage
//! Resolve a URL through [`factory::ProviderFactory`], then drive the
//! returned adapter: commit checks, directory listings, raw file fetches and
//! batched content-hash lookups.

pub mod contract;
pub mod factory;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod interpret;
pub mod overleaf;
pub mod resolve;
