#![doc = "youtube-uploader-core: core logic library for youtube-uploader."]

//! This crate contains the data model, contracts and pipelines for uploading a
//! video to YouTube. Concrete HTTP clients and terminal output live in the
//! `youtube-uploader` crate.
//!
//! # Usage
//! Add this as a dependency for metadata loading, OAuth2 token handling and the
//! upload orchestration.

pub mod auth;
pub mod config;
pub mod contract;
pub mod credentials;
pub mod error;
pub mod metadata;
pub mod upload;

pub use error::{ApiError, ApiHint, AuthError, MetadataError, UploadError};
