//! Demo Call Gateway Library
//!
//! This library provides the core functionality for the demo call gateway: a single
//! HTTP endpoint that lets a salesperson have an AI voice agent dial a prospect.
//!
//! # Features
//! - Sliding-window rate limiting per caller
//! - Input validation (credential format, phone number, business name)
//! - Shared-secret credential check
//! - Outbound call placement through a conversational-voice provider
//!
//! # Modules
//! - `config`: Configuration management
//! - `rate_limit`: Sliding-window limiter and its storage
//! - `validation`: Request body and field validation
//! - `credential`: Shared-secret comparison
//! - `voice`: Voice provider adapter
//! - `gateway`: HTTP router, handler and error envelope
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use rust_call_gateway::{
//!     config::Config,
//!     credential::CredentialChecker,
//!     gateway::{router, AppState},
//!     rate_limit::{RateLimitConfig, RateLimiter},
//!     voice::VoiceClient,
//! };
//!
//! fn build_app() -> axum::Router {
//!     let config = Config::new().expect("Failed to load configuration");
//!     let state = AppState {
//!         limiter: RateLimiter::in_memory(RateLimitConfig::from(&config.rate_limit)),
//!         credentials: CredentialChecker::new(config.auth.password_hash.clone()),
//!         placer: Arc::new(VoiceClient::new(config.voice.clone()).expect("Failed to create voice client")),
//!         trust_forwarded_headers: config.server.trust_forwarded_headers,
//!     };
//!     router(state)
//! }
//! ```
//!
//! # Copyright
//! Copyright (c) 2025
//!
//! # License
//! Licensed under the AGPLv3 license.

pub mod config;
pub mod credential;
pub mod gateway;
pub mod rate_limit;
pub mod validation;
pub mod voice;
