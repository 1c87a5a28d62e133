//! Async Rust client for Azure managed identity tokens and the Azure
//! Marketplace SaaS APIs.
//!
//! Provides bearer-token acquisition from the Instance Metadata Service
//! (managed identity) and from Azure AD (client credentials), a retrying
//! HTTP client with pluggable backoff, and typed, eagerly validated models
//! for Marketplace subscription and metering responses.
//!
//! # Modules
//!
//! - [`auth`]: `Authenticator` trait, client credentials, and the factory.
//! - [`backoff`]: Backoff strategies for the retry loop.
//! - [`client`]: Retrying HTTP client with typed response mapping.
//! - [`config`]: Client options and environment variable names.
//! - [`error`]: Typed error hierarchy (`AzureApiError`).
//! - [`managed_identity`]: Instance Metadata Service authenticator.
//! - [`marketplace`]: SaaS fulfillment and metering client.
//! - [`model`]: `ResponseModel` contract for response mapping.
//! - [`subscription`]: Subscription resolution models.
//! - [`token`]: `AuthenticationToken` and the token wire model.
//! - [`usage`]: Usage event request, result and error models.
//!
//! # Quick Start
//!
//! ```ignore
//! use azure_api_client::auth::Authenticator;
//! use azure_api_client::config::ClientOptions;
//! use azure_api_client::managed_identity::ManagedCredentialsAuthenticator;
//!
//! let auth = ManagedCredentialsAuthenticator::new(ClientOptions::default())?;
//! auth.check_usability().await?;
//! let token = auth.get_authentication_token("https://vault.azure.net").await?;
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod managed_identity;
pub mod marketplace;
pub mod model;
pub mod subscription;
pub mod token;
pub mod usage;
