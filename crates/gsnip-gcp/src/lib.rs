#![allow(clippy::too_many_arguments)]

//! # gsnip-gcp – Google Cloud API snippets over REST
//!
//! Each snippet is an `async fn` that takes a writer and a [`GcpClient`],
//! performs one API call (waiting on the long-running operation when the API
//! returns one), and writes a short confirmation line to the writer. Errors
//! come back as [`GcpError`] tagged with the failing method name.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  Snippets                                        │
//! │   compute · livestream · modelarmor · pubsub     │
//! │   secretmanager · translate · productsearch      │
//! ├──────────────────────────────────────────────────┤
//! │  GcpClient  (client.rs)                          │
//! │  ├── get / post / put / patch / delete           │
//! │  ├── get_all_pages  (pagination)                 │
//! │  └── wait_operation / wait_compute_operation     │
//! ├──────────────────────────────────────────────────┤
//! │  TokenManager  (auth.rs)                         │
//! │  └── JWT → access_token exchange + caching       │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Services
//!
//! | Service               | Module          | API Base                                        |
//! |-----------------------|-----------------|-------------------------------------------------|
//! | Compute Engine        | `compute`       | `https://compute.googleapis.com/compute/v1`     |
//! | Live Stream           | `livestream`    | `https://livestream.googleapis.com/v1`          |
//! | Model Armor           | `modelarmor`    | `https://modelarmor.{location}.rep.googleapis.com/v1` |
//! | Pub/Sub               | `pubsub`        | `https://pubsub.googleapis.com/v1`              |
//! | Secret Manager        | `secretmanager` | `https://secretmanager.googleapis.com/v1`       |
//! | Cloud Translation     | `translate`     | `https://translate.googleapis.com/v3`           |
//! | Vision Product Search | `productsearch` | `https://vision.googleapis.com/v1`              |

// ── Sub-modules ─────────────────────────────────────────────────────────

pub mod error;
pub mod config;
pub mod auth;
pub mod client;
pub mod operation;
pub mod iam;
pub(crate) mod int64;

// Snippets
pub mod compute;
pub mod livestream;
pub mod modelarmor;
pub mod pubsub;
pub mod secretmanager;
pub mod translate;
pub mod productsearch;

// ── Re-exports for ergonomic access ─────────────────────────────────────

pub use auth::{AccessToken, TokenManager, TokenSource};
pub use client::{Empty, GcpClient};
pub use config::{ClientConfig, Credentials, ServiceAccountKey};
pub use error::{Context, GcpError, GcpResult};
pub use iam::{IamClient, IamPolicy};
pub use operation::{ComputeOperation, Operation, Status};
