//! # imclient
//!
//! Asynchronous Rust client for the Incentive Management REST API: typed
//! CRUD over the vendor's JSON envelope conventions, cursor-based listing,
//! bounded retry for transient connection failures, and submit-then-poll
//! orchestration of server-side pipeline jobs.
//!
//! ## Quick start
//!
//! ```no_run
//! use imclient::models::{PipelineRun, PipelineStatus, Period};
//! use imclient::{Filter, Tenant};
//!
//! #[tokio::main]
//! async fn main() -> imclient::Result<()> {
//!     let client = Tenant::new("cald-prd")?;
//!
//!     // Find the current period and kick off a classify run.
//!     let period: Period = client
//!         .read_first(Some(Filter::eq("name", "January 2026")), &[])
//!         .await?;
//!     let job = PipelineRun::classify(
//!         "12345",
//!         period.period_seq.as_deref().unwrap_or_default(),
//!     );
//!     let mut pipeline = client.run_pipeline(&job).await?;
//!
//!     // Poll until the run reaches its terminal state. The interval is the
//!     // caller's choice; the client imposes no sleep policy.
//!     while !pipeline.state.is_terminal() {
//!         tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!         pipeline = client.read(&pipeline).await?;
//!     }
//!     assert_eq!(pipeline.status, Some(PipelineStatus::Successful));
//!     Ok(())
//! }
//! ```
//!
//! ## Listing
//!
//! ```no_run
//! use imclient::models::Participant;
//! use imclient::{Filter, Tenant};
//!
//! # async fn example(client: Tenant) -> imclient::Result<()> {
//! let mut payees = client.read_all::<Participant>(
//!     Some(Filter::eq("lastName", "Smith")),
//!     &["payeeId"],
//!     50,
//! );
//! while let Some(payee) = payees.try_next().await? {
//!     println!("{}", payee.payee_id);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod envelope;
mod errors;
mod filters;
pub mod models;
mod retry;

pub use client::{ResourceList, Tenant, TenantBuilder};
pub use errors::{Error, Result};
pub use filters::Filter;
pub use retry::{retry, retry_with, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF};
