//! Network communication layer for the bike dock
//!
//! This crate talks to the remote authority that decides whether a bike may
//! be checked in or out. Every call collapses into authorized or denied; a
//! dock that cannot reach its authority denies.
//!
//! # Components
//!
//! - **Authority**: the contract the controller depends on
//! - **HttpAuthority**: HTTP+JSON client for the real back end
//! - **MockAuthority**: scripted stand-in for development and tests
//!
//! # Example
//!
//! ```no_run
//! use bikedock_network::{Authority, AuthorityConfig, HttpAuthority};
//! use bikedock_core::DockId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dock_id = DockId::new("181149779735094")?;
//! let authority = HttpAuthority::new(AuthorityConfig::default(), dock_id.clone())?;
//!
//! if !authority.register(&dock_id).await {
//!     eprintln!("registration failed, continuing");
//! }
//! # Ok(())
//! # }
//! ```

mod authority;
mod client;
mod mock;

pub use authority::Authority;
pub use client::{AuthorityConfig, AuthorityError, HttpAuthority};
pub use mock::{AuthorityCall, MockAuthority};
