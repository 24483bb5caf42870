//! The session authority — owner of the authenticated-session lifecycle.
//!
//! One actor task is the single writer of an [`AuthSnapshot`] published
//! over a watch channel; any number of readers poll or subscribe. The
//! actor reconciles the startup session check, backend change
//! notifications, and profile fetches so that at most one profile fetch is
//! ever in flight, a token rotation never blanks the profile, and a hung
//! backend cannot leave the snapshot loading forever.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let authority =
//!   SessionAuthority::spawn(credentials, profiles, Timings::default());
//! authority.initialize().await;
//! let snap = authority.snapshot();
//! if snap.can_publish_articles() { /* … */ }
//! ```

mod actor;
mod authority;
mod snapshot;

pub use authority::{SessionAuthority, Timings};
pub use snapshot::AuthSnapshot;
