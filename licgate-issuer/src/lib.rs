//! Administrator-side license issuance for licgate.
//!
//! Holds the Ed25519 signing key handling and the approval step. Installations
//! link only `licgate-license`, which carries the verifying key alone.

mod error;
mod issuer;
mod keyfile;
mod status;

pub use error::{IssueError, IssueResult};
pub use issuer::{Issuer, install_encoded, install_token};
pub use keyfile::{encode_verifying_key, generate_signing_key, read_signing_key, write_signing_key};
pub use status::local_status;
