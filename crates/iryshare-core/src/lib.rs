//! # Iryshare Core
//!
//! Pure primitives for encrypted file sharing: wallet addresses, access
//! policies, the envelope wire format, and content locators.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the data that travels between the application and its
//! collaborators.
//!
//! ## Key Types
//!
//! - [`Address`] - A wallet identity, lower-cased on construction
//! - [`AccessPolicy`] - The predicate structure evaluated at decrypt time
//! - [`PolicyCompiler`] - Turns recipients plus an owner into a policy
//! - [`Envelope`] - Ciphertext + policy + file metadata, as stored
//! - [`Locator`] - Where a published envelope lives
//!
//! ## Wire Format
//!
//! Envelopes are flat JSON objects tagged by `version`. See [`envelope`].

pub mod address;
pub mod envelope;
pub mod error;
pub mod locator;
pub mod policy;

pub use address::{merge_recipients, normalize_recipients, Address};
pub use envelope::{Envelope, FormatVersion};
pub use error::{CoreError, Result};
pub use locator::{Locator, ObjectId};
pub use policy::{
    compile_policy, AccessCondition, AccessPolicy, BoolOperator, Comparator, PolicyClause,
    PolicyCompiler, PolicyKind, PolicyMode, Predicate, ReturnValueTest, DEFAULT_CHAIN,
    USER_ADDRESS_PARAM,
};
