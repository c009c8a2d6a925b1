//! Identity resolution
//!
//! Turns an inbound request into a stable principal: a verified subject id
//! for authenticated callers, or a salted hash of the client IP for
//! anonymous callers. Anonymous identity is deterministic for the same
//! IP + salt, and is never treated as durable identity beyond rate-limiting.

pub mod resolver;

pub use resolver::{IdentityResolver, Principal, PrincipalKind, RequestContext};
