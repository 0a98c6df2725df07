//! Auth-domain identifiers, cache keys, scope sets, and token models.

pub mod id;
pub mod key;
pub mod scope;
pub mod token;

pub use id::*;
pub use key::*;
pub use scope::*;
pub use token::{record::*, secret::*};
