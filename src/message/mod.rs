//! Request and response values passed through the pipeline.
//!
//! Both types are plain owned values. Middleware derive new values through the
//! consuming `with_*` mutators instead of sharing mutable state, so a request
//! seen by an outer middleware is never changed behind its back by an inner one.

mod attributes;
mod request;
mod response;

use std::sync::Arc;

use smallvec::SmallVec;

pub use attributes::Attributes;
pub use request::Request;
pub use response::Response;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage shared by requests and responses.
///
/// Names keep their original casing and are compared case-insensitively.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

pub(crate) fn find_header<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn replace_header(headers: &mut HeaderVec, name: &str, value: String) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((Arc::from(name), value));
}
