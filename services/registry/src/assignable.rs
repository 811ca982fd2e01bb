//! Type assignability between consumers and services.

use std::fmt;

use crate::bundle::Bundle;
use crate::record::ServiceRecord;

/// Decides whether a consumer sees the same class for a name as the
/// service's owner.
///
/// Consulted only for lookups by explicit name, for non-factory services,
/// and never for the system bundle.
pub trait Assignability: fmt::Debug + Send + Sync {
    /// Whether `record`, published under `class`, is usable by `consumer`.
    fn is_assignable_to(&self, consumer: &Bundle, class: &str, record: &ServiceRecord) -> bool;
}

/// Accepts every service.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignAll;

impl Assignability for AssignAll {
    fn is_assignable_to(&self, _: &Bundle, _: &str, _: &ServiceRecord) -> bool {
        true
    }
}
