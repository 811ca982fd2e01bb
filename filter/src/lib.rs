//! # Service property filters
//!
//! Service properties and the RFC 1960 filter language used to select
//! services from the registry.
//!
//! ```rust
//! use filter::{Filter, Properties};
//!
//! let filter: Filter = "(&(color=red)(service.ranking>=5))".parse().unwrap();
//!
//! let properties = Properties::new()
//!     .with("color", "red")
//!     .with("service.ranking", 10);
//!
//! assert!(filter.matches(&properties));
//! ```

mod error;
mod expr;
mod parse;
mod value;

pub use error::{FilterError, FilterErrorKind};
pub use expr::{Filter, Operator, Substring};
pub use parse::MAX_DEPTH;
pub use value::{Properties, PropertyValue};
