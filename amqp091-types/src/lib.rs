#![deny(missing_docs, missing_debug_implementations)]

//! Method, property and constant definitions of the AMQP 0-9-1 protocol
//!
//! Every standard method has a struct in [`methods`] carrying its argument list. The
//! [`Method`] enum and [`MethodKind::lookup`] form the registry used to decode method frames.
//!
//! ```rust
//! use amqp091_types::{Method, MethodKind, methods::QueueDeclare};
//!
//! let kind = MethodKind::lookup(50, 10).unwrap();
//! assert_eq!(kind, MethodKind::QueueDeclare);
//!
//! let declare = Method::from(QueueDeclare { queue: "tasks".into(), ..Default::default() });
//! assert!(declare.wait());
//! ```

#[macro_use]
mod macros;

mod args;

pub mod constants;
pub mod error;
pub mod method;
pub mod methods;
pub mod properties;
pub mod reply_code;

pub use error::Error;
pub use method::{Method, MethodKind};
pub use properties::{BasicProperties, Content, ContentHeader};
pub use reply_code::ReplyCode;

/// Re-exports the field codec
pub use amqp091_wire as wire;
