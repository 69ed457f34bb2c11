//! Errors raised while decoding methods and content headers

use amqp091_wire::Error as WireError;

/// Errors associated with method and content header encoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Error from the field codec
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The (class id, method id) pair is not in the registry
    #[error("Unknown method class {class_id} method {method_id}")]
    UnknownMethod {
        /// Class id found on the wire
        class_id: u16,

        /// Method id found on the wire
        method_id: u16,
    },

    /// Content header for a class that carries no content
    #[error("Class {0} does not carry content")]
    UnexpectedContentClass(u16),
}
