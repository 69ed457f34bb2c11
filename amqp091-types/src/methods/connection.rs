//! Methods of the `connection` class (class id 10)

use amqp091_wire::FieldTable;
use bytes::Bytes;

method_struct! {
    /// Start connection negotiation, sent by the server
    pub struct ConnectionStart {
        /// Protocol major version
        pub version_major: u8 => octet,
        /// Protocol minor version
        pub version_minor: u8 => octet,
        /// Server properties
        pub server_properties: FieldTable => table,
        /// Space separated list of security mechanisms
        pub mechanisms: String => longstr,
        /// Space separated list of message locales
        pub locales: String => longstr,
    }
}

method_struct! {
    /// Select security mechanism and locale
    pub struct ConnectionStartOk {
        /// Client properties
        pub client_properties: FieldTable => table,
        /// Selected security mechanism
        pub mechanism: String => shortstr,
        /// Security response data
        pub response: Bytes => binary,
        /// Selected message locale
        pub locale: String => shortstr,
    }
}

method_struct! {
    /// Security mechanism challenge
    pub struct ConnectionSecure {
        /// Security challenge data
        pub challenge: Bytes => binary,
    }
}

method_struct! {
    /// Security mechanism response
    pub struct ConnectionSecureOk {
        /// Security response data
        pub response: Bytes => binary,
    }
}

method_struct! {
    /// Propose connection tuning parameters
    pub struct ConnectionTune {
        /// Proposed maximum channels
        pub channel_max: u16 => short,
        /// Proposed maximum frame size
        pub frame_max: u32 => long,
        /// Desired heartbeat delay in seconds
        pub heartbeat: u16 => short,
    }
}

method_struct! {
    /// Negotiate connection tuning parameters
    pub struct ConnectionTuneOk {
        /// Negotiated maximum channels
        pub channel_max: u16 => short,
        /// Negotiated maximum frame size
        pub frame_max: u32 => long,
        /// Desired heartbeat delay in seconds
        pub heartbeat: u16 => short,
    }
}

method_struct! {
    /// Open connection to virtual host
    pub struct ConnectionOpen {
        /// Virtual host name
        pub virtual_host: String => shortstr,
        /// Deprecated capabilities
        pub reserved_1: String => shortstr,
        /// Deprecated insist
        pub reserved_2: bool => bit,
    }
}

method_struct! {
    /// Signal that connection is ready
    pub struct ConnectionOpenOk {
        /// Deprecated known hosts
        pub reserved_1: String => shortstr,
    }
}

method_struct! {
    /// Request a connection close
    pub struct ConnectionClose {
        /// Reply code
        pub reply_code: u16 => short,
        /// Localised reply text
        pub reply_text: String => shortstr,
        /// Class id of the failing method
        pub class_id: u16 => short,
        /// Method id of the failing method
        pub method_id: u16 => short,
    }
}

method_struct! {
    /// Confirm a connection close
    pub struct ConnectionCloseOk {}
}

method_struct! {
    /// Indicate that the connection is blocked
    pub struct ConnectionBlocked {
        /// Block reason
        pub reason: String => shortstr,
    }
}

method_struct! {
    /// Indicate that the connection is unblocked
    pub struct ConnectionUnblocked {}
}

method_struct! {
    /// Update the secret used by the connection
    pub struct ConnectionUpdateSecret {
        /// New secret
        pub new_secret: Bytes => binary,
        /// Reason for the update
        pub reason: String => shortstr,
    }
}

method_struct! {
    /// Confirm a secret update
    pub struct ConnectionUpdateSecretOk {}
}
