//! Methods of the `channel` class (class id 20)

method_struct! {
    /// Open a channel for use
    pub struct ChannelOpen {
        /// Deprecated out-of-band settings
        pub reserved_1: String => shortstr,
    }
}

method_struct! {
    /// Signal that the channel is ready
    pub struct ChannelOpenOk {
        /// Deprecated channel id
        pub reserved_1: String => longstr,
    }
}

method_struct! {
    /// Enable or disable flow from the peer
    pub struct ChannelFlow {
        /// Start or stop content frames
        pub active: bool => bit,
    }
}

method_struct! {
    /// Confirm a flow method
    pub struct ChannelFlowOk {
        /// Current flow setting
        pub active: bool => bit,
    }
}

method_struct! {
    /// Request a channel close
    pub struct ChannelClose {
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
    /// Confirm a channel close
    pub struct ChannelCloseOk {}
}
