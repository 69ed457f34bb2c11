//! Methods of the `confirm` class (class id 85)

method_struct! {
    /// Put the channel in publisher confirm mode
    pub struct ConfirmSelect {
        /// Do not send a reply method
        pub nowait: bool => bit,
    }
}

method_struct! {
    /// Acknowledge confirm mode
    pub struct ConfirmSelectOk {}
}
