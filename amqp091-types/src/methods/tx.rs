//! Methods of the `tx` class (class id 90)

method_struct! {
    /// Select standard transaction mode
    pub struct TxSelect {}
}

method_struct! {
    /// Confirm transaction mode
    pub struct TxSelectOk {}
}

method_struct! {
    /// Commit the current transaction
    pub struct TxCommit {}
}

method_struct! {
    /// Confirm a successful commit
    pub struct TxCommitOk {}
}

method_struct! {
    /// Abandon the current transaction
    pub struct TxRollback {}
}

method_struct! {
    /// Confirm a successful rollback
    pub struct TxRollbackOk {}
}
