use motormart_core::AggregateId;

/// A command: a request to change the state of one aggregate.
///
/// Commands are imperative ("place order"), may be rejected, and target
/// exactly one aggregate instance.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// The aggregate this command is addressed to.
    fn target_aggregate_id(&self) -> AggregateId;
}
