use bytes::Bytes;

/// Handle to the replicated service, bound to one client identity at
/// connect time. The consensus engine behind it is an external collaborator;
/// this crate only submits encoded requests and awaits agreed replies.
///
/// A handle must not be shared across logical callers. `close` consumes it,
/// so no operation can be issued afterward.
#[async_trait::async_trait]
pub trait ServiceEndpoint
where
    Self: Send,
{
    /// Submit a request that requires total-order agreement across replicas.
    /// Resolves once a consensus reply is available.
    async fn invoke_ordered(&mut self, request: Bytes) -> crate::Result<Bytes>;

    /// Submit a request without an ordering requirement. Resolves once an
    /// unordered quorum of replicas replied.
    async fn invoke_unordered(&mut self, request: Bytes) -> crate::Result<Bytes>;

    async fn close(self) -> crate::Result<()>;
}
