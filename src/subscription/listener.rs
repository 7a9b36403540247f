use crate::subscription::Values;
use tokio::sync::mpsc;

/// Interface to be implemented to receive the updates of a subscription.
///
/// The listener is invoked synchronously by the session's reader task, so
/// updates for a single item are always delivered in stream order. The
/// reader holds no lock while dispatching, which makes it safe to call
/// back into the session (for instance to add another subscription) from
/// inside the listener.
pub trait SubscriptionListener: Send + Sync {
    /// Called for every update received from the server.
    ///
    /// # Parameters
    ///
    /// - `item`: 1-based position of the item within the subscription.
    /// - `values`: the fully reconciled snapshot for that item after
    ///   applying the current update.
    fn on_item_update(&self, item: u32, values: &Values);
}

/// Any `Fn(item, values)` closure can act as a listener.
impl<F> SubscriptionListener for F
where
    F: Fn(u32, &Values) + Send + Sync,
{
    fn on_item_update(&self, item: u32, values: &Values) {
        self(item, values);
    }
}

/// A subscription listener that forwards item updates to a tokio mpsc
/// channel.
///
/// This decouples the reception of updates from their processing, enabling
/// asynchronous consumption by other tasks.
///
/// # Examples
///
/// ```ignore
/// use lightstreamer_tlcp::subscription::ChannelListener;
///
/// let (listener, mut rx) = ChannelListener::create_channel();
/// session.subscribe("DEFAULT", "item1", &["Value"], None, listener).await?;
///
/// tokio::spawn(async move {
///     while let Some((item, values)) = rx.recv().await {
///         println!("item {item}: {values}");
///     }
/// });
/// ```
pub struct ChannelListener {
    /// Channel sender for forwarding item updates.
    sender: mpsc::UnboundedSender<(u32, Values)>,
}

impl ChannelListener {
    /// Creates a new `ChannelListener` with the provided sender.
    pub fn new(sender: mpsc::UnboundedSender<(u32, Values)>) -> Self {
        Self { sender }
    }

    /// Creates a new channel pair and returns both the listener and the
    /// receiver end.
    pub fn create_channel() -> (Self, mpsc::UnboundedReceiver<(u32, Values)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl SubscriptionListener for ChannelListener {
    fn on_item_update(&self, item: u32, values: &Values) {
        // If send fails, the receiver has been dropped, which is acceptable.
        let _ = self.sender.send((item, values.clone()));
    }
}
