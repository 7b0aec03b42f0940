//! Session and dissector configuration.

/// What to do when a frame is visited for the first time after a later frame
/// has already been committed.
///
/// Correlation assumes frames are first visited in non-decreasing order.
/// Replaying committed frames out of order is always fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameOrderPolicy {
    /// Accept silently; ordering is the host's responsibility.
    Trust,
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Refuse the message with [`CorrelationError::FrameOutOfOrder`].
    ///
    /// [`CorrelationError::FrameOutOfOrder`]: crate::error::CorrelationError::FrameOutOfOrder
    Reject,
}

/// Configuration for a [`GcpSession`](crate::gcp::GcpSession) and the
/// dissectors driving it.
#[derive(Debug, Clone)]
pub struct GcpConfig {
    /// Keep correlation state across messages (persistent mode).
    /// When false every message is analyzed in isolation.
    pub track_context: bool,
    /// Emit the context/command/termination view after each message.
    pub show_context_tree: bool,
    /// First-visit ordering guard.
    pub frame_order: FrameOrderPolicy,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            track_context: true,
            show_context_tree: true,
            frame_order: FrameOrderPolicy::default(),
        }
    }
}

impl GcpConfig {
    pub fn with_track_context(mut self, track_context: bool) -> Self {
        self.track_context = track_context;
        self
    }

    pub fn with_show_context_tree(mut self, show: bool) -> Self {
        self.show_context_tree = show;
        self
    }

    pub fn with_frame_order(mut self, policy: FrameOrderPolicy) -> Self {
        self.frame_order = policy;
        self
    }
}
