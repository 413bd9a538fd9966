use maybe_sync::{MaybeSend, MaybeSync};

/// Notifies the host application that the canvas should be redrawn.
///
/// The request is non-blocking: the host is expected to schedule a draw on its next idle cycle,
/// which eventually calls [`Figure::on_draw`](crate::Figure::on_draw).
pub trait Messenger: MaybeSend + MaybeSync {
    /// Requests an idle redraw.
    fn request_redraw(&self);
}

/// Messenger that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyMessenger;

impl Messenger for DummyMessenger {
    fn request_redraw(&self) {}
}
