use async_trait::async_trait;
use tokio::sync::watch;

/// Stand-in for intersection observation: a lazy load parks on
/// `wait_until_visible` until the host reports the target on screen.
#[async_trait]
pub trait VisibilityGate: Send + Sync {
    async fn wait_until_visible(&self);
    fn is_visible(&self) -> bool;
}

pub struct AlwaysVisible;

#[async_trait]
impl VisibilityGate for AlwaysVisible {
    async fn wait_until_visible(&self) {}

    fn is_visible(&self) -> bool {
        true
    }
}

pub struct ManualVisibility {
    sender: watch::Sender<bool>,
}

impl ManualVisibility {
    pub fn new(visible: bool) -> Self {
        let (sender, _) = watch::channel(visible);
        Self { sender }
    }

    pub fn set_visible(&self, visible: bool) {
        let _ = self.sender.send(visible);
    }
}

#[async_trait]
impl VisibilityGate for ManualVisibility {
    async fn wait_until_visible(&self) {
        let mut receiver = self.sender.subscribe();
        let _ = receiver.wait_for(|visible| *visible).await;
    }

    fn is_visible(&self) -> bool {
        *self.sender.borrow()
    }
}
