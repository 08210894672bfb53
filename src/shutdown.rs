use tokio::sync::watch;

/// Cooperative stop flag shared by the background loops.
///
/// Loops check it between iterations only; work already in progress
/// (a watering hold in particular) always runs to completion.
#[derive(Clone)]
pub struct StopSignal(watch::Receiver<bool>);

pub struct StopHandle(watch::Sender<bool>);

pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once stop has been requested or the handle was dropped
    pub async fn stopped(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}
