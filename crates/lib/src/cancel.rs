//! Cancellation signal shared between the caller and long-running operations.
//!
//! A [`CancelHandle`] fires the signal; any number of [`Cancellation`] clones
//! observe it, either by polling (`is_cancelled`, for synchronous loops such
//! as directory copies) or by awaiting (`cancelled`, for racing external
//! processes and prompt reads).

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelHandle {
  tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct Cancellation {
  rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn channel() -> (CancelHandle, Cancellation) {
  let (tx, rx) = watch::channel(false);
  (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }

  pub fn subscribe(&self) -> Cancellation {
    Cancellation { rx: self.tx.subscribe() }
  }
}

impl Cancellation {
  /// A signal that never fires.
  pub fn never() -> Self {
    let (_tx, rx) = watch::channel(false);
    Self { rx }
  }

  pub fn is_cancelled(&self) -> bool {
    *self.rx.borrow()
  }

  /// Resolves once the signal has fired.
  ///
  /// If every handle is dropped without cancelling, this never resolves.
  pub async fn cancelled(&self) {
    let mut rx = self.rx.clone();
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}
