//! Session-scoped owner of the refresh state.
//!
//! A single task owns the [`RefreshState`] and applies messages one at a time.
//! Fetches and retry timers run in their own tasks and report back through the
//! session's channel, so no result is ever committed out of order.

use crate::core::refresh::{Effect, Msg, QuoteView, RefreshState, update};
use crate::core::{CurrencyPair, QuoteProvider};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct QuoteSession {
    tx: mpsc::UnboundedSender<Msg>,
    view: watch::Receiver<QuoteView>,
    task: JoinHandle<()>,
}

impl QuoteSession {
    /// Spawns the session task and triggers the initial load.
    pub fn start(provider: Arc<dyn QuoteProvider>, pairs: Vec<CurrencyPair>) -> Self {
        info!(pairs = pairs.len(), "Starting quote session");
        let state = RefreshState::new(pairs);
        let (view_tx, view_rx) = watch::channel(state.view());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(state, provider, rx, tx.downgrade(), view_tx));

        let session = QuoteSession {
            tx,
            view: view_rx,
            task,
        };
        session.send(Msg::InitialLoadRequested);
        session
    }

    fn send(&self, msg: Msg) {
        if self.tx.send(msg).is_err() {
            debug!("Quote session already stopped");
        }
    }

    pub fn request_manual_refresh(&self) {
        self.send(Msg::ManualRefreshRequested);
    }

    pub fn request_retry(&self) {
        self.send(Msg::RetryRequested);
    }

    /// Retries when the blocking error is shown, refreshes otherwise.
    pub fn request_reload(&self) {
        if self.view.borrow().is_blocking_error {
            self.request_retry();
        } else {
            self.request_manual_refresh();
        }
    }

    pub fn view(&self) -> QuoteView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QuoteView> {
        self.view.clone()
    }

    /// Waits until the published view satisfies `predicate`. Returns the last
    /// published view if the session stops first.
    pub async fn wait_for(&self, predicate: impl FnMut(&QuoteView) -> bool) -> QuoteView {
        let mut rx = self.view.clone();
        let matched = rx.wait_for(predicate).await.map(|view| view.clone());
        matched.unwrap_or_else(|_| rx.borrow().clone())
    }

    /// Waits until no fetch is outstanding.
    pub async fn settled(&self) -> QuoteView {
        self.wait_for(|view| !view.is_initial_loading && !view.is_refreshing)
            .await
    }

    pub async fn shutdown(self) {
        let QuoteSession { tx, task, .. } = self;
        drop(tx);
        if let Err(e) = task.await {
            debug!(error = %e, "Quote session task did not finish cleanly");
        }
    }
}

async fn run(
    mut state: RefreshState,
    provider: Arc<dyn QuoteProvider>,
    mut rx: mpsc::UnboundedReceiver<Msg>,
    tx: mpsc::WeakUnboundedSender<Msg>,
    view_tx: watch::Sender<QuoteView>,
) {
    while let Some(msg) = rx.recv().await {
        let (next, effects) = update(state, msg);
        state = next;

        let fresh = state.view();
        view_tx.send_if_modified(|view| {
            if *view == fresh {
                false
            } else {
                *view = fresh;
                true
            }
        });

        for effect in effects {
            spawn_effect(effect, &provider, &tx);
        }
    }
    debug!("Quote session ended");
}

fn spawn_effect(
    effect: Effect,
    provider: &Arc<dyn QuoteProvider>,
    tx: &mpsc::WeakUnboundedSender<Msg>,
) {
    let tx = tx.clone();
    match effect {
        Effect::Fetch { ticket, pairs } => {
            let provider = Arc::clone(provider);
            tokio::spawn(async move {
                debug!(ticket, "Fetching quotes");
                let outcome = provider.fetch_quotes(&pairs).await;
                notify(
                    &tx,
                    Msg::FetchResolved {
                        ticket,
                        outcome,
                        at: Utc::now(),
                    },
                );
            });
        }
        Effect::ScheduleRetry { delay } => {
            tokio::spawn(async move {
                debug!(?delay, "Retry scheduled");
                tokio::time::sleep(delay).await;
                notify(&tx, Msg::RetryDelayElapsed);
            });
        }
    }
}

fn notify(tx: &mpsc::WeakUnboundedSender<Msg>, msg: Msg) {
    match tx.upgrade() {
        Some(tx) => {
            let _ = tx.send(msg);
        }
        None => debug!("Dropping message for a stopped session"),
    }
}
