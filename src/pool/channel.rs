//! Result channel between worker processes and the parent
//!
//! A worker writes its fragment as one JSON line on stdout. The parent relays
//! each worker's stdout into a single in-process queue that the collector
//! drains, so any number of workers can publish concurrently.

use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::OutcomeFragment;

/// Create a connected sender/receiver pair
pub fn channel() -> (FragmentSender, FragmentReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FragmentSender { tx }, FragmentReceiver { rx })
}

/// Parent-side producer end; cloned into every relay
#[derive(Clone, Debug)]
pub struct FragmentSender {
    tx: mpsc::UnboundedSender<OutcomeFragment>,
}

impl FragmentSender {
    /// Enqueue a fragment; false if the receiver is gone
    pub fn put(&self, fragment: OutcomeFragment) -> bool {
        self.tx.send(fragment).is_ok()
    }

    /// Forward the first fragment found on `reader`.
    ///
    /// If the stream ends without a decodable fragment, `fallback` is
    /// published instead so the consumer still sees one fragment per worker.
    pub async fn relay<R, F>(&self, reader: R, fallback: F)
    where
        R: AsyncRead + Unpin,
        F: FnOnce() -> OutcomeFragment,
    {
        let mut lines = BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match OutcomeFragment::decode(&line) {
                    Ok(fragment) => {
                        debug!("Relaying fragment with {} entries", fragment.entries());
                        if !self.put(fragment) {
                            debug!("Result receiver dropped, fragment discarded");
                        }
                        return;
                    }
                    Err(e) => warn!("Discarding malformed worker output: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read worker output: {}", e);
                    break;
                }
            }
        }

        self.put(fallback());
    }
}

/// Consumer end, owned by the collector
#[derive(Debug)]
pub struct FragmentReceiver {
    rx: mpsc::UnboundedReceiver<OutcomeFragment>,
}

impl FragmentReceiver {
    /// Wait for the next fragment; `None` once every sender is gone
    pub async fn get(&mut self) -> Option<OutcomeFragment> {
        self.rx.recv().await
    }
}

/// Worker-side publish: write `fragment` as one line and flush
pub fn publish<W: Write>(fragment: &OutcomeFragment, mut out: W) -> io::Result<()> {
    let line = fragment.encode()?;
    writeln!(out, "{line}")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fingerprint;

    fn fragment(run: usize) -> OutcomeFragment {
        OutcomeFragment {
            failures: vec![(Fingerprint::from_identity("s::a"), "nope".to_string())],
            tests_run: run,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_put_get_fifo() {
        let (tx, mut rx) = channel();
        assert!(tx.put(fragment(1)));
        assert!(tx.put(fragment(2)));

        assert_eq!(rx.get().await.unwrap().tests_run, 1);
        assert_eq!(rx.get().await.unwrap().tests_run, 2);

        drop(tx);
        assert!(rx.get().await.is_none());
    }

    #[tokio::test]
    async fn test_relay_published_line() {
        let mut buf = Vec::new();
        publish(&fragment(3), &mut buf).unwrap();

        let (tx, mut rx) = channel();
        tx.relay(&buf[..], || fragment(99)).await;

        assert_eq!(rx.get().await.unwrap(), fragment(3));
    }

    #[tokio::test]
    async fn test_relay_skips_noise_then_uses_fallback() {
        let (tx, mut rx) = channel();
        tx.relay(&b"\nnot json\n"[..], || fragment(7)).await;

        assert_eq!(rx.get().await.unwrap().tests_run, 7);
    }
}
