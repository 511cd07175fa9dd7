use std::collections::HashMap;
use std::time::Duration;
use tandem_core::StreamKey;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    TrackDebounce(StreamKey),
    CheckingTimeout,
    DisconnectGrace,
    RetryBackoff,
    Requeue,
}

#[derive(Debug)]
pub(crate) struct TimerEvent {
    pub key: TimerKey,
    pub epoch: u64,
    seq: u64,
}

/// Cancellable one-shot timers. A fired timer is delivered as a [`TimerEvent`]
/// and only counts if it is still the armed instance of its key.
pub(crate) struct Timers {
    armed: HashMap<TimerKey, (u64, JoinHandle<()>)>,
    next_seq: u64,
    tx: mpsc::UnboundedSender<TimerEvent>,
}

impl Timers {
    pub fn new(tx: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            armed: HashMap::new(),
            next_seq: 0,
            tx,
        }
    }

    /// Arm `key`, replacing any instance already armed.
    pub fn arm(&mut self, key: TimerKey, delay: Duration, epoch: u64) {
        self.cancel(&key);
        self.next_seq += 1;
        let seq = self.next_seq;

        let tx = self.tx.clone();
        let fired = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerEvent {
                key: fired,
                epoch,
                seq,
            });
        });
        self.armed.insert(key, (seq, handle));
    }

    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        match self.armed.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.armed.contains_key(key)
    }

    pub fn clear(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.abort();
        }
    }

    /// Accept a fired timer. Fails for instances cancelled or re-armed after
    /// they fired.
    pub fn claim(&mut self, event: &TimerEvent) -> bool {
        match self.armed.get(&event.key) {
            Some((seq, _)) if *seq == event.seq => {
                self.armed.remove(&event.key);
                true
            }
            _ => false,
        }
    }

    pub fn armed_keys(&self) -> Vec<TimerKey> {
        let mut keys: Vec<_> = self.armed.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.clear();
    }
}
