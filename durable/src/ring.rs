//! The durable replay ring.
//!
//! Layout in the kv namespace: metadata keys `head`, `tail`, `count`
//! (single bytes) and `tx_seq` (u32 LE); per-slot keys `q{n}_s` (seq,
//! u32 LE), `q{n}_l` (length, u16 LE), `q{n}_d` (bytes followed by a
//! CRC32 guard, u32 LE).
//!
//! The ring wraps on overflow: when full, the oldest slot is dropped so
//! the most recent telemetry is the part that survives.

use crate::{Kv, StoreError};
use tracing::{debug, warn};

/// Slot capacity of the origin's replay ring
pub const RING_CAPACITY: u8 = 8;

/// Power-safe ring of unacked outbound envelopes over a [`Kv`] store.
#[derive(Debug)]
pub struct DurableRing<K: Kv> {
    kv: K,
    capacity: u8,
    head: u8,
    tail: u8,
    count: u8,
    tx_seq: u32,
    // In-memory mirror of each slot's seq; None for unreadable slots
    slot_seqs: Vec<Option<u32>>,
}

fn read_u8<K: Kv>(kv: &K, key: &str) -> Result<Option<u8>, StoreError> {
    Ok(kv.get(key)?.and_then(|v| v.first().copied()))
}

fn read_u16<K: Kv>(kv: &K, key: &str) -> Result<Option<u16>, StoreError> {
    Ok(kv
        .get(key)?
        .and_then(|v| v.try_into().ok())
        .map(u16::from_le_bytes))
}

fn read_u32<K: Kv>(kv: &K, key: &str) -> Result<Option<u32>, StoreError> {
    Ok(kv
        .get(key)?
        .and_then(|v| v.try_into().ok())
        .map(u32::from_le_bytes))
}

impl<K: Kv> DurableRing<K> {
    /// Open the ring, restoring persisted state when present.
    pub fn open(kv: K, capacity: u8) -> Result<Self, StoreError> {
        assert!(capacity >= 1, "ring needs at least one slot");

        let head = read_u8(&kv, "head")?.unwrap_or(0) % capacity;
        let tail = read_u8(&kv, "tail")?.unwrap_or(0) % capacity;
        let count = read_u8(&kv, "count")?.unwrap_or(0).min(capacity);
        let tx_seq = read_u32(&kv, "tx_seq")?.unwrap_or(1).max(1);

        let mut slot_seqs = vec![None; capacity as usize];
        for (i, entry) in slot_seqs.iter_mut().enumerate() {
            *entry = read_u32(&kv, &format!("q{i}_s"))?;
        }

        debug!(head, tail, count, tx_seq, "durable ring opened");
        Ok(Self {
            kv,
            capacity,
            head,
            tail,
            count,
            tx_seq,
            slot_seqs,
        })
    }

    /// Next outbound seq to assign; restored across reboots
    pub fn tx_seq(&self) -> u32 {
        self.tx_seq
    }

    /// Stored slot count
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether no slots are stored
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Slot capacity
    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    /// Give back the kv store, e.g. to reopen after a simulated power loss
    pub fn into_inner(self) -> K {
        self.kv
    }

    // Retry a failed write once, then log and carry on. Durability is
    // weakened for this write only; the message is still sent live.
    fn put_logged(&mut self, key: &str, value: &[u8]) {
        if self.kv.put(key, value).is_ok() {
            return;
        }
        if let Err(e) = self.kv.put(key, value) {
            warn!(key, error = %e, "kv write failed twice; continuing without durability");
        }
    }

    fn persist_meta(&mut self) {
        let (head, tail, count) = (self.head, self.tail, self.count);
        self.put_logged("head", &[head]);
        self.put_logged("tail", &[tail]);
        self.put_logged("count", &[count]);
        let tx_seq = self.tx_seq.to_le_bytes();
        self.put_logged("tx_seq", &tx_seq);
    }

    /// Record that `seq` has been assigned on the origin edge and persist
    /// the counter so a reboot never reuses it.
    pub fn note_assigned(&mut self, seq: u32) {
        if seq >= self.tx_seq {
            self.tx_seq = seq + 1;
            let tx_seq = self.tx_seq.to_le_bytes();
            self.put_logged("tx_seq", &tx_seq);
        }
    }

    /// Store an envelope payload under its assigned seq.
    ///
    /// When full, the oldest slot is dropped first. The slot and metadata
    /// are persisted before this returns, so the payload is recoverable if
    /// power fails any time afterwards.
    pub fn enqueue(&mut self, seq: u32, bytes: &[u8]) {
        if self.count == self.capacity {
            debug!(dropped_seq = ?self.slot_seqs[self.tail as usize], "ring full, dropping oldest");
            self.tail = (self.tail + 1) % self.capacity;
            self.count -= 1;
        }

        let idx = self.head as usize;
        let mut data = Vec::with_capacity(bytes.len() + 4);
        data.extend_from_slice(bytes);
        data.extend_from_slice(&crc32fast::hash(bytes).to_le_bytes());

        self.put_logged(&format!("q{idx}_s"), &seq.to_le_bytes());
        self.put_logged(&format!("q{idx}_l"), &(bytes.len() as u16).to_le_bytes());
        self.put_logged(&format!("q{idx}_d"), &data);
        self.slot_seqs[idx] = Some(seq);

        self.head = (self.head + 1) % self.capacity;
        self.count += 1;
        self.note_assigned(seq);
        self.persist_meta();
    }

    /// Free every slot covered by a cumulative ACK.
    pub fn ack(&mut self, cumulative_seq: u32) {
        let mut freed = 0u8;
        while self.count > 0 {
            let idx = self.tail as usize;
            match self.slot_seqs[idx] {
                Some(seq) if seq <= cumulative_seq => {
                    self.slot_seqs[idx] = None;
                    self.tail = (self.tail + 1) % self.capacity;
                    self.count -= 1;
                    freed += 1;
                }
                // Unreadable slot under the ack boundary is dead weight too
                None => {
                    self.tail = (self.tail + 1) % self.capacity;
                    self.count -= 1;
                    freed += 1;
                }
                Some(_) => break,
            }
        }
        if freed > 0 {
            debug!(cumulative_seq, freed, "durable slots acked");
            self.persist_meta();
        }
    }

    /// All stored `(seq, payload)` pairs in seq order, for re-enqueueing
    /// into the live reliability queue on boot. Slots failing the CRC
    /// guard are skipped.
    pub fn replay(&self) -> Result<Vec<(u32, Vec<u8>)>, StoreError> {
        let mut out = Vec::with_capacity(self.count as usize);
        for n in 0..self.count {
            let idx = ((self.tail + n) % self.capacity) as usize;
            let Some(seq) = self.slot_seqs[idx] else {
                warn!(idx, "slot seq missing, skipping");
                continue;
            };
            let Some(len) = read_u16(&self.kv, &format!("q{idx}_l"))? else {
                warn!(idx, seq, "slot length missing, skipping");
                continue;
            };
            let Some(data) = self.kv.get(&format!("q{idx}_d"))? else {
                warn!(idx, seq, "slot data missing, skipping");
                continue;
            };
            if data.len() != len as usize + 4 {
                warn!(idx, seq, "slot length mismatch, skipping");
                continue;
            }
            let (payload, guard) = data.split_at(len as usize);
            if crc32fast::hash(payload) != u32::from_le_bytes(guard.try_into().unwrap()) {
                warn!(idx, seq, "slot crc mismatch, skipping");
                continue;
            }
            out.push((seq, payload.to_vec()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemKv;

    fn ring() -> DurableRing<MemKv> {
        DurableRing::open(MemKv::new(), RING_CAPACITY).unwrap()
    }

    #[test]
    fn test_enqueue_replay_ack() {
        let mut r = ring();
        r.enqueue(1, b"first");
        r.enqueue(2, b"second");
        assert_eq!(r.len(), 2);
        assert_eq!(r.tx_seq(), 3);

        let replayed = r.replay().unwrap();
        assert_eq!(
            replayed,
            vec![(1, b"first".to_vec()), (2, b"second".to_vec())]
        );

        r.ack(1);
        assert_eq!(r.replay().unwrap(), vec![(2, b"second".to_vec())]);
        r.ack(2);
        assert!(r.is_empty());
    }

    #[test]
    fn test_ack_is_cumulative() {
        let mut r = ring();
        for seq in 1..=5 {
            r.enqueue(seq, format!("e{seq}").as_bytes());
        }
        r.ack(3);
        let left: Vec<u32> = r.replay().unwrap().iter().map(|(s, _)| *s).collect();
        assert_eq!(left, vec![4, 5]);
        // Stale ack changes nothing
        r.ack(2);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_wrap_on_overflow_keeps_newest() {
        let mut r = ring();
        for seq in 1..=(RING_CAPACITY as u32 + 3) {
            r.enqueue(seq, format!("e{seq}").as_bytes());
        }
        assert_eq!(r.len(), RING_CAPACITY as usize);
        let seqs: Vec<u32> = r.replay().unwrap().iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, (4..=11).collect::<Vec<u32>>());
    }

    #[test]
    fn test_power_loss_recovery() {
        // Seqs 100..=105 enqueued, ACK covers 103, then power loss.
        let mut r = ring();
        for seq in 100..=105u32 {
            r.enqueue(seq, format!("t{seq}").as_bytes());
        }
        r.ack(103);

        let kv = r.into_inner();
        let recovered = DurableRing::open(kv, RING_CAPACITY).unwrap();

        let slots = recovered.replay().unwrap();
        let seqs: Vec<u32> = slots.iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, vec![104, 105]);
        assert_eq!(slots[0].1, b"t104");
        assert_eq!(recovered.tx_seq(), 106);
    }

    #[test]
    fn test_note_assigned_persists_counter() {
        let mut r = ring();
        r.note_assigned(41);
        assert_eq!(r.tx_seq(), 42);

        let recovered = DurableRing::open(r.into_inner(), RING_CAPACITY).unwrap();
        assert_eq!(recovered.tx_seq(), 42);
    }

    #[test]
    fn test_corrupt_slot_skipped() {
        let mut r = ring();
        r.enqueue(1, b"good");
        r.enqueue(2, b"bad");
        r.enqueue(3, b"also good");

        let mut kv = r.into_inner();
        // Flip a payload byte under slot 1's CRC guard
        let mut data = kv.get("q1_d").unwrap().unwrap();
        data[0] ^= 0xFF;
        kv.put("q1_d", &data).unwrap();

        let recovered = DurableRing::open(kv, RING_CAPACITY).unwrap();
        let seqs: Vec<u32> = recovered.replay().unwrap().iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, vec![1, 3]);
    }

    #[test]
    fn test_persist_fault_keeps_running() {
        let mut kv = MemKv::new();
        kv.fail_next_puts(2); // first put and its retry both fail
        let mut r = DurableRing::open(kv, RING_CAPACITY).unwrap();
        // Must not panic or error; durability is weakened, liveness kept.
        r.enqueue(1, b"telemetry");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_file_backend_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let ns = dir.path().join("origin");
        {
            let kv = crate::FileKv::open(&ns).unwrap();
            let mut r = DurableRing::open(kv, RING_CAPACITY).unwrap();
            r.enqueue(7, b"persisted envelope");
        }
        let kv = crate::FileKv::open(&ns).unwrap();
        let r = DurableRing::open(kv, RING_CAPACITY).unwrap();
        assert_eq!(r.replay().unwrap(), vec![(7, b"persisted envelope".to_vec())]);
        assert_eq!(r.tx_seq(), 8);
    }
}
