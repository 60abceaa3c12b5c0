//! Sparse byte accumulator for one loader session.

use bytes::Bytes;
use std::collections::BTreeMap;

/// Fetched bytes indexed by absolute resource offset.
///
/// Segments are kept disjoint and non-adjacent: an insert that touches or
/// overlaps existing segments merges them into one. Bytes already present
/// are never overwritten and nothing is ever removed, so anything once
/// readable stays readable for the life of the session.
#[derive(Debug, Default)]
pub struct AccumulatedBuffer {
    segments: BTreeMap<u64, Vec<u8>>,
}

impl AccumulatedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `data` at absolute `offset`. Bytes past `u64::MAX` are dropped.
    pub fn insert(&mut self, offset: u64, data: &[u8]) {
        let room = usize::try_from(u64::MAX - offset).unwrap_or(usize::MAX);
        let data = &data[..data.len().min(room)];
        if data.is_empty() {
            return;
        }
        let end = offset + (data.len() as u64);

        // Segments touching [offset, end], lowest first
        let mut absorbed = Vec::new();
        for (&start, bytes) in self.segments.range(..=end).rev() {
            if start + (bytes.len() as u64) < offset {
                break;
            }
            absorbed.push(start);
        }
        absorbed.reverse();

        // Grow the segment that starts at or before `offset` in place so
        // sequential appends never copy the prefix again
        let (base_start, mut base, rest) = match absorbed.split_first() {
            Some((&first, rest)) if first <= offset => {
                let existing = self.segments.remove(&first).unwrap_or_default();
                (first, existing, rest)
            }
            _ => (offset, Vec::new(), absorbed.as_slice()),
        };

        let base_end = base_start + (base.len() as u64);
        if end > base_end {
            let skip = (base_end.max(offset) - offset) as usize;
            base.extend_from_slice(&data[skip..]);
        }

        for &start in rest {
            let Some(existing) = self.segments.remove(&start) else {
                continue;
            };
            let at = (start - base_start) as usize;
            let overlap = existing.len().min(base.len() - at);
            base[at..at + overlap].copy_from_slice(&existing[..overlap]);
            base.extend_from_slice(&existing[overlap..]);
        }

        self.segments.insert(base_start, base);
    }

    /// End of the contiguous run of bytes starting at `from`. Equals `from`
    /// when the byte at `from` has not arrived.
    pub fn contiguous_end(&self, from: u64) -> u64 {
        match self.segments.range(..=from).next_back() {
            Some((&start, bytes)) => {
                let end = start + (bytes.len() as u64);
                if end > from {
                    end
                } else {
                    from
                }
            }
            None => from,
        }
    }

    /// Whether `[offset, offset + length)` is fully present.
    pub fn covers(&self, offset: u64, length: u64) -> bool {
        if length == 0 {
            return true;
        }
        match offset.checked_add(length) {
            Some(end) => self.contiguous_end(offset) >= end,
            None => false,
        }
    }

    /// Copy of `[from, from + length)` if fully present.
    pub fn read(&self, from: u64, length: u64) -> Option<Bytes> {
        if length == 0 {
            return Some(Bytes::new());
        }
        if !self.covers(from, length) {
            return None;
        }

        let (&start, bytes) = self.segments.range(..=from).next_back()?;
        let at = (from - start) as usize;
        Some(Bytes::copy_from_slice(&bytes[at..at + length as usize]))
    }

    /// Length of the contiguous prefix starting at offset 0.
    pub fn len(&self) -> u64 {
        self.contiguous_end(0)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total bytes held across all segments.
    pub fn stored_bytes(&self) -> u64 {
        self.segments.values().map(|s| s.len() as u64).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}
