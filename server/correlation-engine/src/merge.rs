//! Fan-in of per-source record streams into one near-chronological stream.
//!
//! Sources are individually ordered at best, so this is a k-way merge with one
//! lookahead slot per source rather than a sort: memory stays O(sources) and
//! unbounded sources work. Heads are ordered by `(timestamp, source index)`;
//! each source holds at most one head, so that key is unique. A head without a
//! timestamp cannot be placed and is emitted ahead of the heap, in its source's
//! arrival order. Sequence numbers are assigned on emission, so `seq` follows
//! merged order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::iter;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::types::{Entry, Record, Source};

struct Lane<'a> {
  name: Arc<str>,
  records: Box<dyn Iterator<Item = Record> + 'a>,
  head: Option<Record>,
}

pub struct Merger<'a> {
  lanes: Vec<Lane<'a>>,
  heap: BinaryHeap<Reverse<(DateTime<Utc>, usize)>>,
  bypass: VecDeque<usize>,
  next_seq: u64,
}

impl<'a> Merger<'a> {
  pub fn new(sources: Vec<Source<'a>>) -> Self {
    let lanes: Vec<Lane<'a>> = sources
      .into_iter()
      .map(|s| Lane {
        name: s.name,
        records: s.records,
        head: None,
      })
      .collect();
    let mut merger = Self {
      heap: BinaryHeap::with_capacity(lanes.len()),
      bypass: VecDeque::new(),
      lanes,
      next_seq: 0,
    };
    for lane in 0..merger.lanes.len() {
      merger.refill(lane);
    }
    merger
  }

  /// Pull the next record of `lane` into its slot, or retire the lane.
  fn refill(&mut self, lane: usize) {
    let slot = &mut self.lanes[lane];
    let Some(record) = slot.records.next() else {
      slot.records = Box::new(iter::empty());
      return;
    };

    match record.timestamp {
      Some(ts) => self.heap.push(Reverse((ts, lane))),
      None => self.bypass.push_back(lane),
    }
    slot.head = Some(record);
  }
}

impl Iterator for Merger<'_> {
  type Item = Entry;

  fn next(&mut self) -> Option<Entry> {
    let lane = match self.bypass.pop_front() {
      Some(lane) => lane,
      None => {
        let Reverse((_, lane)) = self.heap.pop()?;
        lane
      }
    };
    let record = self.lanes[lane].head.take()?;
    let entry = Entry {
      seq: self.next_seq,
      origin: Arc::clone(&self.lanes[lane].name),
      record: Arc::new(record),
    };
    self.next_seq += 1;
    self.refill(lane);
    Some(entry)
  }
}
