//! Banked set-associative L1 tag model.
//!
//! Only tags are modeled; data lives in main memory and is read and written
//! functionally. The model answers two questions for the Cache+TLB path:
//! 1. **Ports:** Can bank `b` take another request this cycle?
//! 2. **Lookup:** Does a line hit, and does filling it evict a dirty victim?
//!
//! Replacement is LRU by access stamp. Banks are line-interleaved.

use crate::config::CacheConfig;
use crate::sim::Cycle;

#[derive(Clone, Copy, Debug, Default)]
struct Line {
    tag: u64,
    valid: bool,
    dirty: bool,
    stamp: u64,
}

/// Result of a tag lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lookup {
    /// The line was present.
    pub hit: bool,
    /// A dirty victim was evicted to make room.
    pub writeback: bool,
}

/// L1 tag array with per-bank port accounting.
#[derive(Debug)]
pub struct L1Tags {
    lines: Vec<Line>,
    sets: usize,
    ways: usize,
    line_bytes: usize,
    latency: u64,
    ports: usize,
    port_cycle: Cycle,
    port_use: Vec<usize>,
    clock: u64,
}

impl L1Tags {
    /// Creates an empty tag array from a validated configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let ways = config.ways.max(1);
        let line_bytes = config.line_bytes.max(1);
        let sets = (config.size_bytes / (line_bytes * ways)).max(1);
        Self {
            lines: vec![Line::default(); sets * ways],
            sets,
            ways,
            line_bytes,
            latency: config.latency,
            ports: config.ports.max(1),
            port_cycle: 0,
            port_use: vec![0; config.banks.max(1)],
            clock: 0,
        }
    }

    /// Line size in bytes.
    pub const fn line_bytes(&self) -> usize {
        self.line_bytes
    }

    /// Hit latency in cycles.
    pub const fn latency(&self) -> u64 {
        self.latency
    }

    /// Bank serving the line that holds `paddr`.
    pub fn bank_of(&self, paddr: u64) -> usize {
        ((paddr / self.line_bytes as u64) % self.port_use.len() as u64) as usize
    }

    /// Claims a port on `bank` for cycle `now`.
    ///
    /// Returns `false` when the bank has already accepted `ports` requests
    /// this cycle; the caller must retry later.
    pub fn claim_port(&mut self, now: Cycle, bank: usize) -> bool {
        if now != self.port_cycle {
            self.port_cycle = now;
            self.port_use.iter_mut().for_each(|u| *u = 0);
        }
        match self.port_use.get_mut(bank) {
            Some(used) if *used < self.ports => {
                *used += 1;
                true
            }
            _ => false,
        }
    }

    fn index(&self, paddr: u64) -> (usize, u64) {
        let line = paddr / self.line_bytes as u64;
        ((line % self.sets as u64) as usize, line / self.sets as u64)
    }

    /// Returns `true` if the line holding `paddr` is present.
    pub fn contains(&self, paddr: u64) -> bool {
        let (set, tag) = self.index(paddr);
        self.lines[set * self.ways..(set + 1) * self.ways]
            .iter()
            .any(|l| l.valid && l.tag == tag)
    }

    /// Looks up the line holding `paddr`, filling it on a miss.
    pub fn lookup(&mut self, paddr: u64, is_write: bool) -> Lookup {
        let (set, tag) = self.index(paddr);
        self.clock += 1;
        let stamp = self.clock;
        let ways = &mut self.lines[set * self.ways..(set + 1) * self.ways];

        if let Some(line) = ways.iter_mut().find(|l| l.valid && l.tag == tag) {
            line.stamp = stamp;
            line.dirty |= is_write;
            return Lookup {
                hit: true,
                writeback: false,
            };
        }

        let victim = ways
            .iter_mut()
            .min_by_key(|l| if l.valid { l.stamp } else { 0 });
        let mut writeback = false;
        if let Some(v) = victim {
            writeback = v.valid && v.dirty;
            *v = Line {
                tag,
                valid: true,
                dirty: is_write,
                stamp,
            };
        }
        Lookup {
            hit: false,
            writeback,
        }
    }

    /// Invalidates every line.
    pub fn flush(&mut self) {
        self.lines.iter_mut().for_each(|l| l.valid = false);
    }
}
