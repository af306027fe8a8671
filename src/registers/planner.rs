//! Composite read planning.
//!
//! Several logical fields usually sit close together in a sensor's
//! register table. Reading them one transaction each wastes bus time, so
//! the planner merges requested spans into as few contiguous ranges as the
//! per-transaction register limit allows.

/// One physical read covering one or more requested spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousRange {
    pub start: u16,
    pub count: u16,
}

impl ContiguousRange {
    /// Exclusive end address, widened to avoid overflow at 0xFFFF.
    pub fn end(&self) -> u32 {
        self.start as u32 + self.count as u32
    }

    /// Whether the span `(address, word_count)` sits entirely inside this range.
    pub fn contains(&self, address: u16, word_count: u16) -> bool {
        address >= self.start && address as u32 + word_count as u32 <= self.end()
    }
}

/// Register limit per read transaction for holding/input registers.
pub const DEFAULT_MAX_REGISTERS: u16 = 125;

/// Merges requested register spans into contiguous read ranges.
///
/// `merge_gap` is the widest hole (in registers) bridged between two
/// spans: bridging reads a few throwaway words but saves a transaction.
/// `max_registers` caps each planned range at the device/protocol limit.
#[derive(Debug, Clone)]
pub struct ReadPlanner {
    merge_gap: u16,
    max_registers: u16,
}

impl Default for ReadPlanner {
    fn default() -> Self {
        Self {
            merge_gap: 0,
            max_registers: DEFAULT_MAX_REGISTERS,
        }
    }
}

impl ReadPlanner {
    pub fn new(merge_gap: u16, max_registers: u16) -> Self {
        Self {
            merge_gap,
            max_registers: max_registers.max(1),
        }
    }

    /// Plans reads for `(address, word_count)` spans.
    ///
    /// Returned ranges are sorted ascending and each input span sits
    /// entirely inside exactly one of them. The greedy merge is not
    /// globally optimal but is deterministic.
    pub fn plan(&self, spans: &[(u16, u16)]) -> Vec<ContiguousRange> {
        let mut spans: Vec<(u16, u16)> = spans
            .iter()
            .copied()
            .filter(|(_, word_count)| *word_count > 0)
            .collect();
        spans.sort_unstable();

        let mut ranges: Vec<ContiguousRange> = Vec::new();
        for (address, word_count) in spans {
            let span_end = address as u32 + word_count as u32;
            match ranges.last_mut() {
                Some(last)
                    if address as u32 <= last.end() + self.merge_gap as u32
                        && span_end - last.start as u32 <= self.max_registers as u32 =>
                {
                    let merged_end = last.end().max(span_end);
                    last.count = (merged_end - last.start as u32) as u16;
                }
                _ => ranges.push(ContiguousRange {
                    start: address,
                    count: word_count,
                }),
            }
        }
        ranges
    }
}
