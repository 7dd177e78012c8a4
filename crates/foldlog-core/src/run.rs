//! Run tree nodes: client run, slot run and unit run.
//!
//! Nodes own their lines and children. Each node caches its derived data;
//! the builder marks a node and its ancestors dirty whenever lines are added
//! beneath it, and the next `data()` call recomputes.

use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::aggregate::{self, ClientRunData, SlotRunData, UnitRunData};
use crate::log_line::LogLine;

#[derive(Debug)]
struct CacheState<T> {
    value: Option<Arc<T>>,
    dirty: bool,
}

/// Last computed value of a node plus its dirty flag.
#[derive(Debug)]
pub(crate) struct DataCache<T> {
    state: Mutex<CacheState<T>>,
}

impl<T> DataCache<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                value: None,
                dirty: true,
            }),
        }
    }

    fn mark_dirty(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        state.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).dirty
    }

    fn get_or_compute(&self, compute: impl FnOnce() -> T) -> Arc<T> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.dirty {
            if let Some(value) = &state.value {
                return Arc::clone(value);
            }
        }
        let value = Arc::new(compute());
        state.value = Some(Arc::clone(&value));
        state.dirty = false;
        value
    }
}

/// One attempt at running a work unit on a slot.
#[derive(Debug)]
pub struct UnitRun {
    queue_index: u8,
    folding_slot: u32,
    start_index: u64,
    end_index: Option<u64>,
    is_complete: bool,
    lines: Vec<LogLine>,
    data: DataCache<UnitRunData>,
}

impl UnitRun {
    pub(crate) fn new(queue_index: u8, folding_slot: u32, start_index: u64) -> Self {
        Self {
            queue_index,
            folding_slot,
            start_index,
            end_index: None,
            is_complete: false,
            lines: Vec::new(),
            data: DataCache::new(),
        }
    }

    pub fn queue_index(&self) -> u8 {
        self.queue_index
    }

    /// Slot this unit ran on.
    pub fn folding_slot(&self) -> u32 {
        self.folding_slot
    }

    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    pub fn end_index(&self) -> Option<u64> {
        self.end_index
    }

    /// True once the client cleaned the unit up.
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn log_lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn data(&self) -> Arc<UnitRunData> {
        self.data
            .get_or_compute(|| aggregate::unit_run_data(&self.lines))
    }

    pub fn is_dirty(&self) -> bool {
        self.data.is_dirty()
    }

    pub(crate) fn push_line(&mut self, line: LogLine) {
        self.lines.push(line);
        self.data.mark_dirty();
    }

    pub(crate) fn complete(&mut self, end_index: u64) {
        self.end_index = Some(end_index);
        self.is_complete = true;
    }

    /// Close an unfinished unit at its last line without completing it.
    pub(crate) fn close_at_last_line(&mut self) {
        if let Some(last) = self.lines.last() {
            self.end_index = Some(last.index());
        }
    }
}

/// All unit runs seen on one folding slot during a client run.
#[derive(Debug)]
pub struct SlotRun {
    folding_slot: u32,
    client_start_index: u64,
    unit_runs: Vec<UnitRun>,
    data: DataCache<SlotRunData>,
}

impl SlotRun {
    pub(crate) fn new(folding_slot: u32, client_start_index: u64) -> Self {
        Self {
            folding_slot,
            client_start_index,
            unit_runs: Vec::new(),
            data: DataCache::new(),
        }
    }

    pub fn folding_slot(&self) -> u32 {
        self.folding_slot
    }

    /// Start index of the client run that owns this slot run.
    pub fn client_start_index(&self) -> u64 {
        self.client_start_index
    }

    pub fn unit_runs(&self) -> &[UnitRun] {
        &self.unit_runs
    }

    pub fn data(&self) -> Arc<SlotRunData> {
        self.data.get_or_compute(|| {
            let units: Vec<Arc<UnitRunData>> = self.unit_runs.iter().map(UnitRun::data).collect();
            aggregate::slot_run_data(units.iter().map(|u| u.result.as_ref()))
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.data.is_dirty()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.data.mark_dirty();
    }

    /// The open unit run for the queue index, opening one at `start_index`
    /// when there is none.
    pub(crate) fn unit_run_entry(&mut self, queue_index: u8, start_index: u64) -> &mut UnitRun {
        let open = self
            .unit_runs
            .iter()
            .rposition(|u| u.queue_index == queue_index && !u.is_complete);
        let pos = match open {
            Some(pos) => pos,
            None => {
                debug!(
                    folding_slot = self.folding_slot,
                    queue_index,
                    start_index,
                    "Unit run opened"
                );
                self.unit_runs
                    .push(UnitRun::new(queue_index, self.folding_slot, start_index));
                self.data.mark_dirty();
                self.unit_runs.len() - 1
            }
        };
        &mut self.unit_runs[pos]
    }

    pub(crate) fn open_unit_runs_mut(&mut self) -> impl Iterator<Item = &mut UnitRun> {
        self.unit_runs.iter_mut().filter(|u| !u.is_complete)
    }
}

/// One client process lifetime.
#[derive(Debug)]
pub struct ClientRun {
    client_start_index: u64,
    lines: Vec<LogLine>,
    slot_runs: Vec<SlotRun>,
    data: DataCache<ClientRunData>,
}

impl ClientRun {
    pub(crate) fn new(client_start_index: u64) -> Self {
        Self {
            client_start_index,
            lines: Vec::new(),
            slot_runs: Vec::new(),
            data: DataCache::new(),
        }
    }

    pub fn client_start_index(&self) -> u64 {
        self.client_start_index
    }

    /// Lines not scoped to a work unit.
    pub fn log_lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Slot runs in the order their slots were first seen.
    pub fn slot_runs(&self) -> &[SlotRun] {
        &self.slot_runs
    }

    pub fn slot_run(&self, folding_slot: u32) -> Option<&SlotRun> {
        self.slot_runs.iter().find(|s| s.folding_slot == folding_slot)
    }

    pub fn data(&self) -> Arc<ClientRunData> {
        self.data
            .get_or_compute(|| aggregate::client_run_data(&self.lines))
    }

    pub fn is_dirty(&self) -> bool {
        self.data.is_dirty()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.data.mark_dirty();
    }

    pub(crate) fn push_line(&mut self, line: LogLine) {
        self.lines.push(line);
        self.data.mark_dirty();
    }

    /// The slot run for `folding_slot`, created on first reference.
    pub(crate) fn slot_run_entry(&mut self, folding_slot: u32) -> &mut SlotRun {
        let pos = match self.slot_runs.iter().position(|s| s.folding_slot == folding_slot) {
            Some(pos) => pos,
            None => {
                debug!(folding_slot, client_start_index = self.client_start_index, "Slot run opened");
                self.slot_runs
                    .push(SlotRun::new(folding_slot, self.client_start_index));
                self.data.mark_dirty();
                self.slot_runs.len() - 1
            }
        };
        &mut self.slot_runs[pos]
    }

    pub(crate) fn slot_runs_mut(&mut self) -> impl Iterator<Item = &mut SlotRun> {
        self.slot_runs.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_recomputes_only_when_dirty() {
        let mut cache: DataCache<u32> = DataCache::new();
        let mut calls = 0;

        assert!(cache.is_dirty());
        let first = cache.get_or_compute(|| {
            calls += 1;
            7
        });
        assert!(!cache.is_dirty());
        let second = cache.get_or_compute(|| {
            calls += 1;
            8
        });
        assert_eq!((*first, *second, calls), (7, 7, 1));

        cache.mark_dirty();
        let third = cache.get_or_compute(|| {
            calls += 1;
            9
        });
        assert_eq!((*third, calls), (9, 2));
        assert_eq!(*first, 7);
    }

    #[test]
    fn test_unit_run_close_at_last_line() {
        let mut unit = UnitRun::new(1, 0, 3);
        unit.push_line(LogLine::new(3, "10:00:00:WU01:FS00:Starting"));
        unit.push_line(LogLine::new(5, "10:00:01:WU01:FS00:0xa7:Version 0.0.18"));
        unit.close_at_last_line();

        assert_eq!(unit.end_index(), Some(5));
        assert!(!unit.is_complete());
    }

    #[test]
    fn test_open_unit_lookup_skips_completed() {
        let mut slot = SlotRun::new(0, 0);
        slot.unit_run_entry(1, 0).complete(4);
        assert_eq!(slot.unit_run_entry(1, 5).start_index(), 5);
        assert_eq!(slot.unit_run_entry(1, 9).start_index(), 5);

        assert_eq!(slot.unit_runs().len(), 2);
        assert_eq!(slot.unit_run_entry(2, 10).start_index(), 10);
        assert_eq!(slot.unit_runs().len(), 3);
    }
}
