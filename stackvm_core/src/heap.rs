/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::object::{HeapObject, ObjRef, ObjectKind};
use crate::roots::RootSet;
use crate::value::Value;
use utils::dlog;

pub const DEFAULT_THRESHOLD: usize = 100;

#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Live object count at which the first collection is triggered.
    pub initial_threshold: usize,
    /// Collect before every allocation.
    pub stress: bool,
    /// Print a report to stderr after every cycle.
    pub trace: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_THRESHOLD,
            stress: false,
            trace: false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GcPhase {
    Idle,
    MarkingRoots,
    TracingGraph,
    Sweeping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    pub cycles: u64,
    pub total_allocated: u64,
    pub total_freed: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub before: usize,
    pub after: usize,
    pub freed: usize,
    pub threshold: usize,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<HeapObject>,
}

/// Owns every object the program creates. Objects live in an arena of
/// slots and are additionally threaded onto the all-objects list, which the
/// sweeper walks. Reachability is never computed from that list.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    objects: Option<ObjRef>,
    live: usize,
    threshold: usize,

    // empty outside of a collection; kept around to reuse its buffer
    gray: Vec<ObjRef>,
    phase: GcPhase,

    stats: GcStats,
    last_cycle: Option<CycleReport>,
    config: HeapConfig,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new(HeapConfig::default())
    }
}

impl Heap {
    pub fn new(config: HeapConfig) -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            objects: None,
            live: 0,
            threshold: config.initial_threshold.max(1),
            gray: Vec::new(),
            phase: GcPhase::Idle,
            stats: GcStats::default(),
            last_cycle: None,
            config,
        }
    }

    /// Creates a new object. If the heap has reached its threshold, a full
    /// collection runs first, with `roots` plus the new object's own fields
    /// as the root set.
    pub fn allocate(&mut self, kind: ObjectKind, roots: RootSet<'_>) -> ObjRef {
        if self.config.stress || self.live >= self.threshold {
            self.collect_with(roots, kind.references());
            if self.live >= self.threshold {
                self.threshold = self.threshold.saturating_mul(2);
                dlog!("gc: threshold raised to {}", self.threshold);
            }
        }

        let object = HeapObject::new(kind, self.objects);
        let r = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                ObjRef::new(index, slot.generation)
            }
            None => {
                if self.slots.len() >= u32::MAX as usize || self.slots.try_reserve(1).is_err() {
                    allocation_failed();
                }
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                ObjRef::new(index, 0)
            }
        };

        self.objects = Some(r);
        self.live += 1;
        self.stats.total_allocated += 1;
        r
    }

    /// Runs one full stop-the-world mark-sweep cycle.
    pub fn collect(&mut self, roots: RootSet<'_>) -> CycleReport {
        self.collect_with(roots, [])
    }

    fn collect_with(
        &mut self,
        roots: RootSet<'_>,
        pinned: impl IntoIterator<Item = ObjRef>,
    ) -> CycleReport {
        debug_assert_eq!(self.phase, GcPhase::Idle);
        debug_assert!(self.gray.is_empty());
        let before = self.live;

        self.phase = GcPhase::MarkingRoots;
        for r in roots.iter().filter_map(Value::obj_ref).chain(pinned) {
            self.mark_gray(r);
        }
        dlog!("gc: {} objects gray after root scan", self.gray.len());

        self.phase = GcPhase::TracingGraph;
        self.trace_graph();

        self.phase = GcPhase::Sweeping;
        let freed = self.sweep();

        self.phase = GcPhase::Idle;
        self.stats.cycles += 1;
        self.stats.total_freed += freed as u64;

        let report = CycleReport {
            before,
            after: self.live,
            freed,
            threshold: self.threshold,
        };
        self.last_cycle = Some(report);

        if self.config.trace {
            eprintln!(
                "-- gc cycle {}: {} -> {} objects ({} freed), threshold {}",
                self.stats.cycles, report.before, report.after, report.freed, report.threshold
            );
        }
        report
    }

    fn mark_gray(&mut self, r: ObjRef) {
        debug_assert!(self.contains(r), "reference outside the heap: {r:?}");
        if let Some(object) = self.slots[r.index()].object.as_mut() {
            if !object.marked {
                object.marked = true;
                self.gray.push(r);
            }
        }
    }

    fn trace_graph(&mut self) {
        while let Some(r) = self.gray.pop() {
            let references = match &self.slots[r.index()].object {
                Some(object) => object.kind.references(),
                None => continue,
            };
            for child in references {
                self.mark_gray(child);
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let mut prev: Option<ObjRef> = None;
        let mut cursor = self.objects;

        while let Some(r) = cursor {
            let slot = &mut self.slots[r.index()];
            let Some(object) = slot.object.as_mut() else {
                unreachable!("all-objects list links a freed slot");
            };
            let next = object.next;

            if object.marked {
                object.marked = false;
                prev = Some(r);
            } else {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_slots.push(r.index() as u32);
                self.live -= 1;
                freed += 1;

                match prev {
                    Some(p) => {
                        if let Some(survivor) = self.slots[p.index()].object.as_mut() {
                            survivor.next = next;
                        }
                    }
                    None => self.objects = next,
                }
            }
            cursor = next;
        }

        dlog!("gc: swept {freed} objects, {} remain", self.live);
        freed
    }

    pub fn contains(&self, r: ObjRef) -> bool {
        self.get(r).is_some()
    }

    pub fn get(&self, r: ObjRef) -> Option<&HeapObject> {
        let slot = self.slots.get(r.index())?;
        if slot.generation != r.generation() {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut HeapObject> {
        let slot = self.slots.get_mut(r.index())?;
        if slot.generation != r.generation() {
            return None;
        }
        slot.object.as_mut()
    }

    pub fn kind(&self, r: ObjRef) -> Option<&ObjectKind> {
        self.get(r).map(HeapObject::kind)
    }

    pub fn is_marked(&self, r: ObjRef) -> bool {
        self.get(r).is_some_and(HeapObject::is_marked)
    }

    /// Returns false if `r` is not a live pair.
    pub fn set_head(&mut self, r: ObjRef, value: Value) -> bool {
        match self.get_mut(r).map(|o| &mut o.kind) {
            Some(ObjectKind::Pair { head, .. }) => {
                *head = value;
                true
            }
            _ => false,
        }
    }

    /// Returns false if `r` is not a live pair.
    pub fn set_tail(&mut self, r: ObjRef, value: Value) -> bool {
        match self.get_mut(r).map(|o| &mut o.kind) {
            Some(ObjectKind::Pair { tail, .. }) => {
                *tail = value;
                true
            }
            _ => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Counts objects by walking the all-objects list. Always equal to
    /// `live_count`.
    pub fn count_list(&self) -> usize {
        self.iter().count()
    }

    /// Walks the all-objects list, most recently allocated first.
    pub fn iter(&self) -> Objects<'_> {
        Objects {
            heap: self,
            cursor: self.objects,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle
    }

    pub fn describe(&self, value: Value) -> String {
        match value {
            Value::Int(n) => n.to_string(),
            Value::Obj(r) => match self.kind(r) {
                Some(ObjectKind::Pair { .. }) => "<pair>".to_string(),
                Some(ObjectKind::Function { arity }) => format!("<function/{arity}>"),
                Some(ObjectKind::Closure { .. }) => "<closure>".to_string(),
                None => "<object>".to_string(),
            },
        }
    }
}

pub struct Objects<'a> {
    heap: &'a Heap,
    cursor: Option<ObjRef>,
}

impl<'a> Iterator for Objects<'a> {
    type Item = (ObjRef, &'a HeapObject);

    fn next(&mut self) -> Option<Self::Item> {
        let r = self.cursor?;
        let object = self.heap.get(r)?;
        self.cursor = object.next;
        Some((r, object))
    }
}

fn allocation_failed() -> ! {
    eprintln!("Fatal: Heap Allocation Failed");
    std::process::exit(1)
}
