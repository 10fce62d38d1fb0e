//! Arena storage for objects, arrays, functions and scopes.
//!
//! Cells are addressed by generation-checked [`HeapRef`]s, so a handle to a
//! reclaimed cell can never alias a newer one. Memory is reclaimed two ways:
//! a mark/sweep [`Heap::collect`] from explicit roots, run only at safe points
//! where no Rust frame holds an unrooted handle, and the eager release of
//! scopes belonging to calls and loop iterations that created no closures.

use std::fmt;

use log::trace;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{FunctionKind, FunctionObject};
use crate::runner::ds::lex_env::Scope;
use crate::runner::ds::object::{JsArray, JsObject};
use crate::runner::ds::value::JsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef {
    index: u32,
    generation: u32,
}

impl HeapRef {
    /// A stable 64-bit number identifying this cell for its whole lifetime.
    pub fn slot_id(&self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub fn from_slot_id(slot: u64) -> Self {
        HeapRef {
            index: slot as u32,
            generation: (slot >> 32) as u32,
        }
    }
}

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
pub enum HeapCell {
    Object(JsObject),
    Array(JsArray),
    Function(FunctionObject),
    Scope(Scope),
}

/// Configuration for the heap.
#[derive(Debug, Clone, Default)]
pub struct HeapConfig {
    /// Maximum number of live cells. None means unlimited.
    pub max_cells: Option<usize>,
}

impl HeapConfig {
    pub fn unlimited() -> Self {
        HeapConfig { max_cells: None }
    }

    pub fn with_limit(max_cells: usize) -> Self {
        HeapConfig {
            max_cells: Some(max_cells),
        }
    }
}

struct Slot {
    generation: u32,
    cell: Option<HeapCell>,
}

/// Marks the scope log and closure count at the start of a call or loop iteration.
#[derive(Debug, Clone, Copy)]
pub struct ScopeCheckpoint {
    log_len: usize,
    closures: u64,
}

pub struct Heap {
    config: HeapConfig,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    allocations_since_gc: usize,
    scope_log: Vec<HeapRef>,
    closures_created: u64,
}

impl Heap {
    pub fn new(config: HeapConfig) -> Self {
        Heap {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            allocations_since_gc: 0,
            scope_log: Vec::new(),
            closures_created: 0,
        }
    }

    /// Allocate a cell, failing with `ResourceExceeded` past the configured limit.
    pub fn allocate(&mut self, cell: HeapCell) -> Result<HeapRef, JErrorType> {
        if let Some(max_cells) = self.config.max_cells {
            if self.live >= max_cells {
                return Err(JErrorType::ResourceExceeded(format!(
                    "Heap limit of {} cells exceeded",
                    max_cells
                )));
            }
        }
        Ok(self.allocate_root(cell))
    }

    /// Allocate without consulting the limit. Used for the global scope.
    pub fn allocate_root(&mut self, cell: HeapCell) -> HeapRef {
        let is_scope = matches!(cell, HeapCell::Scope(_));
        let heap_ref = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.cell = Some(cell);
                HeapRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    cell: Some(cell),
                });
                HeapRef {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.live += 1;
        self.allocations_since_gc += 1;
        if is_scope {
            self.scope_log.push(heap_ref);
        }
        heap_ref
    }

    pub fn get(&self, heap_ref: HeapRef) -> Option<&HeapCell> {
        self.slots
            .get(heap_ref.index as usize)
            .filter(|s| s.generation == heap_ref.generation)
            .and_then(|s| s.cell.as_ref())
    }

    pub fn get_mut(&mut self, heap_ref: HeapRef) -> Option<&mut HeapCell> {
        self.slots
            .get_mut(heap_ref.index as usize)
            .filter(|s| s.generation == heap_ref.generation)
            .and_then(|s| s.cell.as_mut())
    }

    pub fn is_live(&self, heap_ref: HeapRef) -> bool {
        self.get(heap_ref).is_some()
    }

    pub fn object(&self, heap_ref: HeapRef) -> Result<&JsObject, JErrorType> {
        match self.get(heap_ref) {
            Some(HeapCell::Object(o)) => Ok(o),
            _ => Err(dangling(heap_ref)),
        }
    }

    pub fn object_mut(&mut self, heap_ref: HeapRef) -> Result<&mut JsObject, JErrorType> {
        match self.get_mut(heap_ref) {
            Some(HeapCell::Object(o)) => Ok(o),
            _ => Err(dangling(heap_ref)),
        }
    }

    pub fn array(&self, heap_ref: HeapRef) -> Result<&JsArray, JErrorType> {
        match self.get(heap_ref) {
            Some(HeapCell::Array(a)) => Ok(a),
            _ => Err(dangling(heap_ref)),
        }
    }

    pub fn array_mut(&mut self, heap_ref: HeapRef) -> Result<&mut JsArray, JErrorType> {
        match self.get_mut(heap_ref) {
            Some(HeapCell::Array(a)) => Ok(a),
            _ => Err(dangling(heap_ref)),
        }
    }

    pub fn function(&self, heap_ref: HeapRef) -> Result<&FunctionObject, JErrorType> {
        match self.get(heap_ref) {
            Some(HeapCell::Function(f)) => Ok(f),
            _ => Err(dangling(heap_ref)),
        }
    }

    pub fn function_mut(&mut self, heap_ref: HeapRef) -> Result<&mut FunctionObject, JErrorType> {
        match self.get_mut(heap_ref) {
            Some(HeapCell::Function(f)) => Ok(f),
            _ => Err(dangling(heap_ref)),
        }
    }

    pub fn scope(&self, heap_ref: HeapRef) -> Result<&Scope, JErrorType> {
        match self.get(heap_ref) {
            Some(HeapCell::Scope(s)) => Ok(s),
            _ => Err(dangling(heap_ref)),
        }
    }

    pub fn scope_mut(&mut self, heap_ref: HeapRef) -> Result<&mut Scope, JErrorType> {
        match self.get_mut(heap_ref) {
            Some(HeapCell::Scope(s)) => Ok(s),
            _ => Err(dangling(heap_ref)),
        }
    }

    /// Number of live cells.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn allocations_since_gc(&self) -> usize {
        self.allocations_since_gc
    }

    fn free(&mut self, heap_ref: HeapRef) {
        if let Some(slot) = self.slots.get_mut(heap_ref.index as usize) {
            if slot.generation == heap_ref.generation && slot.cell.is_some() {
                slot.cell = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(heap_ref.index);
                self.live -= 1;
            }
        }
    }

    pub fn note_closure(&mut self) {
        self.closures_created += 1;
    }

    pub fn scope_checkpoint(&self) -> ScopeCheckpoint {
        ScopeCheckpoint {
            log_len: self.scope_log.len(),
            closures: self.closures_created,
        }
    }

    pub fn closures_since(&self, checkpoint: &ScopeCheckpoint) -> bool {
        self.closures_created != checkpoint.closures
    }

    /// Free the scopes allocated since `checkpoint` unless a closure may have
    /// captured one of them; in that case they are left to the collector.
    pub fn release_scopes(&mut self, checkpoint: &ScopeCheckpoint) {
        if checkpoint.log_len > self.scope_log.len() {
            return;
        }
        let released = self.scope_log.split_off(checkpoint.log_len);
        if !self.closures_since(checkpoint) {
            for heap_ref in released {
                self.free(heap_ref);
            }
        }
    }

    /// Mark from `roots` and sweep everything unreachable. Returns the number of freed cells.
    pub fn collect<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = HeapRef>,
    {
        let mut marked = vec![false; self.slots.len()];
        let mut pending: Vec<HeapRef> = roots.into_iter().collect();
        while let Some(heap_ref) = pending.pop() {
            let index = heap_ref.index as usize;
            if index >= marked.len() || marked[index] {
                continue;
            }
            let cell = match self.get(heap_ref) {
                Some(cell) => cell,
                None => continue,
            };
            marked[index] = true;
            trace_cell(cell, &mut pending);
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.cell.is_some() && !marked[index] {
                slot.cell = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        self.allocations_since_gc = 0;
        self.scope_log.clear();
        trace!("heap collection freed {} cells, {} live", freed, self.live);
        freed
    }
}

fn dangling(heap_ref: HeapRef) -> JErrorType {
    JErrorType::TypeError(format!("Invalid heap reference {}", heap_ref))
}

fn push_value(value: &JsValue, pending: &mut Vec<HeapRef>) {
    if let Some(heap_ref) = value.heap_ref() {
        pending.push(heap_ref);
    }
}

fn trace_cell(cell: &HeapCell, pending: &mut Vec<HeapRef>) {
    match cell {
        HeapCell::Object(o) => {
            pending.extend(o.prototype);
            o.properties.values().for_each(|v| push_value(v, pending));
            o.internal.values().for_each(|v| push_value(v, pending));
        }
        HeapCell::Array(a) => {
            a.elements.iter().for_each(|v| push_value(v, pending));
            a.properties.values().for_each(|v| push_value(v, pending));
        }
        HeapCell::Function(f) => {
            if let FunctionKind::Script(s) = &f.kind {
                pending.push(s.scope);
                if let Some(this) = &s.lexical_this {
                    push_value(this, pending);
                }
            }
            f.properties.values().for_each(|v| push_value(v, pending));
        }
        HeapCell::Scope(s) => {
            pending.extend(s.parent);
            s.bindings.values().for_each(|b| push_value(&b.value, pending));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::lex_env::{Binding, ScopeKind};

    fn object_with(heap: &mut Heap, key: &str, value: JsValue) -> HeapRef {
        let mut o = JsObject::new();
        o.properties.set(key, value);
        heap.allocate(HeapCell::Object(o)).unwrap()
    }

    #[test]
    fn test_collect_keeps_reachable_cycles_and_frees_garbage() {
        let mut heap = Heap::new(HeapConfig::unlimited());
        let a = object_with(&mut heap, "x", JsValue::Null);
        let b = object_with(&mut heap, "a", JsValue::Object(a));
        heap.object_mut(a).unwrap().properties.set("b", JsValue::Object(b));
        let garbage = object_with(&mut heap, "y", JsValue::Number(1.0));
        assert_eq!(heap.len(), 3);

        let freed = heap.collect(vec![a]);
        assert_eq!(freed, 1);
        assert!(heap.is_live(a));
        assert!(heap.is_live(b));
        assert!(!heap.is_live(garbage));
    }

    #[test]
    fn test_stale_reference_does_not_alias_reused_slot() {
        let mut heap = Heap::new(HeapConfig::unlimited());
        let old = object_with(&mut heap, "x", JsValue::Null);
        heap.collect(Vec::new());
        let new = object_with(&mut heap, "y", JsValue::Null);
        assert_ne!(old, new);
        assert!(heap.object(old).is_err());
        assert!(heap.object(new).is_ok());
    }

    #[test]
    fn test_allocation_limit() {
        let mut heap = Heap::new(HeapConfig::with_limit(1));
        heap.allocate(HeapCell::Array(JsArray::default())).unwrap();
        match heap.allocate(HeapCell::Array(JsArray::default())) {
            Err(JErrorType::ResourceExceeded(_)) => {}
            other => panic!("expected ResourceExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_release_scopes_without_closures() {
        let mut heap = Heap::new(HeapConfig::unlimited());
        let global = heap.allocate_root(HeapCell::Scope(Scope::new(ScopeKind::Global, None)));
        let checkpoint = heap.scope_checkpoint();
        let mut scope = Scope::new(ScopeKind::Function, Some(global));
        scope
            .bindings
            .insert("x".to_string(), Binding::var(JsValue::Number(1.0)));
        let local = heap.allocate(HeapCell::Scope(scope)).unwrap();
        heap.release_scopes(&checkpoint);
        assert!(!heap.is_live(local));
        assert!(heap.is_live(global));

        let checkpoint = heap.scope_checkpoint();
        let captured = heap
            .allocate(HeapCell::Scope(Scope::new(ScopeKind::Function, Some(global))))
            .unwrap();
        heap.note_closure();
        heap.release_scopes(&checkpoint);
        assert!(heap.is_live(captured));
    }
}
