//! Reference-counted object heap.
//!
//! Objects live in a generational arena. Each slot is either live (with a
//! reference count), parked in a recycle pool, or free. Releasing a slot
//! bumps its generation, so handles issued before the release can never
//! reach whatever is stored there later.
//!
//! Every heap owns its permanent objects: the two boolean singletons and,
//! unless disabled, a pre-boxed integer for every value in −128..=127. The
//! heap holds one count on each of them, so program code can never drive
//! them to zero.

use std::mem;

use core_types::{name_hash, ObjectId, Value, VmError};
use serde::{Deserialize, Serialize};

use crate::object::{HeapObject, ObjectKind};

/// Smallest integer served from the small-int cache
pub const SMALL_INT_MIN: i32 = -128;
/// Largest integer served from the small-int cache
pub const SMALL_INT_MAX: i32 = 127;

/// Heap tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Maximum number of recycled integer slots kept for reuse
    pub int_pool_capacity: usize,
    /// Maximum number of recycled float slots kept for reuse
    pub float_pool_capacity: usize,
    /// Pre-box −128..=127 and hand out shared references to them
    pub small_int_cache: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            int_pool_capacity: 256,
            float_pool_capacity: 256,
            small_int_cache: true,
        }
    }
}

/// Allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Objects handed out by `allocate`
    pub allocations: u64,
    /// Slots returned to the free list
    pub frees: u64,
    /// Allocations served from a recycle pool
    pub pool_hits: u64,
    /// Scalars parked in a recycle pool instead of being freed
    pub recycled: u64,
    /// Integers served from the small-int cache
    pub small_int_hits: u64,
    /// Highest number of simultaneously live objects
    pub peak_live: usize,
}

#[derive(Debug)]
enum Slot {
    Live { ref_count: u32, object: HeapObject },
    Pooled(HeapObject),
    Free,
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    slot: Slot,
}

/// The object heap.
///
/// # Examples
///
/// ```
/// use memory_manager::Heap;
///
/// let mut heap = Heap::default();
/// let permanent = heap.live_count();
///
/// let big = heap.box_int(1_000);
/// assert_eq!(heap.unbox_int(&big).unwrap(), 1_000);
/// heap.release_value(big);
///
/// assert_eq!(heap.live_count(), permanent);
/// ```
#[derive(Debug)]
pub struct Heap {
    entries: Vec<Entry>,
    free_list: Vec<u32>,
    int_pool: Vec<u32>,
    float_pool: Vec<u32>,
    small_ints: Vec<ObjectId>,
    booleans: [ObjectId; 2],
    config: HeapConfig,
    live: usize,
    stats: HeapStats,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}

impl Heap {
    /// Create a heap and install its permanent objects.
    pub fn new(config: HeapConfig) -> Self {
        let mut heap = Heap {
            entries: Vec::new(),
            free_list: Vec::new(),
            int_pool: Vec::new(),
            float_pool: Vec::new(),
            small_ints: Vec::new(),
            booleans: [ObjectId::new(0, 0); 2],
            config,
            live: 0,
            stats: HeapStats::default(),
        };
        heap.install_permanent();
        heap
    }

    fn install_permanent(&mut self) {
        self.booleans = [
            self.allocate(HeapObject::Boolean(false)),
            self.allocate(HeapObject::Boolean(true)),
        ];
        if self.config.small_int_cache {
            self.small_ints = (SMALL_INT_MIN..=SMALL_INT_MAX)
                .map(|value| self.allocate(HeapObject::Integer(value)))
                .collect();
        }
    }

    /// Configuration this heap was created with
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Store an object with a reference count of one.
    pub fn allocate(&mut self, object: HeapObject) -> ObjectId {
        let pooled = match object.kind() {
            ObjectKind::Integer => self.int_pool.pop(),
            ObjectKind::Float => self.float_pool.pop(),
            _ => None,
        };
        if pooled.is_some() {
            self.stats.pool_hits += 1;
        }

        let slot = Slot::Live {
            ref_count: 1,
            object,
        };
        let id = match pooled.or_else(|| self.free_list.pop()) {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.slot = slot;
                ObjectId::new(index, entry.generation)
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    slot,
                });
                ObjectId::new(index, 0)
            }
        };

        self.live += 1;
        self.stats.allocations += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.live);
        id
    }

    fn live_entry_mut(&mut self, id: ObjectId) -> Option<(&mut u32, &mut HeapObject)> {
        match self.entries.get_mut(id.index()) {
            Some(Entry {
                generation,
                slot: Slot::Live { ref_count, object },
            }) if *generation == id.generation() => Some((ref_count, object)),
            _ => None,
        }
    }

    /// Add one count to an object. Null is a no-op.
    pub fn retain(&mut self, id: Option<ObjectId>) {
        let Some(id) = id else { return };
        match self.live_entry_mut(id) {
            Some((ref_count, _)) => *ref_count = ref_count.saturating_add(1),
            None => log::warn!("retain of dead object {:?} ignored", id),
        }
    }

    /// Drop one count from an object, reclaiming it when the count reaches
    /// zero. Children of reclaimed objects are released with an explicit work
    /// list, so deep structures never recurse.
    pub fn release(&mut self, id: ObjectId) {
        let mut pending = vec![id];

        while let Some(id) = pending.pop() {
            let index = id.index();
            let Some((ref_count, object)) = self.live_entry_mut(id) else {
                log::warn!("release of dead object {:?} ignored", id);
                continue;
            };
            if *ref_count == 0 {
                log::warn!("release of {:?} with a zero count ignored", id);
                continue;
            }
            *ref_count -= 1;
            if *ref_count > 0 {
                continue;
            }

            let kind = object.kind();
            let pool = match kind {
                // booleans are eternal
                ObjectKind::Boolean => continue,
                ObjectKind::Integer if self.int_pool.len() < self.config.int_pool_capacity => {
                    Some((HeapObject::Integer(0), &mut self.int_pool))
                }
                ObjectKind::Float if self.float_pool.len() < self.config.float_pool_capacity => {
                    Some((HeapObject::Float(0.0), &mut self.float_pool))
                }
                _ => None,
            };

            let entry = &mut self.entries[index];
            entry.generation = entry.generation.wrapping_add(1);
            self.live -= 1;

            match pool {
                Some((reset, pool)) => {
                    entry.slot = Slot::Pooled(reset);
                    pool.push(index as u32);
                    self.stats.recycled += 1;
                }
                None => {
                    if let Slot::Live { object, .. } = mem::replace(&mut entry.slot, Slot::Free) {
                        object.release_into(&mut pending);
                    }
                    self.free_list.push(index as u32);
                    self.stats.frees += 1;
                }
            }
        }
    }

    /// Duplicate a value, adding a count when it is a reference.
    pub fn retain_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Reference(id) => {
                self.retain(*id);
                Value::Reference(*id)
            }
            Value::ReturnAddress(address) => Value::ReturnAddress(*address),
            Value::Uninitialized => Value::Uninitialized,
        }
    }

    /// Discard a value, releasing it when it is a non-null reference.
    pub fn release_value(&mut self, value: Value) {
        if let Some(id) = value.into_object() {
            self.release(id);
        }
    }

    /// Live object behind `id`.
    pub fn get(&self, id: ObjectId) -> Option<&HeapObject> {
        match self.entries.get(id.index()) {
            Some(Entry {
                generation,
                slot: Slot::Live { object, .. },
            }) if *generation == id.generation() => Some(object),
            _ => None,
        }
    }

    /// Mutable access to the live object behind `id`.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut HeapObject> {
        self.live_entry_mut(id).map(|(_, object)| object)
    }

    /// Object referenced by `value`, or the error the interpreter reports.
    pub fn object(&self, value: &Value) -> Result<&HeapObject, VmError> {
        let id = referenced(value)?;
        self.get(id)
            .ok_or_else(|| VmError::DanglingReference(format!("{:?}", id)))
    }

    /// Mutable form of [`object`](Self::object).
    pub fn object_mut(&mut self, value: &Value) -> Result<&mut HeapObject, VmError> {
        let id = referenced(value)?;
        self.get_mut(id)
            .ok_or_else(|| VmError::DanglingReference(format!("{:?}", id)))
    }

    /// Current count of a live object
    pub fn ref_count(&self, id: ObjectId) -> Option<u32> {
        match self.entries.get(id.index()) {
            Some(Entry {
                generation,
                slot: Slot::Live { ref_count, .. },
            }) if *generation == id.generation() => Some(*ref_count),
            _ => None,
        }
    }

    /// Kind of a live object
    pub fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.get(id).map(HeapObject::kind)
    }

    /// Whether `id` still names a live object
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Box an integer, sharing the cached object for small values.
    pub fn box_int(&mut self, value: i32) -> Value {
        if let Some(&id) = small_int_index(value).and_then(|i| self.small_ints.get(i)) {
            self.retain(Some(id));
            self.stats.small_int_hits += 1;
            return Value::object(id);
        }
        Value::object(self.allocate(HeapObject::Integer(value)))
    }

    /// Box a float.
    pub fn box_float(&mut self, value: f32) -> Value {
        Value::object(self.allocate(HeapObject::Float(value)))
    }

    /// Reference to one of the boolean singletons.
    pub fn box_bool(&mut self, value: bool) -> Value {
        let id = self.booleans[usize::from(value)];
        self.retain(Some(id));
        Value::object(id)
    }

    /// Allocate a string, computing its hash.
    pub fn alloc_string(&mut self, bytes: impl Into<Vec<u8>>) -> Value {
        let bytes = bytes.into();
        let hash = name_hash(&bytes);
        Value::object(self.allocate(HeapObject::String { bytes, hash }))
    }

    /// Allocate an array of `length` unset elements.
    pub fn alloc_array(&mut self, length: usize) -> Value {
        let elements = (0..length).map(|_| Value::Uninitialized).collect();
        Value::object(self.allocate(HeapObject::Array(elements)))
    }

    /// Allocate a tuple, taking over the counts held by `elements`.
    pub fn alloc_tuple(&mut self, elements: Vec<Value>) -> Value {
        Value::object(self.allocate(HeapObject::Tuple(elements)))
    }

    /// Allocate an instance with `field_count` unset fields.
    pub fn alloc_instance(&mut self, class_index: u16, type_id: u32, field_count: usize) -> Value {
        let fields = (0..field_count).map(|_| Value::Uninitialized).collect();
        Value::object(self.allocate(HeapObject::Instance {
            class_index,
            type_id,
            fields,
        }))
    }

    /// Box a type handle.
    pub fn alloc_type(&mut self, type_id: u32) -> Value {
        Value::object(self.allocate(HeapObject::Type(type_id)))
    }

    /// Allocate a generic instance, taking over the given counts.
    pub fn alloc_generic(&mut self, base_type: ObjectId, type_params: Vec<ObjectId>) -> Value {
        Value::object(self.allocate(HeapObject::GenericInstance {
            base_type,
            type_params,
        }))
    }

    /// Integer payload of a boxed integer.
    pub fn unbox_int(&self, value: &Value) -> Result<i32, VmError> {
        match self.object(value)? {
            HeapObject::Integer(v) => Ok(*v),
            other => Err(VmError::type_mismatch("integer", other.kind().name())),
        }
    }

    /// Float payload of a boxed float.
    pub fn unbox_float(&self, value: &Value) -> Result<f32, VmError> {
        match self.object(value)? {
            HeapObject::Float(v) => Ok(*v),
            other => Err(VmError::type_mismatch("float", other.kind().name())),
        }
    }

    /// Payload of a boolean singleton.
    pub fn unbox_bool(&self, value: &Value) -> Result<bool, VmError> {
        match self.object(value)? {
            HeapObject::Boolean(v) => Ok(*v),
            other => Err(VmError::type_mismatch("boolean", other.kind().name())),
        }
    }

    /// Retained copy of an array element.
    pub fn array_get(&mut self, array: &Value, index: i32) -> Result<Value, VmError> {
        self.slot_get(array, ObjectKind::Array, index)
    }

    /// Store into an array element, releasing what it held. On error the
    /// value is released instead.
    pub fn array_set(&mut self, array: &Value, index: i32, value: Value) -> Result<(), VmError> {
        self.slot_set(array, ObjectKind::Array, index, value)
    }

    /// Element count of an array
    pub fn array_length(&self, array: &Value) -> Result<usize, VmError> {
        self.slots(array, ObjectKind::Array).map(<[Value]>::len)
    }

    /// Retained copy of an instance field.
    pub fn field_get(&mut self, instance: &Value, slot: u16) -> Result<Value, VmError> {
        self.slot_get(instance, ObjectKind::Instance, i32::from(slot))
    }

    /// Store into an instance field; same ownership rules as
    /// [`array_set`](Self::array_set).
    pub fn field_set(&mut self, instance: &Value, slot: u16, value: Value) -> Result<(), VmError> {
        self.slot_set(instance, ObjectKind::Instance, i32::from(slot), value)
    }

    fn slots(&self, container: &Value, kind: ObjectKind) -> Result<&[Value], VmError> {
        match (kind, self.object(container)?) {
            (ObjectKind::Array, HeapObject::Array(values))
            | (ObjectKind::Instance, HeapObject::Instance { fields: values, .. }) => {
                Ok(values.as_slice())
            }
            (_, other) => Err(VmError::type_mismatch(kind.name(), other.kind().name())),
        }
    }

    fn slots_mut(&mut self, container: &Value, kind: ObjectKind) -> Result<&mut [Value], VmError> {
        match (kind, self.object_mut(container)?) {
            (ObjectKind::Array, HeapObject::Array(values))
            | (ObjectKind::Instance, HeapObject::Instance { fields: values, .. }) => {
                Ok(values.as_mut_slice())
            }
            (_, other) => Err(VmError::type_mismatch(kind.name(), other.kind().name())),
        }
    }

    fn slot_get(&mut self, container: &Value, kind: ObjectKind, index: i32) -> Result<Value, VmError> {
        let target = {
            let values = self.slots(container, kind)?;
            let slot = checked_index(index, values.len())?;
            match &values[slot] {
                Value::Reference(id) => Value::Reference(*id),
                Value::ReturnAddress(address) => Value::ReturnAddress(*address),
                Value::Uninitialized => Value::Uninitialized,
            }
        };
        self.retain(target.as_object());
        Ok(target)
    }

    fn slot_set(
        &mut self,
        container: &Value,
        kind: ObjectKind,
        index: i32,
        value: Value,
    ) -> Result<(), VmError> {
        let slot = match self
            .slots(container, kind)
            .and_then(|values| checked_index(index, values.len()))
        {
            Ok(slot) => slot,
            Err(err) => {
                self.release_value(value);
                return Err(err);
            }
        };
        let previous = match self.slots_mut(container, kind) {
            Ok(values) => mem::replace(&mut values[slot], value),
            Err(_) => value,
        };
        self.release_value(previous);
        Ok(())
    }

    /// Number of live objects, permanent ones included
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of objects the heap keeps alive for itself
    pub fn permanent_count(&self) -> usize {
        self.booleans.len() + self.small_ints.len()
    }

    /// Slots currently parked in the integer and float pools
    pub fn pooled_count(&self) -> (usize, usize) {
        (self.int_pool.len(), self.float_pool.len())
    }

    /// Allocation counters
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Drop every object unconditionally, then reinstall the permanent ones.
    ///
    /// Returns how many non-permanent objects were still live. Counts are
    /// ignored: whatever is left at teardown is ordinary garbage.
    pub fn clear(&mut self) -> usize {
        let leftover = self.live.saturating_sub(self.permanent_count());
        self.drain();
        log::debug!("heap cleared, {} outstanding objects dropped", leftover);
        self.install_permanent();
        leftover
    }

    fn drain(&mut self) {
        let mut scratch = Vec::new();
        for entry in self.entries.drain(..) {
            if let Slot::Live { object, .. } | Slot::Pooled(object) = entry.slot {
                // counts are meaningless once every slot is going away
                object.release_into(&mut scratch);
                scratch.clear();
            }
        }
        self.free_list.clear();
        self.int_pool.clear();
        self.float_pool.clear();
        self.small_ints.clear();
        self.live = 0;
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.drain();
    }
}

fn referenced(value: &Value) -> Result<ObjectId, VmError> {
    match value {
        Value::Reference(Some(id)) => Ok(*id),
        Value::Reference(None) => Err(VmError::NullReference),
        other => Err(VmError::type_mismatch("reference", other.tag_name())),
    }
}

fn checked_index(index: i32, length: usize) -> Result<usize, VmError> {
    usize::try_from(index)
        .ok()
        .filter(|&slot| slot < length)
        .ok_or(VmError::ArrayIndexOutOfBounds { index, length })
}

fn small_int_index(value: i32) -> Option<usize> {
    (SMALL_INT_MIN..=SMALL_INT_MAX)
        .contains(&value)
        .then(|| (value - SMALL_INT_MIN) as usize)
}
