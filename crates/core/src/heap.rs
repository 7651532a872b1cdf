//! The mark-and-sweep object pool.
//!
//! Only the four kinds of object the interpreter allocates at *runtime*
//! live here: strings, arrays, bound methods and instances. Functions,
//! native functions and classes are entity-table objects with
//! program-length lifetime and are never enrolled in this pool.
//!
//! Objects form a singly-linked intrusive list (`next` pointers), with
//! head/tail tracked on the `Heap` itself. Allocation pushes at the
//! tail; sweep walks head-to-tail holding the previous node in a local
//! variable so it can unlink dead nodes in place.
//!
//! # Safety
//!
//! This module manages heap nodes through raw pointers because an
//! intrusive linked list with in-place unlinking doesn't fit safe
//! Rust's aliasing rules when combined with the mark bit living on the
//! node itself. Every node is allocated with `Box::into_raw` and only
//! ever freed once, either during `sweep` or in `Heap::drop`. A `Heap`
//! is the sole owner of every node reachable from its `head`.

use crate::entity::{ClassProto, FunctionProto};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::rc::Rc;

/// The payload of one heap node.
pub enum ObjectKind {
    /// A string buffer. `core` is the "core string" flag: `true` when
    /// this is a clone of a constant-pool `Rc<str>` rather
    /// than a freshly computed one (e.g. `CONCAT`'s result). Rust's
    /// `Rc` makes the distinction informational rather than load-bearing
    /// for memory safety, but it is kept for fidelity and for `print`'s
    /// descriptor text.
    Str { data: Rc<str>, core: bool },
    /// An array whose slots may be `Value::Nil`.
    Array(RefCell<Vec<Value>>),
    /// A bound method: an instance paired with the class method it
    /// closes over.
    Method {
        instance: ObjectRef,
        func: Rc<FunctionProto>,
    },
    /// A class instance with its own attribute table.
    Instance {
        class: Rc<ClassProto>,
        attrs: RefCell<HashMap<Rc<str>, Value>>,
    },
}

struct HeapObject {
    id: u64,
    mark: Cell<bool>,
    next: Cell<Option<NonNull<HeapObject>>>,
    kind: ObjectKind,
}

/// A non-owning handle to a heap-allocated object.
///
/// Copyable like any other tagged-pointer value; the `Heap` it came
/// from is the sole owner of the pointee.
#[derive(Clone, Copy)]
pub struct ObjectRef(NonNull<HeapObject>);

impl ObjectRef {
    fn obj(&self) -> &HeapObject {
        // SAFETY: the Heap that produced this ref owns the pointee and
        // only frees nodes during sweep/drop, never while a live Value
        // referencing them is reachable from a root.
        unsafe { self.0.as_ref() }
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.obj().kind
    }

    /// A stable, allocation-order id used for `print`'s `at ADDR`
    /// descriptor text, kept deterministic instead of a raw pointer
    /// value.
    pub fn id(&self) -> u64 {
        self.obj().id
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.0 == other.0
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// The VM-owned heap: an intrusive list of live objects plus the
/// mark-and-sweep cycle triggered by the `GBG` opcode.
pub struct Heap {
    head: Cell<Option<NonNull<HeapObject>>>,
    tail: Cell<Option<NonNull<HeapObject>>>,
    count: Cell<usize>,
    next_id: Cell<u64>,
}

impl Default for Heap {
    fn default() -> Self {
        Heap {
            head: Cell::new(None),
            tail: Cell::new(None),
            count: Cell::new(0),
            next_id: Cell::new(0),
        }
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn len(&self) -> usize {
        self.count.get()
    }

    pub fn is_empty(&self) -> bool {
        self.count.get() == 0
    }

    /// Allocate a new heap object, enrolling it at the tail of the
    /// object list.
    pub fn alloc(&self, kind: ObjectKind) -> ObjectRef {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let node = Box::new(HeapObject {
            id,
            mark: Cell::new(false),
            next: Cell::new(None),
            kind,
        });
        // SAFETY: Box::into_raw always yields a non-null, well-aligned
        // pointer that this Heap now owns exclusively.
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(node)) };

        match self.tail.get() {
            Some(tail) => {
                // SAFETY: `tail` is a live node owned by this heap.
                unsafe { tail.as_ref() }.next.set(Some(ptr));
            }
            None => self.head.set(Some(ptr)),
        }
        self.tail.set(Some(ptr));
        self.count.set(self.count.get() + 1);

        ObjectRef(ptr)
    }

    pub fn alloc_str(&self, data: Rc<str>, core: bool) -> ObjectRef {
        self.alloc(ObjectKind::Str { data, core })
    }

    pub fn alloc_array(&self, items: Vec<Value>) -> ObjectRef {
        self.alloc(ObjectKind::Array(RefCell::new(items)))
    }

    pub fn alloc_method(&self, instance: ObjectRef, func: Rc<FunctionProto>) -> ObjectRef {
        self.alloc(ObjectKind::Method { instance, func })
    }

    pub fn alloc_instance(&self, class: Rc<ClassProto>) -> ObjectRef {
        self.alloc(ObjectKind::Instance {
            class,
            attrs: RefCell::new(HashMap::new()),
        })
    }

    /// Mark phase: mark `value` and, for heap objects, transitively mark
    /// everything it references. Idempotent: an already-marked object
    /// is not walked again, which also breaks any cycle.
    pub fn mark_value(&self, value: &Value) {
        let obj_ref = match value {
            Value::Str(r) | Value::Array(r) | Value::Method(r) | Value::Instance(r) => r,
            _ => return,
        };
        self.mark_object(*obj_ref);
    }

    fn mark_object(&self, obj_ref: ObjectRef) {
        let obj = obj_ref.obj();
        if obj.mark.get() {
            return;
        }
        obj.mark.set(true);
        match &obj.kind {
            ObjectKind::Str { .. } => {}
            ObjectKind::Array(items) => {
                for item in items.borrow().iter() {
                    self.mark_value(item);
                }
            }
            ObjectKind::Method { instance, .. } => {
                self.mark_object(*instance);
            }
            ObjectKind::Instance { attrs, .. } => {
                for value in attrs.borrow().values() {
                    self.mark_value(value);
                }
            }
        }
    }

    /// Sweep phase: unlink and free every unmarked object, clearing the
    /// mark bit on every object that survives. Returns the number of
    /// objects freed.
    pub fn sweep(&self) -> usize {
        let mut freed = 0;
        let mut prev: Option<NonNull<HeapObject>> = None;
        let mut current = self.head.get();

        while let Some(node) = current {
            // SAFETY: every node walked here is still owned by this
            // heap and hasn't been freed.
            let obj = unsafe { node.as_ref() };
            let next = obj.next.get();

            if obj.mark.get() {
                obj.mark.set(false);
                prev = Some(node);
            } else {
                match prev {
                    Some(p) => unsafe { p.as_ref() }.next.set(next),
                    None => self.head.set(next),
                }
                if self.tail.get() == Some(node) {
                    self.tail.set(prev);
                }
                // SAFETY: this node was allocated with Box::into_raw and
                // has just been unlinked from the only list that
                // referenced it; no live ObjectRef can still observe it
                // because reaching sweep implies nothing marked it.
                unsafe {
                    drop(Box::from_raw(node.as_ptr()));
                }
                self.count.set(self.count.get() - 1);
                freed += 1;
            }
            current = next;
        }

        freed
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let mut current = self.head.get();
        while let Some(node) = current {
            // SAFETY: tearing down the heap; every remaining node is
            // still owned by it and nothing outlives this Drop.
            let next = unsafe { node.as_ref() }.next.get();
            unsafe {
                drop(Box::from_raw(node.as_ptr()));
            }
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_array_is_swept() {
        let heap = Heap::new();
        let _kept = heap.alloc_array(vec![Value::Int(1)]);
        let _dropped = heap.alloc_array(vec![Value::Int(2)]);
        assert_eq!(heap.len(), 2);

        heap.mark_value(&Value::Array(_kept));
        let freed = heap.sweep();

        assert_eq!(freed, 1);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn marking_array_marks_nested_object_items() {
        let heap = Heap::new();
        let inner = heap.alloc_str(Rc::from("hi"), true);
        let outer = heap.alloc_array(vec![Value::Str(inner)]);

        heap.mark_value(&Value::Array(outer));
        let freed = heap.sweep();

        assert_eq!(freed, 0);
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn sweep_clears_mark_bits_on_survivors() {
        let heap = Heap::new();
        let kept = heap.alloc_array(vec![]);
        heap.mark_value(&Value::Array(kept));
        heap.sweep();
        // A second cycle with nothing marked should now free it.
        let freed = heap.sweep();
        assert_eq!(freed, 1);
    }
}
