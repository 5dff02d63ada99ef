// Handles - Creation-ordered handles for backend-owned objects
//
// A driver may own several surfaces and devices. The host refers to them by
// handle only; the handle is the creation index and is never reused.

use std::fmt;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const fn from_index(index: u32) -> Self {
                Self(index)
            }

            pub const fn index(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_handle!(
    /// Handle of a surface created by a driver.
    SurfaceHandle,
    "surface"
);
define_handle!(
    /// Handle of a logical device created by a driver.
    DeviceHandle,
    "device"
);

/// Slot storage keyed by creation index.
///
/// Removed slots stay empty so later handles keep their index. Dropping the
/// table drops live entries newest first.
pub struct HandleTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Stores `value` and returns its creation index.
    pub fn insert(&mut self, value: T) -> u32 {
        self.slots.push(Some(value));
        (self.slots.len() - 1) as u32
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, index: u32) -> Option<T> {
        self.slots.get_mut(index as usize).and_then(Option::take)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Live entries in creation order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i as u32, v)))
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Drops every live entry, newest first. Indices stay taken.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut().rev() {
            slot.take();
        }
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for HandleTable<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tracked(u32, Rc<RefCell<Vec<u32>>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn test_indices_follow_creation_order() {
        let mut table = HandleTable::new();
        assert_eq!(table.insert("a"), 0);
        assert_eq!(table.insert("b"), 1);
        assert_eq!(table.remove(0), Some("a"));
        assert_eq!(table.insert("c"), 2);
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(2), Some(&"c"));
        assert_eq!(table.live_count(), 2);
    }

    #[test]
    fn test_out_of_range_lookup_is_none() {
        let mut table: HandleTable<u8> = HandleTable::new();
        assert!(table.get(7).is_none());
        assert!(table.remove(7).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_drop_is_reverse_creation_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let mut table = HandleTable::new();
            for i in 0..3 {
                table.insert(Tracked(i, order.clone()));
            }
        }
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_clear_keeps_indices_taken() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut table = HandleTable::new();
        for i in 0..3 {
            table.insert(Tracked(i, order.clone()));
        }

        table.clear();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
        assert!(table.is_empty());
        assert!(table.get(0).is_none());
        assert_eq!(table.insert(Tracked(3, order.clone())), 3);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(SurfaceHandle::from_index(3).to_string(), "surface#3");
        assert_eq!(DeviceHandle::from_index(0).to_string(), "device#0");
    }
}
