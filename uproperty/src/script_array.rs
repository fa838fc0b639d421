use std::{ptr, slice};

use crate::malloc::{self, DEFAULT_ALIGNMENT};

/// Untyped dynamic array as it is laid out inside property memory.
///
/// The element size is supplied by the caller on every operation. Elements are
/// never constructed or destroyed here, see `FScriptArrayHelper` for that.
#[derive(Debug)]
#[repr(C)]
pub struct FScriptArray {
    data: *mut u8,
    array_num: i32,
    array_max: i32,
}

impl FScriptArray {
    pub const fn new() -> Self {
        Self {
            data: ptr::null_mut(),
            array_num: 0,
            array_max: 0,
        }
    }

    pub fn get_data(&self) -> *const u8 {
        self.data
    }

    pub fn get_data_mut(&mut self) -> *mut u8 {
        self.data
    }

    pub fn is_valid_index(&self, index: i32) -> bool {
        index >= 0 && index < self.array_num
    }

    pub fn is_empty(&self) -> bool {
        self.array_num == 0
    }

    pub fn num(&self) -> i32 {
        debug_assert!(self.array_num >= 0);
        debug_assert!(self.array_max >= self.array_num);
        self.array_num
    }

    pub fn max(&self) -> i32 {
        self.array_max
    }

    pub fn get_slack(&self) -> i32 {
        self.array_max - self.array_num
    }

    pub fn get_allocated_size(&self, num_bytes_per_element: i32) -> usize {
        self.array_max as usize * num_bytes_per_element as usize
    }

    pub fn empty(&mut self, slack: i32, num_bytes_per_element: i32) {
        debug_assert!(slack >= 0);
        self.array_num = 0;
        if slack != self.array_max {
            self.resize_to(slack, num_bytes_per_element);
        }
    }

    /// Drops all elements, keeping the allocation if it can hold `new_size`.
    pub fn reset(&mut self, new_size: i32, num_bytes_per_element: i32) {
        if new_size <= self.array_max {
            self.array_num = 0;
        } else {
            self.empty(new_size, num_bytes_per_element);
        }
    }

    pub fn shrink(&mut self, num_bytes_per_element: i32) {
        if self.array_num != self.array_max {
            self.resize_to(self.array_num, num_bytes_per_element);
        }
    }

    pub fn insert(&mut self, index: i32, count: i32, num_bytes_per_element: i32) {
        assert!(count >= 0);
        assert!(index >= 0 && index <= self.array_num);

        let old_num = self.array_num;
        self.array_num += count;
        if self.array_num > self.array_max {
            self.resize_grow(num_bytes_per_element);
        }

        if count > 0 && index < old_num {
            let size = num_bytes_per_element as usize;
            unsafe {
                ptr::copy(
                    self.data.add(index as usize * size),
                    self.data.add((index + count) as usize * size),
                    (old_num - index) as usize * size,
                );
            }
        }
    }

    pub fn insert_zeroed(&mut self, index: i32, count: i32, num_bytes_per_element: i32) {
        self.insert(index, count, num_bytes_per_element);
        self.zero_range(index, count, num_bytes_per_element);
    }

    /// Appends `count` uninitialized elements, returning the index of the first.
    pub fn add(&mut self, count: i32, num_bytes_per_element: i32) -> i32 {
        assert!(count >= 0);
        let old_num = self.array_num;
        self.array_num += count;
        if self.array_num > self.array_max {
            self.resize_grow(num_bytes_per_element);
        }
        old_num
    }

    pub fn add_zeroed(&mut self, count: i32, num_bytes_per_element: i32) -> i32 {
        let index = self.add(count, num_bytes_per_element);
        self.zero_range(index, count, num_bytes_per_element);
        index
    }

    pub fn remove(&mut self, index: i32, count: i32, num_bytes_per_element: i32) {
        if count <= 0 {
            return;
        }
        assert!(index >= 0 && index + count <= self.array_num);

        let num_to_move = self.array_num - index - count;
        if num_to_move > 0 {
            let size = num_bytes_per_element as usize;
            unsafe {
                ptr::copy(
                    self.data.add((index + count) as usize * size),
                    self.data.add(index as usize * size),
                    num_to_move as usize * size,
                );
            }
        }
        self.array_num -= count;
    }

    pub fn set_num_uninitialized(&mut self, new_num: i32, num_bytes_per_element: i32) {
        assert!(new_num >= 0);
        let old_num = self.num();
        if new_num > old_num {
            self.add(new_num - old_num, num_bytes_per_element);
        } else if new_num < old_num {
            self.remove(new_num, old_num - new_num, num_bytes_per_element);
        }
    }

    pub fn swap_memory(&mut self, a: i32, b: i32, num_bytes_per_element: i32) {
        assert!(self.is_valid_index(a) && self.is_valid_index(b));
        if a != b {
            let size = num_bytes_per_element as usize;
            unsafe {
                ptr::swap_nonoverlapping(
                    self.data.add(a as usize * size),
                    self.data.add(b as usize * size),
                    size,
                );
            }
        }
    }

    /// Moves the contents of `other` into `self`, leaving `other` empty.
    /// Elements already in `self` must have been destroyed by the caller.
    pub fn move_assign(&mut self, other: &mut FScriptArray) {
        if ptr::eq(self, other) {
            return;
        }
        unsafe { malloc::free(self.data) };
        self.data = std::mem::replace(&mut other.data, ptr::null_mut());
        self.array_num = std::mem::take(&mut other.array_num);
        self.array_max = std::mem::take(&mut other.array_max);
    }

    pub fn as_slice<T>(&self) -> &[T] {
        if self.array_num == 0 || self.data.is_null() {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.data.cast(), self.array_num as usize) }
        }
    }

    pub fn as_mut_slice<T>(&mut self) -> &mut [T] {
        if self.array_num == 0 || self.data.is_null() {
            &mut []
        } else {
            unsafe { slice::from_raw_parts_mut(self.data.cast(), self.array_num as usize) }
        }
    }

    /// Asserts `addr` does not point into this array's storage.
    pub fn check_address(&self, addr: *const u8, num_bytes_per_element: i32) {
        let start = self.data as usize;
        let end = start + self.get_allocated_size(num_bytes_per_element);
        let addr = addr as usize;
        assert!(
            addr < start || addr >= end,
            "Attempting to use a container element which already comes from the container being modified"
        );
    }

    fn zero_range(&mut self, index: i32, count: i32, num_bytes_per_element: i32) {
        if count > 0 {
            let size = num_bytes_per_element as usize;
            unsafe {
                ptr::write_bytes(self.data.add(index as usize * size), 0, count as usize * size);
            }
        }
    }

    fn resize_grow(&mut self, num_bytes_per_element: i32) {
        self.array_max = if self.array_max == 0 {
            (self.array_num.max(4) as u32).next_power_of_two() as i32
        } else {
            (self.array_max * 2).max(self.array_num)
        };
        self.reallocate(num_bytes_per_element);
    }

    fn resize_to(&mut self, new_max: i32, num_bytes_per_element: i32) {
        let new_max = if new_max > 0 {
            (new_max as u32).next_power_of_two() as i32
        } else {
            0
        };
        if new_max != self.array_max {
            self.array_max = new_max;
            self.reallocate(num_bytes_per_element);
        }
    }

    fn reallocate(&mut self, num_bytes_per_element: i32) {
        let bytes = self.array_max as usize * num_bytes_per_element as usize;
        self.data = unsafe { malloc::realloc(self.data, bytes, DEFAULT_ALIGNMENT) };
    }
}

impl Default for FScriptArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FScriptArray {
    fn drop(&mut self) {
        self.array_num = 0;
        self.array_max = 0;
        unsafe { malloc::free(std::mem::replace(&mut self.data, ptr::null_mut())) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INT: i32 = std::mem::size_of::<i32>() as i32;

    fn filled(values: &[i32]) -> FScriptArray {
        let mut array = FScriptArray::new();
        let index = array.add(values.len() as i32, INT);
        array.as_mut_slice::<i32>()[index as usize..].copy_from_slice(values);
        array
    }

    #[test]
    fn test_growth_policy() {
        let mut array = FScriptArray::new();
        assert!(array.get_data().is_null());
        assert_eq!(array.get_allocated_size(INT), 0);

        array.add(1, INT);
        assert_eq!(array.max(), 4);
        array.add(4, INT);
        assert_eq!(array.max(), 8);
        array.add(20, INT);
        assert_eq!(array.num(), 25);
        assert_eq!(array.max(), 25);

        let mut big = FScriptArray::new();
        big.add(5, INT);
        assert_eq!(big.max(), 8);
    }

    #[test]
    fn test_zeroed_insert_in_middle() {
        let mut array = filled(&[7, 8, 9]);
        array.insert_zeroed(1, 2, INT);
        assert_eq!(array.as_slice::<i32>(), &[7, 0, 0, 8, 9]);
        array.insert(5, 1, INT);
        array.as_mut_slice::<i32>()[5] = 10;
        assert_eq!(array.as_slice::<i32>(), &[7, 0, 0, 8, 9, 10]);
        array.remove(0, 3, INT);
        assert_eq!(array.as_slice::<i32>(), &[8, 9, 10]);
        array.remove(1, 0, INT);
        assert_eq!(array.num(), 3);
    }

    #[test]
    fn test_slack_and_shrink() {
        let mut array = filled(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(array.get_slack(), 2);
        array.set_num_uninitialized(2, INT);
        array.shrink(INT);
        assert_eq!(array.max(), 2);
        assert_eq!(array.as_slice::<i32>(), &[1, 2]);

        array.reset(1, INT);
        assert!(array.is_empty());
        assert_eq!(array.max(), 2);

        array.empty(0, INT);
        assert!(array.get_data().is_null());
    }

    #[test]
    fn test_swap_and_move() {
        let mut array = filled(&[1, 2, 3]);
        array.swap_memory(0, 2, INT);
        assert_eq!(array.as_slice::<i32>(), &[3, 2, 1]);

        let mut other = FScriptArray::new();
        other.move_assign(&mut array);
        assert!(array.is_empty());
        assert!(array.get_data().is_null());
        assert_eq!(other.as_slice::<i32>(), &[3, 2, 1]);
        assert!(other.is_valid_index(2));
        assert!(!other.is_valid_index(3));
    }

    #[test]
    #[should_panic]
    fn test_check_address_rejects_own_storage() {
        let array = filled(&[1, 2]);
        array.check_address(array.get_data(), INT);
    }
}
