use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;

use crate::script_array::FScriptArray;

/// Typed view over an [`FScriptArray`] with the same memory layout.
#[repr(transparent)]
pub struct TArray<T> {
    array: FScriptArray,
    _type: PhantomData<T>,
}

const fn elem_size<T>() -> i32 {
    size_of::<T>() as i32
}

impl<T> TArray<T> {
    pub const fn new() -> Self {
        Self {
            array: FScriptArray::new(),
            _type: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.array.num() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        self.array.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.array.as_mut_slice()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn push(&mut self, value: T) {
        let index = self.array.add(1, elem_size::<T>());
        unsafe { self.array.get_data_mut().cast::<T>().add(index as usize).write(value) };
    }

    pub fn insert(&mut self, index: usize, value: T) {
        self.array.insert(index as i32, 1, elem_size::<T>());
        unsafe { self.array.get_data_mut().cast::<T>().add(index).write(value) };
    }

    pub fn remove(&mut self, index: usize) -> T {
        assert!(index < self.len());
        let value = unsafe { self.array.get_data().cast::<T>().add(index).read() };
        self.array.remove(index as i32, 1, elem_size::<T>());
        value
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        let mut i = 0;
        while i < self.len() {
            if keep(&self.as_slice()[i]) {
                i += 1;
            } else {
                drop(self.remove(i));
            }
        }
    }

    pub fn clear(&mut self) {
        unsafe { std::ptr::drop_in_place(self.as_mut_slice() as *mut [T]) };
        self.array.empty(0, elem_size::<T>());
    }

    pub fn as_script_array(&self) -> &FScriptArray {
        &self.array
    }
}

impl<T> Default for TArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TArray<T> {
    fn drop(&mut self) {
        unsafe { std::ptr::drop_in_place(self.as_mut_slice() as *mut [T]) };
    }
}

impl<T: Clone> Clone for TArray<T> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<T: PartialEq> PartialEq for TArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for TArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for TArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = TArray::new();
        for item in iter {
            array.push(item);
        }
        array
    }
}

impl<'a, T> IntoIterator for &'a TArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Null terminated UTF-16 string stored in a [`TArray`]. An empty string has no storage.
#[derive(Default, Clone, PartialEq)]
#[repr(transparent)]
pub struct FString(TArray<u16>);

impl FString {
    pub fn new() -> Self {
        Self(TArray::new())
    }

    pub fn from_utf16(chars: &[u16]) -> Self {
        let chars = match chars.iter().position(|c| *c == 0) {
            Some(end) => &chars[..end],
            None => chars,
        };
        if chars.is_empty() {
            return Self::new();
        }
        Self(chars.iter().copied().chain([0]).collect())
    }

    /// Characters without the terminator.
    pub fn as_utf16(&self) -> &[u16] {
        match self.0.as_slice() {
            [] => &[],
            [chars @ .., _] => chars,
        }
    }

    /// Characters including the terminator, empty when there is no storage.
    pub fn as_utf16_with_nul(&self) -> &[u16] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.as_utf16().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_utf16().is_empty()
    }

    pub fn is_ascii(&self) -> bool {
        self.as_utf16().iter().all(|c| *c < 0x80)
    }
}

impl From<&str> for FString {
    fn from(value: &str) -> Self {
        let chars: Vec<u16> = value.encode_utf16().collect();
        Self::from_utf16(&chars)
    }
}

impl From<String> for FString {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl fmt::Display for FString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = widestring::U16Str::from_slice(self.as_utf16()).to_string_lossy();
        write!(f, "{string}")
    }
}

impl fmt::Debug for FString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl PartialEq<str> for FString {
    fn eq(&self, other: &str) -> bool {
        self.as_utf16().iter().copied().eq(other.encode_utf16())
    }
}
