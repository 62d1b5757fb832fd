//! A `std::vec::Vec`, but 1-indexed instead of 0-indexed.

use std::ops::Index;
use std::ops::IndexMut;

/// Like a `std::vec::Vec`, but 1-indexed instead of 0-indexed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OneIndexedVec<T> {
    vec: Vec<T>,
}

impl<T> OneIndexedVec<T> {
    pub fn new() -> Self {
        OneIndexedVec { vec: vec![] }
    }

    /// Returns the element at the given index, or `None` if the index is 0 or out of bounds.
    pub fn get(&self, index: usize) -> Option<&T> {
        index.checked_sub(1).and_then(|i| self.vec.get(i))
    }

    /// Returns a mutable reference to the element at the given index, or `None` if the index is
    /// 0 or out of bounds.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        match index.checked_sub(1) {
            Some(i) => self.vec.get_mut(i),
            None => None,
        }
    }

    /// Appends an element and returns the (1-based) index it was stored at.
    pub fn push(&mut self, value: T) -> usize {
        self.vec.push(value);
        self.vec.len()
    }

    /// Returns the number of elements in the vector.
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    /// Returns true if the vector has a length of 0.
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Returns an iterator over the vector.
    pub fn iter(&self) -> ::std::slice::Iter<T> {
        self.vec.iter()
    }

    /// Returns an iterator that allows modifying each value.
    pub fn iter_mut(&mut self) -> ::std::slice::IterMut<T> {
        self.vec.iter_mut()
    }

    /// Maps every element, preserving indices.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> OneIndexedVec<U> {
        OneIndexedVec { vec: self.vec.iter().map(f).collect() }
    }
}

impl<T> Index<usize> for OneIndexedVec<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        if index == 0 {
            panic!("index is 0");
        }
        &self.vec[index - 1]
    }
}

impl<T> IndexMut<usize> for OneIndexedVec<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        if index == 0 {
            panic!("index is 0");
        }
        &mut self.vec[index - 1]
    }
}

impl<T> From<Vec<T>> for OneIndexedVec<T> {
    fn from(vec: Vec<T>) -> Self {
        OneIndexedVec { vec }
    }
}

impl<T> IntoIterator for OneIndexedVec<T> {
    type Item = T;
    type IntoIter = ::std::vec::IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        self.vec.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a OneIndexedVec<T> {
    type Item = &'a T;
    type IntoIter = ::std::slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.vec.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut OneIndexedVec<T> {
    type Item = &'a mut T;
    type IntoIter = ::std::slice::IterMut<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.vec.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::OneIndexedVec;

    #[test]
    fn indices_start_at_one() {
        let mut v = OneIndexedVec::from(vec!['a', 'b']);
        assert_eq!(v.get(0), None);
        assert_eq!(v.get(1), Some(&'a'));
        assert_eq!(v[2], 'b');
        assert_eq!(v.get(3), None);
        assert_eq!(v.push('c'), 3);
        assert_eq!(v[3], 'c');
    }

    #[test]
    #[should_panic]
    fn zero_index_panics() {
        let v = OneIndexedVec::from(vec![1]);
        let _ = v[0];
    }
}
