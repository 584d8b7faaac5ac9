// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// Multimap with keys iterated in ascending order and values kept in insertion order.
///
/// Routing tables built from it are reproducible across attempts, so every
/// bucket-keyed collection in this crate goes through this type.
#[derive(Clone, PartialEq, Eq)]
pub struct OrderedMultimap<K: Ord, V> {
    entries: BTreeMap<K, Vec<V>>,
}

impl<K: Ord, V> Default for OrderedMultimap<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> OrderedMultimap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: K, value: V) {
        self.entries.entry(key).or_default().push(value);
    }

    pub fn put_all(&mut self, key: K, values: impl IntoIterator<Item = V>) {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return;
        }
        self.entries.entry(key).or_default().extend(values);
    }

    /// Values stored under `key`, empty if the key is absent.
    pub fn get(&self, key: &K) -> &[V] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().flatten()
    }

    /// Iterates `(key, values)` pairs in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, K, Vec<V>> {
        self.entries.iter()
    }

    /// Number of distinct keys.
    pub fn key_len(&self) -> usize {
        self.entries.len()
    }

    /// Total number of values over all keys.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }
}

impl<K: Ord, V> IntoIterator for OrderedMultimap<K, V> {
    type Item = (K, Vec<V>);
    type IntoIter = btree_map::IntoIter<K, Vec<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a OrderedMultimap<K, V> {
    type Item = (&'a K, &'a Vec<V>);
    type IntoIter = btree_map::Iter<'a, K, Vec<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Ord + Debug, V: Debug> Debug for OrderedMultimap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::OrderedMultimap;

    #[test]
    fn keys_sorted_values_in_insertion_order() {
        let mut map = OrderedMultimap::new();
        map.put(3, "c");
        map.put(1, "b");
        map.put(1, "a");
        map.put_all(2, Vec::<&str>::new());

        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(map.get(&1), &["b", "a"]);
        assert!(map.get(&2).is_empty());
        assert!(!map.contains_key(&2));
        assert_eq!(map.len(), 3);
        assert_eq!(map.key_len(), 2);
    }
}
