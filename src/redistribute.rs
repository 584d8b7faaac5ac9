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

//! Maps the buckets of a secondary input onto the primary's buckets when the
//! two tables were bucketed with different bucket counts.

use log::debug;

use crate::multimap::OrderedMultimap;

pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Redistributes the buckets of an input written with `input_bucket_count`
/// buckets into the primary's `num_buckets` buckets.
///
/// A row in secondary bucket `s` has a hash `h` with `h mod k == s`, so its
/// primary bucket `h mod n` can be any bucket congruent to `s` modulo
/// `gcd(n, k)`. Every primary bucket therefore receives all splits of the
/// secondary buckets in its remainder class. For 6 primary and 4 secondary
/// buckets, secondary bucket 1 lands in primary buckets 1, 3 and 5.
///
/// Equal bucket counts return the map unchanged.
pub fn redistribute<V: Clone>(
    buckets: OrderedMultimap<u32, V>,
    num_buckets: u32,
    input_bucket_count: u32,
) -> OrderedMultimap<u32, V> {
    if num_buckets == input_bucket_count {
        return buckets;
    }

    let gcd = gcd(num_buckets, input_bucket_count);
    debug!(
        "Redistributing {input_bucket_count} buckets into {num_buckets} buckets with gcd {gcd}"
    );

    let mut by_remainder = OrderedMultimap::new();
    for (bucket_id, values) in buckets {
        by_remainder.put_all(bucket_id % gcd, values);
    }

    let mut redistributed = OrderedMultimap::new();
    for bucket_id in 0..num_buckets {
        redistributed.put_all(bucket_id, by_remainder.get(&(bucket_id % gcd)).to_vec());
    }
    redistributed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_per_bucket(count: u32) -> OrderedMultimap<u32, u32> {
        let mut map = OrderedMultimap::new();
        for bucket in 0..count {
            map.put(bucket, bucket);
        }
        map
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(6, 4), 2);
        assert_eq!(gcd(4, 6), 2);
        assert_eq!(gcd(7, 3), 1);
        assert_eq!(gcd(8, 8), 8);
    }

    #[test]
    fn six_big_four_small() {
        let mut small = OrderedMultimap::new();
        small.put(1u32, "s1");
        let map = redistribute(small, 6, 4);
        let targets: Vec<u32> = map.keys().copied().collect();
        assert_eq!(targets, vec![1, 3, 5]);
        for bucket in [1, 3, 5] {
            assert_eq!(map.get(&bucket), &["s1"]);
        }
    }

    #[test]
    fn every_remainder_class_reaches_matching_buckets() {
        let map = redistribute(one_per_bucket(4), 6, 4);
        assert_eq!(map.get(&0), &[0, 2]);
        assert_eq!(map.get(&1), &[1, 3]);
        assert_eq!(map.get(&4), &[0, 2]);
        assert_eq!(map.get(&5), &[1, 3]);

        // coprime counts send everything everywhere
        let map = redistribute(one_per_bucket(3), 4, 3);
        for bucket in 0..4 {
            assert_eq!(map.get(&bucket), &[0, 1, 2]);
        }
    }

    #[test]
    fn equal_bucket_counts_are_identity() {
        let buckets = one_per_bucket(6);
        assert_eq!(redistribute(buckets.clone(), 6, 6), buckets);
    }

    #[test]
    fn small_table_with_more_buckets() {
        let map = redistribute(one_per_bucket(8), 4, 8);
        assert_eq!(map.key_len(), 4);
        assert_eq!(map.get(&1), &[1, 5]);
        assert_eq!(map.get(&3), &[3, 7]);
    }
}
