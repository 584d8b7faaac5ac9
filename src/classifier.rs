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

//! Groups the splits of one root input by bucket.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::config::VertexConfig;
use crate::error::{Result, VertexError};
use crate::multimap::OrderedMultimap;
use crate::split::FileSplit;

/// Splits of one input keyed by bucket id.
pub type BucketSplitMap = OrderedMultimap<u32, FileSplit>;

/// Number of buckets the data of `input_name` was written with.
///
/// The primary input uses the vertex's bucket count. A secondary input must
/// belong to a sort-merge join and have its own entry in the bucket count map.
pub fn input_bucket_count(config: &VertexConfig, input_name: &str) -> Result<u32> {
    if config.is_main_input(input_name) {
        return Ok(config.num_buckets);
    }
    if !config.is_smb_join() {
        return Err(VertexError::MissingBucketMapping(input_name.to_string()));
    }
    config
        .input_bucket_counts
        .get(input_name)
        .copied()
        .ok_or_else(|| VertexError::MissingBucketMapping(input_name.to_string()))
}

/// Collects the splits of one root input and assigns each to a bucket.
#[derive(Debug)]
pub struct SplitClassifier {
    input_name: String,
    input_bucket_count: u32,
    /// Distinct splits in arrival order.
    arrival_order: Vec<FileSplit>,
    seen: HashSet<Vec<u8>>,
    /// Splits with explicit bucket ids, keyed by raw bucket id then identity.
    by_bucket: BTreeMap<u32, BTreeMap<Vec<u8>, FileSplit>>,
    missing_bucket_id: bool,
}

impl SplitClassifier {
    pub fn try_new(config: &VertexConfig, input_name: &str) -> Result<Self> {
        Ok(Self {
            input_name: input_name.to_string(),
            input_bucket_count: input_bucket_count(config, input_name)?,
            arrival_order: vec![],
            seen: HashSet::new(),
            by_bucket: BTreeMap::new(),
            missing_bucket_id: false,
        })
    }

    pub fn input_bucket_count(&self) -> u32 {
        self.input_bucket_count
    }

    /// Adds a split. A split already seen under the same identity is ignored.
    pub fn add(&mut self, split: FileSplit) {
        let identity = split.identity_bytes();
        if !self.seen.insert(identity.clone()) {
            debug!(
                "Ignoring duplicate split {split:?} of input {}",
                self.input_name
            );
            return;
        }
        match split.bucket_id {
            Some(bucket_id) => {
                self.by_bucket
                    .entry(bucket_id)
                    .or_default()
                    .insert(identity, split.clone());
            }
            None => self.missing_bucket_id = true,
        }
        self.arrival_order.push(split);
    }

    /// Produces the bucket to splits map in the input's own bucket space.
    pub fn classify(self) -> BucketSplitMap {
        if self.missing_bucket_id {
            info!(
                "Input {} has splits without bucket ids, falling back to assigning buckets by split order",
                self.input_name
            );
            classify_by_arrival_order(self.arrival_order, self.input_bucket_count)
        } else {
            classify_by_bucket_id(self.by_bucket, self.input_bucket_count)
        }
    }
}

/// Reduces explicit bucket ids modulo the input's bucket count. Within a bucket
/// splits are ordered by identity bytes, so retries produce the same groups.
fn classify_by_bucket_id(
    by_bucket: BTreeMap<u32, BTreeMap<Vec<u8>, FileSplit>>,
    input_bucket_count: u32,
) -> BucketSplitMap {
    let mut buckets = BucketSplitMap::new();
    for (bucket_id, splits) in by_bucket {
        buckets.put_all(bucket_id % input_bucket_count, splits.into_values());
    }
    buckets
}

/// Legacy assignment for data written without bucket metadata.
///
/// Relies on the initializer emitting splits sorted by file name, so that the
/// n-th file is bucket `n mod bucket_count`. Explicit bucket ids seen on other
/// splits of the input are ignored.
fn classify_by_arrival_order(
    splits: Vec<FileSplit>,
    input_bucket_count: u32,
) -> BucketSplitMap {
    let mut buckets = BucketSplitMap::new();
    for (idx, split) in splits.into_iter().enumerate() {
        buckets.put((idx as u64 % input_bucket_count as u64) as u32, split);
    }
    buckets
}

/// Fails if any bucket of `buckets` lies outside the primary bucket range.
pub fn ensure_bucket_range<V>(
    input_name: &str,
    num_buckets: u32,
    buckets: &OrderedMultimap<u32, V>,
) -> Result<()> {
    match buckets.keys().find(|bucket_id| **bucket_id >= num_buckets) {
        Some(bucket_id) => Err(VertexError::BucketRangeViolation {
            input_name: input_name.to_string(),
            bucket_id: *bucket_id,
            num_buckets,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::file_split;

    fn classify(
        config: &VertexConfig,
        input: &str,
        splits: Vec<FileSplit>,
    ) -> Result<BucketSplitMap> {
        let mut classifier = SplitClassifier::try_new(config, input)?;
        for split in splits {
            classifier.add(split);
        }
        Ok(classifier.classify())
    }

    #[test]
    fn explicit_bucket_ids_keep_every_split_once() -> Result<()> {
        let config = VertexConfig::new(4, "");
        let splits = vec![
            file_split("/t/000002_0", 0, Some(2)),
            file_split("/t/000000_0", 100, Some(0)),
            file_split("/t/000000_0", 0, Some(0)),
            file_split("/t/000000_0", 0, Some(0)),
            file_split("/t/000003_0", 0, Some(3)),
        ];
        let buckets = classify(&config, "big", splits.clone())?;

        assert!(buckets.keys().all(|b| *b < 4));
        assert_eq!(buckets.len(), 4);
        let mut expected: Vec<_> = splits.iter().map(|s| s.identity_bytes()).collect();
        expected.sort();
        expected.dedup();
        let mut actual: Vec<_> = buckets.values().map(|s| s.identity_bytes()).collect();
        actual.sort();
        assert_eq!(expected, actual);
        Ok(())
    }

    #[test]
    fn splits_ordered_by_identity_within_bucket() -> Result<()> {
        let config = VertexConfig::new(2, "");
        let buckets = classify(
            &config,
            "big",
            vec![
                file_split("/t/b", 0, Some(1)),
                file_split("/t/a", 10, Some(1)),
                file_split("/t/a", 0, Some(1)),
            ],
        )?;
        let paths: Vec<_> = buckets
            .get(&1)
            .iter()
            .map(|s| (s.path.as_str(), s.start))
            .collect();
        assert_eq!(paths, vec![("/t/a", 0), ("/t/a", 10), ("/t/b", 0)]);
        Ok(())
    }

    #[test]
    fn bucket_ids_reduced_modulo_input_bucket_count() -> Result<()> {
        let config = VertexConfig::new(4, "");
        let buckets = classify(&config, "big", vec![file_split("/t/x", 0, Some(6))])?;
        assert_eq!(buckets.keys().copied().collect::<Vec<_>>(), vec![2]);
        Ok(())
    }

    #[test]
    fn missing_bucket_id_uses_arrival_order() -> Result<()> {
        let config = VertexConfig::new(2, "");
        let buckets = classify(
            &config,
            "big",
            vec![
                file_split("/t/c", 0, Some(1)),
                file_split("/t/a", 0, None),
                file_split("/t/b", 0, Some(1)),
            ],
        )?;
        let paths = |b: u32| {
            buckets
                .get(&b)
                .iter()
                .map(|s| s.path.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(paths(0), vec!["/t/c", "/t/b"]);
        assert_eq!(paths(1), vec!["/t/a"]);
        Ok(())
    }

    #[test]
    fn secondary_input_needs_bucket_count() {
        let config = VertexConfig::new(6, "big").with_num_inputs(2);
        assert!(matches!(
            SplitClassifier::try_new(&config, "small"),
            Err(VertexError::MissingBucketMapping(_))
        ));

        // a bucket map join has no secondary bucketed inputs at all
        let config = VertexConfig::new(6, "big").with_input_bucket_count("small", 4);
        assert!(matches!(
            SplitClassifier::try_new(&config, "small"),
            Err(VertexError::MissingBucketMapping(_))
        ));
    }

    #[test]
    fn out_of_range_bucket_detected() {
        let mut buckets = OrderedMultimap::new();
        buckets.put(5u32, ());
        assert!(matches!(
            ensure_bucket_range("small", 4, &buckets),
            Err(VertexError::BucketRangeViolation { bucket_id: 5, .. })
        ));
        assert!(ensure_bucket_range("small", 6, &buckets).is_ok());
    }
}
