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

//! Merges the splits of one bucket into fewer, larger units of work.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::config::GroupingConfig;
use crate::context::TaskLocationHint;
use crate::error::{Result, VertexError};
use crate::location::{HostAffinityLocationProvider, SplitLocationProvider};
use crate::multimap::OrderedMultimap;
use crate::split::{FileSplit, GroupedSplit, SplitUnit};

/// Groups splits into units of work and derives their location hints.
pub trait SplitGrouper: Send + Sync {
    /// Groups the splits of a single bucket.
    ///
    /// The grouper aims for `available_slots * waves` groups. When
    /// `group_across_files` is false a group never contains ranges of two
    /// different files.
    fn generate_grouped_splits(
        &self,
        splits: &[FileSplit],
        waves: f32,
        available_slots: u32,
        input_name: &str,
        group_across_files: bool,
    ) -> Result<Vec<GroupedSplit>>;

    /// Second grouping pass: merges the already grouped splits of each bucket
    /// into groups of groups, sizing each bucket's share of the
    /// `available_slots * waves` tasks by its share of the bytes.
    fn group(
        &self,
        buckets: &OrderedMultimap<u32, GroupedSplit>,
        available_slots: u32,
        waves: f32,
    ) -> Result<OrderedMultimap<u32, GroupedSplit>>;

    /// One hint per group. With `consistent` only the primary host is kept so
    /// that a task is always placed on the same host.
    fn create_task_location_hints(
        &self,
        groups: &[GroupedSplit],
        consistent: bool,
    ) -> Vec<TaskLocationHint>;
}

/// Number of groups to aim for given the cluster capacity.
pub fn desired_groups(available_slots: u32, waves: f32) -> usize {
    ((available_slots as f64 * waves as f64).ceil() as usize).max(1)
}

/// Size based grouper that keeps splits sharing a preferred host together.
pub struct DefaultSplitGrouper {
    min_group_size: u64,
    max_group_size: u64,
    location_provider: Option<Arc<dyn SplitLocationProvider>>,
}

impl DefaultSplitGrouper {
    pub fn new(config: &GroupingConfig) -> Self {
        Self {
            min_group_size: config.min_group_size(),
            max_group_size: config.max_group_size(),
            location_provider: None,
        }
    }

    pub fn with_location_provider(
        mut self,
        location_provider: Arc<dyn SplitLocationProvider>,
    ) -> Self {
        self.location_provider = Some(location_provider);
        self
    }

    /// Places splits on `hosts` by consistent hashing instead of by replica.
    pub fn with_host_affinity(self, hosts: Vec<String>, config: &GroupingConfig) -> Self {
        let provider =
            HostAffinityLocationProvider::new(hosts, config.consistent_hash_replicas());
        self.with_location_provider(Arc::new(provider))
    }

    fn preferred_location(&self, split: &FileSplit) -> Option<String> {
        match &self.location_provider {
            Some(provider) => provider.location(split),
            None => split.hosts.first().cloned(),
        }
    }

    fn single_split_group(&self, split: &FileSplit) -> GroupedSplit {
        let location = self.preferred_location(split);
        self.build_group(vec![split.clone().into()], location)
    }

    /// Puts the preferred location first, followed by the members' own hosts.
    fn build_group(
        &self,
        members: Vec<SplitUnit>,
        preferred: Option<String>,
    ) -> GroupedSplit {
        let derived = GroupedSplit::new(members.clone());
        let mut locations: Vec<String> = preferred.into_iter().collect();
        for host in derived.locations() {
            if !locations.contains(host) {
                locations.push(host.clone());
            }
        }
        GroupedSplit::with_locations(members, locations)
    }

    fn target_group_size(&self, total_length: u64, desired: usize) -> u64 {
        total_length
            .div_ceil(desired as u64)
            .clamp(self.min_group_size, self.max_group_size)
            .max(1)
    }
}

impl SplitGrouper for DefaultSplitGrouper {
    fn generate_grouped_splits(
        &self,
        splits: &[FileSplit],
        waves: f32,
        available_slots: u32,
        input_name: &str,
        group_across_files: bool,
    ) -> Result<Vec<GroupedSplit>> {
        if splits.is_empty() {
            return Ok(vec![]);
        }
        let desired = desired_groups(available_slots, waves);
        if splits.len() <= desired {
            debug!(
                "Input {input_name}: {} splits do not exceed the {desired} desired groups, not grouping",
                splits.len()
            );
            return Ok(splits
                .iter()
                .map(|split| self.single_split_group(split))
                .collect());
        }

        let total_length: u64 = splits.iter().map(|split| split.length).sum();
        let target = self.target_group_size(total_length, desired);

        let mut by_location: BTreeMap<Option<String>, Vec<&FileSplit>> = BTreeMap::new();
        for split in splits {
            by_location
                .entry(self.preferred_location(split))
                .or_default()
                .push(split);
        }

        let mut groups = vec![];
        for (location, splits) in by_location {
            let mut current: Vec<SplitUnit> = vec![];
            let mut current_length = 0u64;
            let mut current_path: Option<&str> = None;
            for split in splits {
                let crosses_file = !group_across_files
                    && current_path.is_some_and(|path| path != split.path);
                if !current.is_empty()
                    && (current_length + split.length > target || crosses_file)
                {
                    groups.push(
                        self.build_group(std::mem::take(&mut current), location.clone()),
                    );
                    current_length = 0;
                }
                current_length += split.length;
                current_path = Some(split.path.as_str());
                current.push(split.clone().into());
            }
            if !current.is_empty() {
                groups.push(self.build_group(current, location.clone()));
            }
        }

        debug!(
            "Input {input_name}: grouped {} splits into {} groups of about {target} bytes",
            splits.len(),
            groups.len()
        );
        Ok(groups)
    }

    fn group(
        &self,
        buckets: &OrderedMultimap<u32, GroupedSplit>,
        available_slots: u32,
        waves: f32,
    ) -> Result<OrderedMultimap<u32, GroupedSplit>> {
        let total_length: u64 = buckets.values().map(GroupedSplit::length).sum();
        let total_tasks = available_slots as f64 * waves as f64;

        let mut regrouped = OrderedMultimap::new();
        for (bucket_id, groups) in buckets {
            if groups.iter().any(GroupedSplit::is_empty) {
                return Err(VertexError::Internal(format!(
                    "Empty split group found in bucket {bucket_id}"
                )));
            }
            let bucket_length: u64 = groups.iter().map(GroupedSplit::length).sum();
            let estimated = if total_length == 0 {
                1
            } else {
                ((bucket_length as f64 * total_tasks / total_length as f64).ceil()
                    as usize)
                    .max(1)
            };
            let num_groups = estimated.min(groups.len());

            // contiguous chunks whose sizes differ by at most one group
            let base = groups.len() / num_groups;
            let extra = groups.len() % num_groups;
            let mut offset = 0;
            for i in 0..num_groups {
                let len = base + usize::from(i < extra);
                let members: Vec<SplitUnit> = groups[offset..offset + len]
                    .iter()
                    .cloned()
                    .map(SplitUnit::Group)
                    .collect();
                offset += len;
                regrouped.put(*bucket_id, GroupedSplit::new(members));
            }
            debug!(
                "Bucket {bucket_id}: regrouped {} groups into {num_groups}",
                groups.len()
            );
        }
        Ok(regrouped)
    }

    fn create_task_location_hints(
        &self,
        groups: &[GroupedSplit],
        consistent: bool,
    ) -> Vec<TaskLocationHint> {
        groups
            .iter()
            .map(|group| {
                let hosts = if consistent {
                    group.locations().iter().take(1).cloned().collect()
                } else {
                    group.locations().to_vec()
                };
                TaskLocationHint { hosts }
            })
            .collect()
    }
}
