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

use std::fmt::{Debug, Formatter};

/// A contiguous byte range of one bucket file produced by the table scan.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FileSplit {
    /// Path of the file the split reads from.
    pub path: String,
    /// Byte offset of the first byte of the split.
    pub start: u64,
    /// Number of bytes covered by the split.
    pub length: u64,
    /// Hosts holding a local replica of the data, most preferred first.
    pub hosts: Vec<String>,
    /// Bucket the file belongs to, `None` if the file carries no bucket metadata.
    pub bucket_id: Option<u32>,
}

impl FileSplit {
    pub fn new(path: impl Into<String>, start: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            start,
            length,
            hosts: vec![],
            bucket_id: None,
        }
    }

    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_bucket_id(mut self, bucket_id: u32) -> Self {
        self.bucket_id = Some(bucket_id);
        self
    }

    /// Byte key used to order and deduplicate splits of one bucket.
    ///
    /// Two splits with the same key are the same split, regardless of which
    /// replica hosts were reported for them.
    pub fn identity_bytes(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.path.len() + 17);
        key.extend_from_slice(self.path.as_bytes());
        key.push(0);
        key.extend_from_slice(&self.start.to_be_bytes());
        key.extend_from_slice(&self.length.to_be_bytes());
        key
    }
}

impl Debug for FileSplit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}+{}", self.path, self.start, self.length)?;
        if let Some(bucket_id) = self.bucket_id {
            write!(f, "@{bucket_id}")?;
        }
        Ok(())
    }
}

/// Unit of work handed to a task: either a single file split or a group of units.
///
/// A second grouping pass produces groups whose members are themselves groups,
/// and each member is later sent to the task as its own event.
#[derive(Clone, PartialEq, Eq)]
pub enum SplitUnit {
    File(FileSplit),
    Group(GroupedSplit),
}

impl SplitUnit {
    /// Total number of bytes covered by this unit.
    pub fn length(&self) -> u64 {
        match self {
            SplitUnit::File(split) => split.length,
            SplitUnit::Group(group) => group.length(),
        }
    }

    /// Preferred hosts of this unit.
    pub fn locations(&self) -> &[String] {
        match self {
            SplitUnit::File(split) => &split.hosts,
            SplitUnit::Group(group) => &group.locations,
        }
    }

    /// Path of the first file covered by this unit.
    pub fn first_path(&self) -> Option<&str> {
        match self {
            SplitUnit::File(split) => Some(split.path.as_str()),
            SplitUnit::Group(group) => {
                group.members.first().and_then(|member| member.first_path())
            }
        }
    }
}

impl Debug for SplitUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitUnit::File(split) => split.fmt(f),
            SplitUnit::Group(group) => group.fmt(f),
        }
    }
}

impl From<FileSplit> for SplitUnit {
    fn from(split: FileSplit) -> Self {
        SplitUnit::File(split)
    }
}

impl From<GroupedSplit> for SplitUnit {
    fn from(group: GroupedSplit) -> Self {
        SplitUnit::Group(group)
    }
}

/// Ordered set of split units merged into one task's work.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct GroupedSplit {
    members: Vec<SplitUnit>,
    locations: Vec<String>,
}

impl GroupedSplit {
    /// Creates a group, deriving its locations from its members in first-seen order.
    pub fn new(members: Vec<SplitUnit>) -> Self {
        let mut locations: Vec<String> = vec![];
        for host in members.iter().flat_map(|member| member.locations()) {
            if !locations.contains(host) {
                locations.push(host.clone());
            }
        }
        Self { members, locations }
    }

    /// Creates a group with explicitly chosen locations.
    pub fn with_locations(members: Vec<SplitUnit>, locations: Vec<String>) -> Self {
        Self { members, locations }
    }

    pub fn members(&self) -> &[SplitUnit] {
        &self.members
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn length(&self) -> u64 {
        self.members.iter().map(|member| member.length()).sum()
    }
}

impl Debug for GroupedSplit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.members.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_orders_by_path_then_offset() {
        let a = FileSplit::new("/t/000000_0", 0, 100);
        let b = FileSplit::new("/t/000000_0", 100, 100);
        let c = FileSplit::new("/t/000001_0", 0, 100);
        assert!(a.identity_bytes() < b.identity_bytes());
        assert!(b.identity_bytes() < c.identity_bytes());
        assert_eq!(
            a.identity_bytes(),
            a.clone()
                .with_hosts(vec!["h1".to_string()])
                .identity_bytes()
        );
    }

    #[test]
    fn group_collects_member_locations() {
        let group = GroupedSplit::new(vec![
            FileSplit::new("/t/a", 0, 10)
                .with_hosts(vec!["h1".to_string(), "h2".to_string()])
                .into(),
            FileSplit::new("/t/b", 0, 5)
                .with_hosts(vec!["h2".to_string(), "h3".to_string()])
                .into(),
        ]);
        assert_eq!(group.locations(), &["h1", "h2", "h3"]);
        assert_eq!(group.length(), 15);
        assert_eq!(group.len(), 2);
        assert_eq!(SplitUnit::from(group).first_path(), Some("/t/a"));
    }
}
