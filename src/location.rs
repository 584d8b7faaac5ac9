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

//! Host affinity for splits, so that retries and later queries reading the
//! same file ranges are placed on the same hosts.

use std::collections::{BTreeMap, HashSet};

use md5::{Digest, Md5};

use crate::split::FileSplit;

pub type HashFunction = fn(&[u8]) -> Vec<u8>;

/// Chooses the preferred host of a split.
pub trait SplitLocationProvider: Send + Sync {
    fn location(&self, split: &FileSplit) -> Option<String>;
}

/// Consistent hash ring of host names.
pub struct ConsistentHash {
    virtual_nodes: BTreeMap<Vec<u8>, String>,
    hosts: HashSet<String>,
    hash_func: HashFunction,
}

impl ConsistentHash {
    pub fn new(hosts: Vec<String>, num_replicas: usize) -> Self {
        Self::new_with_hash(hosts, num_replicas, md5_hash)
    }

    pub fn new_with_hash(
        hosts: Vec<String>,
        num_replicas: usize,
        hash_func: HashFunction,
    ) -> Self {
        let mut consistent_hash = Self {
            virtual_nodes: BTreeMap::new(),
            hosts: HashSet::new(),
            hash_func,
        };
        for host in hosts {
            consistent_hash.add(host, num_replicas);
        }
        consistent_hash
    }

    pub fn add(&mut self, host: String, num_replicas: usize) {
        for i in 0..num_replicas {
            let vnode_id = format!("{host}:{i}");
            let vnode_key = (self.hash_func)(vnode_id.as_bytes());
            self.virtual_nodes.insert(vnode_key, host.clone());
        }
        self.hosts.insert(host);
    }

    pub fn remove(&mut self, host: &str, num_replicas: usize) -> bool {
        if !self.hosts.remove(host) {
            return false;
        }
        for i in 0..num_replicas {
            let vnode_id = format!("{host}:{i}");
            let vnode_key = (self.hash_func)(vnode_id.as_bytes());
            self.virtual_nodes.remove(vnode_key.as_slice());
        }
        true
    }

    /// First host clockwise from the hash of `key`.
    pub fn get(&self, key: &[u8]) -> Option<&str> {
        let hashed_key = (self.hash_func)(key);
        self.virtual_nodes
            .range(hashed_key..)
            .chain(self.virtual_nodes.iter())
            .next()
            .map(|(_, host)| host.as_str())
    }
}

pub fn md5_hash(data: &[u8]) -> Vec<u8> {
    let mut digest = Md5::default();
    digest.update(data);
    digest.finalize().to_vec()
}

/// Places each split on a host by hashing its path and offset onto a ring of
/// the cluster's hosts, ignoring where the file's replicas live.
pub struct HostAffinityLocationProvider {
    ring: ConsistentHash,
}

impl HostAffinityLocationProvider {
    pub fn new(hosts: Vec<String>, num_replicas: usize) -> Self {
        Self {
            ring: ConsistentHash::new(hosts, num_replicas),
        }
    }
}

impl SplitLocationProvider for HostAffinityLocationProvider {
    fn location(&self, split: &FileSplit) -> Option<String> {
        let key = format!("{}:{}", split.path, split.start);
        self.ring.get(key.as_bytes()).map(str::to_string)
    }
}
