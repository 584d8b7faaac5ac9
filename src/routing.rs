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

use prost::Message;

use crate::context::{EdgeManagerDescriptor, CUSTOM_PARTITION_EDGE};
use crate::error::{Result, VertexError};
use crate::multimap::OrderedMultimap;
use crate::serde::protobuf;

/// Appends tasks to buckets while the primary input is processed.
///
/// Task indices are handed out monotonically, so the index of a task is the
/// position of its grouped split in bucket order.
#[derive(Debug)]
pub struct RoutingTableBuilder {
    num_buckets: u32,
    bucket_to_tasks: OrderedMultimap<u32, u32>,
    next_task: u32,
}

impl RoutingTableBuilder {
    pub fn new(num_buckets: u32) -> Self {
        Self {
            num_buckets,
            bucket_to_tasks: OrderedMultimap::new(),
            next_task: 0,
        }
    }

    /// Creates a new task for `bucket_id` and returns its index.
    pub fn add_task(&mut self, bucket_id: u32) -> Result<u32> {
        if bucket_id >= self.num_buckets {
            return Err(VertexError::Internal(format!(
                "Cannot route a task to bucket {bucket_id}, only {} buckets exist",
                self.num_buckets
            )));
        }
        let task = self.next_task;
        self.bucket_to_tasks.put(bucket_id, task);
        self.next_task += 1;
        Ok(task)
    }

    pub fn task_count(&self) -> u32 {
        self.next_task
    }

    pub fn finish(self) -> RoutingTable {
        RoutingTable {
            num_buckets: self.num_buckets,
            bucket_to_tasks: self.bucket_to_tasks,
            task_count: self.next_task,
        }
    }
}

/// Frozen mapping from primary bucket to the tasks that own it.
///
/// Every task in `0..task_count` belongs to exactly one bucket. A bucket may own
/// several tasks, or none if the primary input had no data for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    num_buckets: u32,
    bucket_to_tasks: OrderedMultimap<u32, u32>,
    task_count: u32,
}

impl RoutingTable {
    pub fn num_buckets(&self) -> u32 {
        self.num_buckets
    }

    pub fn task_count(&self) -> u32 {
        self.task_count
    }

    /// Tasks that own `bucket_id`, in ascending order.
    pub fn tasks_for_bucket(&self, bucket_id: u32) -> &[u32] {
        self.bucket_to_tasks.get(&bucket_id)
    }

    pub fn bucket_for_task(&self, task: u32) -> Option<u32> {
        self.bucket_to_tasks
            .iter()
            .find(|(_, tasks)| tasks.contains(&task))
            .map(|(bucket_id, _)| *bucket_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u32])> {
        self.bucket_to_tasks
            .iter()
            .map(|(bucket_id, tasks)| (*bucket_id, tasks.as_slice()))
    }

    /// Descriptor that swaps the routing table into every custom partition edge.
    pub fn edge_manager_descriptor(&self) -> EdgeManagerDescriptor {
        let proto: protobuf::RoutingTableProto = self.into();
        EdgeManagerDescriptor {
            name: CUSTOM_PARTITION_EDGE.to_string(),
            payload: proto.encode_to_vec(),
        }
    }

    /// Decodes an edge payload and checks that it describes a complete table.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let proto = protobuf::RoutingTableProto::decode(payload)?;
        // a complete table numbers its tasks densely from 0
        let task_count: usize = proto.buckets.iter().map(|b| b.task_ids.len()).sum();
        let mut owners: Vec<Option<u32>> = vec![None; task_count];
        let mut bucket_to_tasks = OrderedMultimap::new();
        for entry in proto.buckets {
            if entry.bucket_id >= proto.num_buckets {
                return Err(VertexError::BucketRangeViolation {
                    input_name: CUSTOM_PARTITION_EDGE.to_string(),
                    bucket_id: entry.bucket_id,
                    num_buckets: proto.num_buckets,
                });
            }
            for task in entry.task_ids {
                let Some(slot) = owners.get_mut(task as usize) else {
                    return Err(VertexError::Internal(format!(
                        "Task {task} is out of range for a table of {task_count} tasks"
                    )));
                };
                if let Some(owner) = *slot {
                    return Err(VertexError::Internal(format!(
                        "Task {task} is routed from both bucket {owner} and bucket {}",
                        entry.bucket_id
                    )));
                }
                *slot = Some(entry.bucket_id);
                bucket_to_tasks.put(entry.bucket_id, task);
            }
        }
        if let Some(task) = owners.iter().position(Option::is_none) {
            return Err(VertexError::Internal(format!(
                "Task {task} is not owned by any bucket"
            )));
        }
        Ok(Self {
            num_buckets: proto.num_buckets,
            bucket_to_tasks,
            task_count: task_count as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(buckets: &[u32]) -> Result<RoutingTable> {
        let mut builder = RoutingTableBuilder::new(4);
        for bucket in buckets {
            builder.add_task(*bucket)?;
        }
        Ok(builder.finish())
    }

    #[test]
    fn tasks_assigned_in_order() -> Result<()> {
        let table = table(&[0, 0, 2, 3])?;
        assert_eq!(table.task_count(), 4);
        assert_eq!(table.tasks_for_bucket(0), &[0, 1]);
        assert!(table.tasks_for_bucket(1).is_empty());
        assert_eq!(table.tasks_for_bucket(2), &[2]);
        assert_eq!(table.bucket_for_task(3), Some(3));
        assert_eq!(table.bucket_for_task(4), None);
        Ok(())
    }

    #[test]
    fn every_task_has_one_bucket() -> Result<()> {
        let table = table(&[1, 1, 1, 0, 3])?;
        for task in 0..table.task_count() {
            let owners = table
                .iter()
                .filter(|(_, tasks)| tasks.contains(&task))
                .count();
            assert_eq!(owners, 1, "task {task}");
        }
        Ok(())
    }

    #[test]
    fn out_of_range_bucket_rejected() {
        let mut builder = RoutingTableBuilder::new(2);
        assert!(builder.add_task(2).is_err());
        assert_eq!(builder.task_count(), 0);
    }

    #[test]
    fn descriptor_payload_decodes_to_same_table() -> Result<()> {
        let table = table(&[0, 2, 2])?;
        let descriptor = table.edge_manager_descriptor();
        assert_eq!(descriptor.name, CUSTOM_PARTITION_EDGE);
        assert_eq!(RoutingTable::from_payload(&descriptor.payload)?, table);
        Ok(())
    }

    #[test]
    fn payload_with_gap_rejected() {
        let proto = protobuf::RoutingTableProto {
            num_buckets: 2,
            buckets: vec![protobuf::BucketTasks {
                bucket_id: 0,
                task_ids: vec![0, 2],
            }],
        };
        assert!(RoutingTable::from_payload(&proto.encode_to_vec()).is_err());
    }

    #[test]
    fn payload_with_huge_task_id_rejected() {
        let proto = protobuf::RoutingTableProto {
            num_buckets: 2,
            buckets: vec![protobuf::BucketTasks {
                bucket_id: 1,
                task_ids: vec![0, u32::MAX],
            }],
        };
        assert!(matches!(
            RoutingTable::from_payload(&proto.encode_to_vec()),
            Err(VertexError::Internal(_))
        ));
    }
}
