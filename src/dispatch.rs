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

//! Turns grouped splits into data information events addressed to tasks.

use log::debug;

use crate::context::{DataInformationEvent, InputSpecUpdate, ProcessorEvent};
use crate::error::{Result, VertexError};
use crate::multimap::OrderedMultimap;
use crate::routing::{RoutingTable, RoutingTableBuilder};
use crate::serde::encode_split;
use crate::split::{GroupedSplit, SplitUnit};

/// Events for one root input together with the per task event counts the
/// runtime needs before it starts the tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvents {
    pub events: Vec<DataInformationEvent>,
    pub input_spec: InputSpecUpdate,
}

/// Hands out sequential source indices per destination task.
struct EventCollector {
    events: Vec<DataInformationEvent>,
    counts: Vec<u32>,
}

impl EventCollector {
    fn new(task_count: u32) -> Self {
        Self {
            events: vec![],
            counts: vec![0; task_count as usize],
        }
    }

    fn push(&mut self, target_index: u32, unit: &SplitUnit) -> Result<()> {
        let count = self.counts.get_mut(target_index as usize).ok_or_else(|| {
            VertexError::Internal(format!("Task {target_index} is not part of the vertex"))
        })?;
        self.events.push(DataInformationEvent {
            source_index: *count,
            target_index,
            payload: encode_split(unit),
        });
        *count += 1;
        Ok(())
    }

    fn finish(self) -> RoutedEvents {
        RoutedEvents {
            events: self.events,
            input_spec: InputSpecUpdate::per_task(self.counts),
        }
    }
}

/// Assigns one task per grouped split of the primary input, in bucket order,
/// recording each task in the routing table.
///
/// After a second grouping pass every group is a group of groups and each of
/// its members is sent to the task as a separate event.
pub fn dispatch_primary(
    buckets: &OrderedMultimap<u32, GroupedSplit>,
    routing: &mut RoutingTableBuilder,
    second_pass: bool,
) -> Result<RoutedEvents> {
    let mut assignments: Vec<(u32, &GroupedSplit)> = vec![];
    for (bucket_id, groups) in buckets {
        for group in groups {
            assignments.push((routing.add_task(*bucket_id)?, group));
        }
    }

    let mut collector = EventCollector::new(routing.task_count());
    for (task, group) in assignments {
        if second_pass {
            for member in group.members() {
                if !matches!(member, SplitUnit::Group(_)) {
                    return Err(VertexError::UnsupportedSplitType(format!(
                        "Expected a group of grouped splits for task {task}, found {member:?}"
                    )));
                }
                collector.push(task, member)?;
            }
        } else {
            collector.push(task, &SplitUnit::Group(group.clone()))?;
        }
    }
    Ok(collector.finish())
}

/// Sends every split of a secondary input to all tasks owning its bucket.
///
/// Buckets the primary had no data for have no tasks, their splits are dropped.
pub fn dispatch_side(
    input_name: &str,
    buckets: &OrderedMultimap<u32, GroupedSplit>,
    routing: &RoutingTable,
) -> Result<RoutedEvents> {
    let mut collector = EventCollector::new(routing.task_count());
    for (bucket_id, groups) in buckets {
        let tasks = routing.tasks_for_bucket(*bucket_id);
        if tasks.is_empty() {
            debug!(
                "Input {input_name}: no task owns bucket {bucket_id}, dropping {} splits",
                groups.len()
            );
            continue;
        }
        for task in tasks {
            for group in groups {
                collector.push(*task, &SplitUnit::Group(group.clone()))?;
            }
        }
    }
    Ok(collector.finish())
}

/// Tells every task which bucket it owns.
///
/// The payload is the big-endian bucket count followed by the big-endian
/// bucket id. Returns `(task index, event)` pairs in task order.
pub fn bucket_identity_events(routing: &RoutingTable) -> Vec<(u32, ProcessorEvent)> {
    let mut events: Vec<(u32, ProcessorEvent)> = routing
        .iter()
        .flat_map(|(bucket_id, tasks)| {
            tasks.iter().map(move |task| {
                let mut payload = Vec::with_capacity(8);
                payload.extend_from_slice(&routing.num_buckets().to_be_bytes());
                payload.extend_from_slice(&bucket_id.to_be_bytes());
                (*task, ProcessorEvent { payload })
            })
        })
        .collect();
    events.sort_by_key(|(task, _)| *task);
    events
}

/// Decodes a bucket identity payload into `(num_buckets, bucket_id)`.
pub fn decode_bucket_identity(payload: &[u8]) -> Result<(u32, u32)> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| {
        VertexError::Internal(format!(
            "Bucket identity payload must be 8 bytes, got {}",
            payload.len()
        ))
    })?;
    let num_buckets = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let bucket_id = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Ok((num_buckets, bucket_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serde::decode_split;
    use crate::test_utils::file_split;

    fn single(path: &str, bucket_id: u32) -> GroupedSplit {
        GroupedSplit::new(vec![file_split(path, 0, Some(bucket_id)).into()])
    }

    fn primary_buckets() -> OrderedMultimap<u32, GroupedSplit> {
        let mut buckets = OrderedMultimap::new();
        buckets.put(0, single("/big/0a", 0));
        buckets.put(0, single("/big/0b", 0));
        buckets.put(2, single("/big/2", 2));
        buckets
    }

    #[test]
    fn primary_one_event_per_task() -> Result<()> {
        let mut builder = RoutingTableBuilder::new(4);
        let routed = dispatch_primary(&primary_buckets(), &mut builder, false)?;
        let table = builder.finish();

        assert_eq!(table.task_count(), 3);
        assert_eq!(table.tasks_for_bucket(0), &[0, 1]);
        assert_eq!(table.tasks_for_bucket(2), &[2]);
        assert_eq!(routed.input_spec, InputSpecUpdate::per_task(vec![1, 1, 1]));
        let targets: Vec<_> = routed
            .events
            .iter()
            .map(|e| (e.target_index, e.source_index))
            .collect();
        assert_eq!(targets, vec![(0, 0), (1, 0), (2, 0)]);

        let SplitUnit::Group(group) = decode_split(&routed.events[2].payload)? else {
            panic!("expected a grouped split");
        };
        assert_eq!(group.members()[0].first_path(), Some("/big/2"));
        Ok(())
    }

    #[test]
    fn second_pass_members_sent_separately() -> Result<()> {
        let mut buckets = OrderedMultimap::new();
        buckets.put(
            1u32,
            GroupedSplit::new(vec![
                single("/big/1a", 1).into(),
                single("/big/1b", 1).into(),
            ]),
        );
        let mut builder = RoutingTableBuilder::new(2);
        let routed = dispatch_primary(&buckets, &mut builder, true)?;
        assert_eq!(routed.input_spec, InputSpecUpdate::per_task(vec![2]));
        let sources: Vec<_> = routed.events.iter().map(|e| e.source_index).collect();
        assert_eq!(sources, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn second_pass_rejects_file_members() {
        let mut buckets = OrderedMultimap::new();
        buckets.put(0u32, single("/big/0", 0));
        let mut builder = RoutingTableBuilder::new(1);
        assert!(matches!(
            dispatch_primary(&buckets, &mut builder, true),
            Err(VertexError::UnsupportedSplitType(_))
        ));
    }

    #[test]
    fn side_splits_duplicated_to_all_owners() -> Result<()> {
        let mut builder = RoutingTableBuilder::new(4);
        dispatch_primary(&primary_buckets(), &mut builder, false)?;
        let table = builder.finish();

        let mut side = OrderedMultimap::new();
        side.put(0u32, single("/small/0", 0));
        side.put(1u32, single("/small/1", 1));
        side.put(2u32, single("/small/2a", 2));
        side.put(2u32, single("/small/2b", 2));

        let routed = dispatch_side("small", &side, &table)?;
        // bucket 1 has no task on the primary side
        assert_eq!(routed.input_spec, InputSpecUpdate::per_task(vec![1, 1, 2]));
        let targets: Vec<_> = routed
            .events
            .iter()
            .map(|e| (e.target_index, e.source_index))
            .collect();
        assert_eq!(targets, vec![(0, 0), (1, 0), (2, 0), (2, 1)]);
        assert_eq!(routed.events[0].payload, routed.events[1].payload);
        Ok(())
    }

    #[test]
    fn identity_payload_is_big_endian() -> Result<()> {
        let mut builder = RoutingTableBuilder::new(6);
        builder.add_task(5)?;
        builder.add_task(1)?;
        let events = bucket_identity_events(&builder.finish());

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 0);
        assert_eq!(events[0].1.payload, vec![0, 0, 0, 6, 0, 0, 0, 5]);
        assert_eq!(decode_bucket_identity(&events[1].1.payload)?, (6, 1));
        assert!(decode_bucket_identity(&[0, 1]).is_err());
        Ok(())
    }
}
