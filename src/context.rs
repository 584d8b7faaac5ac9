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

//! Interface between the vertex manager and the DAG runtime hosting it.

use std::collections::HashMap;

use crate::error::Result;

/// Name of the edge manager that routes records by the bucket routing table.
pub const CUSTOM_PARTITION_EDGE: &str = "bucket_join.CustomPartitionEdge";

/// How records move along an edge into this vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMovementType {
    OneToOne,
    Broadcast,
    ScatterGather,
    /// Routing is decided by a pluggable edge manager.
    Custom,
}

/// Named edge manager plus its opaque configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeManagerDescriptor {
    pub name: String,
    pub payload: Vec<u8>,
}

/// Properties of an edge from an upstream vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeProperty {
    pub data_movement_type: DataMovementType,
    pub edge_manager: Option<EdgeManagerDescriptor>,
}

impl EdgeProperty {
    pub fn new(data_movement_type: DataMovementType) -> Self {
        Self {
            data_movement_type,
            edge_manager: None,
        }
    }

    /// A custom edge waiting for the bucket routing table.
    pub fn custom_partition() -> Self {
        Self {
            data_movement_type: DataMovementType::Custom,
            edge_manager: Some(EdgeManagerDescriptor {
                name: CUSTOM_PARTITION_EDGE.to_string(),
                payload: vec![],
            }),
        }
    }

    /// True if the routing table must be installed on this edge.
    pub fn routes_by_bucket(&self) -> bool {
        self.data_movement_type == DataMovementType::Custom
            && self
                .edge_manager
                .as_ref()
                .is_some_and(|em| em.name == CUSTOM_PARTITION_EDGE)
    }
}

/// Hosts a task would preferably run on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskLocationHint {
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub task_index: u32,
    pub location_hint: Option<TaskLocationHint>,
}

/// Number of data information events each task of the vertex should expect
/// from one root input before it starts, indexed by task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpecUpdate {
    pub num_events_per_task: Vec<u32>,
}

impl InputSpecUpdate {
    pub fn per_task(num_events_per_task: Vec<u32>) -> Self {
        Self {
            num_events_per_task,
        }
    }
}

/// Assigns one serialized split to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInformationEvent {
    /// Sequential index of the event among those sent to the same task.
    pub source_index: u32,
    pub target_index: u32,
    pub payload: Vec<u8>,
}

/// Opaque payload delivered to the processor of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorEvent {
    pub payload: Vec<u8>,
}

/// Final shape of the vertex, handed to the runtime once.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexParallelism {
    pub task_count: u32,
    pub location_hints: Vec<TaskLocationHint>,
    /// Edge managers to install, keyed by source vertex name.
    pub edge_managers: HashMap<String, Option<EdgeManagerDescriptor>>,
    pub input_specs: HashMap<String, InputSpecUpdate>,
}

/// Runtime services available to the vertex manager.
///
/// All calls are synchronous; the runtime delivers one notification at a
/// time to a given vertex manager.
pub trait VertexManagerContext: Send + Sync {
    fn vertex_name(&self) -> &str;

    /// Current number of tasks of the vertex.
    fn vertex_num_tasks(&self) -> u32;

    /// Memory available to the whole vertex, in megabytes.
    fn total_available_memory_mb(&self) -> u64;

    /// Memory requested by one task, in megabytes.
    fn task_memory_mb(&self) -> u64;

    /// Edge properties keyed by source vertex name.
    fn input_vertex_edge_properties(&self) -> HashMap<String, EdgeProperty>;

    fn schedule_tasks(&self, tasks: Vec<ScheduledTask>) -> Result<()>;

    fn add_root_input_events(
        &self,
        input_name: &str,
        events: Vec<DataInformationEvent>,
    ) -> Result<()>;

    fn set_vertex_parallelism(&self, parallelism: VertexParallelism) -> Result<()>;

    fn send_event_to_processor(
        &self,
        events: Vec<ProcessorEvent>,
        task_index: u32,
    ) -> Result<()>;
}
