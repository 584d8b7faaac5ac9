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

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::context::{
    DataInformationEvent, DataMovementType, EdgeProperty, ProcessorEvent, ScheduledTask,
    VertexManagerContext, VertexParallelism,
};
use crate::error::Result;
use crate::event::{InputInitializerEvent, SplitPayload};
use crate::serde::encode_split;
use crate::split::FileSplit;

/// Memory of one task slot of a [`TestContext`], in megabytes.
pub const TASK_MEMORY_MB: u64 = 1024;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A 100 byte split of `path` starting at `start`.
pub fn file_split(path: &str, start: u64, bucket_id: Option<u32>) -> FileSplit {
    let split = FileSplit::new(path, start, 100);
    match bucket_id {
        Some(bucket_id) => split.with_bucket_id(bucket_id),
        None => split,
    }
}

/// One data event per split, alternating between decoded and serialized payloads.
pub fn data_events(splits: Vec<FileSplit>) -> Vec<InputInitializerEvent> {
    splits
        .into_iter()
        .enumerate()
        .map(|(i, split)| {
            let payload = if i % 2 == 0 {
                SplitPayload::Deserialized(split.into())
            } else {
                SplitPayload::Serialized(encode_split(&split.into()))
            };
            InputInitializerEvent::DataInformation {
                source_index: i as u32,
                payload,
            }
        })
        .collect()
}

/// One split per listed bucket, each in its own file under `path`.
pub fn bucket_splits(path: &str, buckets: &[u32]) -> Vec<FileSplit> {
    buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| file_split(&format!("{path}/{bucket:06}_{i}"), 0, Some(*bucket)))
        .collect()
}

/// Runtime stand-in that records everything the vertex manager publishes.
pub struct TestContext {
    available_slots: u64,
    edges: HashMap<String, EdgeProperty>,
    num_tasks: Mutex<u32>,
    pub root_input_events: Arc<Mutex<Vec<(String, Vec<DataInformationEvent>)>>>,
    pub parallelism: Arc<Mutex<Vec<VertexParallelism>>>,
    pub processor_events: Arc<Mutex<Vec<(u32, Vec<ProcessorEvent>)>>>,
    pub scheduled_tasks: Arc<Mutex<Vec<ScheduledTask>>>,
}

impl TestContext {
    /// A vertex fed by a custom partition edge from `small_map` and a
    /// broadcast edge from `dim_map`.
    pub fn new(available_slots: u64) -> Self {
        Self {
            available_slots,
            edges: HashMap::from([
                ("small_map".to_string(), EdgeProperty::custom_partition()),
                (
                    "dim_map".to_string(),
                    EdgeProperty::new(DataMovementType::Broadcast),
                ),
            ]),
            num_tasks: Mutex::new(0),
            root_input_events: Arc::default(),
            parallelism: Arc::default(),
            processor_events: Arc::default(),
            scheduled_tasks: Arc::default(),
        }
    }

    /// Events published for `input_name`, in publication order.
    pub fn events_for(&self, input_name: &str) -> Vec<DataInformationEvent> {
        self.root_input_events
            .lock()
            .iter()
            .filter(|(name, _)| name == input_name)
            .flat_map(|(_, events)| events.clone())
            .collect()
    }

    pub fn last_parallelism(&self) -> Option<VertexParallelism> {
        self.parallelism.lock().last().cloned()
    }

    pub fn parallelism_calls(&self) -> usize {
        self.parallelism.lock().len()
    }
}

impl VertexManagerContext for TestContext {
    fn vertex_name(&self) -> &str {
        "Map 1"
    }

    fn vertex_num_tasks(&self) -> u32 {
        *self.num_tasks.lock()
    }

    fn total_available_memory_mb(&self) -> u64 {
        self.available_slots * TASK_MEMORY_MB
    }

    fn task_memory_mb(&self) -> u64 {
        TASK_MEMORY_MB
    }

    fn input_vertex_edge_properties(&self) -> HashMap<String, EdgeProperty> {
        self.edges.clone()
    }

    fn schedule_tasks(&self, tasks: Vec<ScheduledTask>) -> Result<()> {
        self.scheduled_tasks.lock().extend(tasks);
        Ok(())
    }

    fn add_root_input_events(
        &self,
        input_name: &str,
        events: Vec<DataInformationEvent>,
    ) -> Result<()> {
        self.root_input_events
            .lock()
            .push((input_name.to_string(), events));
        Ok(())
    }

    fn set_vertex_parallelism(&self, parallelism: VertexParallelism) -> Result<()> {
        *self.num_tasks.lock() = parallelism.task_count;
        self.parallelism.lock().push(parallelism);
        Ok(())
    }

    fn send_event_to_processor(
        &self,
        events: Vec<ProcessorEvent>,
        task_index: u32,
    ) -> Result<()> {
        self.processor_events.lock().push((task_index, events));
        Ok(())
    }
}
