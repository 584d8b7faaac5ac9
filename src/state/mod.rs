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

//! Coordinates the root inputs of a bucketed join vertex until its
//! parallelism can be set.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::classifier::{ensure_bucket_range, BucketSplitMap, SplitClassifier};
use crate::config::{GroupingConfig, VertexConfig};
use crate::context::{
    EdgeManagerDescriptor, InputSpecUpdate, ScheduledTask, TaskLocationHint,
    VertexManagerContext, VertexParallelism,
};
use crate::dispatch::{bucket_identity_events, dispatch_primary, dispatch_side};
use crate::error::{Result, VertexError};
use crate::event::{InputDescriptor, InputInitializerEvent};
use crate::grouper::{DefaultSplitGrouper, SplitGrouper};
use crate::location::SplitLocationProvider;
use crate::multimap::OrderedMultimap;
use crate::redistribute::redistribute;
use crate::routing::{RoutingTable, RoutingTableBuilder};
use crate::split::GroupedSplit;

/// Lifecycle of a bucket vertex manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexState {
    /// Waiting for the root inputs affecting parallelism to report.
    AwaitingInputs,
    /// Parallelism was set. Terminal.
    AllInputsSeen,
}

/// Vertex manager of a bucket map join or sort-merge bucket join vertex.
///
/// The primary (big table) input decides the number of tasks: one task per
/// grouped split, recorded per bucket in a routing table. Secondary inputs
/// are routed by that table and are queued until it exists.
pub struct BucketVertexManager {
    context: Arc<dyn VertexManagerContext>,
    config: Option<VertexConfig>,
    grouper: Option<Arc<dyn SplitGrouper>>,
    location_provider: Option<Arc<dyn SplitLocationProvider>>,
    affinity_hosts: Vec<String>,
    state: VertexState,
    num_inputs_seen: usize,
    reported_inputs: HashSet<String>,
    pending_side_inputs: Vec<(String, OrderedMultimap<u32, GroupedSplit>)>,
    routing_table: Option<RoutingTable>,
    location_hints: Vec<TaskLocationHint>,
    final_splits: OrderedMultimap<u32, GroupedSplit>,
    input_specs: HashMap<String, InputSpecUpdate>,
    edge_managers: HashMap<String, Option<EdgeManagerDescriptor>>,
}

impl BucketVertexManager {
    pub fn new(context: Arc<dyn VertexManagerContext>) -> Self {
        Self {
            context,
            config: None,
            grouper: None,
            location_provider: None,
            affinity_hosts: vec![],
            state: VertexState::AwaitingInputs,
            num_inputs_seen: 0,
            reported_inputs: HashSet::new(),
            pending_side_inputs: vec![],
            routing_table: None,
            location_hints: vec![],
            final_splits: OrderedMultimap::new(),
            input_specs: HashMap::new(),
            edge_managers: HashMap::new(),
        }
    }

    /// Creates an already initialized manager.
    pub fn try_new(
        context: Arc<dyn VertexManagerContext>,
        config: VertexConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut manager = Self::new(context);
        manager.config = Some(config);
        Ok(manager)
    }

    /// Replaces the default size based grouper for every input.
    pub fn with_grouper(mut self, grouper: Arc<dyn SplitGrouper>) -> Self {
        self.grouper = Some(grouper);
        self
    }

    /// Location provider handed to the default grouper.
    pub fn with_location_provider(
        mut self,
        location_provider: Arc<dyn SplitLocationProvider>,
    ) -> Self {
        self.location_provider = Some(location_provider);
        self
    }

    /// Spreads splits over `hosts` by consistent hashing of their file ranges,
    /// unless a location provider was set.
    pub fn with_host_affinity(mut self, hosts: Vec<String>) -> Self {
        self.affinity_hosts = hosts;
        self
    }

    /// Decodes the vertex configuration payload.
    pub fn initialize(&mut self, payload: &[u8]) -> Result<()> {
        let config = VertexConfig::from_payload(payload)?;
        info!(
            "Initializing bucket vertex {} with {} buckets, main input '{}', {} inputs, {:?}",
            self.context.vertex_name(),
            config.num_buckets,
            config.main_input_name,
            config.num_inputs,
            config.vertex_type
        );
        self.config = Some(config);
        Ok(())
    }

    pub fn state(&self) -> VertexState {
        self.state
    }

    pub fn num_inputs_seen(&self) -> usize {
        self.num_inputs_seen
    }

    pub fn num_pending_side_inputs(&self) -> usize {
        self.pending_side_inputs.len()
    }

    pub fn routing_table(&self) -> Option<&RoutingTable> {
        self.routing_table.as_ref()
    }

    /// Schedules every task of the vertex without location hints.
    pub fn on_vertex_started(&mut self) -> Result<()> {
        let num_tasks = self.context.vertex_num_tasks();
        debug!(
            "Vertex {} started, scheduling {num_tasks} tasks",
            self.context.vertex_name()
        );
        let tasks = (0..num_tasks)
            .map(|task_index| ScheduledTask {
                task_index,
                location_hint: None,
            })
            .collect();
        self.context.schedule_tasks(tasks)
    }

    pub fn on_source_task_completed(&mut self, _source_vertex: &str, _task_index: u32) {}

    pub fn on_vertex_manager_event(&mut self, _payload: &[u8]) {}

    /// Handles the splits reported by the initializer of one root input.
    pub fn on_root_vertex_initialized(
        &mut self,
        input_name: &str,
        descriptor: &mut InputDescriptor,
        events: Vec<InputInitializerEvent>,
    ) -> Result<()> {
        if self.state == VertexState::AllInputsSeen {
            return Err(VertexError::ProtocolViolation(format!(
                "Input {input_name} reported after the parallelism of vertex {} was set",
                self.context.vertex_name()
            )));
        }
        let config = self.config()?.clone();
        let grouping = GroupingConfig::with_settings(descriptor.settings.clone())?;
        descriptor.grouping_enabled = true;

        if self.reported_inputs.contains(input_name) {
            return Err(VertexError::ProtocolViolation(format!(
                "Input {input_name} reported more than once"
            )));
        }
        if self.num_inputs_seen >= config.num_inputs {
            return Err(VertexError::ProtocolViolation(format!(
                "Input {input_name} reported after all {} inputs of vertex {} were seen",
                config.num_inputs,
                self.context.vertex_name()
            )));
        }
        self.reported_inputs.insert(input_name.to_string());
        self.num_inputs_seen += 1;
        info!(
            "Root input {input_name} of vertex {} initialized with {} events ({} of {} inputs seen)",
            self.context.vertex_name(),
            events.len(),
            self.num_inputs_seen,
            config.num_inputs
        );

        let mut classifier = SplitClassifier::try_new(&config, input_name)?;
        let mut configured = false;
        let mut data_seen = false;
        for event in events {
            match event {
                InputInitializerEvent::ConfigureVertexTasks { num_tasks } => {
                    if data_seen {
                        return Err(VertexError::ProtocolViolation(format!(
                            "Input {input_name} sent a configure event after data events"
                        )));
                    }
                    if configured {
                        return Err(VertexError::ProtocolViolation(format!(
                            "Input {input_name} sent more than one configure event"
                        )));
                    }
                    configured = true;
                    debug!("Input {input_name} suggested {num_tasks} tasks");
                }
                InputInitializerEvent::DataInformation { payload, .. } => {
                    data_seen = true;
                    classifier.add(payload.into_file_split()?);
                }
                InputInitializerEvent::UpdatePayload(_) => {
                    return Err(VertexError::ProtocolViolation(format!(
                        "Input {input_name} sent an unexpected payload update"
                    )));
                }
            }
        }

        let input_bucket_count = classifier.input_bucket_count();
        let buckets = classifier.classify();
        debug!("Input {input_name} splits by bucket: {buckets:?}");

        if config.is_main_input(input_name) {
            self.process_primary(&config, &grouping, input_name, buckets)?;
        } else {
            self.process_side(&config, &grouping, input_name, input_bucket_count, buckets)?;
        }
        Ok(())
    }

    /// Sets the parallelism once every input affecting it has reported.
    ///
    /// Returns true if this call finalized the vertex.
    pub fn try_finalize(&mut self) -> Result<bool> {
        if self.state == VertexState::AllInputsSeen {
            return Ok(false);
        }
        let num_inputs = self.config()?.num_inputs;
        if self.num_inputs_seen != num_inputs {
            debug!(
                "Vertex {}: {} of {num_inputs} inputs seen, not finalizing",
                self.context.vertex_name(),
                self.num_inputs_seen
            );
            return Ok(false);
        }
        let Some(table) = self.routing_table.as_ref() else {
            return Err(VertexError::ProtocolViolation(format!(
                "All {num_inputs} inputs of vertex {} reported without the main input",
                self.context.vertex_name()
            )));
        };

        let parallelism = VertexParallelism {
            task_count: table.task_count(),
            location_hints: mem::take(&mut self.location_hints),
            edge_managers: self.edge_managers.clone(),
            input_specs: self.input_specs.clone(),
        };
        info!(
            "Setting parallelism of vertex {} to {} tasks over {} buckets",
            self.context.vertex_name(),
            table.task_count(),
            table.num_buckets()
        );
        self.context.set_vertex_parallelism(parallelism)?;

        for (task, event) in bucket_identity_events(table) {
            self.context.send_event_to_processor(vec![event], task)?;
        }

        self.final_splits.clear();
        self.state = VertexState::AllInputsSeen;
        Ok(true)
    }

    fn config(&self) -> Result<&VertexConfig> {
        self.config.as_ref().ok_or_else(|| {
            VertexError::ProtocolViolation(format!(
                "Vertex {} received an event before it was initialized",
                self.context.vertex_name()
            ))
        })
    }

    fn grouper_for(&self, grouping: &GroupingConfig) -> Arc<dyn SplitGrouper> {
        if let Some(grouper) = &self.grouper {
            return grouper.clone();
        }
        let grouper = DefaultSplitGrouper::new(grouping);
        match &self.location_provider {
            Some(provider) => Arc::new(grouper.with_location_provider(provider.clone())),
            None if !self.affinity_hosts.is_empty() => {
                Arc::new(grouper.with_host_affinity(self.affinity_hosts.clone(), grouping))
            }
            None => Arc::new(grouper),
        }
    }

    fn available_slots(&self) -> u32 {
        let task_memory = self.context.task_memory_mb().max(1);
        let slots = self.context.total_available_memory_mb() / task_memory;
        u32::try_from(slots).unwrap_or(u32::MAX).max(1)
    }

    fn group_by_bucket(
        &self,
        grouper: &dyn SplitGrouper,
        grouping: &GroupingConfig,
        input_name: &str,
        buckets: BucketSplitMap,
        group_across_files: bool,
    ) -> Result<OrderedMultimap<u32, GroupedSplit>> {
        let slots = self.available_slots();
        let mut grouped = OrderedMultimap::new();
        for (bucket_id, splits) in buckets {
            let groups = grouper.generate_grouped_splits(
                &splits,
                grouping.split_waves(),
                slots,
                input_name,
                group_across_files,
            )?;
            grouped.put_all(bucket_id, groups);
        }
        Ok(grouped)
    }

    fn process_primary(
        &mut self,
        config: &VertexConfig,
        grouping: &GroupingConfig,
        input_name: &str,
        buckets: BucketSplitMap,
    ) -> Result<()> {
        if self.routing_table.is_some() {
            return Err(VertexError::ProtocolViolation(format!(
                "Input {input_name} cannot be a second main input of vertex {}",
                self.context.vertex_name()
            )));
        }
        let grouper = self.grouper_for(grouping);
        let group_across_files = config.main_input_name.is_empty();
        let mut grouped = self.group_by_bucket(
            grouper.as_ref(),
            grouping,
            input_name,
            buckets,
            group_across_files,
        )?;
        ensure_bucket_range(input_name, config.num_buckets, &grouped)?;

        let second_pass = !config.main_input_name.is_empty();
        if second_pass {
            grouped = grouper.group(&grouped, self.available_slots(), grouping.smb_waves())?;
        }

        let mut builder = RoutingTableBuilder::new(config.num_buckets);
        let routed = dispatch_primary(&grouped, &mut builder, second_pass)?;
        let table = builder.finish();
        info!(
            "Main input {input_name} routed to {} tasks over {} of {} buckets",
            table.task_count(),
            grouped.key_len(),
            config.num_buckets
        );

        let groups: Vec<GroupedSplit> = grouped.values().cloned().collect();
        self.location_hints =
            grouper.create_task_location_hints(&groups, config.consistent_splits);

        // edges without a routing table still get their edge manager replaced
        let descriptor = config
            .vertex_type
            .requires_routing_table()
            .then(|| table.edge_manager_descriptor());
        for (source, edge) in self.context.input_vertex_edge_properties() {
            if edge.routes_by_bucket() {
                debug!("Replacing edge manager on edge from {source}");
                self.edge_managers.insert(source, descriptor.clone());
            }
        }

        self.input_specs
            .insert(input_name.to_string(), routed.input_spec);
        self.context.add_root_input_events(input_name, routed.events)?;
        self.final_splits = grouped;
        self.routing_table = Some(table);

        for (side_input, buckets) in mem::take(&mut self.pending_side_inputs) {
            debug!("Dispatching queued input {side_input}");
            self.dispatch_side_input(&side_input, &buckets)?;
        }
        self.try_finalize()?;
        Ok(())
    }

    fn process_side(
        &mut self,
        config: &VertexConfig,
        grouping: &GroupingConfig,
        input_name: &str,
        input_bucket_count: u32,
        buckets: BucketSplitMap,
    ) -> Result<()> {
        let grouper = self.grouper_for(grouping);
        let grouped =
            self.group_by_bucket(grouper.as_ref(), grouping, input_name, buckets, false)?;
        let grouped = redistribute(grouped, config.num_buckets, input_bucket_count);
        ensure_bucket_range(input_name, config.num_buckets, &grouped)?;

        if self.routing_table.is_some() {
            self.dispatch_side_input(input_name, &grouped)?;
            self.try_finalize()?;
        } else {
            debug!("Main input not seen yet, queueing input {input_name}");
            self.pending_side_inputs
                .push((input_name.to_string(), grouped));
        }
        Ok(())
    }

    fn dispatch_side_input(
        &mut self,
        input_name: &str,
        buckets: &OrderedMultimap<u32, GroupedSplit>,
    ) -> Result<()> {
        let Some(table) = self.routing_table.as_ref() else {
            return Err(VertexError::Internal(format!(
                "Cannot route input {input_name} before the routing table exists"
            )));
        };
        let routed = dispatch_side(input_name, buckets, table)?;
        if routed.events.is_empty() {
            warn!("Input {input_name} shares no buckets with the main input");
        }
        self.input_specs
            .insert(input_name.to_string(), routed.input_spec);
        self.context.add_root_input_events(input_name, routed.events)
    }
}
