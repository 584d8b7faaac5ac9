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

#![doc = include_str!("../README.md")]

/// Assigns the splits of a root input to buckets.
pub mod classifier;
/// Grouping and locality settings, and the vertex initialization payload.
pub mod config;
/// Runtime interface of the vertex manager.
pub mod context;
/// Data information and processor events addressed to tasks.
pub mod dispatch;
/// Error types and result definitions.
pub mod error;
/// Events produced by root input initializers.
pub mod event;
/// Event loop driving a vertex manager from a channel.
pub mod event_loop;
/// Split grouping.
pub mod grouper;
/// Consistent hashing of splits onto hosts.
pub mod location;
pub mod multimap;
/// Remapping of secondary buckets onto the primary bucket space.
pub mod redistribute;
/// Bucket to task routing tables.
pub mod routing;
/// Protobuf messages for splits, routing tables and vertex configuration.
pub mod serde;
pub mod split;
/// Vertex manager state machine.
pub mod state;

#[cfg(test)]
pub mod test_utils;

pub use config::{GroupingConfig, VertexConfig, VertexType};
pub use error::{Result, VertexError};
pub use state::{BucketVertexManager, VertexState};
