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

use crate::config::{VertexConfig, VertexType};
use crate::routing::RoutingTable;
use crate::serde::protobuf;
use crate::split::{FileSplit, GroupedSplit, SplitUnit};

use protobuf::file_split_proto::OptionalBucketId;
use protobuf::split_proto::SplitType;

impl From<&FileSplit> for protobuf::FileSplitProto {
    fn from(split: &FileSplit) -> Self {
        protobuf::FileSplitProto {
            path: split.path.clone(),
            start: split.start,
            length: split.length,
            hosts: split.hosts.clone(),
            optional_bucket_id: split.bucket_id.map(OptionalBucketId::BucketId),
        }
    }
}

impl From<&GroupedSplit> for protobuf::GroupedSplitProto {
    fn from(group: &GroupedSplit) -> Self {
        protobuf::GroupedSplitProto {
            members: group.members().iter().map(Into::into).collect(),
            locations: group.locations().to_vec(),
        }
    }
}

impl From<&SplitUnit> for protobuf::SplitProto {
    fn from(split: &SplitUnit) -> Self {
        let split_type = match split {
            SplitUnit::File(file) => SplitType::File(file.into()),
            SplitUnit::Group(group) => SplitType::Grouped(group.into()),
        };
        protobuf::SplitProto {
            split_type: Some(split_type),
        }
    }
}

impl From<&RoutingTable> for protobuf::RoutingTableProto {
    fn from(table: &RoutingTable) -> Self {
        protobuf::RoutingTableProto {
            num_buckets: table.num_buckets(),
            buckets: table
                .iter()
                .map(|(bucket_id, tasks)| protobuf::BucketTasks {
                    bucket_id,
                    task_ids: tasks.to_vec(),
                })
                .collect(),
        }
    }
}

impl From<VertexType> for protobuf::VertexType {
    fn from(vertex_type: VertexType) -> Self {
        match vertex_type {
            VertexType::AutoInitializedEdges => protobuf::VertexType::AutoInitializedEdges,
            VertexType::InitializedEdges => protobuf::VertexType::InitializedEdges,
            VertexType::MultiInputInitializedEdges => {
                protobuf::VertexType::MultiInputInitializedEdges
            }
            VertexType::MultiInputUninitializedEdges => {
                protobuf::VertexType::MultiInputUninitializedEdges
            }
        }
    }
}

impl From<VertexConfig> for protobuf::VertexConfiguration {
    fn from(config: VertexConfig) -> Self {
        protobuf::VertexConfiguration {
            num_buckets: config.num_buckets,
            input_name: config.main_input_name,
            vertex_type: protobuf::VertexType::from(config.vertex_type) as i32,
            num_inputs: config.num_inputs as u32,
            consistent_splits: config.consistent_splits,
            input_bucket_counts: config.input_bucket_counts,
        }
    }
}
