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
use crate::error::{Result, VertexError};
use crate::serde::protobuf;
use crate::split::{FileSplit, GroupedSplit, SplitUnit};

use protobuf::file_split_proto::OptionalBucketId;
use protobuf::split_proto::SplitType;

impl From<protobuf::FileSplitProto> for FileSplit {
    fn from(proto: protobuf::FileSplitProto) -> Self {
        FileSplit {
            path: proto.path,
            start: proto.start,
            length: proto.length,
            hosts: proto.hosts,
            bucket_id: proto
                .optional_bucket_id
                .map(|OptionalBucketId::BucketId(bucket_id)| bucket_id),
        }
    }
}

impl TryFrom<protobuf::SplitProto> for SplitUnit {
    type Error = VertexError;

    fn try_from(proto: protobuf::SplitProto) -> Result<Self> {
        match proto.split_type {
            Some(SplitType::File(file)) => Ok(SplitUnit::File(file.into())),
            Some(SplitType::Grouped(group)) => {
                let members = group
                    .members
                    .into_iter()
                    .map(SplitUnit::try_from)
                    .collect::<Result<Vec<_>>>()?;
                Ok(SplitUnit::Group(GroupedSplit::with_locations(
                    members,
                    group.locations,
                )))
            }
            None => Err(VertexError::UnsupportedSplitType(
                "split payload does not carry a split".to_string(),
            )),
        }
    }
}

impl From<protobuf::VertexType> for VertexType {
    fn from(vertex_type: protobuf::VertexType) -> Self {
        match vertex_type {
            protobuf::VertexType::AutoInitializedEdges => VertexType::AutoInitializedEdges,
            protobuf::VertexType::InitializedEdges => VertexType::InitializedEdges,
            protobuf::VertexType::MultiInputInitializedEdges => {
                VertexType::MultiInputInitializedEdges
            }
            protobuf::VertexType::MultiInputUninitializedEdges => {
                VertexType::MultiInputUninitializedEdges
            }
        }
    }
}

impl TryFrom<protobuf::VertexConfiguration> for VertexConfig {
    type Error = VertexError;

    fn try_from(proto: protobuf::VertexConfiguration) -> Result<Self> {
        let vertex_type = protobuf::VertexType::try_from(proto.vertex_type)
            .map_err(|_| {
                VertexError::Configuration(format!(
                    "Unknown vertex type {}",
                    proto.vertex_type
                ))
            })?
            .into();
        Ok(VertexConfig {
            num_buckets: proto.num_buckets,
            main_input_name: proto.input_name,
            vertex_type,
            num_inputs: proto.num_inputs as usize,
            consistent_splits: proto.consistent_splits,
            input_bucket_counts: proto.input_bucket_counts,
        })
    }
}
