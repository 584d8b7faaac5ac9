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

use crate::error::{Result, VertexError};
use crate::serde::decode_split;
use crate::split::{FileSplit, SplitUnit};

/// Split carried by a data information event, either already materialized by
/// the initializer or still in its serialized form.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitPayload {
    Deserialized(SplitUnit),
    Serialized(Vec<u8>),
}

impl SplitPayload {
    /// Resolves the payload to a file split; grouped splits are not accepted
    /// from initializers.
    pub fn into_file_split(self) -> Result<FileSplit> {
        let unit = match self {
            SplitPayload::Deserialized(unit) => unit,
            SplitPayload::Serialized(bytes) => decode_split(&bytes)?,
        };
        match unit {
            SplitUnit::File(split) => Ok(split),
            SplitUnit::Group(group) => Err(VertexError::UnsupportedSplitType(format!(
                "Cannot handle splits other than file splits, got a group of {} splits",
                group.len()
            ))),
        }
    }
}

/// Event produced by a root input initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum InputInitializerEvent {
    /// Initial task count hint. At most one, before any data event.
    ConfigureVertexTasks { num_tasks: u32 },
    /// One split of the input.
    DataInformation {
        source_index: u32,
        payload: SplitPayload,
    },
    /// Never sent to bucketed vertices.
    UpdatePayload(Vec<u8>),
}

/// Descriptor of a root input as registered with the runtime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputDescriptor {
    pub class_name: String,
    /// Job settings the input was configured with.
    pub settings: HashMap<String, String>,
    /// Set by the vertex manager since it regroups splits itself.
    pub grouping_enabled: bool,
}

impl InputDescriptor {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}
