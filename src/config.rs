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

//! Bucket vertex configuration

use std::collections::HashMap;
use std::fmt::Display;
use std::result;
use std::sync::LazyLock;

use prost::Message;

use crate::error::{Result, VertexError};
use crate::serde::protobuf;

/// Number of waves of tasks the grouper aims for when sizing split groups.
pub const GROUPING_SPLIT_WAVES: &str = "bucket_vertex.grouping.split_waves";
/// Waves used by the second grouping pass of a sort-merge join's big table.
pub const GROUPING_SMB_WAVES: &str = "bucket_vertex.grouping.smb_waves";
/// Lower bound of the byte size of a split group.
pub const GROUPING_MIN_SIZE: &str = "bucket_vertex.grouping.min_size";
/// Upper bound of the byte size of a split group.
pub const GROUPING_MAX_SIZE: &str = "bucket_vertex.grouping.max_size";
/// Virtual nodes per host on the consistent hash ring used for split locality.
pub const LOCALITY_CONSISTENT_HASH_REPLICAS: &str =
    "bucket_vertex.locality.consistent_hash_replicas";

pub type ParseResult<T> = result::Result<T, String>;

static CONFIG_ENTRIES: LazyLock<HashMap<String, ConfigEntry>> = LazyLock::new(|| {
    let entries = vec![
        ConfigEntry::new(GROUPING_SPLIT_WAVES.to_string(),
                         "Multiplier of the available task slots used as the desired number of split groups".to_string(),
                         ConfigValueType::Float, Some("1.7".to_string())),
        ConfigEntry::new(GROUPING_SMB_WAVES.to_string(),
                         "Multiplier of the available task slots used when regrouping the big table of a sort-merge join".to_string(),
                         ConfigValueType::Float, Some("0.5".to_string())),
        ConfigEntry::new(GROUPING_MIN_SIZE.to_string(),
                         "Minimum number of bytes of a split group".to_string(),
                         ConfigValueType::UInt64, Some((16 * 1024 * 1024).to_string())),
        ConfigEntry::new(GROUPING_MAX_SIZE.to_string(),
                         "Maximum number of bytes of a split group".to_string(),
                         ConfigValueType::UInt64, Some((1024 * 1024 * 1024).to_string())),
        ConfigEntry::new(LOCALITY_CONSISTENT_HASH_REPLICAS.to_string(),
                         "Replica number of each host for the consistent hashing of split locations".to_string(),
                         ConfigValueType::UInt64, Some(31.to_string())),
    ];
    entries
        .into_iter()
        .map(|e| (e.name.clone(), e))
        .collect::<HashMap<_, _>>()
});

/// Type a setting value must parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueType {
    Float,
    UInt64,
}

impl Display for ConfigValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValueType::Float => write!(f, "Float"),
            ConfigValueType::UInt64 => write!(f, "UInt64"),
        }
    }
}

/// Configuration option meta-data
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    name: String,
    description: String,
    data_type: ConfigValueType,
    default_value: Option<String>,
}

impl ConfigEntry {
    fn new(
        name: String,
        description: String,
        data_type: ConfigValueType,
        default_value: Option<String>,
    ) -> Self {
        Self {
            name,
            description,
            data_type,
            default_value,
        }
    }
}

/// Split grouping settings carried by an input descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupingConfig {
    /// Validated settings keyed by name
    settings: HashMap<String, String>,
}

impl GroupingConfig {
    /// Create a new configuration based on key-value pairs.
    ///
    /// Keys that are not grouping settings are ignored, since input descriptors
    /// carry the whole job configuration.
    pub fn with_settings(settings: HashMap<String, String>) -> Result<Self> {
        let supported_entries = GroupingConfig::valid_entries();
        let mut accepted = HashMap::new();
        for (name, entry) in supported_entries {
            if let Some(v) = settings.get(name) {
                // validate that we can parse the user-supplied value
                Self::parse_value(v.as_str(), entry.data_type).map_err(|e| VertexError::Configuration(format!("Failed to parse user-supplied value '{v}' for configuration setting '{name}' ({}): {e}", entry.description)))?;
                accepted.insert(name.clone(), v.clone());
            } else if let Some(v) = entry.default_value.as_ref() {
                Self::parse_value(v.as_str(), entry.data_type).map_err(|e| VertexError::Configuration(format!("Failed to parse default value '{v}' for configuration setting '{name}': {e}")))?;
            } else {
                return Err(VertexError::Configuration(format!(
                    "No value specified for mandatory configuration setting '{name}'"
                )));
            }
        }

        let config = Self { settings: accepted };
        if config.min_group_size() > config.max_group_size() {
            return Err(VertexError::Configuration(format!(
                "'{GROUPING_MIN_SIZE}' ({}) must not exceed '{GROUPING_MAX_SIZE}' ({})",
                config.min_group_size(),
                config.max_group_size()
            )));
        }
        Ok(config)
    }

    pub fn parse_value(val: &str, data_type: ConfigValueType) -> ParseResult<()> {
        match data_type {
            ConfigValueType::Float => {
                let v = val.parse::<f32>().map_err(|e| format!("{e:?}"))?;
                if !v.is_finite() || v <= 0.0 {
                    return Err(format!("expected a positive number, got {v}"));
                }
            }
            ConfigValueType::UInt64 => {
                val.parse::<u64>().map_err(|e| format!("{e:?}"))?;
            }
        }

        Ok(())
    }

    // All available configuration options
    pub fn valid_entries() -> &'static HashMap<String, ConfigEntry> {
        &CONFIG_ENTRIES
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn split_waves(&self) -> f32 {
        self.get_f32_setting(GROUPING_SPLIT_WAVES)
    }

    pub fn smb_waves(&self) -> f32 {
        self.get_f32_setting(GROUPING_SMB_WAVES)
    }

    pub fn min_group_size(&self) -> u64 {
        self.get_u64_setting(GROUPING_MIN_SIZE)
    }

    pub fn max_group_size(&self) -> u64 {
        self.get_u64_setting(GROUPING_MAX_SIZE)
    }

    pub fn consistent_hash_replicas(&self) -> usize {
        self.get_u64_setting(LOCALITY_CONSISTENT_HASH_REPLICAS) as usize
    }

    fn setting_or_default(&self, key: &str) -> &str {
        match self.settings.get(key) {
            Some(v) => v,
            None => Self::valid_entries()
                .get(key)
                .and_then(|entry| entry.default_value.as_deref())
                .unwrap_or_default(),
        }
    }

    fn get_f32_setting(&self, key: &str) -> f32 {
        // values are validated in the constructor
        self.setting_or_default(key).parse().unwrap_or(1.0)
    }

    fn get_u64_setting(&self, key: &str) -> u64 {
        // values are validated in the constructor
        self.setting_or_default(key).parse().unwrap_or_default()
    }
}

/// How the vertex's incoming edges are initialized, which decides whether a
/// routing table has to be handed to the custom edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VertexType {
    AutoInitializedEdges,
    #[default]
    InitializedEdges,
    MultiInputInitializedEdges,
    MultiInputUninitializedEdges,
}

impl VertexType {
    /// True if the custom edges need the bucket to task routing table.
    pub fn requires_routing_table(&self) -> bool {
        matches!(
            self,
            VertexType::InitializedEdges | VertexType::MultiInputInitializedEdges
        )
    }
}

/// Initialization payload of a bucket join vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexConfig {
    /// Number of buckets of the big (primary) table.
    pub num_buckets: u32,
    /// Name of the primary input. Empty if the vertex has a single bucketed input.
    pub main_input_name: String,
    pub vertex_type: VertexType,
    /// Number of root inputs that must report before parallelism is set.
    pub num_inputs: usize,
    /// Whether location hints should pin each task to a single host.
    pub consistent_splits: bool,
    /// Bucket counts of secondary inputs.
    pub input_bucket_counts: HashMap<String, u32>,
}

impl VertexConfig {
    pub fn new(num_buckets: u32, main_input_name: impl Into<String>) -> Self {
        Self {
            num_buckets,
            main_input_name: main_input_name.into(),
            vertex_type: VertexType::default(),
            num_inputs: 1,
            consistent_splits: true,
            input_bucket_counts: HashMap::new(),
        }
    }

    pub fn with_vertex_type(mut self, vertex_type: VertexType) -> Self {
        self.vertex_type = vertex_type;
        self
    }

    pub fn with_num_inputs(mut self, num_inputs: usize) -> Self {
        self.num_inputs = num_inputs;
        self
    }

    pub fn with_consistent_splits(mut self, consistent_splits: bool) -> Self {
        self.consistent_splits = consistent_splits;
        self
    }

    pub fn with_input_bucket_count(
        mut self,
        input_name: impl Into<String>,
        bucket_count: u32,
    ) -> Self {
        self.input_bucket_counts
            .insert(input_name.into(), bucket_count);
        self
    }

    /// True if `input_name` is the big table that builds the routing table.
    pub fn is_main_input(&self, input_name: &str) -> bool {
        self.main_input_name.is_empty() || self.main_input_name == input_name
    }

    /// A sort-merge join has more than one input affecting parallelism.
    pub fn is_smb_join(&self) -> bool {
        self.num_inputs != 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_buckets == 0 {
            return Err(VertexError::Configuration(
                "number of buckets must be positive".to_string(),
            ));
        }
        if self.num_inputs == 0 {
            return Err(VertexError::Configuration(
                "number of inputs affecting parallelism must be positive".to_string(),
            ));
        }
        if let Some((name, _)) = self
            .input_bucket_counts
            .iter()
            .find(|(_, count)| **count == 0)
        {
            return Err(VertexError::Configuration(format!(
                "bucket count of input {name} must be positive"
            )));
        }
        Ok(())
    }

    /// Decodes and validates the initialization payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let proto = protobuf::VertexConfiguration::decode(payload)?;
        let config: VertexConfig = proto.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let proto: protobuf::VertexConfiguration = self.clone().into();
        proto.encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() -> Result<()> {
        let config = GroupingConfig::default();
        assert_eq!(1.7, config.split_waves());
        assert_eq!(0.5, config.smb_waves());
        assert_eq!(16 * 1024 * 1024, config.min_group_size());
        assert_eq!(31, config.consistent_hash_replicas());
        Ok(())
    }

    #[test]
    fn settings_override_defaults() -> Result<()> {
        let settings = HashMap::from([
            (GROUPING_SPLIT_WAVES.to_string(), "2.5".to_string()),
            ("unrelated.setting".to_string(), "x".to_string()),
        ]);
        let config = GroupingConfig::with_settings(settings)?;
        assert_eq!(2.5, config.split_waves());
        assert!(!config.settings().contains_key("unrelated.setting"));
        Ok(())
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings =
            HashMap::from([(GROUPING_SMB_WAVES.to_string(), "-1".to_string())]);
        match GroupingConfig::with_settings(settings) {
            Err(VertexError::Configuration(msg)) => {
                assert!(msg.contains("regrouping the big table"), "{msg}")
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }

        let settings = HashMap::from([
            (GROUPING_MIN_SIZE.to_string(), "100".to_string()),
            (GROUPING_MAX_SIZE.to_string(), "10".to_string()),
        ]);
        assert!(GroupingConfig::with_settings(settings).is_err());
    }

    #[test]
    fn vertex_config_payload() -> Result<()> {
        let config = VertexConfig::new(6, "big")
            .with_num_inputs(2)
            .with_vertex_type(VertexType::MultiInputInitializedEdges)
            .with_consistent_splits(false)
            .with_input_bucket_count("small", 4);

        let decoded = VertexConfig::from_payload(&config.to_payload())?;
        assert_eq!(config, decoded);
        assert!(decoded.is_smb_join());
        assert!(decoded.is_main_input("big"));
        assert!(!decoded.is_main_input("small"));
        Ok(())
    }

    #[test]
    fn zero_buckets_rejected() {
        let payload = VertexConfig::new(0, "").to_payload();
        assert!(matches!(
            VertexConfig::from_payload(&payload),
            Err(VertexError::Configuration(_))
        ));
    }
}
