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

//! Vertex manager error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    result,
};

/// Result type alias for vertex manager operations.
pub type Result<T> = result::Result<T, VertexError>;

/// Errors raised while routing splits for a bucketed join vertex.
///
/// None of these are retried here. They abort the whole stage and the
/// runtime decides whether to rerun it.
#[derive(Debug)]
pub enum VertexError {
    /// Events arrived out of the configure-then-data order, or an event type
    /// that is never expected was received.
    ProtocolViolation(String),
    /// A split payload was not a file split.
    UnsupportedSplitType(String),
    /// A bucket id fell outside `0..num_buckets` after remainder reduction.
    BucketRangeViolation {
        /// Name of the input that produced the bucket id.
        input_name: String,
        /// Offending bucket id.
        bucket_id: u32,
        /// Number of buckets of the primary table.
        num_buckets: u32,
    },
    /// A secondary input has no entry in the per-input bucket count map.
    MissingBucketMapping(String),
    /// Invalid configuration value or initialization payload.
    Configuration(String),
    /// Protobuf payload could not be decoded.
    Decode(prost::DecodeError),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
}

impl VertexError {
    /// Every vertex error aborts the stage. Kept as a method so callers that
    /// report failures to the runtime do not have to match on variants.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl From<prost::DecodeError> for VertexError {
    fn from(e: prost::DecodeError) -> Self {
        VertexError::Decode(e)
    }
}

impl Display for VertexError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VertexError::ProtocolViolation(desc) => {
                write!(f, "Protocol violation: {desc}")
            }
            VertexError::UnsupportedSplitType(desc) => {
                write!(f, "Unsupported split type: {desc}")
            }
            VertexError::BucketRangeViolation {
                input_name,
                bucket_id,
                num_buckets,
            } => write!(
                f,
                "Bucket id {bucket_id} of input {input_name} is outside of [0, {num_buckets})"
            ),
            VertexError::MissingBucketMapping(input_name) => {
                write!(f, "No bucket count is defined for input {input_name}")
            }
            VertexError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            VertexError::Decode(e) => write!(f, "Protobuf decode error: {e}"),
            VertexError::Internal(desc) => {
                write!(f, "Internal vertex manager error: {desc}")
            }
        }
    }
}

impl Error for VertexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VertexError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_bucket_range_violation() {
        let err = VertexError::BucketRangeViolation {
            input_name: "small".to_string(),
            bucket_id: 7,
            num_buckets: 4,
        };
        assert_eq!(
            "Bucket id 7 of input small is outside of [0, 4)",
            err.to_string()
        );
        assert!(err.is_fatal());
    }
}
