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

//! Code generated from the bucket vertex Protocol Buffer definition as well
//! as convenience code for converting between it and the in-memory types.

use prost::Message;

use crate::error::Result;
use crate::split::SplitUnit;

pub use generated::bucket_vertex as protobuf;

mod from_proto;
pub mod generated;
mod to_proto;

/// Serializes a split unit into the payload of a data information event.
pub fn encode_split(split: &SplitUnit) -> Vec<u8> {
    protobuf::SplitProto::from(split).encode_to_vec()
}

/// Deserializes a data information event payload into a split unit.
pub fn decode_split(bytes: &[u8]) -> Result<SplitUnit> {
    protobuf::SplitProto::decode(bytes)?.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VertexError;
    use crate::split::{FileSplit, GroupedSplit};

    #[test]
    fn nested_group_survives_encoding() -> Result<()> {
        let inner = GroupedSplit::new(vec![
            FileSplit::new("/t/000000_0", 0, 64)
                .with_hosts(vec!["h1".to_string()])
                .with_bucket_id(0)
                .into(),
            FileSplit::new("/t/000000_0", 64, 64).into(),
        ]);
        let outer: SplitUnit = GroupedSplit::new(vec![inner.into()]).into();

        let decoded = decode_split(&encode_split(&outer))?;
        assert_eq!(outer, decoded);
        Ok(())
    }

    #[test]
    fn empty_split_is_unsupported() {
        let bytes = protobuf::SplitProto { split_type: None }.encode_to_vec();
        assert!(matches!(
            decode_split(&bytes),
            Err(VertexError::UnsupportedSplitType(_))
        ));
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        assert!(matches!(
            decode_split(&[0xff, 0xff, 0xff]),
            Err(VertexError::Decode(_))
        ));
    }
}
