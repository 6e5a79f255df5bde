use serde::{Deserialize, Serialize};

use super::error_code;
use crate::record::RecordBody;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchRequest {
    pub topic: String,
    pub partition: u32,

    /// First offset to return.
    pub offset: u64,

    /// Byte budget for the returned records, measured in on-disk record
    /// sizes.
    pub max_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub topic: String,
    pub partition: u32,
    pub error_code: i32,
    pub error_message: Option<String>,

    /// Records in strict offset-ascending order; empty on failure.
    pub records: Vec<RecordBody>,
}

impl FetchResponse {
    pub fn success(topic: impl Into<String>, partition: u32, records: Vec<RecordBody>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            error_code: error_code::NONE,
            error_message: None,
            records,
        }
    }

    pub fn failure(
        topic: impl Into<String>,
        partition: u32,
        error_code: i32,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            error_code,
            error_message: Some(error_message.into()),
            records: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let req: FetchRequest = serde_json::from_str(
            r#"{"topic":"t1","partition":0,"offset":0,"max_bytes":1024}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            FetchRequest {
                topic: "t1".to_owned(),
                partition: 0,
                offset: 0,
                max_bytes: 1024,
            }
        );
    }

    #[test]
    fn test_response_record_shape() {
        let resp = FetchResponse::success(
            "t1",
            0,
            vec![RecordBody {
                value: b"hello".to_vec(),
                key: None,
                timestamp: 1,
                headers: Default::default(),
                offset: 0,
            }],
        );
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"topic":"t1","partition":0,"error_code":0,"error_message":null,"records":[{"value":"aGVsbG8=","key":null,"timestamp":1,"headers":{},"offset":0}]}"#
        );
    }
}
