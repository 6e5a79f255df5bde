use serde::{Deserialize, Serialize};

use super::error_code;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTopicsRequest {
    /// The topics to create. Names must be unique within one request.
    pub topics: Vec<NewTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTopic {
    /// The topic name.
    pub name: String,

    /// The number of partitions to create. Must be at least 1.
    pub num_partitions: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTopicsResponse {
    /// Result for each topic in request order.
    pub topics: Vec<TopicStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStatus {
    pub name: String,
    pub error_code: i32,
    pub error_message: Option<String>,
}

impl TopicStatus {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error_code: error_code::NONE,
            error_message: None,
        }
    }

    pub fn failure(
        name: impl Into<String>,
        error_code: i32,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            error_code,
            error_message: Some(error_message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let req: CreateTopicsRequest =
            serde_json::from_str(r#"{"topics":[{"name":"t1","num_partitions":2}]}"#).unwrap();
        assert_eq!(
            req,
            CreateTopicsRequest {
                topics: vec![NewTopic {
                    name: "t1".to_owned(),
                    num_partitions: 2,
                }],
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let result: Result<CreateTopicsRequest, _> = serde_json::from_str(
            r#"{"topics":[{"name":"t1","num_partitions":2}],"replication_factor":3}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_response_shape() {
        let resp = CreateTopicsResponse {
            topics: vec![TopicStatus::success("t1")],
        };
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"topics":[{"name":"t1","error_code":0,"error_message":null}]}"#
        );
    }
}
