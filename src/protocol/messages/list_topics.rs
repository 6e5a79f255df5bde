use serde::{Deserialize, Serialize};

use super::error_code;

// The ListTopics request has an empty payload; only the response has a body.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTopicsResponse {
    /// Deduplicated topic names, sorted.
    pub topics: Vec<String>,

    pub error_code: i32,
    pub error_message: Option<String>,
}

impl ListTopicsResponse {
    pub fn success(topics: Vec<String>) -> Self {
        Self {
            topics,
            error_code: error_code::NONE,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let resp = ListTopicsResponse::success(vec!["t1".to_owned()]);
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"topics":["t1"],"error_code":0,"error_message":null}"#
        );
    }
}
