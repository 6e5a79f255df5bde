//! ApiKey to tag request types.

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ApiKey {
    CreateTopics,
    Produce,
    Fetch,
    OffsetCommit,
    ListTopics,
    Unknown(u8),
}

impl From<u8> for ApiKey {
    fn from(key: u8) -> Self {
        match key {
            0 => Self::CreateTopics,
            1 => Self::Produce,
            2 => Self::Fetch,
            3 => Self::OffsetCommit,
            4 => Self::ListTopics,
            _ => Self::Unknown(key),
        }
    }
}

impl From<ApiKey> for u8 {
    fn from(key: ApiKey) -> Self {
        match key {
            ApiKey::CreateTopics => 0,
            ApiKey::Produce => 1,
            ApiKey::Fetch => 2,
            ApiKey::OffsetCommit => 3,
            ApiKey::ListTopics => 4,
            ApiKey::Unknown(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_roundtrip_u8(code: u8) {
            let api_key = ApiKey::from(code);
            let code2 = u8::from(api_key);
            assert_eq!(code, code2);
        }

        #[test]
        fn test_roundtrip_api_key(key: ApiKey) {
            let key = match key {
                // Ensure key is actually unknown
                ApiKey::Unknown(x) => ApiKey::from(x),
                _ => key,
            };

            let code = u8::from(key);
            let key2 = ApiKey::from(code);
            assert_eq!(key, key2);
        }
    }
}
