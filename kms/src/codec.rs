//! Wire encodings for binary fields.

/// Serde adapter encoding `Vec<u8>` as a standard base64 string.
///
/// `null` and missing values decode to an empty vector.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Encode bytes as base64.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Decode a base64 string.
    ///
    /// # Errors
    ///
    /// Fails if the value is not valid base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Option::<String>::deserialize(deserializer)?.map_or_else(
            || Ok(Vec::new()),
            |encoded| STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Blob {
        #[serde(default, with = "super::base64_bytes")]
        data: Vec<u8>,
    }

    #[test]
    fn test_encodes_as_base64() {
        let json = serde_json::to_string(&Blob {
            data: b"Lorem ipsum dolor sit amet".to_vec(),
        })
        .unwrap();
        assert_eq!(json, r#"{"data":"TG9yZW0gaXBzdW0gZG9sb3Igc2l0IGFtZXQ="}"#);
    }

    #[test]
    fn test_null_and_missing_decode_empty() {
        let blob: Blob = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(blob.data.is_empty());
        let blob: Blob = serde_json::from_str("{}").unwrap();
        assert!(blob.data.is_empty());
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(serde_json::from_str::<Blob>(r#"{"data":"not base64!"}"#).is_err());
    }
}
