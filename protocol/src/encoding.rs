//! Base64 encoding of binary fields in wire-facing models.

use {
    base64::{Engine, prelude::BASE64_STANDARD},
    serde::{Deserialize, Deserializer, Serializer, de},
    std::borrow::Cow,
};

pub mod base64_vec {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Cow::<'_, str>::deserialize(deserializer)?;
        BASE64_STANDARD.decode(encoded.as_ref()).map_err(de::Error::custom)
    }
}

pub mod base64_array {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let encoded = Cow::<'_, str>::deserialize(deserializer)?;
        let bytes = BASE64_STANDARD.decode(encoded.as_ref()).map_err(de::Error::custom)?;
        <[u8; N]>::try_from(bytes).map_err(|bytes: Vec<u8>| {
            de::Error::custom(format!("invalid length {}, expected {N}", bytes.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use {serde::Serialize, serde_json::json};

    #[derive(Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
    struct Sample {
        #[serde(with = "crate::encoding::base64_vec")]
        data: Vec<u8>,
        #[serde(with = "crate::encoding::base64_array")]
        fixed: [u8; 4],
    }

    #[test]
    fn base64_roundtrip() {
        let sample = Sample {
            data: vec![0, 255, 7],
            fixed: [1, 2, 3, 4],
        };
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value, json!({ "data": "AP8H", "fixed": "AQIDBA==" }));
        let parsed: Sample = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = serde_json::from_value::<Sample>(json!({ "data": "", "fixed": "AQID" }))
            .unwrap_err();
        assert!(err.to_string().contains("invalid length"));
    }
}
