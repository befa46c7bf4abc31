//! Key containers exchanged with the server.
//!
//! Binary fields are base64-encoded on the wire. Plain (unwrapped) key
//! material never leaves this process: [`PlainFileKey`] intentionally has no
//! serde support and its key bytes are wiped on drop.

use {
    crate::encoding,
    rand::{RngCore, rngs::OsRng},
    serde::{Deserialize, Serialize},
    std::{
        fmt::{self, Debug, Display},
        str::FromStr,
    },
    thiserror::Error,
    zeroize::Zeroize,
};

/// Length of the symmetric per-file key in bytes.
pub const FILE_KEY_LENGTH: usize = 32;
/// Length of the content cipher initialization vector in bytes.
pub const IV_LENGTH: usize = 12;
/// Length of the content authentication tag in bytes.
pub const TAG_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported crypto version `{0}`")]
pub struct UnsupportedVersion(pub String);

/// Version of a user key pair, determining the asymmetric key size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserKeyPairVersion {
    #[serde(rename = "A")]
    Rsa2048,
    #[serde(rename = "RSA-4096")]
    Rsa4096,
}

impl UserKeyPairVersion {
    #[must_use]
    #[inline]
    pub fn key_size(self) -> usize {
        match self {
            Self::Rsa2048 => 2048,
            Self::Rsa4096 => 4096,
        }
    }

    #[must_use]
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rsa2048 => "A",
            Self::Rsa4096 => "RSA-4096",
        }
    }
}

impl Display for UserKeyPairVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserKeyPairVersion {
    type Err = UnsupportedVersion;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::Rsa2048),
            "RSA-4096" => Ok(Self::Rsa4096),
            _ => Err(UnsupportedVersion(s.to_owned())),
        }
    }
}

/// Version of a file key: the wrapping key pair lineage plus the content cipher.
///
/// Both versions encrypt content with AES-256-GCM; they differ in the key
/// pair that protects the file key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKeyVersion {
    #[serde(rename = "A")]
    Rsa2048Aes256Gcm,
    #[serde(rename = "RSA-4096/AES-256-GCM")]
    Rsa4096Aes256Gcm,
}

impl FileKeyVersion {
    /// The key pair version a file key of this version must be wrapped under.
    #[must_use]
    #[inline]
    pub fn key_pair_version(self) -> UserKeyPairVersion {
        match self {
            Self::Rsa2048Aes256Gcm => UserKeyPairVersion::Rsa2048,
            Self::Rsa4096Aes256Gcm => UserKeyPairVersion::Rsa4096,
        }
    }

    #[must_use]
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rsa2048Aes256Gcm => "A",
            Self::Rsa4096Aes256Gcm => "RSA-4096/AES-256-GCM",
        }
    }
}

impl Display for FileKeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKeyVersion {
    type Err = UnsupportedVersion;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::Rsa2048Aes256Gcm),
            "RSA-4096/AES-256-GCM" => Ok(Self::Rsa4096Aes256Gcm),
            _ => Err(UnsupportedVersion(s.to_owned())),
        }
    }
}

/// Secret symmetric key material for one file's content.
#[derive(Clone)]
pub struct FileKey([u8; FILE_KEY_LENGTH]);

impl FileKey {
    /// Generates fresh random key material from the OS secure random source.
    #[must_use]
    #[inline]
    pub fn generate() -> Self {
        let mut bytes = [0u8; FILE_KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    #[inline]
    pub fn from_bytes(bytes: [u8; FILE_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; FILE_KEY_LENGTH] {
        &self.0
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey").finish()
    }
}

/// Unwrapped per-file key with the cipher parameters attached to it.
///
/// `iv` is assigned once when an encryption cipher is created and never
/// changes afterwards. `tag` is written by the encryption cipher at
/// finalization; for decryption both fields must be populated up front.
#[derive(Debug, Clone)]
pub struct PlainFileKey {
    pub key: FileKey,
    pub version: FileKeyVersion,
    pub iv: Option<[u8; IV_LENGTH]>,
    pub tag: Option<[u8; TAG_LENGTH]>,
}

impl PlainFileKey {
    #[must_use]
    #[inline]
    pub fn new(key: FileKey, version: FileKeyVersion) -> Self {
        Self {
            key,
            version,
            iv: None,
            tag: None,
        }
    }
}

/// A file key wrapped under a recipient's public key. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFileKey {
    #[serde(with = "encoding::base64_vec")]
    pub key: Vec<u8>,
    pub version: FileKeyVersion,
    #[serde(with = "encoding::base64_array")]
    pub iv: [u8; IV_LENGTH],
    #[serde(with = "encoding::base64_array")]
    pub tag: [u8; TAG_LENGTH],
}

/// Public half of a user key pair (SPKI PEM).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublicKey {
    pub public_key: String,
    pub version: UserKeyPairVersion,
}

/// Private half of a user key pair: an encrypted PKCS#8 PEM container.
///
/// The plaintext private key only ever exists transiently in memory while a
/// file key is being unwrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrivateKey {
    pub private_key: String,
    pub version: UserKeyPairVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKeyPair {
    pub public_key_container: UserPublicKey,
    pub private_key_container: UserPrivateKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings_roundtrip() {
        for version in [UserKeyPairVersion::Rsa2048, UserKeyPairVersion::Rsa4096] {
            assert_eq!(version.as_str().parse::<UserKeyPairVersion>(), Ok(version));
        }
        for version in [
            FileKeyVersion::Rsa2048Aes256Gcm,
            FileKeyVersion::Rsa4096Aes256Gcm,
        ] {
            assert_eq!(version.as_str().parse::<FileKeyVersion>(), Ok(version));
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = "RSA-8192".parse::<UserKeyPairVersion>().unwrap_err();
        assert_eq!(err, UnsupportedVersion("RSA-8192".to_owned()));
        "B".parse::<FileKeyVersion>().unwrap_err();
    }

    #[test]
    fn file_key_debug_is_masked() {
        let key = FileKey::from_bytes([7; FILE_KEY_LENGTH]);
        assert_eq!(format!("{key:?}"), "FileKey");
    }

    #[test]
    fn encrypted_file_key_serde_roundtrip() {
        let original = EncryptedFileKey {
            key: vec![1, 2, 3, 4, 5],
            version: FileKeyVersion::Rsa2048Aes256Gcm,
            iv: [9; IV_LENGTH],
            tag: [3; TAG_LENGTH],
        };
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"version\":\"A\""));
        let parsed: EncryptedFileKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
