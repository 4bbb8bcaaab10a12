use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Certificate/key pair used to terminate TLS on the gRPC listener.
///
/// Both files unset (or empty) means plaintext. Setting only one of them is a
/// configuration error, see [`TlsConfig::material`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsConfig {
    /// PEM encoded certificate chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    /// PEM encoded private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

/// A validated certificate/key pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl TlsConfig {
    /// Create a config with both files set.
    pub fn new(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: Some(cert_file.into()),
            key_file: Some(key_file.into()),
        }
    }

    /// Validate the pairing and return the material to load, if TLS is enabled.
    ///
    /// - neither file set: `Ok(None)`, serve plaintext;
    /// - both set: `Ok(Some(..))`;
    /// - exactly one set: [`ModelError::IncompleteTls`].
    pub fn material(&self) -> ModelResult<Option<TlsMaterial>> {
        match (present(&self.cert_file), present(&self.key_file)) {
            (None, None) => Ok(None),
            (Some(cert), Some(key)) => Ok(Some(TlsMaterial {
                cert_file: cert.to_path_buf(),
                key_file: key.to_path_buf(),
            })),
            (Some(_), None) => Err(ModelError::IncompleteTls("key file")),
            (None, Some(_)) => Err(ModelError::IncompleteTls("cert file")),
        }
    }
}

fn present(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_enabled_by_default() {
        assert_eq!(TlsConfig::default().material().unwrap(), None);
    }

    #[test]
    fn empty_paths_count_as_unset() {
        let cfg = TlsConfig::new("", "");
        assert_eq!(cfg.material().unwrap(), None);
    }

    #[test]
    fn both_files_enable_tls() {
        let cfg = TlsConfig::new("cert.pem", "key.pem");
        let material = cfg.material().unwrap().expect("tls enabled");
        assert_eq!(material.cert_file, PathBuf::from("cert.pem"));
        assert_eq!(material.key_file, PathBuf::from("key.pem"));
    }

    #[test]
    fn missing_key_is_an_error() {
        let cfg = TlsConfig {
            cert_file: Some("cert.pem".into()),
            key_file: Some("".into()),
        };
        let err = cfg.material().unwrap_err();
        assert!(matches!(err, ModelError::IncompleteTls("key file")));
    }

    #[test]
    fn missing_cert_is_an_error() {
        let cfg = TlsConfig {
            cert_file: None,
            key_file: Some("key.pem".into()),
        };
        let err = cfg.material().unwrap_err();
        assert!(matches!(err, ModelError::IncompleteTls("cert file")));
    }

    #[test]
    fn deserializes_camel_case() {
        let cfg: TlsConfig =
            serde_json::from_str(r#"{ "certFile": "cert.pem", "keyFile": "key.pem" }"#).unwrap();
        assert_eq!(cfg, TlsConfig::new("cert.pem", "key.pem"));
    }
}
