// service/media_signature.rs
use sha2::{Digest, Sha256};

use crate::{
    config::CloudinaryConfig,
    models::uploadmodel::{UploadCredential, UploadNamespace},
};

/// Issues upload credentials for direct uploads to the media host.
#[derive(Debug, Clone)]
pub struct MediaSigner {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    upload_preset: Option<String>,
}

impl MediaSigner {
    /// `None` when the media host credentials are not configured.
    pub fn from_config(config: &CloudinaryConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }

        Some(MediaSigner {
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            upload_preset: config.upload_preset.clone(),
        })
    }

    /// Parameters the client must send alongside the file, in signing order.
    pub fn signed_params(&self, namespace: UploadNamespace, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("folder", namespace.default_folder().to_string()),
            ("timestamp", timestamp.to_string()),
        ];
        if let Some(preset) = &self.upload_preset {
            params.push(("upload_preset", preset.clone()));
        }
        params
    }

    pub fn sign(&self, namespace: UploadNamespace, timestamp: i64) -> UploadCredential {
        let params = self.signed_params(namespace, timestamp);

        UploadCredential {
            timestamp,
            signature: sign_params(&params, &self.api_secret),
            cloud_name: self.cloud_name.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

/// `key=value` pairs sorted by key and joined with `&`.
pub fn signature_payload(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, value)| !value.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex SHA-256 of the sorted payload with the API secret appended.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature_payload(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
