use serde::{Deserialize, Serialize};

/// Entity namespace a signed upload credential is scoped to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UploadNamespace {
    Property,
    Agent,
    Agency,
    Promoter,
    Verification,
}

impl UploadNamespace {
    pub const ALL: [UploadNamespace; 5] = [
        UploadNamespace::Property,
        UploadNamespace::Agent,
        UploadNamespace::Agency,
        UploadNamespace::Promoter,
        UploadNamespace::Verification,
    ];

    /// API path segment owning the namespace's signature endpoint.
    pub fn route_segment(&self) -> &'static str {
        match self {
            UploadNamespace::Property => "properties",
            UploadNamespace::Agent => "agents",
            UploadNamespace::Agency => "agencies",
            UploadNamespace::Promoter => "promoters",
            UploadNamespace::Verification => "verifications",
        }
    }

    /// Media host folder uploads in this namespace land in.
    pub fn default_folder(&self) -> &'static str {
        match self {
            UploadNamespace::Property => "estatehub/properties",
            UploadNamespace::Agent => "estatehub/agents",
            UploadNamespace::Agency => "estatehub/agencies",
            UploadNamespace::Promoter => "estatehub/promoters",
            UploadNamespace::Verification => "estatehub/verifications",
        }
    }

    pub fn signature_path(&self) -> String {
        format!("/api/{}/cloudinary-signature", self.route_segment())
    }
}

/// Short-lived credential for one direct upload to the media host.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadCredential {
    pub timestamp: i64,
    pub signature: String,
    pub cloud_name: String,
    pub api_key: String,
}

/// Body of every `cloudinary-signature` endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadCredentialResponse {
    pub status: String,
    pub data: UploadCredential,
}
