use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRequest {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl MappingRequest {
    /// The `(uuid, userId)` pair when both are present and non-empty.
    pub fn pair(&self) -> Option<(&str, &str)> {
        let uuid = self.uuid.as_deref().filter(|v| !v.is_empty())?;
        let user_id = self.user_id.as_deref().filter(|v| !v.is_empty())?;
        Some((uuid, user_id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMappingRequest {
    #[serde(default)]
    pub mappings: Vec<MappingRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveMappingRequest {
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRemoveMappingRequest {
    #[serde(default)]
    pub uuids: Vec<String>,
}
