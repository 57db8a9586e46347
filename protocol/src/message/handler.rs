use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashData {
    #[serde(default)]
    pub vless_uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub username: Option<String>,
}

/// `/node/handler/add-user`; the first `data` entry names the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    #[serde(default)]
    pub data: Vec<UserEntry>,
    #[serde(default)]
    pub hash_data: Option<HashData>,
}

impl AddUserRequest {
    /// `(vlessUuid, username)` when both are present.
    pub fn mapping(&self) -> Option<(&str, &str)> {
        let username = self.data.first()?.username.as_deref().filter(|v| !v.is_empty())?;
        let uuid = self
            .hash_data
            .as_ref()?
            .vless_uuid
            .as_deref()
            .filter(|v| !v.is_empty())?;
        Some((uuid, username))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedUserData {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub vless_uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedUser {
    #[serde(default)]
    pub user_data: Option<ProvisionedUserData>,
}

impl ProvisionedUser {
    pub fn mapping(&self) -> Option<(&str, &str)> {
        let data = self.user_data.as_ref()?;
        let uuid = data.vless_uuid.as_deref().filter(|v| !v.is_empty())?;
        let user_id = data.user_id.as_deref().filter(|v| !v.is_empty())?;
        Some((uuid, user_id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddUsersRequest {
    #[serde(default)]
    pub users: Vec<ProvisionedUser>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveUserRequest {
    #[serde(default)]
    pub hash_data: Option<HashData>,
}

impl RemoveUserRequest {
    pub fn uuid(&self) -> Option<&str> {
        self.hash_data
            .as_ref()?
            .vless_uuid
            .as_deref()
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedUser {
    #[serde(default)]
    pub hash_uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveUsersRequest {
    #[serde(default)]
    pub users: Vec<RemovedUser>,
}

/// The emulated node does not keep per-inbound user lists; this is always empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundUsersResponse {
    pub users: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundUsersCountResponse {
    pub count: usize,
}
