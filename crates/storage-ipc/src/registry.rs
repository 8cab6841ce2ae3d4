//! Registry IPC surface: a lookup service over the accounts this process
//! hosts (`spec.md` §6 "Registry IPC"). It never routes calls — that is
//! `ProviderInterface`'s job — it only tells callers where to find them.

use storage_core::domain::AccountId;
use zbus::zvariant::Type;

/// One enumerated account, as handed back by `RegistryInterface::list`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Type)]
pub struct AccountDetails {
    pub id: String,
    pub service_id: String,
    pub display_name: String,
    pub provider_id: String,
    pub provider_name: String,
    pub icon_name: String,
}

impl AccountDetails {
    pub fn new(
        id: AccountId,
        service_id: impl Into<String>,
        display_name: impl Into<String>,
        provider_id: impl Into<String>,
        provider_name: impl Into<String>,
        icon_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            service_id: service_id.into(),
            display_name: display_name.into(),
            provider_id: provider_id.into(),
            provider_name: provider_name.into(),
            icon_name: icon_name.into(),
        }
    }
}

/// The `<vendor>.StorageFramework.Registry` interface. Bound once at
/// `SF_REGISTRY_OBJECT_PATH` (`spec.md` §6).
pub struct RegistryInterface {
    accounts: Vec<AccountDetails>,
}

impl RegistryInterface {
    pub fn new(accounts: Vec<AccountDetails>) -> Self {
        Self { accounts }
    }
}

#[zbus::interface(name = "com.storageframework.Registry")]
impl RegistryInterface {
    #[zbus(name = "List")]
    async fn list(&self) -> Vec<AccountDetails> {
        self.accounts.clone()
    }
}
