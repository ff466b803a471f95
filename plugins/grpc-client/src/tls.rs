use std::collections::HashMap;

use tokio::sync::RwLock;
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

const INSECURE_CIPHER_MARKERS: &[&str] = &["RSA", "RC4", "3DES"];
const FORWARD_SECRET_MARKERS: &[&str] = &["ECDHE", "DHE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

/// Raw material for a single subscribed service's client TLS identity.
/// `ca_pem` is the service's server certificate's root, `client_identity`
/// is this application's own cert/key when mutual TLS is required.
#[derive(Debug, Clone)]
pub struct ServiceTlsMaterial {
    pub domain_name: String,
    pub ca_pem: Vec<u8>,
    pub client_identity_pem: Option<(Vec<u8>, Vec<u8>)>,
    pub cipher_suites: Vec<String>,
    pub min_tls_version: TlsVersion,
}

#[derive(Debug, thiserror::Error)]
pub enum TlsAssemblyError {
    #[error("CA certificate material is empty for service {0:?}")]
    EmptyCaCertificate(String),

    #[error("minimum TLS version {1:?} for service {0:?} is below the required TLS 1.2 floor")]
    MinVersionTooLow(String, TlsVersion),

    #[error("no configured cipher suite for service {0:?} advertises forward secrecy")]
    NoForwardSecrecy(String),

    #[error("cipher suite {1:?} for service {0:?} is on the rejected list (RSA key exchange, RC4, or 3DES)")]
    InsecureCipher(String, String),
}

fn assemble(service: &str, material: &ServiceTlsMaterial) -> Result<ClientTlsConfig, TlsAssemblyError> {
    if material.ca_pem.is_empty() {
        return Err(TlsAssemblyError::EmptyCaCertificate(service.to_string()));
    }
    if material.min_tls_version < TlsVersion::Tls12 {
        return Err(TlsAssemblyError::MinVersionTooLow(
            service.to_string(),
            material.min_tls_version,
        ));
    }

    for suite in &material.cipher_suites {
        let upper = suite.to_uppercase();
        let forward_secret = FORWARD_SECRET_MARKERS.iter().any(|marker| upper.contains(marker));
        if !forward_secret && INSECURE_CIPHER_MARKERS.iter().any(|marker| upper.contains(marker)) {
            return Err(TlsAssemblyError::InsecureCipher(service.to_string(), suite.clone()));
        }
    }
    if !material.cipher_suites.is_empty()
        && !material.cipher_suites.iter().any(|s| {
            let upper = s.to_uppercase();
            FORWARD_SECRET_MARKERS.iter().any(|marker| upper.contains(marker))
        })
    {
        return Err(TlsAssemblyError::NoForwardSecrecy(service.to_string()));
    }

    let mut tls = ClientTlsConfig::new()
        .domain_name(material.domain_name.clone())
        .ca_certificate(Certificate::from_pem(material.ca_pem.clone()));

    if let Some((cert, key)) = &material.client_identity_pem {
        tls = tls.identity(Identity::from_pem(cert.clone(), key.clone()));
    }

    Ok(tls)
}

/// Supplies the raw TLS material for a subscribed service. A deployment's
/// own certificate/secret store implements this; the client plug-in only
/// calls it once per subscribed service at startup and on refresh.
pub trait ClientCertificateProvider: Send + Sync {
    fn material_for(&self, service: &str) -> Option<ServiceTlsMaterial>;
}

/// Keeps a concurrent map of per-service client TLS credentials. Callers
/// never fall back to an insecure channel when a service has no
/// configuration: `get_credentials` returns an error instead.
pub struct ClientTlsManager {
    materials: RwLock<HashMap<String, ServiceTlsMaterial>>,
    built: RwLock<HashMap<String, ClientTlsConfig>>,
}

impl ClientTlsManager {
    pub fn new() -> Self {
        Self {
            materials: RwLock::new(HashMap::new()),
            built: RwLock::new(HashMap::new()),
        }
    }

    /// Validates and assembles credentials for `service`, replacing any
    /// previous configuration only after the new material passes every
    /// check.
    pub async fn set_service_config(
        &self,
        service: &str,
        material: ServiceTlsMaterial,
    ) -> Result<(), TlsAssemblyError> {
        let config = assemble(service, &material)?;
        self.materials.write().await.insert(service.to_string(), material);
        self.built.write().await.insert(service.to_string(), config);
        Ok(())
    }

    pub async fn get_credentials(&self, service: &str) -> Result<ClientTlsConfig, TlsAssemblyError> {
        self.built
            .read()
            .await
            .get(service)
            .cloned()
            .ok_or_else(|| TlsAssemblyError::EmptyCaCertificate(service.to_string()))
    }

    /// Rebuilds every registered service's credentials from its stored raw
    /// material. Returns the list of services whose rebuild failed; those
    /// services keep serving their last-known-good credentials rather than
    /// being torn down.
    pub async fn refresh_credentials(&self) -> Vec<(String, TlsAssemblyError)> {
        let materials = self.materials.read().await.clone();
        let mut failures = Vec::new();

        for (service, material) in &materials {
            match assemble(service, material) {
                Ok(config) => {
                    self.built.write().await.insert(service.clone(), config);
                }
                Err(err) => failures.push((service.clone(), err)),
            }
        }

        failures
    }
}

impl Default for ClientTlsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_material() -> ServiceTlsMaterial {
        ServiceTlsMaterial {
            domain_name: "orders.internal".to_string(),
            ca_pem: b"-----BEGIN CERTIFICATE-----\nfake\n-----END CERTIFICATE-----\n".to_vec(),
            client_identity_pem: None,
            cipher_suites: vec!["TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256".to_string()],
            min_tls_version: TlsVersion::Tls12,
        }
    }

    #[tokio::test]
    async fn rejects_empty_ca() {
        let manager = ClientTlsManager::new();
        let mut material = good_material();
        material.ca_pem.clear();
        let err = manager.set_service_config("orders", material).await.unwrap_err();
        assert!(matches!(err, TlsAssemblyError::EmptyCaCertificate(_)));
    }

    #[tokio::test]
    async fn rejects_weak_cipher() {
        let manager = ClientTlsManager::new();
        let mut material = good_material();
        material.cipher_suites = vec!["TLS_RSA_WITH_RC4_128_SHA".to_string()];
        let err = manager.set_service_config("orders", material).await.unwrap_err();
        assert!(matches!(err, TlsAssemblyError::InsecureCipher(_, _)));
    }

    #[tokio::test]
    async fn get_credentials_errors_when_unconfigured() {
        let manager = ClientTlsManager::new();
        assert!(manager.get_credentials("unknown").await.is_err());
    }

    #[tokio::test]
    async fn set_then_get_succeeds() {
        let manager = ClientTlsManager::new();
        manager.set_service_config("orders", good_material()).await.unwrap();
        assert!(manager.get_credentials("orders").await.is_ok());
    }

    #[tokio::test]
    async fn refresh_rebuilds_without_error_for_good_material() {
        let manager = ClientTlsManager::new();
        manager.set_service_config("orders", good_material()).await.unwrap();
        let failures = manager.refresh_credentials().await;
        assert!(failures.is_empty());
    }
}
