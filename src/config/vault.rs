use super::HclWriter;

/// Flag-driven Vault server configuration. Storage is the integrated file
/// backend unless a Consul address is given.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    pub api_addr: String,
    pub cluster_addr: String,
    pub address: String,
    pub cert_file: String,
    pub key_file: String,
    pub storage_path: String,
    pub consul_addr: String,
    pub consul_path: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            api_addr: String::new(),
            cluster_addr: String::new(),
            address: "0.0.0.0:8200".to_string(),
            cert_file: String::new(),
            key_file: String::new(),
            storage_path: "/opt/vault".to_string(),
            consul_addr: String::new(),
            consul_path: "vault/".to_string(),
        }
    }
}

impl VaultConfig {
    fn tls_enabled(&self) -> bool {
        !self.cert_file.is_empty() && !self.key_file.is_empty()
    }

    /// Render the vault.hcl contents.
    pub fn generate(&self) -> String {
        let mut hcl = HclWriter::new();

        hcl.block("listener \"tcp\"", |w| {
            w.string("address", &self.address);
            if self.tls_enabled() {
                w.string("tls_cert_file", &self.cert_file);
                w.string("tls_key_file", &self.key_file);
            } else {
                w.raw("tls_disable", true);
            }
        });

        if self.consul_addr.is_empty() {
            hcl.block("storage \"file\"", |w| {
                w.string("path", &self.storage_path);
            });
        } else {
            hcl.block("storage \"consul\"", |w| {
                w.string("address", &self.consul_addr);
                w.string("path", &self.consul_path);
            });
        }

        if !self.api_addr.is_empty() {
            hcl.string("api_addr", &self.api_addr);
        }
        if !self.cluster_addr.is_empty() {
            hcl.string("cluster_addr", &self.cluster_addr);
        }
        hcl.raw("ui", true);

        hcl.finish()
    }
}
