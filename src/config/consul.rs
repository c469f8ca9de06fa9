use super::HclWriter;

/// Flag-driven Consul agent configuration.
#[derive(Clone, Debug)]
pub struct ConsulConfig {
    pub server: bool,
    pub ui: bool,
    pub connect: bool,
    pub datacenter: String,
    pub bind_addr: String,
    pub advertise_addr: String,
    pub client_addr: String,
    pub bootstrap_expect: u64,
    pub retry_join: Vec<String>,
    pub encrypt: String,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
    pub acl: bool,
    pub agent_token: String,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            server: false,
            ui: false,
            connect: false,
            datacenter: "dc1".to_string(),
            bind_addr: String::new(),
            advertise_addr: String::new(),
            client_addr: "0.0.0.0".to_string(),
            bootstrap_expect: 1,
            retry_join: Vec::new(),
            encrypt: String::new(),
            ca_file: String::new(),
            cert_file: String::new(),
            key_file: String::new(),
            acl: false,
            agent_token: String::new(),
        }
    }
}

impl ConsulConfig {
    fn tls_enabled(&self) -> bool {
        !self.ca_file.is_empty() && !self.cert_file.is_empty() && !self.key_file.is_empty()
    }

    /// Render the consul.hcl contents.
    pub fn generate(&self) -> String {
        let mut hcl = HclWriter::new();

        hcl.string("datacenter", &self.datacenter);
        hcl.string("data_dir", "/opt/consul");
        hcl.string("client_addr", &self.client_addr);

        if !self.bind_addr.is_empty() {
            hcl.string("bind_addr", &self.bind_addr);
        }
        if !self.advertise_addr.is_empty() {
            hcl.string("advertise_addr", &self.advertise_addr);
        }

        if self.server {
            hcl.raw("server", true);
            hcl.raw("bootstrap_expect", self.bootstrap_expect);
        }
        if self.ui {
            hcl.raw("ui", true);
        }

        if !self.retry_join.is_empty() {
            hcl.string_list("retry_join", &self.retry_join);
        }
        if !self.encrypt.is_empty() {
            hcl.string("encrypt", &self.encrypt);
        }

        if self.tls_enabled() {
            hcl.string("ca_file", &self.ca_file);
            hcl.string("cert_file", &self.cert_file);
            hcl.string("key_file", &self.key_file);
            hcl.raw("verify_incoming", true);
            hcl.raw("verify_outgoing", true);
            hcl.raw("verify_server_hostname", true);
        }

        if self.connect {
            hcl.block("connect", |w| {
                w.raw("enabled", true);
            });
        }

        if self.acl {
            hcl.block("acl", |w| {
                w.raw("enabled", true);
                w.string("default_policy", "deny");
                w.raw("enable_token_persistence", true);
                if !self.agent_token.is_empty() {
                    w.block("tokens", |w| {
                        w.string("agent", &self.agent_token);
                    });
                }
            });
        }

        hcl.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let generated = ConsulConfig::default().generate();

        assert_eq!(
            generated,
            concat!(
                "datacenter = \"dc1\"\n",
                "data_dir = \"/opt/consul\"\n",
                "client_addr = \"0.0.0.0\"\n",
            )
        );
    }

    #[test]
    fn test_server_layout() {
        let config = ConsulConfig {
            server: true,
            ui: true,
            connect: true,
            bind_addr: "10.0.0.5".to_string(),
            bootstrap_expect: 3,
            retry_join: vec!["10.0.0.1".to_string()],
            encrypt: "aPapu9ZyLcRtErhIeWzF8A==".to_string(),
            ..Default::default()
        };

        assert_eq!(
            config.generate(),
            concat!(
                "datacenter = \"dc1\"\n",
                "data_dir = \"/opt/consul\"\n",
                "client_addr = \"0.0.0.0\"\n",
                "bind_addr = \"10.0.0.5\"\n",
                "server = true\n",
                "bootstrap_expect = 3\n",
                "ui = true\n",
                "retry_join = [\"10.0.0.1\"]\n",
                "encrypt = \"aPapu9ZyLcRtErhIeWzF8A==\"\n",
                "connect {\n",
                "  enabled = true\n",
                "}\n",
            )
        );
    }

    #[test]
    fn test_acl_block() {
        let config = ConsulConfig {
            acl: true,
            agent_token: "21b533f5-061d-3e78-7032-64df11b484a5".to_string(),
            ..Default::default()
        };

        let generated = config.generate();
        assert!(generated.ends_with(concat!(
            "acl {\n",
            "  enabled = true\n",
            "  default_policy = \"deny\"\n",
            "  enable_token_persistence = true\n",
            "  tokens {\n",
            "    agent = \"21b533f5-061d-3e78-7032-64df11b484a5\"\n",
            "  }\n",
            "}\n",
        )));
    }
}
