use super::HclWriter;

/// Flag-driven Nomad agent configuration. A node can be server, client or
/// both.
#[derive(Clone, Debug)]
pub struct NomadConfig {
    pub server: bool,
    pub client: bool,
    pub datacenter: String,
    pub node_name: String,
    pub address: String,
    pub advertise_addr: String,
    pub bootstrap_expect: u64,
    pub retry_join: Vec<String>,
    pub encrypt: String,
    pub acl: bool,
}

impl Default for NomadConfig {
    fn default() -> Self {
        Self {
            server: false,
            client: false,
            datacenter: "dc1".to_string(),
            node_name: String::new(),
            address: String::new(),
            advertise_addr: String::new(),
            bootstrap_expect: 1,
            retry_join: Vec::new(),
            encrypt: String::new(),
            acl: false,
        }
    }
}

impl NomadConfig {
    /// Render the nomad.hcl contents.
    pub fn generate(&self) -> String {
        let mut hcl = HclWriter::new();

        hcl.string("datacenter", &self.datacenter);
        hcl.string("data_dir", "/opt/nomad");

        if !self.node_name.is_empty() {
            hcl.string("name", &self.node_name);
        }
        if !self.address.is_empty() {
            hcl.string("bind_addr", &self.address);
        }

        if !self.advertise_addr.is_empty() {
            hcl.block("advertise", |w| {
                w.string("http", &self.advertise_addr);
                w.string("rpc", &self.advertise_addr);
                w.string("serf", &self.advertise_addr);
            });
        }

        if self.server {
            hcl.block("server", |w| {
                w.raw("enabled", true);
                w.raw("bootstrap_expect", self.bootstrap_expect);
                if !self.encrypt.is_empty() {
                    w.string("encrypt", &self.encrypt);
                }
                if !self.retry_join.is_empty() {
                    w.block("server_join", |w| {
                        w.string_list("retry_join", &self.retry_join);
                    });
                }
            });
        }

        if self.client {
            hcl.block("client", |w| {
                w.raw("enabled", true);
                if !self.retry_join.is_empty() {
                    w.block("server_join", |w| {
                        w.string_list("retry_join", &self.retry_join);
                    });
                }
            });
        }

        if self.acl {
            hcl.block("acl", |w| {
                w.raw("enabled", true);
            });
        }

        hcl.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_layout() {
        let config = NomadConfig {
            server: true,
            node_name: "nomad-1".to_string(),
            address: "10.0.0.5".to_string(),
            bootstrap_expect: 3,
            encrypt: "aPapu9ZyLcRtErhIeWzF8A==".to_string(),
            ..Default::default()
        };

        assert_eq!(
            config.generate(),
            concat!(
                "datacenter = \"dc1\"\n",
                "data_dir = \"/opt/nomad\"\n",
                "name = \"nomad-1\"\n",
                "bind_addr = \"10.0.0.5\"\n",
                "server {\n",
                "  enabled = true\n",
                "  bootstrap_expect = 3\n",
                "  encrypt = \"aPapu9ZyLcRtErhIeWzF8A==\"\n",
                "}\n",
            )
        );
    }

    #[test]
    fn test_client_with_retry_join() {
        let config = NomadConfig {
            client: true,
            retry_join: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
            ..Default::default()
        };

        assert_eq!(
            config.generate(),
            concat!(
                "datacenter = \"dc1\"\n",
                "data_dir = \"/opt/nomad\"\n",
                "client {\n",
                "  enabled = true\n",
                "  server_join {\n",
                "    retry_join = [\"10.0.0.1\", \"10.0.0.2\"]\n",
                "  }\n",
                "}\n",
            )
        );
    }

    #[test]
    fn test_advertise_block() {
        let config = NomadConfig {
            server: true,
            advertise_addr: "192.168.1.9".to_string(),
            ..Default::default()
        };

        let generated = config.generate();
        assert!(generated.contains(concat!(
            "advertise {\n",
            "  http = \"192.168.1.9\"\n",
            "  rpc = \"192.168.1.9\"\n",
            "  serf = \"192.168.1.9\"\n",
            "}\n",
        )));
    }
}
