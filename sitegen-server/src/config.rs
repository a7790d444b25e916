//! Server configuration from flags and environment.

use std::net::SocketAddr;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "sitegen-server", about = "HTTP front end for sitegen preview deploys")]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, env = "SITEGEN_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The listen address when `host` is a literal IP.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.listen_addr().parse().ok()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}
