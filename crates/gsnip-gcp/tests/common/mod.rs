//! Shared helpers for the mock-server tests.

#![allow(dead_code)]

use gsnip_gcp::{ClientConfig, GcpClient};
use wiremock::MockServer;

pub const PROJECT: &str = "test-project";

/// Client that sends every service to `server`, without credentials, and
/// polls operations every millisecond.
pub fn client(server: &MockServer) -> GcpClient {
    let config = ClientConfig::for_endpoint(&server.uri())
        .with_project(PROJECT)
        .with_polling(1, 5);
    GcpClient::new(config).expect("client")
}

pub fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("utf-8 output")
}
