#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use coinbase_cashout::auth::Credentials;
use coinbase_cashout::config::{Config, FeeSchedule};
use coinbase_cashout::policy::TimePolicy;
use coinbase_cashout::{Client, Result};
use httpmock::MockServer;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

pub const API_KEY: &str = "key-id";
/// base64 of "test-secret-key"
pub const SECRET: &str = "dGVzdC1zZWNyZXQta2V5";
pub const PASSPHRASE: &str = "hunter2-pass";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn credentials() -> Credentials {
    Credentials::new(API_KEY, SECRET, PASSPHRASE).expect("valid test credentials")
}

pub fn config(server: &MockServer) -> Result<Config> {
    Ok(Config::sandbox()?
        .with_host(&server.base_url())?
        .with_price_host(&server.base_url())?
        .with_fees(FeeSchedule::new(dec!(0.01), dec!(2.50))?))
}

pub fn client(server: &MockServer) -> Result<Client> {
    init_tracing();
    Client::new(config(server)?, credentials())
}

pub fn client_with_time_policy(server: &MockServer, time: TimePolicy) -> Result<Client> {
    init_tracing();
    Client::new(config(server)?.with_time_policy(time), credentials())
}
