//! Live exchanges with the authority's test environment.
//!
//! These tests need a real certificate enabled for the test environment.
//! Set SIFEN_LIVE_CERT (and SIFEN_LIVE_PASSWORD for PKCS#12 bundles), then
//! run with: cargo test --test live_sifen -- --ignored

mod common;

use std::time::Duration;

use common::test_env::{self, live_credentials};
use sifen_signer::infra::config::CredentialConfig;
use sifen_signer::services::cert_validator::CertificateUse;
use sifen_signer::{
    resolve_credentials, Cdc, Environment, Logger, ResponseClass, SifenHttpClient,
    SifenHttpConfig, SifenTransport,
};

fn client() -> Option<SifenHttpClient> {
    let live = live_credentials()?;
    let logger = Logger::new("live");
    let source = resolve_credentials(
        &CredentialConfig {
            cert_path: Some(live.cert_path),
            key_path: None,
            password: live.password,
        },
        CertificateUse::Transport,
        &logger,
    )
    .expect("live certificate should pass the trust checks");
    Some(SifenHttpClient::new(
        SifenHttpConfig {
            environment: Environment::Test,
            timeout: Duration::from_secs(30),
            retry_attempts: 2,
            retry_base_delay: Duration::from_millis(200),
        },
        source,
        &logger,
    ))
}

#[test]
#[ignore = "Requires a certificate enabled for the SIFEN test environment"]
fn document_query_reaches_the_authority() {
    let Some(mut client) = client() else {
        println!("{} not set, skipping", test_env::ENV_LIVE_CERT);
        return;
    };
    let cdc = std::env::var(test_env::ENV_LIVE_CDC)
        .unwrap_or_else(|_| common::SAMPLE_CDC.to_string());
    let cdc = Cdc::parse(&cdc).expect("SIFEN_LIVE_CDC must be a valid CDC");

    let result = client.query_document(&cdc).expect("exchange should complete");
    println!("query {}: {result:?}", cdc.as_str());
    // the sample code is never stored, so anything classified proves the channel
    assert_ne!(result.class(), ResponseClass::Unknown, "unclassified answer: {result:?}");
}
