//! SIFEN SOAP client adapter.
//! mTLS SOAP 1.2 client for the authority's web services.
//! Provides bounded exponential-backoff retry for transient network failures.
//!
//! A response that arrives and can be classified is never retried, whatever
//! its class; only failures to obtain a response are.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Identity;

use crate::adapters::credentials::CredentialSource;
use crate::adapters::transport::SifenTransport;
use crate::domain::cdc::Cdc;
use crate::domain::constants::{
    PATH_QUERY_DE, PATH_QUERY_LOTE, PATH_RECEIVE_LOTE, SOAP_CONTENT_TYPE,
};
use crate::domain::response::{StatusResult, SubmissionResult};
use crate::domain::types::{CorrelationId, Environment, ProtocolId};
use crate::infra::config::SifenConfiguration;
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use crate::services::classifier::{classify_document_query, classify_status, classify_submission};
use crate::services::lote::LotePackage;
use crate::services::soap::{self, parse_response, ParsedResponse};

/// Configuration for SOAP HTTP operations.
#[derive(Debug, Clone)]
pub struct SifenHttpConfig {
    pub environment: Environment,
    pub timeout: Duration,
    pub retry_attempts: usize,
    pub retry_base_delay: Duration,
}

impl SifenHttpConfig {
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.environment.base_url())
    }

    /// Sleep before each retry: base, 2x base, 4x base, ...
    #[must_use]
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (1..self.retry_attempts)
            .map(|n| self.retry_base_delay.saturating_mul(1u32 << (n - 1).min(16)))
            .collect()
    }
}

impl From<&SifenConfiguration> for SifenHttpConfig {
    fn from(cfg: &SifenConfiguration) -> Self {
        Self {
            environment: cfg.environment,
            timeout: cfg.network_timeout(),
            retry_attempts: cfg.retry_attempts.max(1),
            retry_base_delay: cfg.retry_base_delay(),
        }
    }
}

/// HTTP adapter performing SOAP exchanges with a client certificate.
pub struct SifenHttpClient {
    cfg: SifenHttpConfig,
    credentials: CredentialSource,
    logger: Logger,
}

impl SifenHttpClient {
    /// `credentials` must already have passed [`resolve_credentials`]
    /// for transport use.
    ///
    /// [`resolve_credentials`]: crate::adapters::credentials::resolve_credentials
    #[must_use]
    pub fn new(cfg: SifenHttpConfig, credentials: CredentialSource, logger: &Logger) -> Self {
        Self {
            cfg,
            credentials,
            logger: logger.child("http"),
        }
    }

    /// Client carrying the TLS identity. Built per call so the decrypted key
    /// only lives for one exchange.
    fn client(&self) -> SifenResult<Client> {
        let (cert_pem, key_pem) = self.credentials.load()?.identity_pem()?;
        let identity = Identity::from_pkcs8_pem(&cert_pem, &key_pem).map_err(|e| {
            SifenError::CredentialError(format!("TLS identity rejected: {e}"))
        })?;
        Ok(Client::builder()
            .identity(identity)
            .timeout(self.cfg.timeout)
            .user_agent(concat!("sifen-signer/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    /// POST a SOAP envelope and parse the answer.
    pub fn exchange(&self, path: &str, envelope: &str) -> SifenResult<ParsedResponse> {
        self.exchange_with(&self.client()?, &self.cfg.url(path), envelope)
    }

    fn exchange_with(
        &self,
        client: &Client,
        url: &str,
        envelope: &str,
    ) -> SifenResult<ParsedResponse> {
        let delays = self.cfg.backoff_schedule();
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.logger.debug(&format!(
                "soap attempt {attempt} of {} -> {url}",
                self.cfg.retry_attempts
            ));
            match self.single_post(client, url, envelope) {
                Ok(body) => return parse_response(&body),
                Err(e) if e.is_transient() && attempt <= delays.len() => {
                    let delay = delays[attempt - 1];
                    self.logger
                        .warn(&format!("{url} failed ({e}), retrying in {delay:?}"));
                    thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn single_post(&self, client: &Client, url: &str, envelope: &str) -> SifenResult<String> {
        let resp = client
            .post(url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(envelope.to_string())
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        // SOAP 1.2 faults travel with HTTP 500; keep any envelope for classification
        if status.is_success() || body.contains("Envelope") {
            return Ok(body);
        }
        if status.is_server_error() {
            return Err(SifenError::NetworkError(format!("HTTP {status} from {url}")));
        }
        Err(SifenError::ProtocolError(format!(
            "HTTP {status} from {url} without a SOAP body"
        )))
    }
}

impl SifenTransport for SifenHttpClient {
    fn submit_lote(&mut self, package: &LotePackage) -> SifenResult<SubmissionResult> {
        let parsed = self.exchange(PATH_RECEIVE_LOTE, &package.soap_body)?;
        let result = classify_submission(&parsed);
        self.logger.info(&format!(
            "submit dId={}: {}",
            package.correlation_id,
            result.class()
        ));
        Ok(result)
    }

    fn query_lote(&mut self, protocol: &ProtocolId) -> SifenResult<StatusResult> {
        let envelope = soap::query_lote_request(&CorrelationId::generate(), protocol);
        let parsed = self.exchange(PATH_QUERY_LOTE, &envelope)?;
        Ok(classify_status(&parsed))
    }

    fn query_document(&mut self, cdc: &Cdc) -> SifenResult<StatusResult> {
        let envelope = soap::query_document_request(&CorrelationId::generate(), cdc);
        let parsed = self.exchange(PATH_QUERY_DE, &envelope)?;
        Ok(classify_document_query(&parsed, cdc.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CertPassword;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(attempts: usize) -> SifenHttpConfig {
        SifenHttpConfig {
            environment: Environment::Test,
            timeout: Duration::from_secs(5),
            retry_attempts: attempts,
            retry_base_delay: Duration::from_millis(200),
        }
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(
            config(4).backoff_schedule(),
            vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800)
            ]
        );
        assert!(config(1).backoff_schedule().is_empty());
    }

    #[test]
    fn urls_follow_environment() {
        assert_eq!(
            config(1).url(PATH_RECEIVE_LOTE),
            "https://sifen-test.set.gov.py/de/ws/async/recibe-lote.wsdl"
        );
        let mut prod = config(1);
        prod.environment = Environment::Prod;
        assert!(prod.url(PATH_QUERY_DE).starts_with("https://sifen.set.gov.py/"));
    }

    #[test]
    fn config_from_settings() {
        let settings = SifenConfiguration::default();
        let cfg = SifenHttpConfig::from(&settings);
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.backoff_schedule().len(), 2);
    }

    const SOAP_OK: &str = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body><ns2:rResEnviLoteDe xmlns:ns2="http://ekuatia.set.gov.py/sifen/xsd"><ns2:dCodRes>0300</ns2:dCodRes><ns2:dMsgRes>Lote recibido con éxito</ns2:dMsgRes><ns2:dProtConsLote>42</ns2:dProtConsLote></ns2:rResEnviLoteDe></env:Body></env:Envelope>"#;

    const SOAP_FAULT: &str = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body><env:Fault><env:Code><env:Value>env:Receiver</env:Value></env:Code><env:Reason><env:Text xml:lang="es">Error interno</env:Text></env:Reason></env:Fault></env:Body></env:Envelope>"#;

    /// Local HTTP server answering each request with the next canned
    /// response (the last one repeats). Returns its URL and a request count.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!(
            "http://{}{PATH_RECEIVE_LOTE}",
            listener.local_addr().unwrap()
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                read_request(&mut stream);
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (code, body) = responses[n.min(responses.len() - 1)];
                let reply = format!(
                    "HTTP/1.1 {code} Status\r\nContent-Type: application/soap+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        (url, hits)
    }

    fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn local_client(attempts: usize) -> SifenHttpClient {
        let mut cfg = config(attempts);
        cfg.retry_base_delay = Duration::from_millis(10);
        SifenHttpClient::new(
            cfg,
            CredentialSource::Pkcs12 {
                path: "unused.p12".into(),
                password: CertPassword::new("unused"),
            },
            &Logger::default(),
        )
    }

    #[test]
    fn server_error_is_retried_until_an_envelope_arrives() {
        let (url, hits) = serve(vec![(503, "unavailable"), (200, SOAP_OK)]);
        let client = local_client(3);
        let parsed = client
            .exchange_with(&Client::new(), &url, "<env:Envelope/>")
            .unwrap();
        assert_eq!(parsed.code.as_deref(), Some("0300"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retries_stop_at_the_configured_attempts() {
        let (url, hits) = serve(vec![(503, "unavailable")]);
        let err = local_client(3)
            .exchange_with(&Client::new(), &url, "<env:Envelope/>")
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn client_error_is_not_retried() {
        let (url, hits) = serve(vec![(400, "bad request"), (200, SOAP_OK)]);
        let err = local_client(3)
            .exchange_with(&Client::new(), &url, "<env:Envelope/>")
            .unwrap_err();
        assert!(matches!(err, SifenError::ProtocolError(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn soap_fault_is_returned_without_retry() {
        let (url, hits) = serve(vec![(500, SOAP_FAULT), (200, SOAP_OK)]);
        let parsed = local_client(3)
            .exchange_with(&Client::new(), &url, "<env:Envelope/>")
            .unwrap();
        assert_eq!(parsed.fault.as_deref(), Some("env:Receiver: Error interno"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
