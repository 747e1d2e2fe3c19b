#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::ssl::{NameType, Ssl, SslAcceptor, SslMethod};
use openssl::x509::{X509NameBuilder, X509};
use relay_probe::ProbeConfig;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_openssl::SslStream;

pub const FULL_META: &str = r#"{"clientIp":"1.2.3.4","asOrganization":"Acme","country":"US","asn":"13335","colo":"LAX","httpProtocol":"HTTP/1.1","latitude":"34.05","longitude":"-118.25"}"#;

/// What the fake relay saw from the prober.
#[derive(Debug)]
pub struct Captured {
    pub sni: Option<String>,
    pub request: String,
}

pub fn probe_config() -> ProbeConfig {
    ProbeConfig {
        connect_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        ..ProbeConfig::default()
    }
}

pub fn http_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}"
    )
    .into_bytes()
}

fn acceptor() -> SslAcceptor {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "relay.test").unwrap();
    let name = name.build();

    let mut cert = X509::builder().unwrap();
    cert.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    cert.set_serial_number(&serial).unwrap();
    cert.set_subject_name(&name).unwrap();
    cert.set_issuer_name(&name).unwrap();
    cert.set_pubkey(&key).unwrap();
    cert.set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    cert.set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    cert.sign(&key, MessageDigest::sha256()).unwrap();
    let cert = cert.build();

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    builder.set_private_key(&key).unwrap();
    builder.set_certificate(&cert).unwrap();
    builder.check_private_key().unwrap();
    builder.build()
}

/// How the fake relay ends the connection once its chunks are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Close {
    /// Send a TLS close_notify before closing TCP.
    Notify,
    /// Drop the socket without any TLS shutdown.
    Drop,
}

/// A single-connection TLS relay that answers with `chunks`, pausing `gap`
/// between them, then closes with a close_notify.
pub async fn spawn_tls_relay(
    chunks: Vec<Vec<u8>>,
    gap: Duration,
) -> (SocketAddr, JoinHandle<Captured>) {
    spawn_tls_relay_closing(chunks, gap, Close::Notify).await
}

pub async fn spawn_tls_relay_closing(
    chunks: Vec<Vec<u8>>,
    gap: Duration,
    close: Close,
) -> (SocketAddr, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = acceptor();

    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ssl = Ssl::new(acceptor.context()).unwrap();
        let mut tls = SslStream::new(ssl, tcp).unwrap();
        Pin::new(&mut tls).accept().await.unwrap();
        let sni = tls
            .ssl()
            .servername(NameType::HOST_NAME)
            .map(str::to_string);

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = tls.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        // The client may hang up mid-response; stop writing when it does.
        for chunk in chunks {
            if tls.write_all(&chunk).await.is_err() || tls.flush().await.is_err() {
                break;
            }
            if !gap.is_zero() {
                tokio::time::sleep(gap).await;
            }
        }
        match close {
            Close::Notify => {
                let _ = tls.shutdown().await;
            }
            Close::Drop => drop(tls),
        }

        Captured {
            sni,
            request: String::from_utf8_lossy(&request).into_owned(),
        }
    });

    (addr, handle)
}
