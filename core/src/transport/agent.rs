//! Per-call ureq agent: configuration, connector chain and request.

use std::sync::{Arc, OnceLock};

use log::{debug, warn};
use ureq::http::{self, Response};
use ureq::tls::{Certificate, RootCerts, TlsConfig};
use ureq::unversioned::resolver::DefaultResolver;
use ureq::unversioned::transport::{ConnectProxyConnector, Connector, RustlsConnector, TcpConnector};
use ureq::{Agent, Body, Proxy};

use super::tap::{HandshakeMarker, Tap, TapConnector};
use super::{bracketed, Phase, TransferSpec, TransportError, TransportErrorKind};
use crate::http::HttpMethod;

static ROOT_CERTS: OnceLock<RootCerts> = OnceLock::new();

/// Platform certificates first, the bundled Mozilla roots when none could
/// be loaded.
fn root_certs() -> RootCerts {
    ROOT_CERTS
        .get_or_init(|| {
            let native = match rustls_native_certs::load_native_certs() {
                Ok(certs) => certs,
                Err(e) => {
                    warn!("could not load native root certificates: {e}");
                    Vec::new()
                }
            };
            debug!("loaded {} native root certificates", native.len());
            if native.is_empty() {
                RootCerts::WebPki
            } else {
                native
                    .iter()
                    .map(|der| Certificate::from_der(der.as_ref()).to_owned())
                    .collect::<Vec<_>>()
                    .into()
            }
        })
        .clone()
}

/// Build an agent whose connector chain reports into `tap`.
pub(super) fn build(spec: &TransferSpec<'_>, tap: &Arc<Tap>) -> Result<Agent, TransportError> {
    let options = spec.options;
    let proxy = match spec.proxy {
        Some((host, port)) => {
            let url = format!("http://{}:{port}", bracketed(host));
            let proxy = Proxy::new(&url).map_err(|e| {
                TransportError::new(TransportErrorKind::InvalidRequest, Phase::Connecting, format!("proxy {url}: {e}"))
            })?;
            Some(proxy)
        }
        None => None,
    };

    let config = Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .max_idle_connections(0)
        .user_agent(spec.agent)
        .accept_encoding("")
        .proxy(proxy)
        .max_response_header_size(options.max_head_bytes)
        .timeout_connect(options.connect_timeout)
        .timeout_send_request(options.io_timeout)
        .timeout_send_body(options.io_timeout)
        .timeout_recv_response(options.io_timeout)
        .timeout_recv_body(options.io_timeout)
        .tls_config(TlsConfig::builder().root_certs(root_certs()).build())
        .build();

    let connector = ()
        .chain(ConnectProxyConnector::default())
        .chain(TcpConnector::default())
        .chain(HandshakeMarker { tap: Arc::clone(tap) })
        .chain(RustlsConnector::default())
        .chain(TapConnector {
            tap: Arc::clone(tap),
            proxied: spec.proxy.is_some(),
        });

    Ok(Agent::with_parts(config, connector, DefaultResolver::default()))
}

/// Form bodies are the default for POST.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Send the request described by `spec` and wait for the response head.
///
/// Caller headers go first, in order. ureq adds `host`, `user-agent`,
/// `accept` and the body length; `connection: close` and the POST content
/// type are added here. Each automatic header is skipped when the caller
/// already supplied one with the same name.
pub(super) fn send(agent: &Agent, spec: &TransferSpec<'_>) -> Result<Response<Body>, ureq::Error> {
    let mut builder = http::Request::builder()
        .method(spec.method.as_str())
        .uri(spec.url());
    let mut has_connection = false;
    let mut has_content_type = false;
    for line in spec.headers {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            has_connection |= name.eq_ignore_ascii_case("connection");
            has_content_type |= name.eq_ignore_ascii_case("content-type");
            builder = builder.header(name, value.trim());
        }
    }
    if !has_connection {
        builder = builder.header(http::header::CONNECTION, "close");
    }
    if spec.method == HttpMethod::Post && !has_content_type {
        builder = builder.header(http::header::CONTENT_TYPE, FORM_CONTENT_TYPE);
    }
    match (spec.method, spec.body) {
        (HttpMethod::Post, Some(body)) => agent.run(builder.body(body).map_err(ureq::Error::Http)?),
        _ => agent.run(builder.body(()).map_err(ureq::Error::Http)?),
    }
}
