use std::error::Error as _;

use async_trait::async_trait;
use reqwest::header::{LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Response, Url};
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use crate::check::SslInfo;
use crate::clock::SharedClock;
use crate::config::HttpMethod;

use super::{ProbeError, ProbeRequest, ProbeResponse, Transport, tls};

const REDIRECT_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// reqwest-backed transport
///
/// Redirects are followed by hand so the hop count and the missing
/// `Location` case can be reported precisely.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    clock: SharedClock,
}

impl HttpTransport {
    pub fn new(clock: SharedClock) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .tls_info(true)
            .build()
            .map_err(|e| ProbeError::Request(error_chain(&e)))?;

        Ok(Self { client, clock })
    }

    async fn exchange(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
        let start = Instant::now();
        let mut url = Url::parse(&request.url).map_err(|e| ProbeError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let mut method = request.method;
        let mut hops = 0;
        let mut ssl = None;

        loop {
            trace!("{} {url}", method.as_str());
            let response = self
                .client
                .request(reqwest_method(method), url.clone())
                .header(USER_AGENT, &request.user_agent)
                .send()
                .await
                .map_err(|e| classify(e, request))?;

            if request.inspect_tls && ssl.is_none() && url.scheme() == "https" {
                ssl = self.peer_certificate(&response);
            }

            let status_code = response.status().as_u16();
            if request.follow_redirects && REDIRECT_CODES.contains(&status_code) {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or(ProbeError::RedirectWithoutLocation {
                        status: status_code,
                    })?;

                hops += 1;
                if hops > request.max_redirects {
                    return Err(ProbeError::TooManyRedirects {
                        max: request.max_redirects,
                    });
                }

                url = url.join(location).map_err(|e| ProbeError::InvalidUrl {
                    url: location.to_string(),
                    reason: e.to_string(),
                })?;
                if status_code == 303 && method != HttpMethod::Head {
                    method = HttpMethod::Get;
                }
                debug!(hops, "following redirect to {url}");
                continue;
            }

            let body = if method == HttpMethod::Head {
                String::new()
            } else {
                response.text().await.map_err(|e| classify(e, request))?
            };

            return Ok(ProbeResponse {
                status_code,
                response_time: start.elapsed(),
                body,
                final_url: url.to_string(),
                ssl,
            });
        }
    }

    fn peer_certificate(&self, response: &Response) -> Option<SslInfo> {
        let der = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()?
            .peer_certificate()?;
        tls::parse_certificate(der, self.clock.now())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(url = %request.url))]
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
        // The timeout spans every hop and the body read of one attempt
        tokio::time::timeout(request.timeout, self.exchange(request))
            .await
            .map_err(|_| ProbeError::Timeout(request.timeout))?
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Put => reqwest::Method::PUT,
    }
}

fn classify(error: reqwest::Error, request: &ProbeRequest) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout(request.timeout)
    } else if error.is_connect() {
        ProbeError::Connect(error_chain(&error))
    } else {
        ProbeError::Request(error_chain(&error))
    }
}

/// reqwest's Display omits the underlying cause, which is usually the useful part
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
