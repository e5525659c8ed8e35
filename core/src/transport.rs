//! Execution of `HttpRequest` values over the network.
//!
//! # Design
//! `Transport` is the only place the client touches I/O. The production
//! implementation wraps a blocking `reqwest` client: one call, one round
//! trip, no retries. Status codes are returned as data so the client applies
//! one uniform status rule. Tests swap in an in-memory transport.

use std::io;

use reqwest::blocking::multipart::Form;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Executes one HTTP round trip.
pub trait Transport {
    /// Send `request` and return the response whatever its status code.
    ///
    /// Files named by a multipart body are opened inside this call and
    /// released before it returns, whether the request succeeds or not.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        (**self).execute(request)
    }
}

/// Blocking `reqwest` transport authenticating every request with HTTP Basic
/// auth.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::blocking::Client,
    username: String,
    credential: SecretString,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_tls())
            .build()?;
        Ok(Self {
            http,
            username: config.username().to_string(),
            credential: config.credential().clone(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        debug!(
            method = %request.method,
            url = %request.url,
            params = request.query.len(),
            body = request.body.kind(),
            "sending request"
        );

        let mut builder = self
            .http
            .request(to_reqwest_method(request.method), &request.url)
            .basic_auth(&self.username, Some(self.credential.expose_secret()))
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.body(body),
            // The form owns the open files; they close when `send` returns.
            RequestBody::Multipart(parts) => builder.multipart(multipart_form(&parts)?),
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text()?;

        debug!(status, "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Open every part's file, in order, and attach it under its field name.
///
/// Field names go out verbatim. Architecture destinations contain `/`, and
/// the server ignores the percent-encoded `name*=` form.
fn multipart_form(parts: &[FilePart]) -> io::Result<Form> {
    parts.iter().try_fold(Form::new().percent_encode_noop(), |form, part| {
        form.file(part.field.clone(), &part.path)
    })
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::thread;

    use secrecy::SecretString;

    use super::*;

    /// Accept one connection, answer 200 and return the raw request text.
    fn capture_one_request(listener: TcpListener) -> String {
        let (mut stream, _) = listener.accept().unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let head = text[..header_end].to_ascii_lowercase();
            let complete = match head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
            {
                Some(len) => raw.len() >= header_end + 4 + len.trim().parse::<usize>().unwrap(),
                None => text.ends_with("0\r\n\r\n"),
            };
            if complete {
                break;
            }
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 7\r\nconnection: close\r\n\r\nsuccess")
            .unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[test]
    fn multipart_field_names_are_sent_verbatim() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || capture_one_request(listener));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.architecture");
        std::fs::write(&path, "<architecture/>").unwrap();

        let config = ClientConfig::new(
            &format!("http://{addr}"),
            "admin",
            SecretString::new("secret".into()),
            "demo",
        )
        .unwrap();
        let transport = ReqwestTransport::new(&config).unwrap();
        let response = transport
            .execute(HttpRequest {
                method: HttpMethod::Post,
                url: format!("http://{addr}/p/demo/architecture-upload/"),
                query: Vec::new(),
                headers: Vec::new(),
                body: RequestBody::Multipart(vec![FilePart {
                    field: "arch/core.architecture".to_string(),
                    path: path.clone(),
                }]),
            })
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "success");

        let raw = server.join().unwrap();
        assert!(
            raw.contains(
                "content-disposition: form-data; name=\"arch/core.architecture\"; filename=\"core.architecture\""
            ) || raw.contains(
                "Content-Disposition: form-data; name=\"arch/core.architecture\"; filename=\"core.architecture\""
            ),
            "unexpected multipart body:\n{raw}"
        );
        assert!(!raw.contains("name*="), "field name was percent-encoded:\n{raw}");
        assert!(raw.contains("<architecture/>"));
    }

    #[test]
    fn methods_map_to_reqwest() {
        assert_eq!(to_reqwest_method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(HttpMethod::Put), reqwest::Method::PUT);
        assert_eq!(to_reqwest_method(HttpMethod::Post), reqwest::Method::POST);
        assert_eq!(to_reqwest_method(HttpMethod::Delete), reqwest::Method::DELETE);
    }

    #[test]
    fn missing_file_fails_before_sending() {
        let parts = vec![FilePart {
            field: "report".to_string(),
            path: PathBuf::from("/definitely/not/here.xml"),
        }];
        let err = multipart_form(&parts).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
