//! Tests for the HTTP transport against a mock server

use super::*;

use bytes::Bytes;
use packman_core::types::PackId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::parser::{parse_line_stream, NoopListener};
use crate::transport::{
    CommandRequest, Endpoint, FilePart, CMD_DELETE, CMD_INSTALL, CMD_UPLOAD, HTML_SERVICE_PATH, KEY_FORCE,
    KEY_PACKAGE, MIME_ZIP,
};

// admin:admin
const BASIC_ADMIN: &str = "Basic YWRtaW46YWRtaW4=";

fn transport_for(server: &MockServer) -> ReqwestTransport {
    ReqwestTransport::with_config(TransportConfig {
        base_url: format!("{}/", server.uri()),
        ..TransportConfig::default()
    })
    .unwrap()
}

fn sample_id() -> PackId {
    PackId::from_parts("test-packmgr", "test-packmgr-client", Some("1.0")).unwrap()
}

/// Read one request head and its `Content-Length` body
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }
}

/// Serve one console response whose parts are written after the given delays
async fn trickling_server(parts: Vec<(u64, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/html;charset=utf-8\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        for (delay_ms, part) in parts {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if socket.write_all(part.as_bytes()).await.is_err() {
                return;
            }
        }
    });
    format!("http://{}", addr)
}

fn transport_with_timeout(base_url: String, request_timeout: Duration) -> ReqwestTransport {
    ReqwestTransport::with_config(TransportConfig {
        base_url,
        request_timeout,
        ..TransportConfig::default()
    })
    .unwrap()
}

#[test]
fn test_transport_config_default() {
    let config = TransportConfig::default();
    assert_eq!(config.base_url, "http://localhost:4502");
    assert_eq!(config.username, "admin");
    assert_eq!(config.password, "admin");
    assert!(config.user_agent.starts_with("packman/"));
}

#[test]
fn test_base_url_trailing_slashes_are_trimmed() {
    let transport = ReqwestTransport::with_config(TransportConfig {
        base_url: "http://localhost:4502//".to_string(),
        ..TransportConfig::default()
    })
    .unwrap();
    assert_eq!(transport.base_url(), "http://localhost:4502");
}

#[test]
fn test_invalid_base_url_is_rejected() {
    let result = ReqwestTransport::with_config(TransportConfig {
        base_url: "localhost:4502".to_string(),
        ..TransportConfig::default()
    });
    assert!(matches!(result, Err(PackmanError::ConfigValidation { .. })));

    let result = ReqwestTransport::with_config(TransportConfig {
        base_url: "not a url".to_string(),
        ..TransportConfig::default()
    });
    assert!(matches!(result, Err(PackmanError::ConfigValidation { .. })));
}

#[tokio::test]
async fn test_probe_method_not_allowed_is_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JSON_SERVICE_PATH))
        .and(header("authorization", BASIC_ADMIN))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let availability = transport_for(&server)
        .probe(false, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(availability, Availability::Ready);
}

#[tokio::test]
async fn test_probe_unauthorized_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JSON_SERVICE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = transport_for(&server).probe(false, Duration::ZERO).await;
    assert!(matches!(result, Err(PackmanError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_probe_other_status_is_unready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JSON_SERVICE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let availability = transport_for(&server)
        .probe(true, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(availability, Availability::Unready);
}

#[tokio::test]
async fn test_probe_slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JSON_SERVICE_PATH))
        .respond_with(ResponseTemplate::new(405).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let result = transport_for(&server)
        .probe(true, Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(PackmanError::ServiceTimeout { .. })));
}

#[tokio::test]
async fn test_probe_refused_connection_is_unready() {
    let transport = ReqwestTransport::with_config(TransportConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        connect_timeout: Duration::from_secs(2),
        ..TransportConfig::default()
    })
    .unwrap();

    let availability = transport.probe(false, Duration::ZERO).await.unwrap();
    assert_eq!(availability, Availability::Unready);
}

#[tokio::test]
async fn test_execute_simple_posts_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/crx/packmgr/service/exec.json/etc/packages/test-packmgr/test-packmgr-client-1.0.zip",
        ))
        .and(header("authorization", BASIC_ADMIN))
        .and(body_string_contains("cmd=delete"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"success":true,"msg":"Package deleted"}"#,
            "application/json;charset=utf-8",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let request = CommandRequest::new(Endpoint::Json, CMD_DELETE).for_pack_id(&sample_id());
    let response = transport_for(&server).execute_simple(&request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.charset.as_deref(), Some("utf-8"));
    assert!(response.text().contains("Package deleted"));
}

#[tokio::test]
async fn test_execute_simple_with_file_uses_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(JSON_SERVICE_PATH))
        .and(query_param("cmd", "upload"))
        .and(query_param("force", "true"))
        .and(body_string_contains("name=\"package\""))
        .and(body_string_contains("filename=\"pack.zip\""))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"success":true}"#, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let request = CommandRequest::new(Endpoint::Json, CMD_UPLOAD)
        .with_param(
            KEY_PACKAGE,
            FilePart {
                file_name: "pack.zip".to_string(),
                mime_type: MIME_ZIP.to_string(),
                bytes: Bytes::from_static(b"PK\x03\x04"),
            },
        )
        .with_param(KEY_FORCE, true);

    let response = transport_for(&server).execute_simple(&request).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_execute_streaming_decodes_lines() {
    let server = MockServer::start().await;
    let mut body = b"<body><h2>Installing content</h2>\r\n".to_vec();
    body.extend_from_slice(b"<span class=\"A\"><b>A</b>&nbsp;/content/caf\xe9</span><br>\n");
    body.extend_from_slice(b"</div><br>Package installed in 4ms.<br>\n");

    Mock::given(method("POST"))
        .and(path(format!(
            "{}/etc/packages/test-packmgr/test-packmgr-client-1.0.zip",
            HTML_SERVICE_PATH
        )))
        .and(body_string_contains("cmd=install"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=ISO-8859-1"))
        .mount(&server)
        .await;

    let request = CommandRequest::new(Endpoint::Html, CMD_INSTALL).for_pack_id(&sample_id());
    let response = transport_for(&server).execute_streaming(&request).await.unwrap();
    assert_eq!(response.status, 200);

    let lines: Vec<String> = response.lines.map(|l| l.unwrap()).collect().await;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "<body><h2>Installing content</h2>");
    assert!(lines[1].contains("/content/café"));
}

#[tokio::test]
async fn test_streaming_install_outlives_request_timeout() {
    let base_url = trickling_server(vec![
        (0, "<body><h2>Installing content</h2>\n"),
        (400, "<span class=\"A\"><b>A</b>&nbsp;/apps/test-packmgr</span><br>\n"),
        (400, "<span class=\"A\"><b>A</b>&nbsp;/apps/test-packmgr/components</span><br>\n"),
        (400, "<span class=\"A\"><b>A</b>&nbsp;/apps/test-packmgr/config</span><br>\n"),
        (400, "</div><br>Package installed in 1600ms.<br>\n"),
    ])
    .await;
    let transport = transport_with_timeout(base_url, Duration::from_secs(1));

    let request = CommandRequest::new(Endpoint::Html, CMD_INSTALL).for_pack_id(&sample_id());
    let response = transport.execute_streaming(&request).await.unwrap();
    let result = parse_line_stream(response.lines, &mut NoopListener).await.unwrap();

    assert!(result.success);
    assert_eq!(result.duration_millis, 1600);
}

#[tokio::test]
async fn test_streaming_stall_is_service_timeout() {
    let base_url = trickling_server(vec![
        (0, "<body><h2>Installing content</h2>\n"),
        (3000, "</div><br>Package installed in 3000ms.<br>\n"),
    ])
    .await;
    let transport = transport_with_timeout(base_url, Duration::from_millis(500));

    let request = CommandRequest::new(Endpoint::Html, CMD_INSTALL).for_pack_id(&sample_id());
    let response = transport.execute_streaming(&request).await.unwrap();
    let result = parse_line_stream(response.lines, &mut NoopListener).await;

    assert!(matches!(result, Err(PackmanError::ServiceTimeout { .. })));
}

#[tokio::test]
async fn test_streaming_response_head_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<body><h2>Installing content</h2>\n", "text/html")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let transport = transport_with_timeout(server.uri(), Duration::from_millis(200));

    let request = CommandRequest::new(Endpoint::Html, CMD_INSTALL).for_pack_id(&sample_id());
    let result = transport.execute_streaming(&request).await;

    assert!(matches!(result, Err(PackmanError::ServiceTimeout { .. })));
}

#[tokio::test]
async fn test_list_sends_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("q", "packmgr"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"results":[],"total":0}"#, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport_for(&server).list(Some("packmgr")).await.unwrap();
    assert_eq!(response.text(), r#"{"results":[],"total":0}"#);
}

#[tokio::test]
async fn test_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(body_string_contains("j_username=admin"))
        .and(body_string_contains("j_validate=true"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "login-token=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(body_string_contains("j_username=nobody"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    assert!(transport.login("admin", "admin").await.unwrap());
    assert!(!transport.login("nobody", "secret").await.unwrap());
}
