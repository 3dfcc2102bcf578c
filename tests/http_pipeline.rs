use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use khawarizmi::error::PipelineError;
use khawarizmi::pipeline::{HttpPipeline, Pipeline, PipelineRequest, WireSchema};
use khawarizmi::query::Query;

/// Serve one canned HTTP response and hand back the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/pipeline", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let length = text[..split]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buf.len() >= split + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request() -> PipelineRequest {
    PipelineRequest::new(Query::parse("sales by region").unwrap(), "gpt-4o-mini")
}

#[tokio::test]
async fn posts_intent_and_model_and_decodes_split_body() {
    let (url, server) = serve_once("200 OK", r#"{"report":"<p>ok</p>","charts":["<div>a</div>","<div>b</div>"]}"#).await;
    let pipeline = HttpPipeline::new(url, WireSchema::Split, None).unwrap();

    let response = pipeline.run(&request()).await.unwrap();
    assert_eq!(response.report_html, "<p>ok</p>");
    assert_eq!(response.chart_html_list, vec!["<div>a</div>", "<div>b</div>"]);

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /pipeline HTTP/1.1"));
    let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
    let sent: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(sent["intent"], "sales by region");
    assert_eq!(sent["model"], "gpt-4o-mini");
}

#[tokio::test]
async fn gateway_schema_keeps_sql() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"html_report":"<h2>Top</h2>","plots":["<div>p</div>"],"sql_query":"SELECT 1"}"#,
    )
    .await;
    let pipeline = HttpPipeline::new(url, WireSchema::Gateway, None).unwrap();

    let response = pipeline.run(&request()).await.unwrap();
    assert_eq!(response.report_html, "<h2>Top</h2>");
    assert_eq!(response.chart_html_list.len(), 1);
    assert_eq!(response.sql_query.as_deref(), Some("SELECT 1"));
    server.await.unwrap();
}

#[tokio::test]
async fn non_success_status_is_a_transport_failure() {
    let (url, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
    let pipeline = HttpPipeline::new(url, WireSchema::Split, None).unwrap();

    let err = pipeline.run(&request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Status { status: 500, .. }), "{err:?}");
    assert_eq!(err.kind(), "transport");
    server.await.unwrap();
}

#[tokio::test]
async fn unparseable_body_is_malformed() {
    let (url, server) = serve_once("200 OK", "<html>gateway error</html>").await;
    let pipeline = HttpPipeline::new(url, WireSchema::Split, None).unwrap();

    let err = pipeline.run(&request()).await.unwrap_err();
    assert_eq!(err.kind(), "malformed");
    server.await.unwrap();
}

#[tokio::test]
async fn wrong_field_types_are_malformed() {
    let (url, server) = serve_once("200 OK", r#"{"report":"<p>x</p>","charts":"not a list"}"#).await;
    let pipeline = HttpPipeline::new(url, WireSchema::Split, None).unwrap();

    let err = pipeline.run(&request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Malformed(_)), "{err:?}");
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/pipeline", listener.local_addr().unwrap());
    drop(listener);
    let pipeline = HttpPipeline::new(url, WireSchema::Split, None).unwrap();

    let err = pipeline.run(&request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Transport(_)), "{err:?}");
}
