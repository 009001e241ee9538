//! Local HTTP server with canned responses, for client and directory tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serve `(path, status, body)` routes on an ephemeral port. Unknown paths
/// get a 404. Returns the base URL and a counter of requests handled.
pub async fn serve(routes: &[(&str, u16, &str)]) -> (String, Arc<AtomicU32>) {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let routes: Arc<Vec<(String, u16, String)>> = Arc::new(
    routes
      .iter()
      .map(|(path, status, body)| (path.to_string(), *status, body.to_string()))
      .collect(),
  );
  let hits = Arc::new(AtomicU32::new(0));

  let counter = Arc::clone(&hits);
  tokio::spawn(async move {
    while let Ok((socket, _)) = listener.accept().await {
      counter.fetch_add(1, Ordering::SeqCst);
      tokio::spawn(respond(socket, Arc::clone(&routes)));
    }
  });

  (format!("http://{}", addr), hits)
}

async fn respond(mut socket: TcpStream, routes: Arc<Vec<(String, u16, String)>>) {
  let mut request = Vec::new();
  let mut chunk = [0u8; 1024];
  loop {
    let n = socket.read(&mut chunk).await.unwrap_or(0);
    if n == 0 {
      break;
    }
    request.extend_from_slice(&chunk[..n]);
    if request.windows(4).any(|w| w == b"\r\n\r\n") {
      break;
    }
  }

  let head = String::from_utf8_lossy(&request);
  let path = head.split_whitespace().nth(1).unwrap_or("/");
  let (status, body) = routes
    .iter()
    .find(|(p, _, _)| p == path)
    .map(|(_, status, body)| (*status, body.as_str()))
    .unwrap_or((404, "Not Found"));

  let response = format!(
    "HTTP/1.1 {} {}\r\n\
     content-type: application/json\r\n\
     content-length: {}\r\n\
     connection: close\r\n\r\n{}",
    status,
    if status == 200 { "OK" } else { "Error" },
    body.len(),
    body
  );
  let _ = socket.write_all(response.as_bytes()).await;
  let _ = socket.shutdown().await;
}
