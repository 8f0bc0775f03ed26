//! Loopback HTTP listener that captures the provider redirect for hosts
//! without a browser address bar of their own.

use crate::{AuthError, AuthResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info};

type RedirectSender = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// Waits on `127.0.0.1:<port>` for one `GET` to the callback path.
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
    path: String,
    timeout: Duration,
}

impl CallbackListener {
    /// Bind now so the callback URL is valid before the browser is opened.
    /// Port 0 picks a free port.
    pub async fn bind(port: u16, path: &str, timeout: Duration) -> AuthResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let port = listener.local_addr()?.port();
        info!(port, path, "Callback listener bound");
        Ok(Self {
            listener,
            port,
            path: path.to_string(),
            timeout,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL the provider should redirect to.
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}{}", self.port, self.path)
    }

    /// Serve until the redirect arrives and return it as an absolute URL,
    /// query string included.
    pub async fn wait_for_redirect(self) -> AuthResult<String> {
        let (tx, rx) = oneshot::channel::<String>();
        let tx: RedirectSender = Arc::new(Mutex::new(Some(tx)));

        let listener = self.listener;
        let port = self.port;
        let path = Arc::new(self.path);

        let server_handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let tx = tx.clone();
                        let path = path.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, port, &path, tx).await {
                                error!("Error handling callback connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        break;
                    }
                }
            }
        });

        let result = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(_)) => Err(AuthError::Config(
                "Callback listener stopped unexpectedly".to_string(),
            )),
            Err(_) => Err(AuthError::Timeout),
        };

        server_handle.abort();
        result
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    port: u16,
    callback_path: &str,
    tx: RedirectSender,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.split('?').next().unwrap_or_default().trim(), "Received request");

    // GET /oauth-success?accessToken=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    if method != "GET" {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let target_path = target.split('?').next().unwrap_or_default();
    if target_path != callback_path {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    send_response(&mut writer, 200, "OK", RECEIVED_PAGE).await?;

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(format!("http://localhost:{}{}", port, target));
    }

    Ok(())
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

const RECEIVED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Crown - Login received</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Login received</h1>
<p>You can close this window and return to the terminal.</p>
<script>history.replaceState(null, "", location.pathname);</script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn send_raw(port: u16, request: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_callback_url() {
        let listener = CallbackListener::bind(0, "/oauth-success", Duration::from_secs(1))
            .await
            .unwrap();
        assert_ne!(listener.port(), 0);
        assert_eq!(
            listener.callback_url(),
            format!("http://localhost:{}/oauth-success", listener.port())
        );
    }

    #[tokio::test]
    async fn test_returns_redirect_url() {
        let listener = CallbackListener::bind(0, "/oauth-success", Duration::from_secs(5))
            .await
            .unwrap();
        let port = listener.port();
        let waiter = tokio::spawn(listener.wait_for_redirect());

        let not_found = send_raw(port, "GET /elsewhere HTTP/1.1\r\n\r\n").await;
        assert!(not_found.starts_with("HTTP/1.1 404"));

        let wrong_method = send_raw(port, "POST /oauth-success HTTP/1.1\r\n\r\n").await;
        assert!(wrong_method.starts_with("HTTP/1.1 405"));

        let ok = send_raw(port, "GET /oauth-success?accessToken=a.b.c HTTP/1.1\r\n\r\n").await;
        assert!(ok.starts_with("HTTP/1.1 200"));

        let url = waiter.await.unwrap().unwrap();
        assert_eq!(
            url,
            format!("http://localhost:{}/oauth-success?accessToken=a.b.c", port)
        );
    }

    #[tokio::test]
    async fn test_times_out() {
        let listener = CallbackListener::bind(0, "/oauth-success", Duration::from_millis(50))
            .await
            .unwrap();
        let result = listener.wait_for_redirect().await;
        assert!(matches!(result, Err(AuthError::Timeout)));
    }
}
