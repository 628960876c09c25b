//! Local preview server for the reader view.
//!
//! Binds a loopback listener and renders the current [`ReaderState`] as a
//! scrollable HTML page. Page images are served through their blob URLs, so
//! a handle that has been released answers 404 from that point on. Requests
//! are handled one at a time on purpose: a load triggered by the picker
//! finishes before the next request is accepted, which rules out two
//! extractions racing for the page list.
//!
//! Routes:
//! - `GET /` renders the reader (picker, fullscreen toggle, error region,
//!   page blocks with "Page X of N" captions)
//! - `GET /blob/{id}` serves a registered page image
//! - `POST /load` loads the archive named by the form field `name`
//! - `POST /fullscreen` toggles the display mode

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::reader::ReaderState;

const READ_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_HEADER_SIZE: usize = 1024 * 1024;
const MAX_BODY_SIZE: usize = 1024 * 1024;

struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

/// Serve the reader on `127.0.0.1:port`, optionally preloading `archive`.
///
/// Runs until the process is stopped. A preload failure is not fatal; the
/// page shows the error and the picker stays usable.
pub async fn run_server(archive: Option<&Path>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind 127.0.0.1:{port}"))?;
    serve_on(listener, archive).await
}

/// Serve the reader on an already-bound listener. Binding is the caller's
/// job, so a test or embedder can pick port 0 and read the actual address
/// back before handing the listener over.
pub async fn serve_on(listener: TcpListener, archive: Option<&Path>) -> Result<()> {
    let store = BlobStore::new();
    let mut state = ReaderState::new(store.clone());
    if let Some(path) = archive {
        state.load(Some(path)).await;
    }

    let addr = listener.local_addr()?;
    info!("Serving reader at http://{}:{}/", addr.ip(), addr.port());

    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!("Accept error: {}", err);
                continue;
            }
        };
        if let Err(err) = handle_connection(&mut stream, &mut state, &store).await {
            warn!("Request error: {:#}", err);
        }
    }
}

async fn handle_connection(
    stream: &mut TcpStream,
    state: &mut ReaderState,
    store: &BlobStore,
) -> Result<()> {
    let req = match tokio::time::timeout(READ_TIMEOUT, read_http_request(stream)).await {
        Ok(req) => req?,
        Err(_) => bail!("request timed out"),
    };
    let path = req.path.split('?').next().unwrap_or(&req.path);

    match (req.method.as_str(), path) {
        ("GET", "/") => {
            let body = render_page(state);
            write_http_response(stream, "200 OK", "text/html; charset=utf-8", body.as_bytes())
                .await
        }
        ("GET", blob_path) if blob_path.starts_with("/blob/") => {
            let blob = blob_path
                .strip_prefix("/blob/")
                .and_then(|id| id.parse::<u64>().ok())
                .and_then(|id| store.resolve(id));
            match blob {
                Some(blob) => {
                    write_http_response(stream, "200 OK", blob.content_type, &blob.data).await
                }
                None => {
                    write_http_response(
                        stream,
                        "404 Not Found",
                        "text/plain; charset=utf-8",
                        b"unknown or revoked image",
                    )
                    .await
                }
            }
        }
        ("POST", "/load") => {
            let name = form_value(&req.body, "name")
                .or_else(|| {
                    req.path
                        .split_once('?')
                        .and_then(|(_, query)| form_value(query.as_bytes(), "name"))
                })
                .filter(|name| !name.is_empty());
            state.load(name.as_deref().map(Path::new)).await;
            write_redirect(stream, "/").await
        }
        ("POST", "/fullscreen") => {
            state.toggle_fullscreen();
            write_redirect(stream, "/").await
        }
        ("GET", "/favicon.ico") => {
            write_http_response(stream, "204 No Content", "text/plain", &[]).await
        }
        _ => {
            write_http_response(stream, "404 Not Found", "text/plain; charset=utf-8", b"not found")
                .await
        }
    }
}

const PAGE_CSS: &str = "\
body{background:#111;color:#eee;font-family:sans-serif;max-width:860px;margin:0 auto;padding:1rem}\
body.fullscreen{max-width:none;padding:0}\
body.fullscreen .chrome{display:none}\
.chrome form{display:inline-block;margin-right:1rem}\
input[type=text]{width:24rem;padding:.3rem}\
.error{color:#f66}\
.page{margin:1.5rem 0}\
.page img{display:block;max-width:100%;margin:0 auto}\
figcaption{text-align:center;color:#999;margin-top:.4rem}";

/// Render the reader view for the current state.
pub fn render_page(state: &ReaderState) -> String {
    let total = state.pages().len();
    let mut html = String::with_capacity(2048);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>CBZ Reader</title>\n<style>");
    html.push_str(PAGE_CSS);
    html.push_str("</style>\n</head>\n");
    if state.is_fullscreen() {
        html.push_str("<body class=\"fullscreen\">\n");
    } else {
        html.push_str("<body>\n");
    }

    html.push_str("<header class=\"chrome\">\n<h1>CBZ Reader</h1>\n");
    html.push_str(
        "<form method=\"post\" action=\"/load\">\n\
         <input type=\"text\" name=\"name\" placeholder=\"Path to a .cbz archive\">\n\
         <button type=\"submit\">Open</button>\n</form>\n",
    );
    let label = if state.is_fullscreen() {
        "Exit fullscreen"
    } else {
        "Enter fullscreen"
    };
    // Best effort: ask the browser for real fullscreen at click time; the
    // server-side flag is the source of truth either way.
    html.push_str(&format!(
        "<form method=\"post\" action=\"/fullscreen\" onsubmit=\"\
         (document.fullscreenElement?document.exitFullscreen():\
         document.documentElement.requestFullscreen()).catch(()=>{{}})\">\n\
         <button type=\"submit\">{label}</button>\n</form>\n",
    ));
    html.push_str("</header>\n");

    if let Some(err) = state.error() {
        html.push_str(&format!(
            "<p class=\"error\">Error: {}</p>\n",
            html_escape(&err.to_string())
        ));
    }

    for (index, page) in state.pages().iter().enumerate() {
        html.push_str(&format!(
            "<figure class=\"page\">\n<img src=\"{}\" alt=\"{}\">\n\
             <figcaption>Page {} of {}</figcaption>\n</figure>\n",
            page.handle.url(),
            html_escape(&page.name),
            index + 1,
            total,
        ));
    }

    html.push_str("</body>\n</html>\n");
    html
}

async fn read_http_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 1024];
    let mut header_end = None;

    while header_end.is_none() {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(idx) = find_header_end(&buf) {
            header_end = Some(idx);
            break;
        }
        if buf.len() > MAX_HEADER_SIZE {
            bail!("request header too large");
        }
    }

    let header_end = header_end.context("incomplete http request")?;
    let header_text = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().context("missing request line")?;

    let mut parts = request_line.split_whitespace();
    let method = parts.next().context("missing method")?.to_string();
    let path = parts.next().context("missing path")?.to_string();

    let mut content_length = 0usize;
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    // Client-declared, so bound it before it sizes the buffer.
    if content_length > MAX_BODY_SIZE {
        bail!("request body too large");
    }

    let mut body = Vec::with_capacity(content_length);
    if buf.len() > header_end + 4 {
        body.extend_from_slice(&buf[(header_end + 4)..]);
    }
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest { method, path, body })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

async fn write_http_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\
         Cache-Control: no-store\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(body).await?;
    Ok(())
}

async fn write_redirect(stream: &mut TcpStream, location: &str) -> Result<()> {
    let header = format!(
        "HTTP/1.1 303 See Other\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    );
    stream.write_all(header.as_bytes()).await?;
    Ok(())
}

/// Look up a key in a form-encoded byte string.
fn form_value(body: &[u8], key: &str) -> Option<String> {
    body.split(|&b| b == b'&').find_map(|pair| {
        let (raw_key, raw_value) = match pair.iter().position(|&b| b == b'=') {
            Some(idx) => (&pair[..idx], &pair[idx + 1..]),
            None => (pair, &pair[pair.len()..]),
        };
        (percent_decode(raw_key) == key).then(|| percent_decode(raw_value))
    })
}

/// Decode `%XX` escapes and `+` spaces. Works on bytes so a multibyte
/// escape sequence never splits a UTF-8 character.
fn percent_decode(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < raw.len() => {
                match (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi * 16 + lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
