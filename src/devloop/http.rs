//! Static file server for dev mode.
//!
//! Serves the output directory and injects the reload client script into
//! HTML responses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tiny_http::{Header, Response, Server};

/// Reload client injected before `</body>` of every served HTML page.
const RELOAD_SCRIPT: &str = r#"<script>
(function () {
  var proto = "ws://";
  var socket;
  function connect() {
    socket = new WebSocket(proto + "127.0.0.1:__WS_PORT__");
    socket.onmessage = function (raw) {
      var msg = JSON.parse(raw.data);
      if (msg.type === "reload") { location.reload(); }
      else if (msg.type === "reload_css") {
        document.querySelectorAll("link[rel=stylesheet]").forEach(function (link) {
          var url = new URL(link.href);
          url.searchParams.set("v", Date.now());
          link.href = url.toString();
        });
      } else if (msg.type === "build_error") {
        var overlay = document.getElementById("bengal-error-overlay");
        if (!overlay) {
          overlay = document.createElement("pre");
          overlay.id = "bengal-error-overlay";
          overlay.style.cssText = "position:fixed;inset:0;background:rgba(20,0,0,.92);color:#ffb4b4;padding:2rem;z-index:99999;overflow:auto;font:14px/1.5 monospace";
          document.body.appendChild(overlay);
        }
        overlay.textContent = msg.diagnostic.kind + ": " + msg.diagnostic.message + (msg.diagnostic.hint ? "\nhint: " + msg.diagnostic.hint : "");
      } else if (msg.type === "clear_error") {
        var overlay = document.getElementById("bengal-error-overlay");
        if (overlay) overlay.remove();
      }
    };
    socket.onclose = function () { setTimeout(connect, 1000); };
  }
  connect();
})();
</script>"#;

/// Dev HTTP server handle.
pub struct HttpServer {
    pub addr: String,
}

/// Start serving `output_dir` on `host:port`. Returns after spawning the
/// worker threads.
pub fn serve(output_dir: PathBuf, host: &str, port: u16, ws_port: u16) -> Result<HttpServer> {
    let addr = format!("{host}:{port}");
    let server = Server::http(&addr)
        .map_err(|e| anyhow::anyhow!("cannot bind {addr}: {e}"))
        .context("dev server bind failed")?;
    let script = RELOAD_SCRIPT.replace("__WS_PORT__", &ws_port.to_string());

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = respond(&output_dir, request.url(), &script);
            let _ = request.respond(response);
        }
    });

    Ok(HttpServer { addr })
}

fn respond(output_dir: &Path, url: &str, script: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let Some(path) = resolve(output_dir, url) else {
        return not_found(output_dir, script);
    };

    match std::fs::read(&path) {
        Ok(bytes) => {
            let mime = mime_for(&path);
            let body = if mime == "text/html" {
                inject_script(&bytes, script)
            } else {
                bytes
            };
            Response::from_data(body).with_header(content_type(mime))
        }
        Err(_) => not_found(output_dir, script),
    }
}

/// Map a URL path onto the output tree; directories serve their index.html.
fn resolve(output_dir: &Path, url: &str) -> Option<PathBuf> {
    let clean = url.split(['?', '#']).next().unwrap_or(url);
    let mut path = output_dir.to_path_buf();
    for segment in clean.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => path.push(other),
        }
    }
    if path.is_dir() {
        path.push("index.html");
    }
    path.is_file().then_some(path)
}

fn not_found(output_dir: &Path, script: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let body = std::fs::read(output_dir.join("404.html"))
        .map(|bytes| inject_script(&bytes, script))
        .unwrap_or_else(|_| b"<h1>404 Not Found</h1>".to_vec());
    Response::from_data(body)
        .with_header(content_type("text/html"))
        .with_status_code(404)
}

fn inject_script(bytes: &[u8], script: &str) -> Vec<u8> {
    let Ok(html) = std::str::from_utf8(bytes) else {
        return bytes.to_vec();
    };
    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..pos]);
            out.push_str(script);
            out.push_str(&html[pos..]);
            out.into_bytes()
        }
        None => {
            let mut out = html.to_string();
            out.push_str(script);
            out.into_bytes()
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn content_type(mime: &str) -> Header {
    Header::from_bytes(&b"Content-Type"[..], mime.as_bytes()).expect("static header")
}
