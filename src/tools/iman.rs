//! `iMan`: man pages from man.he.net.

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const HOST: &str = "man.he.net";
const TIMEOUT: Duration = Duration::from_secs(10);

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static pattern compiles"));

pub fn fetch(topic: &str) -> Result<String> {
    let mut stream =
        TcpStream::connect((HOST, 80)).with_context(|| format!("can't connect to {HOST}"))?;
    stream.set_read_timeout(Some(TIMEOUT))?;
    write!(
        stream,
        "GET /?topic={topic}&section=all HTTP/1.1\r\nHost: {HOST}\r\nConnection: close\r\n\r\n"
    )?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw)?;
    debug!(topic, bytes = raw.len(), "man page fetched");
    let response = String::from_utf8_lossy(&raw);
    let (_, body) = response
        .split_once("\r\n\r\n")
        .ok_or_else(|| anyhow!("malformed response from {HOST}"))?;
    Ok(body.to_string())
}

/// Drop markup and decode the handful of entities the site uses.
pub fn strip_html(body: &str) -> String {
    TAG.replace_all(body, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

pub fn iman(topic: &str, out: &mut dyn Write) -> Result<()> {
    let page = strip_html(&fetch(topic)?);
    if page.contains("No matches for") {
        writeln!(out, "ERROR\n\tNo such command")?;
        return Ok(());
    }
    writeln!(out, "{}", page.trim())?;
    Ok(())
}
