use crate::model::ProbeConfig;

const HEADER_END: &str = "\r\n\r\n";

/// The fixed metadata request. `Connection: close` makes the peer end the
/// stream after responding, which is how the reader knows it is done.
pub fn build_request(cfg: &ProbeConfig) -> String {
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\n\r\n",
        cfg.path, cfg.upstream_host, cfg.user_agent
    )
}

/// Splits a raw response at the first blank line into head and body.
pub fn split_head_body(response: &str) -> Option<(&str, &str)> {
    response.split_once(HEADER_END)
}

pub fn status_line(head: &str) -> &str {
    head.lines().next().unwrap_or_default()
}
