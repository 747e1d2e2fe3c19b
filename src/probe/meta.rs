use crate::error::{ProbeError, Result};
use crate::model::{ProbeResult, Target, UNKNOWN};
use crate::region::{country_flag, country_name, RegionNames};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const MALFORMED: &str = "Failed to parse JSON from proxy";
const MISSING_CLIENT_IP: &str = "Invalid JSON response";

/// The upstream's `/meta` document. Every field is optional and kept as raw
/// JSON so that string and numeric encodings are both accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaRecord {
    client_ip: Option<Value>,
    as_organization: Option<Value>,
    country: Option<Value>,
    asn: Option<Value>,
    colo: Option<Value>,
    http_protocol: Option<Value>,
    latitude: Option<Value>,
    longitude: Option<Value>,
}

/// Parses a response body and requires a non-empty `clientIp`.
///
/// A document that parses but lacks `clientIp` is rejected just like
/// malformed input: both mean the candidate did not relay to the upstream.
pub fn parse_metadata(body: &str) -> Result<MetaRecord> {
    let value: Value =
        serde_json::from_str(body).map_err(|_| ProbeError::Parse(MALFORMED.into()))?;
    if !value.is_object() {
        return Err(ProbeError::Parse(MISSING_CLIENT_IP.into()));
    }
    let record: MetaRecord =
        serde_json::from_value(value).map_err(|_| ProbeError::Parse(MALFORMED.into()))?;
    if present(&record.client_ip).is_none() {
        return Err(ProbeError::Parse(MISSING_CLIENT_IP.into()));
    }
    Ok(record)
}

impl MetaRecord {
    pub fn client_ip(&self) -> Option<String> {
        present(&self.client_ip).map(display)
    }

    /// Builds the result, substituting defaults field by field.
    pub fn into_result(
        self,
        target: &Target,
        delay: Duration,
        regions: &dyn RegionNames,
        alive_label: &str,
    ) -> ProbeResult {
        let code = present(&self.country).and_then(Value::as_str);
        ProbeResult {
            address: target.address.clone(),
            port: target.port,
            is_alive: present(&self.client_ip).is_some(),
            as_organization: text_or_unknown(&self.as_organization),
            country_code: text_or_unknown(&self.country),
            country_name: country_name(regions, code),
            country_flag: country_flag(code),
            asn: present(&self.asn).and_then(parse_asn).unwrap_or(0),
            colo: text_or_unknown(&self.colo),
            http_protocol: text_or_unknown(&self.http_protocol),
            delay_ms: crate::util::duration_millis(delay),
            latitude: passthrough_or_unknown(self.latitude),
            longitude: passthrough_or_unknown(self.longitude),
            message: format!("{alive_label} Alive {}:{}", target.address, target.port),
        }
    }
}

/// Null, `false` and empty strings count as absent.
fn present(value: &Option<Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_or_unknown(value: &Option<Value>) -> String {
    present(value)
        .map(display)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

// Numeric 0 counts as present and passes through: 0 is a real latitude or
// longitude. A JavaScript `value || "Unknown"` fallback would have replaced it.
fn passthrough_or_unknown(value: Option<Value>) -> Value {
    if present(&value).is_some() {
        value.unwrap_or(Value::Null)
    } else {
        Value::String(UNKNOWN.to_string())
    }
}

fn parse_asn(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => leading_integer(s),
        _ => None,
    }
}

/// Integer prefix of a string, e.g. `" 13335 "` or `"13335abc"`.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
