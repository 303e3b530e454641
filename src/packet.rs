use crate::error::QueryError;
use crate::info::ProtocolEntryInfo;

/// Key in [ProtocolEntryInfo] holding the request template.
pub const REQUEST_TEMPLATE_KEY: &str = "RequestPreludeTemplate";

/// A raw reply, tagged with the protocol it was requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    protocol: String,
    data: Vec<u8>,
}

impl Packet {
    pub fn new(protocol: impl Into<String>, data: Vec<u8>) -> Self {
        Packet {
            protocol: protocol.into(),
            data,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Serializes a request from `template`, filling `{{.Key}}` placeholders from `info`.
///
/// Substitution happens first, then escape decoding, so both the template
/// and the substituted values may carry `\xHH` style escapes for control bytes.
///
/// ```
/// use rgamequery::info::ProtocolEntryInfo;
/// use rgamequery::packet::build_request;
///
/// let mut info = ProtocolEntryInfo::new();
/// info.insert("PreludeFinisher".to_string(), r"\x00\x00".to_string());
/// let bytes = build_request(r"\x03{{.PreludeFinisher}}", &info).unwrap();
/// assert_eq!(bytes, vec![0x03, 0x00, 0x00]);
/// ```
pub fn build_request(template: &str, info: &ProtocolEntryInfo) -> Result<Vec<u8>, QueryError> {
    let expanded = substitute(template, info)?;
    unescape(&expanded)
}

fn substitute(template: &str, info: &ProtocolEntryInfo) -> Result<String, QueryError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| QueryError::Template(format!("unterminated placeholder in {:?}", template)))?;

        let inner = after[..end].trim();
        let key = inner
            .strip_prefix('.')
            .map(str::trim)
            .ok_or_else(|| QueryError::Template(format!("placeholder {:?} must start with '.'", inner)))?;
        let value = info
            .get(key)
            .ok_or_else(|| QueryError::Template(format!("undefined field {:?}", key)))?;
        out.push_str(value);

        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

fn unescape(text: &str) -> Result<Vec<u8>, QueryError> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let escape = *bytes
            .get(i + 1)
            .ok_or_else(|| QueryError::Template("trailing backslash".to_string()))?;
        match escape {
            b'x' => {
                let digits = bytes
                    .get(i + 2..i + 4)
                    .filter(|d| d.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|d| std::str::from_utf8(d).ok())
                    .and_then(|d| u8::from_str_radix(d, 16).ok())
                    .ok_or_else(|| QueryError::Template(format!("bad \\x escape at byte {}", i)))?;
                out.push(digits);
                i += 4;
                continue;
            }
            b'0' => out.push(0),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'\\' => out.push(b'\\'),
            other => {
                return Err(QueryError::Template(format!(
                    "unknown escape \\{}",
                    char::from(other)
                )))
            }
        }
        i += 2;
    }

    Ok(out)
}
