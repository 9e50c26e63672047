use crate::UrlError;
use url::Url;

/// Bitmask controlling which normalization steps are applied to incoming
/// URLs. The default set matches what the crawler applies to every seed and
/// harvested link before deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeFlags(u32);

impl NormalizeFlags {
    /// No normalization beyond parsing.
    pub const NONE: NormalizeFlags = NormalizeFlags(0);

    /// Lowercase the scheme and host.
    pub const LOWERCASE: NormalizeFlags = NormalizeFlags(1 << 0);

    /// Drop an explicit port equal to the scheme default (80/443).
    pub const REMOVE_DEFAULT_PORT: NormalizeFlags = NormalizeFlags(1 << 1);

    /// Collapse runs of consecutive slashes in the path to one.
    pub const COLLAPSE_SLASHES: NormalizeFlags = NormalizeFlags(1 << 2);

    /// Strip the fragment component.
    pub const REMOVE_FRAGMENT: NormalizeFlags = NormalizeFlags(1 << 3);

    /// Decode percent-escapes of unreserved characters in the path.
    pub const DECODE_UNRESERVED: NormalizeFlags = NormalizeFlags(1 << 4);

    /// Checks whether every flag in `other` is set.
    pub fn contains(self, other: NormalizeFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for NormalizeFlags {
    fn default() -> Self {
        Self::LOWERCASE
            | Self::REMOVE_DEFAULT_PORT
            | Self::COLLAPSE_SLASHES
            | Self::REMOVE_FRAGMENT
            | Self::DECODE_UNRESERVED
    }
}

impl std::ops::BitOr for NormalizeFlags {
    type Output = NormalizeFlags;

    fn bitor(self, rhs: NormalizeFlags) -> NormalizeFlags {
        NormalizeFlags(self.0 | rhs.0)
    }
}

/// Normalizes a raw URL into its canonical form.
///
/// The raw string is parsed, resolved against `base` when it is relative,
/// and then rewritten according to `flags`. The canonical string of the
/// returned URL is the identity used for deduplication, so two spellings of
/// the same resource normalize to the same value.
///
/// # Arguments
///
/// * `raw` - The URL string as received (seed, link, or enqueue payload)
/// * `base` - Base URL for resolving relative references, if any
/// * `flags` - The normalization steps to apply
///
/// # Returns
///
/// * `Ok(Url)` - The canonical URL
/// * `Err(UrlError)` - The input could not be parsed or is unsupported
pub fn normalize(raw: &str, base: Option<&Url>, flags: NormalizeFlags) -> Result<Url, UrlError> {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(raw).map_err(|e| UrlError::Parse(e.to_string()))?,
            None => return Err(UrlError::Parse(format!("relative URL without base: {raw}"))),
        },
        Err(e) => return Err(UrlError::Parse(e.to_string())),
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = match url.host_str() {
        Some(host) => host.to_string(),
        None => return Err(UrlError::MissingHost),
    };

    if flags.contains(NormalizeFlags::LOWERCASE) {
        // The scheme is already lowercased by the parser; the host may carry
        // its original casing when it came from a caller-built Url.
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::Parse(e.to_string()))?;
        }
    }

    if flags.contains(NormalizeFlags::REMOVE_DEFAULT_PORT) {
        let default = match url.scheme() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        if url.port().is_some() && url.port() == default {
            let _ = url.set_port(None);
        }
    }

    if flags.contains(NormalizeFlags::COLLAPSE_SLASHES) {
        let path = url.path();
        if path.contains("//") {
            let collapsed = collapse_slashes(path);
            url.set_path(&collapsed);
        }
    }

    if flags.contains(NormalizeFlags::REMOVE_FRAGMENT) {
        url.set_fragment(None);
    }

    if flags.contains(NormalizeFlags::DECODE_UNRESERVED) {
        let path = url.path();
        if path.contains('%') {
            let decoded = decode_unreserved(path);
            url.set_path(&decoded);
        }
    }

    Ok(url)
}

/// Collapses runs of consecutive slashes in a path to a single slash.
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;

    for c in path.chars() {
        if c == '/' {
            if !last_was_slash {
                out.push(c);
            }
            last_was_slash = true;
        } else {
            out.push(c);
            last_was_slash = false;
        }
    }

    out
}

/// Decodes percent-escapes whose octet is an unreserved character
/// (ALPHA / DIGIT / "-" / "." / "_" / "~"); all other escapes are kept.
fn decode_unreserved(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(path.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            if let Ok(value) = u8::from_str_radix(&path[i + 1..i + 3], 16) {
                if value.is_ascii_alphanumeric() || matches!(value, b'-' | b'.' | b'_' | b'~') {
                    out.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    // Input came from Url::path() and decoded octets are ASCII, so the
    // result is valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| {
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    })
}
