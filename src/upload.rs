//! Upload filename handling
//!
//! Client filenames are only used to pick the temp file suffix and the
//! download name; the final path component is all that is ever looked at.

/// Suffix used when the upload has no extension
pub const DEFAULT_INPUT_SUFFIX: &str = ".jpg";

/// Base name used when the upload has no filename
pub const DEFAULT_BASE_NAME: &str = "result";

/// Last component of a client path, accepting both `/` and `\` separators
#[must_use]
pub fn final_component(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Split a filename into base and extension
///
/// The extension starts at the last dot, unless every character before that
/// dot is also a dot (`.bashrc` has no extension).
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name.get(..idx).is_some_and(|head| head.chars().any(|c| c != '.')) => {
            name.split_at(idx)
        },
        _ => (name, ""),
    }
}

/// Temp file suffix for an upload, `.jpg` when there is no extension
#[must_use]
pub fn input_suffix(filename: Option<&str>) -> String {
    let (_, ext) = split_extension(final_component(filename.unwrap_or_default()));
    if ext.is_empty() {
        DEFAULT_INPUT_SUFFIX.to_string()
    } else {
        ext.to_string()
    }
}

/// Download name: upload base name with a `.png` extension
#[must_use]
pub fn download_filename(filename: Option<&str>) -> String {
    let name = final_component(filename.unwrap_or_default());
    let (base, _) = split_extension(name);
    let base = if base.is_empty() { DEFAULT_BASE_NAME } else { base };
    format!("{base}.png")
}

/// `Content-Disposition` value for an attachment named `filename`
///
/// Plain printable ASCII names are quoted directly; anything else is
/// percent-encoded as UTF-8 in the extended `filename*` parameter.
#[must_use]
pub fn content_disposition(filename: &str) -> String {
    let plain = filename
        .bytes()
        .all(|b| (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\');

    if plain {
        format!("attachment; filename=\"{filename}\"")
    } else {
        format!("attachment; filename*=utf-8''{}", percent_encode(filename))
    }
}

fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}
