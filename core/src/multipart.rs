//! `multipart/form-data` uploads.
//!
//! # Design
//! The body is assembled in memory before anything is sent: every file is read
//! up front, and a single unreadable file fails the whole upload so a partial
//! body never reaches the server. Part order on the wire is parameters first
//! (in unspecified order), then files in the order given, then the closing
//! delimiter.
//!
//! Field names and file names are written into quoted header parameters with
//! `"`, CR and LF percent-encoded, as browsers encode form submissions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::error::{ApiError, EncodingError};
use crate::http::{CachePolicy, HttpRequest};

/// Fixed timeout applied to every upload.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const CRLF: &str = "\r\n";

/// Form fields and files for one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    pub parameters: Option<HashMap<String, String>>,
    /// Form field name every file is attached under.
    pub file_field_name: String,
    pub file_locations: Option<Vec<PathBuf>>,
}

impl MultipartPayload {
    pub fn new(file_field_name: impl Into<String>) -> Self {
        Self {
            parameters: None,
            file_field_name: file_field_name.into(),
            file_locations: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.to_string());
        self
    }

    pub fn with_file(mut self, location: impl Into<PathBuf>) -> Self {
        self.file_locations
            .get_or_insert_with(Vec::new)
            .push(location.into());
        self
    }

    /// One-line summary used in diagnostics, e.g.
    /// `parameters: [name: John], fileKeyName: uploads, files: [/a/test.txt]`.
    ///
    /// Segments for absent or empty collections are omitted; `fileKeyName` is
    /// always present.
    pub fn string_value(&self) -> String {
        let mut segments = Vec::with_capacity(3);

        if let Some(parameters) = self.parameters.as_ref().filter(|p| !p.is_empty()) {
            let sorted: BTreeMap<_, _> = parameters.iter().collect();
            let rendered: Vec<String> = sorted
                .into_iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            segments.push(format!("parameters: [{}]", rendered.join(", ")));
        }

        segments.push(format!("fileKeyName: {}", self.file_field_name));

        if let Some(files) = self.file_locations.as_ref().filter(|f| !f.is_empty()) {
            let rendered: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
            segments.push(format!("files: [{}]", rendered.join(", ")));
        }

        segments.join(", ")
    }
}

impl fmt::Display for MultipartPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string_value())
    }
}

/// Fresh boundary token. Each upload gets its own.
pub fn generate_boundary() -> String {
    format!("Boundary-{}", Uuid::new_v4())
}

/// MIME type for `path` from its extension, `application/octet-stream` when
/// the extension is unknown.
pub fn mime_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Make `value` safe inside a quoted `Content-Disposition` parameter.
fn quote_param(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Serialise `payload` into a multipart body delimited by `boundary`.
pub fn encode_multipart(payload: &MultipartPayload, boundary: &str) -> Result<Vec<u8>, EncodingError> {
    let mut body = Vec::new();

    if let Some(parameters) = &payload.parameters {
        for (name, value) in parameters {
            body.extend_from_slice(format!("--{boundary}{CRLF}").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"{CRLF}{CRLF}",
                    quote_param(name)
                )
                .as_bytes(),
            );
            body.extend_from_slice(format!("{value}{CRLF}").as_bytes());
        }
    }

    for location in payload.file_locations.iter().flatten() {
        let contents = std::fs::read(location).map_err(|source| EncodingError::File {
            path: location.clone(),
            source,
        })?;
        let filename = location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.display().to_string());

        body.extend_from_slice(format!("--{boundary}{CRLF}").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"{CRLF}",
                quote_param(&payload.file_field_name),
                quote_param(&filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("Content-Type: {}{CRLF}{CRLF}", mime_type_for(location)).as_bytes(),
        );
        body.extend_from_slice(&contents);
        body.extend_from_slice(CRLF.as_bytes());
    }

    body.extend_from_slice(format!("--{boundary}--{CRLF}").as_bytes());
    Ok(body)
}

/// Replace the request body with a multipart encoding of `payload`.
///
/// Also sets the multipart content type, the upload timeout and a cache
/// policy that bypasses every cache.
pub fn attach_multipart(request: &mut HttpRequest, payload: &MultipartPayload) -> Result<(), ApiError> {
    let boundary = generate_boundary();
    let body = encode_multipart(payload, &boundary)?;

    request.set_header("Content-Type", format!("multipart/form-data; boundary={boundary}"));
    request.timeout = Some(UPLOAD_TIMEOUT);
    request.cache_policy = CachePolicy::ReloadIgnoringCache;
    request.body = Some(body);
    Ok(())
}
