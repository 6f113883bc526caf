use serde_json::json;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", pretty(&err));
    std::process::exit(4);
}

pub fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub fn exit_code_for_status(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    }
}

/// Optional parts of a request beyond method and path.
#[derive(Default)]
pub struct RequestParts<'a> {
    pub body: Option<serde_json::Value>,
    pub query: &'a [(String, String)],
    pub role: Option<&'a str>,
}

fn build_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    parts: RequestParts<'_>,
) -> Result<reqwest::RequestBuilder, String> {
    let mut url = reqwest::Url::parse(&format!("{api_url}{path}"))
        .map_err(|e| format!("Invalid URL: {api_url}{path}: {e}"))?;
    if !parts.query.is_empty() {
        let mut q = url.query_pairs_mut();
        for (k, v) in parts.query {
            q.append_pair(k, v);
        }
    }

    let mut req = client().request(method, url);
    if let Some(role) = parts.role {
        req = req.header("x-portal-role", role);
    }
    if let Some(b) = parts.body {
        req = req.json(&b);
    }
    Ok(req)
}

/// Execute an API request, print the response, return a structured exit code.
pub async fn api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    parts: RequestParts<'_>,
) -> i32 {
    let req = match build_request(api_url, method, path, parts) {
        Ok(r) => r,
        Err(message) => {
            eprintln!("{}", pretty(&json!({"error": "cli_error", "message": message})));
            return 4;
        }
    };

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            print_connection_error(&e);
            return 3;
        }
    };

    let status = resp.status().as_u16();
    let exit_code = exit_code_for_status(status);

    let text = resp.text().await.unwrap_or_default();
    let output = if text.is_empty() {
        json!({"status": status})
    } else {
        serde_json::from_str(&text).unwrap_or_else(
            |e| json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
        )
    };

    if exit_code == 0 {
        println!("{}", pretty(&output));
    } else {
        eprintln!("{}", pretty(&output));
    }

    exit_code
}

pub fn print_connection_error(e: &reqwest::Error) {
    let err = json!({
        "error": "connection_error",
        "message": format!("{e}"),
        "docs_hint": "Is the API server running? Check PORTAL_API_URL."
    });
    eprintln!("{}", pretty(&err));
}

/// Failure of a request whose response the caller wants to inspect.
#[derive(Debug)]
pub enum RawError {
    Usage(String),
    Connection(reqwest::Error),
}

impl RawError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RawError::Usage(_) => 4,
            RawError::Connection(_) => 3,
        }
    }

    pub fn report(&self) {
        match self {
            RawError::Usage(message) => {
                eprintln!("{}", pretty(&json!({"error": "cli_error", "message": message})))
            }
            RawError::Connection(e) => print_connection_error(e),
        }
    }
}

/// Execute an API request and return the response (no printing).
pub async fn raw_api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    parts: RequestParts<'_>,
) -> Result<(u16, serde_json::Value), RawError> {
    let req = build_request(api_url, method, path, parts).map_err(RawError::Usage)?;
    let resp = req.send().await.map_err(RawError::Connection)?;
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let body = if text.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(json!({"error": "non-json response", "body": text}))
    };
    Ok((status, body))
}

/// Read JSON from a file path or stdin (when path is "-").
pub fn read_json_from_file(path: &str) -> Result<serde_json::Value, String> {
    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin())
            .map_err(|e| format!("Failed to read stdin: {e}"))?
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))?
    };
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}
