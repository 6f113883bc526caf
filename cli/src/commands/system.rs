use serde_json::json;

use crate::util::{RequestParts, api_request, exit_code_for_status, pretty, raw_api_request};

pub async fn config(api_url: &str) -> i32 {
    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/system/config",
        RequestParts::default(),
    )
    .await
}

/// Print the OpenAPI document, or a compact endpoint list.
pub async fn discover(api_url: &str, endpoints_only: bool) -> i32 {
    let (status, spec) = match raw_api_request(
        api_url,
        reqwest::Method::GET,
        "/api-doc/openapi.json",
        RequestParts::default(),
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            e.report();
            return e.exit_code();
        }
    };

    if exit_code_for_status(status) != 0 {
        eprintln!("{}", pretty(&spec));
        return exit_code_for_status(status);
    }

    if !endpoints_only {
        println!("{}", pretty(&spec));
        return 0;
    }

    let endpoints = compact_endpoints(&spec);
    let output = json!({
        "total": endpoints.len(),
        "endpoints": endpoints,
        "base_url": api_url
    });
    println!("{}", pretty(&output));
    0
}

fn compact_endpoints(spec: &serde_json::Value) -> Vec<serde_json::Value> {
    let mut endpoints = Vec::new();
    let Some(paths) = spec.get("paths").and_then(|p| p.as_object()) else {
        return endpoints;
    };

    for (path, methods) in paths {
        let Some(methods_obj) = methods.as_object() else {
            continue;
        };
        for (method, details) in methods_obj {
            // Skip OpenAPI metadata keys
            if !["get", "post", "put", "delete", "patch"].contains(&method.as_str()) {
                continue;
            }
            let summary = details
                .get("summary")
                .and_then(|s| s.as_str())
                .unwrap_or("");
            endpoints.push(json!({
                "method": method.to_uppercase(),
                "path": path,
                "summary": summary,
            }));
        }
    }

    endpoints.sort_by(|a, b| {
        let pa = a["path"].as_str().unwrap_or("");
        let pb = b["path"].as_str().unwrap_or("");
        pa.cmp(pb).then_with(|| {
            let ma = a["method"].as_str().unwrap_or("");
            let mb = b["method"].as_str().unwrap_or("");
            ma.cmp(mb)
        })
    });
    endpoints
}
