//! Command line front end.
//!
//! Reads one line of JSON from stdin:
//! `{"hosts": ["203.0.113.7"], "protocol": "openttds"}`
//! and prints one JSON object with `version`, `status`, `message` and `output`.
//! `"show-protocols": true` lists the known protocols instead, and
//! `"custom-config-path"` replaces the embedded protocol configuration.

use std::error::Error;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use rgamequery::config::ConfigFile;
use rgamequery::info::QueryResult;
use rgamequery::query::query;
use rgamequery::registry::Registry;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct InputData {
    hosts: Vec<String>,
    protocol: String,
    show_protocols: bool,
    custom_config_path: String,
}

#[derive(Debug, Serialize)]
struct JsonResponse {
    version: &'static str,
    status: u16,
    message: String,
    output: Value,
}

impl JsonResponse {
    fn new(result: Result<Value, Box<dyn Error>>) -> Self {
        match result {
            Ok(output) => JsonResponse {
                version: env!("CARGO_PKG_VERSION"),
                status: 200,
                message: "OK".to_string(),
                output,
            },
            Err(e) => JsonResponse {
                version: env!("CARGO_PKG_VERSION"),
                status: 500,
                message: e.to_string(),
                output: json!({}),
            },
        }
    }
}

async fn run(input: InputData) -> Result<Value, Box<dyn Error>> {
    let registry = if input.custom_config_path.is_empty() {
        Registry::builtin()?
    } else {
        Registry::from_config(&ConfigFile::from_file(&input.custom_config_path)?)?
    };

    if input.show_protocols {
        let protocols: Vec<_> = registry.entries().map(|e| e.info()).collect();
        return Ok(json!({ "protocols": protocols }));
    }

    let host = match input.hosts.first() {
        None => return Err("No hosts specified.".into()),
        Some(host) if host.is_empty() => return Err("Please specify a valid IP.".into()),
        Some(host) => host,
    };
    if input.protocol.is_empty() {
        return Err("Please specify the protocol.".into());
    }
    if input.hosts.len() > 1 {
        debug!("only the first of {} hosts is queried", input.hosts.len());
    }

    let output = match query(&registry, &input.protocol, host, None).await {
        Ok(QueryResult::ServerInfo(entry)) => json!({ "server_info": entry }),
        Ok(QueryResult::Servers(list)) => json!({ "servers": list }),
        Err(e) => {
            error!("{} query against {} failed: {} ({})", input.protocol, host, e, e.kind());
            return Err(e.into());
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut line = String::new();
    let result = match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
        Ok(_) => match serde_json::from_str::<InputData>(&line) {
            Ok(input) => run(input).await,
            Err(e) => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    };

    let response = JsonResponse::new(result);
    match serde_json::to_string(&response) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            error!("failed to serialize response: {}", e);
            println!("{{}}");
        }
    }
}
