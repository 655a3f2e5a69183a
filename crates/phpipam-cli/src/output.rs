//! Response rendering

use phpipam_client::ApiResponse;
use std::process::ExitCode;

/// Body as pretty-printed JSON, or verbatim text when it is not JSON
pub fn render_body(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned()),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Print the status line to stderr and the body to stdout
///
/// Returns a failing exit code for non-success statuses.
pub fn print_response(response: &ApiResponse) -> ExitCode {
    eprintln!("{}", response.status());

    if !response.body().is_empty() {
        println!("{}", render_body(response.body()));
    }

    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
