use anyhow::{Result, bail};
use serde::Deserialize;
use tracing::debug;

/// Relevant part of a HashiCorp checkpoint API response.
#[derive(Debug, Deserialize)]
struct CheckResponse {
    current_version: String,
}

/// Look up the latest release version of a product.
pub fn latest_version(product: &str) -> Result<String> {
    let url = format!("https://checkpoint-api.hashicorp.com/v1/check/{product}");
    debug!(url, "requesting latest version");

    let response = reqwest::blocking::get(&url)?;
    if !response.status().is_success() {
        bail!("checkpoint API returned {}", response.status());
    }

    let check: CheckResponse = response.json()?;
    Ok(check.current_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_response() {
        let check: CheckResponse = serde_json::from_str(
            r#"{"product":"consul","current_version":"1.9.5","current_release":1618488600,
                "current_download_url":"https://releases.hashicorp.com/consul/1.9.5/"}"#,
        )
        .unwrap();

        assert_eq!(check.current_version, "1.9.5");
    }
}
