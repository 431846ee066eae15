use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;

use super::error::CatalogError;
use super::instrument::Instrument;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the raw JSON-lines body from `url`, transparently
/// decompressing a gzip-encoded response.
pub async fn fetch_body(client: &reqwest::Client, url: &str) -> Result<String, CatalogError> {
    let response = client
        .get(url)
        .header("Accept-Encoding", "gzip")
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| CatalogError::Fetch(e.to_string()))?;

    let is_gzip = response
        .headers()
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| CatalogError::Io(e.to_string()))?;

    if is_gzip {
        let mut decoder = GzDecoder::new(&bytes[..]);
        let mut out = String::new();
        decoder
            .read_to_string(&mut out)
            .map_err(|e| CatalogError::Io(e.to_string()))?;
        Ok(out)
    } else {
        String::from_utf8(bytes.to_vec()).map_err(|e| CatalogError::Io(e.to_string()))
    }
}

/// Parses a JSON-lines body into instruments, skipping blank lines.
/// Lines are accumulated with a growable `String` rather than a fixed
/// `BufReader` capacity, so no line length silently truncates.
pub fn parse_jsonlines(body: &str) -> Result<Vec<Instrument>, CatalogError> {
    let mut instruments = Vec::new();
    for (idx, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let instrument: Instrument = serde_json::from_str(line)
            .map_err(|source| CatalogError::Parse { line: idx + 1, source })?;
        instruments.push(instrument);
    }
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_blank_lines() {
        let body = "\n{\"instrument_token\":1,\"exchange_token\":0,\"tradingsymbol\":\"A\",\"name\":\"A\",\"last_price\":1.0,\"tick_size\":0.05,\"lot_size\":1,\"instrument_type\":\"EQ\",\"segment\":\"NSE\",\"exchange\":\"NSE\"}\n\n";
        let parsed = parse_jsonlines(body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].tradingsymbol, "A");
    }

    #[test]
    fn parse_reports_line_number_on_bad_json() {
        let body = "{}\nnot json\n";
        let err = parse_jsonlines(body).unwrap_err();
        match err {
            CatalogError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
