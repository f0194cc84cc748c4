//! `export` command: log in, switch the report to the daily view and save
//! the CSV it offers as `<Prefix>-<date>.csv`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use drsync_core::{AppConfig, FileDiagnosticSink};
use drsync_scraper::{HttpBrowser, SessionNavigator};

pub(crate) fn export_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}-{}.csv", date.format("%Y-%m-%d"))
}

pub(crate) async fn run_export(
    config: &AppConfig,
    date: NaiveDate,
    out_dir: &Path,
    headless: bool,
) -> anyhow::Result<PathBuf> {
    let source = config.require_source()?;
    if !headless {
        tracing::warn!("HEADLESS=false ignored: the HTTP driver has no visible mode");
    }
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("cannot create output directory {}", out_dir.display()))?;

    let sink = FileDiagnosticSink::new(&config.diagnostics_dir);
    let browser = HttpBrowser::new(config.request_timeout_secs, &config.user_agent)?;
    let navigator = SessionNavigator::new(
        browser,
        source,
        &sink,
        Duration::from_secs(config.download_timeout_secs),
    );
    let download = navigator.export_csv(date).await?;

    let path = out_dir.join(export_file_name(&config.export_prefix, date));
    tokio::fs::write(&path, &download.bytes)
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        bytes = download.bytes.len(),
        served_as = download.file_name.as_deref().unwrap_or(""),
        "daily export saved"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use drsync_core::{Environment, FieldMapping, SourceConfig, TargetSchema};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const REPORT: &str = r#"<html><body>
      <a href="/logout">Log out</a>
      <a href="/report.csv">Download CSV</a>
    </body></html>"#;

    fn config(server: &MockServer, diagnostics: &Path) -> AppConfig {
        AppConfig {
            env: Environment::Test,
            log_level: "debug".to_string(),
            diagnostics_dir: diagnostics.to_path_buf(),
            request_timeout_secs: 5,
            user_agent: "drsync-test/0.1".to_string(),
            download_timeout_secs: 2,
            export_prefix: "Orders".to_string(),
            relay_bind_addr: "127.0.0.1:0".parse().unwrap(),
            field_mapping: FieldMapping::default(),
            target_schema: TargetSchema::default(),
            source: Some(SourceConfig {
                base_url: server.uri(),
                login_url: Some(format!("{}/report", server.uri())),
                username: "dispatch".to_string(),
                password: "secret".to_string(),
                orders_url: format!("{}/report", server.uri()),
                api_paths: Vec::new(),
                api_token: None,
            }),
            store: None,
        }
    }

    #[test]
    fn export_file_name_uses_prefix_and_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(export_file_name("Orders", date), "Orders-2025-01-05.csv");
    }

    #[tokio::test]
    async fn export_writes_prefixed_csv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(REPORT.as_bytes().to_vec(), "text/html"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/report.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"Order #,Customer\n7,Jane\n".to_vec(), "text/csv"),
            )
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let diagnostics = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let config = config(&server, diagnostics.path());

        let written = run_export(&config, date, &out.path().join("daily"), true)
            .await
            .unwrap();

        assert_eq!(
            written,
            out.path().join("daily").join("Orders-2025-01-15.csv")
        );
        let contents = std::fs::read_to_string(&written).unwrap();
        assert_eq!(contents, "Order #,Customer\n7,Jane\n");
    }
}
