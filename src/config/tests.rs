use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(settings.webhook.secret.is_none());
    assert_eq!(settings.webhook.max_skew, Some(time::Duration::seconds(300)));
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.page_limit.get(), DEFAULT_CACHE_PAGE_LIMIT);
    assert_eq!(settings.cache.preview_cookie, "vetrina-preview");
    assert_eq!(settings.routes.products(), "/prodotti");
    assert_eq!(settings.site.public_url.as_str(), "http://localhost:3000/");
    assert!(settings.upstream.url.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.page_limit = Some(10);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_page_limit: Some(64),
        upstream_url: Some("http://127.0.0.1:8080".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.page_limit.get(), 64);
    assert_eq!(
        settings.upstream.url.as_ref().map(Url::as_str),
        Some("http://127.0.0.1:8080/")
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_secret_counts_as_missing() {
    let mut raw = RawSettings::default();
    raw.webhook.secret = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.webhook.secret.is_none());
}

#[test]
fn zero_skew_disables_timestamp_window() {
    let mut raw = RawSettings::default();
    raw.webhook.max_skew_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.webhook.max_skew.is_none());
}

#[test]
fn secret_is_redacted_in_debug_output() {
    let mut raw = RawSettings::default();
    raw.webhook.secret = Some("hunter2".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    let debug = format!("{:?}", settings.webhook);
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("<redacted>"));
}

#[test]
fn invalid_values_name_their_key() {
    let mut raw = RawSettings::default();
    raw.cache.page_limit = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "cache.page_limit", .. })
    ));

    let mut raw = RawSettings::default();
    raw.routes.products = Some("prodotti".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "routes", .. })
    ));

    let mut raw = RawSettings::default();
    raw.site.public_url = Some("ftp://example.it".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "site.public_url", .. })
    ));

    let mut raw = RawSettings::default();
    raw.cache.preview_cookie = Some("a=b".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "cache.preview_cookie", .. })
    ));
}

#[test]
fn configured_routes_are_normalized() {
    let mut raw = RawSettings::default();
    raw.routes.products = Some("/en/products/".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.routes.products(), "/en/products");
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["vetrina"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_paths_arguments() {
    let args = CliArgs::parse_from([
        "vetrina",
        "paths",
        "--type",
        "product",
        "--slug",
        "policut-20",
        "--json",
    ]);

    match args.command.expect("paths command") {
        Command::Paths(paths) => {
            assert_eq!(paths.document.document_type, "product");
            assert_eq!(paths.document.slug.as_deref(), Some("policut-20"));
            assert!(paths.json);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_notify_arguments() {
    let args = CliArgs::parse_from([
        "vetrina",
        "notify",
        "--url",
        "https://www.example.it/api/revalidate",
        "--type",
        "siteSettings",
    ]);

    match args.command.expect("notify command") {
        Command::Notify(notify) => {
            assert_eq!(notify.document.document_type, "siteSettings");
            assert!(notify.document.slug.is_none());
            assert_eq!(
                notify.url.as_deref(),
                Some("https://www.example.it/api/revalidate")
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn serve_overrides_parse_boolish_flags() {
    let args = CliArgs::parse_from(["vetrina", "serve", "--cache-enabled", "no", "--log-json", "1"]);
    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.cache_enabled, Some(false));
            assert_eq!(serve.overrides.log_json, Some(true));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
