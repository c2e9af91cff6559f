use fifu_kernel::message::{MessageKind, MetaMessage};
use fifu_kernel::plugin::{ConverterPlugin, ProtocolPlugin};
use fifu_kernel::uri::Uri;
use fifu_plugins::{HtmlConverter, LoopbackProtocol, builtin_catalog};
use fifu_runtime::{Gateway, GatewayConfig};
use fifu_testing::{MockConverter, MockProtocol, assert_sent, wait_for};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fifu_runtime=debug")
        .with_test_writer()
        .try_init();
}

fn gateway(protocols: &[&MockProtocol], converter: Option<Arc<dyn ConverterPlugin>>) -> Gateway {
    init_tracing();
    let mut builder = Gateway::builder().workers(4);
    for protocol in protocols {
        builder = protocol.attach_to(builder);
    }
    if let Some(converter) = converter {
        builder = builder.converter(converter);
    }
    builder.build().unwrap()
}

fn strings(uris: &[Uri]) -> Vec<String> {
    uris.iter().map(ToString::to_string).collect()
}

#[test]
fn test_create_mapping_is_idempotent() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let b = MockProtocol::new("scheme-b");
    let gateway = gateway(&[&http, &a, &b], None);
    let original = Uri::parse("http://example.org/x.html");

    let first = gateway.router().create_mapping(&original);
    let second = gateway.router().create_mapping(&original);

    assert_eq!(
        strings(&first),
        vec!["scheme-a://example.org/x.html", "scheme-b://example.org/x.html"]
    );
    assert_eq!(first, second);
    assert_eq!(gateway.router().mapping_count(), 2);
    assert_eq!(a.mint_count(), 1);
    assert_eq!(b.mint_count(), 1);
    assert_eq!(http.mint_count(), 0);
}

#[test]
fn test_concurrent_create_mapping_creates_each_scheme_once() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let b = MockProtocol::new("scheme-b");
    a.set_mint_delay(Duration::from_millis(20));
    b.set_mint_delay(Duration::from_millis(20));
    let gateway = gateway(&[&http, &a, &b], None);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let router = gateway.router().clone();
            thread::spawn(move || router.create_mapping(&Uri::parse("http://example.org/x.html")))
        })
        .collect();
    let results: Vec<Vec<Uri>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for result in &results {
        assert_eq!(result, &results[0]);
        assert_eq!(result.len(), 2);
    }
    assert_eq!(gateway.router().mapping_count(), 2);
    assert_eq!(a.mint_count(), 1);
    assert_eq!(b.mint_count(), 1);
}

#[test]
fn test_declined_mapping_is_retried() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let b = MockProtocol::new("scheme-b");
    b.set_declines(true);
    let gateway = gateway(&[&http, &a, &b], None);
    let original = Uri::parse("http://example.org/x.html");

    assert_eq!(
        strings(&gateway.router().create_mapping(&original)),
        vec!["scheme-a://example.org/x.html"]
    );
    b.set_declines(false);
    assert_eq!(gateway.router().create_mapping(&original).len(), 2);
    assert_eq!(a.mint_count(), 1);
    assert_eq!(b.mint_count(), 2);
}

#[test]
fn test_end_to_end_html_rewrite() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let b = MockProtocol::new("scheme-b");
    let gateway = gateway(&[&http, &a, &b], Some(Arc::new(HtmlConverter::new())));
    let original = Uri::parse("http://example.org/x.html");
    gateway.router().create_mapping(&original);
    gateway.start().unwrap();

    a.inject(MetaMessage::request(Uri::parse("scheme-a://example.org/x.html")));
    assert!(wait_for(TIMEOUT, || http.send_count() == 1));
    let request = &http.sent()[0];
    assert_eq!(request.uri, original);
    assert_eq!(request.kind(), MessageKind::Request);

    http.inject(MetaMessage::response(
        original.clone(),
        "text/html; charset=utf-8",
        br#"<p><a href="/y.html">next</a></p>"#.to_vec(),
    ));
    assert!(wait_for(TIMEOUT, || a.send_count() == 1));

    let response = &a.sent()[0];
    assert_eq!(response.uri.to_string(), "scheme-a://example.org/x.html");
    assert_eq!(response.kind(), MessageKind::Response);
    assert_eq!(
        String::from_utf8(response.content_data.clone()).unwrap(),
        r#"<p><a href="scheme-a://example.org/y.html">next</a></p>"#
    );
    assert_eq!(
        gateway.router().original_of(&Uri::parse("scheme-b://example.org/y.html")),
        Some(Uri::parse("http://example.org/y.html"))
    );
    assert_sent!(b, 0);
    assert!(gateway.router().pending_for(&original).is_empty());

    gateway.shutdown();
}

#[test]
fn test_response_fans_out_with_per_scheme_rewrite() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let b = MockProtocol::new("scheme-b");
    let converter = MockConverter::new(&["text/x-links"]);
    let gateway = gateway(&[&http, &a, &b], Some(Arc::new(converter.clone())));
    let router = gateway.router();
    let original = Uri::parse("http://example.org/list");
    router.create_mapping(&original);

    router.route(MetaMessage::request(Uri::parse("scheme-a://example.org/list")));
    router.route(MetaMessage::request(Uri::parse("scheme-b://example.org/list")));
    assert_eq!(router.pending_for(&original).len(), 2);

    router.route(MetaMessage::response(
        original.clone(),
        "text/x-links",
        b"see link:/item/1".to_vec(),
    ));

    assert_eq!(a.sent()[0].content_data, b"see scheme-a://example.org/item/1");
    assert_eq!(b.sent()[0].content_data, b"see scheme-b://example.org/item/1");
    assert_eq!(converter.call_count(), 2);
    assert_sent!(http, 2);
}

#[test]
fn test_keep_session_retains_requesters() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let gateway = gateway(&[&http, &a], None);
    let router = gateway.router();
    let original = Uri::parse("http://example.org/stream");
    let foreign = router.create_mapping(&original).remove(0);

    router.route(MetaMessage::request(foreign.clone()));
    for part in ["1", "2", "3"] {
        router.route(
            MetaMessage::response(original.clone(), "text/plain", part.as_bytes().to_vec())
                .with_keep_session(true),
        );
    }
    assert_sent!(a, 3);
    assert_eq!(router.pending_for(&original), vec![foreign]);

    router.route(MetaMessage::response(original.clone(), "text/plain", b"end".to_vec()));
    router.route(MetaMessage::response(original.clone(), "text/plain", b"late".to_vec()));
    assert_sent!(a, 4);
    assert!(router.pending_for(&original).is_empty());
}

#[test]
fn test_unroutable_messages_are_dropped() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let gateway = gateway(&[&http, &a], None);
    let router = gateway.router();

    router.route(MetaMessage::response(
        Uri::parse("http://example.org/never-requested"),
        "text/plain",
        b"x".to_vec(),
    ));
    router.route(MetaMessage::request(Uri::parse("scheme-a://unmapped/x")));

    assert_sent!(http, 0);
    assert_sent!(a, 0);
}

#[test]
fn test_missing_target_protocol_drops_only_that_copy() {
    let a = MockProtocol::new("scheme-a");
    let b = MockProtocol::new("scheme-b");
    let gateway = gateway(&[&a, &b], None);
    let router = gateway.router();
    let original = Uri::parse("http://example.org/x");
    router.create_mapping(&original);

    router.route(MetaMessage::request(Uri::parse("scheme-a://example.org/x")));
    router.route(MetaMessage::request(Uri::parse("scheme-b://example.org/x")));
    router.route(MetaMessage::response(original, "text/plain", b"ok".to_vec()));

    assert_sent!(a, 1);
    assert_sent!(b, 1);
}

#[test]
fn test_shutdown_stops_plugins_and_dispatch() {
    let http = MockProtocol::new("http");
    let a = MockProtocol::new("scheme-a");
    let gateway = gateway(&[&http, &a], None);
    gateway.start().unwrap();
    assert!(http.is_started());

    gateway.shutdown();
    gateway.shutdown();

    assert!(http.is_stopped());
    assert!(a.is_stopped());
    assert!(!gateway.router().is_running());
    a.inject(MetaMessage::request(Uri::parse("scheme-a://example.org/x")));
    assert_sent!(http, 0);
}

#[test]
fn test_builtin_plugins_serve_a_static_site() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    let site = dir.path().join("site");
    std::fs::create_dir_all(site.join("example.org")).unwrap();
    std::fs::write(
        site.join("example.org/x.html"),
        r#"<html><body><a href="/y.html">y</a></body></html>"#,
    )
    .unwrap();

    let protocols = dir.path().join("protocols");
    std::fs::create_dir(&protocols).unwrap();
    std::fs::write(
        protocols.join("origin.toml"),
        format!("kind = \"static\"\n\n[options]\nroot = \"{}\"\n", site.display()),
    )
    .unwrap();

    let converters = dir.path().join("converters");
    std::fs::create_dir(&converters).unwrap();
    std::fs::write(converters.join("html.yaml"), "kind: html\n").unwrap();

    let resources = dir.path().join("resources.txt");
    std::fs::write(&resources, "http://example.org/x.html\n").unwrap();

    let ndn: Arc<OnceLock<Arc<LoopbackProtocol>>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&ndn);
    let gateway = Gateway::builder()
        .workers(2)
        .catalog(builtin_catalog())
        .protocol_with(move |context| {
            let plugin = Arc::new(LoopbackProtocol::new("ndn", context.clone()));
            let _ = slot.set(Arc::clone(&plugin));
            plugin as Arc<dyn ProtocolPlugin>
        })
        .load_protocols(&protocols)
        .load_converters(&converters)
        .build()
        .unwrap();
    assert_eq!(gateway.load_resources(&resources).unwrap(), 1);
    gateway.start().unwrap();

    let ndn = ndn.get().unwrap();
    let outbound = ndn.outbound();
    ndn.inject(MetaMessage::request(Uri::parse("ndn://example.org/x.html")));

    let response = outbound.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(response.uri.to_string(), "ndn://example.org/x.html");
    assert_eq!(response.content_type, "text/html");
    assert_eq!(
        String::from_utf8(response.content_data).unwrap(),
        r#"<html><body><a href="ndn://example.org/y.html">y</a></body></html>"#
    );
    assert!(ndn.serves(&Uri::parse("ndn://example.org/y.html")));

    gateway.shutdown();
}

#[test]
fn test_from_config_without_protocols_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = GatewayConfig::default()
        .with_workers(1)
        .with_protocols_dir(dir.path());
    assert!(Gateway::from_config(&config, builtin_catalog()).is_err());
}
