use opentelemetry_facade::{init, Error, TracerConfig};

#[test]
fn malformed_endpoint_fails_without_installing_a_tracer() {
    let err = init(
        "svc",
        "1.0.0",
        TracerConfig::new().with_collector_host("bad host"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidEndpoint { .. }));
    assert!(err.to_string().contains("invalid collector endpoint"));

    // the failed attempt left no tracer behind, so a clean init still works
    let tracer = init("svc", "1.0.0", TracerConfig::new().with_noop()).expect("init after failure");
    assert!(tracer.shutdown().is_ok());
}
