use super::*;

#[test]
fn test_bind_error_display() {
    let err = GatewayError::Bind {
        addr: "127.0.0.1:9222".parse().unwrap(),
        source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
    };
    assert_eq!(
        err.to_string(),
        "failed to bind 127.0.0.1:9222: address in use"
    );
}

#[test]
fn test_io_error_conversion() {
    let err: GatewayError = std::io::Error::other("boom").into();
    assert_eq!(err.to_string(), "I/O error: boom");
}

#[test]
fn test_error_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<GatewayError>();
}
