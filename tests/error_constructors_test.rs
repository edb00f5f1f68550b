use aethon::error::AethonError;

#[test]
fn constructors_build_matching_variants() {
    assert!(matches!(
        AethonError::config("x"),
        AethonError::Config { .. }
    ));
    assert!(matches!(AethonError::io("x"), AethonError::Io { .. }));
    assert!(matches!(
        AethonError::network("x"),
        AethonError::Network { .. }
    ));
    assert!(matches!(AethonError::api("x"), AethonError::Api { .. }));
    assert!(matches!(AethonError::auth("x"), AethonError::Auth { .. }));
    assert!(matches!(
        AethonError::generic("x"),
        AethonError::Generic { .. }
    ));
    assert!(matches!(
        AethonError::validation("f", "m"),
        AethonError::Validation { .. }
    ));
}

#[test]
fn messages_are_prefixed_by_kind() {
    assert_eq!(
        AethonError::api("gateway said no").to_string(),
        "API error: gateway said no"
    );
    assert_eq!(
        AethonError::auth("bad token").to_string(),
        "Authentication error: bad token"
    );
    assert_eq!(
        AethonError::validation("amps", "out of range").to_string(),
        "Validation error: amps - out of range"
    );
}

#[test]
fn io_errors_convert() {
    let err: AethonError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert!(matches!(err, AethonError::Io { .. }));
}

#[test]
fn serde_errors_convert() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: AethonError = json_err.into();
    assert!(matches!(err, AethonError::Serialization { .. }));
}
