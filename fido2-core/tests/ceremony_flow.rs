//! End-to-end ceremony tests against the mock authenticator.
//!
//! These exercise the full path: configuration, request building, slot
//! tracking, provider delivery and result mapping.

use std::sync::Arc;

use fido2_core::request::{AlgorithmParameter, CredentialType};
use fido2_core::{
    decode, encode, AlgorithmInput, AttestationPreference, AuthenticateOptions, CeremonyKind,
    CeremonyOutcome, Fido2Client, Fido2Error, MockAuthenticator, MockBehavior, ProviderGateway,
    RegisterOptions, COSE_ES256,
};

fn client_with(mock: &Arc<MockAuthenticator>) -> Fido2Client {
    Fido2Client::new(Arc::clone(mock) as Arc<dyn ProviderGateway>)
}

fn configured(mock: &Arc<MockAuthenticator>) -> Fido2Client {
    let client = client_with(mock);
    client.configure_relying_party("example.com", "Example", None);
    client
        .configure_user(&encode(b"u1"), "alice", None, "Alice")
        .expect("valid handle");
    client
}

fn es256() -> Vec<AlgorithmInput> {
    vec![AlgorithmInput::public_key(COSE_ES256)]
}

async fn wait_for_held(mock: &MockAuthenticator) {
    while mock.held_count() == 0 {
        tokio::task::yield_now().await;
    }
}

#[test]
fn test_encoding_round_trip() {
    let samples: [&[u8]; 5] = [b"", b"\x00", b"u1", b"\xff\xfe\xfd", &[0u8; 64]];
    for bytes in samples {
        assert_eq!(decode(&encode(bytes)).unwrap(), bytes);
    }
    let all: Vec<u8> = (0..=255).collect();
    assert_eq!(decode(&encode(&all)).unwrap(), all);
}

#[tokio::test]
async fn test_example_registration() {
    let mock = Arc::new(MockAuthenticator::default().with_behavior(MockBehavior::Hold));
    let client = Arc::new(configured(&mock));

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.register(&[], &encode(b"c1"), &es256(), None).await })
    };
    wait_for_held(&mock).await;

    let request = mock.last_creation().expect("request submitted");
    assert!(request.exclude_list.is_empty());
    assert_eq!(
        request.algorithms,
        vec![AlgorithmParameter {
            credential_type: CredentialType::PublicKey,
            algorithm: -7,
        }]
    );
    assert_eq!(request.policy.timeout_seconds, 60.0);
    assert_eq!(request.policy.attestation, AttestationPreference::None);
    assert_eq!(request.policy.attachment, None);
    assert_eq!(request.challenge, b"c1");
    assert_eq!(request.user.handle, b"u1");

    let released = mock.release_held(CeremonyOutcome::Attestation {
        credential_id: vec![1, 2, 3],
        raw_client_data: b"{}".to_vec(),
        attestation_object: vec![0xa0],
    });
    assert_eq!(released, 1);

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.id, encode([1u8, 2, 3]));
    assert_eq!(result.raw_id, encode([1u8, 2, 3]));
}

#[tokio::test]
async fn test_relying_party_replaced_between_calls() {
    let mock = Arc::new(MockAuthenticator::default());
    let client = client_with(&mock);

    client.configure_relying_party("first.example", "First", None);
    client.configure_relying_party("second.example", "Second", None);
    client
        .authenticate(&[encode([9u8])], &encode(b"c2"), None)
        .await
        .unwrap();

    assert_eq!(mock.last_assertion().unwrap().rp_id, "second.example");
}

#[tokio::test]
async fn test_authenticate_requires_relying_party() {
    let mock = Arc::new(MockAuthenticator::default());
    let client = client_with(&mock);

    let err = client
        .authenticate(&[encode([9u8])], &encode(b"c2"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Fido2Error::MissingRelyingParty));
    assert_eq!(err.code(), "E_CONFIG_MISSING");
    assert!(mock.assertions().is_empty());
}

#[tokio::test]
async fn test_duplicate_delivery_resolves_once() {
    let mock = Arc::new(MockAuthenticator::default().with_duplicate_delivery());
    let client = configured(&mock);

    let created = client
        .register(&[], &encode(b"c1"), &es256(), None)
        .await
        .unwrap();
    let asserted = client
        .authenticate(&[created.id.clone()], &encode(b"c2"), None)
        .await
        .unwrap();
    assert_eq!(asserted.id, created.id);

    // The stray second deliveries must not leak into later ceremonies.
    mock.set_behavior(MockBehavior::Cancel);
    let err = client
        .authenticate(&[created.id], &encode(b"c3"), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_SIGN_CANCELLED");
}

#[tokio::test]
async fn test_late_delivery_after_completion_ignored() {
    let mock = Arc::new(MockAuthenticator::default().with_behavior(MockBehavior::Hold));
    let client = Arc::new(configured(&mock));

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.authenticate(&[], &encode(b"c2"), None).await })
    };
    wait_for_held(&mock).await;

    let held = mock.take_held();
    assert_eq!(held.len(), 1);
    let sink = &held[0];
    assert!(sink.deliver(CeremonyOutcome::Cancelled));
    assert!(!sink.deliver(CeremonyOutcome::ProviderError {
        message: "late".into()
    }));
    assert!(!sink.deliver_encoded(&CeremonyOutcome::Cancelled.to_cbor().unwrap()));

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        Fido2Error::Cancelled(CeremonyKind::Authentication)
    ));
    assert!(!client.is_pending(CeremonyKind::Authentication));
}

#[tokio::test]
async fn test_cancellation_kind_not_confused() {
    let mock = Arc::new(MockAuthenticator::default().with_behavior(MockBehavior::Cancel));
    let client = configured(&mock);

    let register = client
        .register(&[], &encode(b"c1"), &es256(), None)
        .await
        .unwrap_err();
    let sign = client
        .authenticate(&[], &encode(b"c2"), None)
        .await
        .unwrap_err();

    assert_eq!(register.code(), "E_REGISTER_CANCELLED");
    assert_eq!(register.to_string(), "Register was cancelled");
    assert_eq!(sign.code(), "E_SIGN_CANCELLED");
    assert_eq!(sign.to_string(), "Sign was cancelled");
}

#[tokio::test]
async fn test_attachment_omitted_unless_recognised() {
    let mock = Arc::new(MockAuthenticator::default());
    let client = configured(&mock);

    for authenticator_type in [None, Some("usb-stick"), Some("")] {
        let options = RegisterOptions {
            authenticator_type: authenticator_type.map(str::to_string),
            ..RegisterOptions::default()
        };
        client
            .register(&[], &encode(b"c1"), &es256(), Some(&options))
            .await
            .unwrap();
        let request = mock.last_creation().unwrap();
        assert_eq!(request.policy.attachment, None);
        assert!(request.to_options_json().get("authenticatorSelection").is_none());
    }
}

#[tokio::test]
async fn test_negative_timeout_rejected_before_submission() {
    let mock = Arc::new(MockAuthenticator::default());
    let client = configured(&mock);

    let options = RegisterOptions {
        timeout: Some(-1.0),
        ..RegisterOptions::default()
    };
    let err = client
        .register(&[], &encode(b"c1"), &es256(), Some(&options))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_INVALID_POLICY");
    assert!(mock.creations().is_empty());
}

#[tokio::test]
async fn test_malformed_key_handle_rejected_before_submission() {
    let mock = Arc::new(MockAuthenticator::default());
    let client = configured(&mock);

    let err = client
        .authenticate(&["***".to_string()], &encode(b"c2"), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_MALFORMED_ENCODING");
    assert!(mock.assertions().is_empty());
    assert!(!client.is_pending(CeremonyKind::Authentication));
}

#[tokio::test]
async fn test_provider_error_message_preserved() {
    let message = "The incoming request cannot be validated";
    let mock = Arc::new(
        MockAuthenticator::default().with_behavior(MockBehavior::ProviderError(message.into())),
    );
    let client = configured(&mock);

    let err = client
        .register(&[], &encode(b"c1"), &es256(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_AUTHENTICATOR_ERROR");
    match err {
        Fido2Error::AuthenticatorError(text) => assert_eq!(text, message),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_and_wrong_responses() {
    let mock = Arc::new(MockAuthenticator::default().with_behavior(MockBehavior::Malformed));
    let client = configured(&mock);

    let err = client
        .register(&[], &encode(b"c1"), &es256(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_UNEXPECTED_RESPONSE");

    mock.set_behavior(MockBehavior::WrongCredential);
    let err = client
        .register(&[], &encode(b"c1"), &es256(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_UNEXPECTED_RESPONSE");
    assert!(!client.is_pending(CeremonyKind::Registration));
}

#[tokio::test]
async fn test_rejected_submission_is_unknown_category() {
    let mock = Arc::new(
        MockAuthenticator::default().with_behavior(MockBehavior::RejectSubmission("busy".into())),
    );
    let client = configured(&mock);

    let err = client
        .register(&[], &encode(b"c1"), &es256(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unknown");
    assert!(err.to_string().contains("busy"));
    assert_eq!(mock.creations().len(), 1);
}

#[tokio::test]
async fn test_kinds_run_concurrently() {
    let mock = Arc::new(MockAuthenticator::default().with_behavior(MockBehavior::Hold));
    let client = Arc::new(configured(&mock));

    let register = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.register(&[], &encode(b"c1"), &es256(), None).await })
    };
    let authenticate = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.authenticate(&[], &encode(b"c2"), None).await })
    };
    while mock.held_count() < 2 {
        tokio::task::yield_now().await;
    }
    assert!(client.is_pending(CeremonyKind::Registration));
    assert!(client.is_pending(CeremonyKind::Authentication));

    assert_eq!(mock.release_held(CeremonyOutcome::Cancelled), 2);
    assert_eq!(
        register.await.unwrap().unwrap_err().code(),
        "E_REGISTER_CANCELLED"
    );
    assert_eq!(
        authenticate.await.unwrap().unwrap_err().code(),
        "E_SIGN_CANCELLED"
    );
}

#[tokio::test]
async fn test_app_id_extension_requires_opt_in() {
    let mock = Arc::new(MockAuthenticator::default());
    let client = configured(&mock);
    client.configure_legacy_app_id("https://example.com/appid.json");

    client
        .authenticate(&[encode([9u8])], &encode(b"c2"), None)
        .await
        .unwrap();
    assert_eq!(mock.last_assertion().unwrap().app_id_fallback, None);

    let options = AuthenticateOptions {
        use_app_id: Some(true),
        ..AuthenticateOptions::default()
    };
    client
        .authenticate(&[encode([9u8])], &encode(b"c2"), Some(&options))
        .await
        .unwrap();
    let request = mock.last_assertion().unwrap();
    assert_eq!(
        request.app_id_fallback.as_deref(),
        Some("https://example.com/appid.json")
    );
    assert_eq!(
        request.to_options_json()["extensions"]["appid"],
        "https://example.com/appid.json"
    );
}

#[tokio::test]
async fn test_abandoned_ceremony_rejects_caller() {
    let mock = Arc::new(MockAuthenticator::default().with_behavior(MockBehavior::Hold));
    let client = Arc::new(configured(&mock));

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.register(&[], &encode(b"c1"), &es256(), None).await })
    };
    wait_for_held(&mock).await;
    mock.drop_held();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, Fido2Error::Abandoned(CeremonyKind::Registration)));
    assert_eq!(err.code(), "unknown");
}
