use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use federation_crypto::{
    build_http_auth, generate_keypair, AuthToken, Ed25519Scheme, SignableRequest,
    SignatureScheme, SIGNED_HEADERS,
};

fn request<'a>(digest: &'a str) -> SignableRequest<'a> {
    SignableRequest {
        method: "POST",
        path: "/users/bob/inbox",
        host: "example.org",
        date: "Sun, 06 Nov 1994 08:49:37 GMT",
        digest,
    }
}

fn signature_value(header: &str) -> Vec<u8> {
    let start = header.find("signature=\"").unwrap() + "signature=\"".len();
    let rest = &header[start..];
    let end = rest.find('"').unwrap();
    STANDARD.decode(&rest[..end]).unwrap()
}

#[test]
fn digest_is_sha256_base64() {
    // SHA-256 of the empty string
    assert_eq!(
        AuthToken::digest(b""),
        "SHA-256=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
    );
}

#[test]
fn signing_string_lowercases_method() {
    let digest = AuthToken::digest(b"{}");
    let s = request(&digest).signing_string();
    assert!(s.starts_with("(request-target): post /users/bob/inbox\n"));
    assert!(s.contains("\nhost: example.org\n"));
    assert!(s.ends_with(&format!("digest: {digest}")));
}

#[test]
fn token_exposes_key_id_and_algorithm() {
    let (private, _) = generate_keypair();
    let token = build_http_auth(
        Arc::new(Ed25519Scheme),
        &private,
        "https://example.com/profile#main-key",
    );
    assert_eq!(token.key_id(), "https://example.com/profile#main-key");
    assert_eq!(token.algorithm(), "Ed25519");
}

#[test]
fn signature_header_verifies_with_public_key() {
    let (private, public) = generate_keypair();
    let token = build_http_auth(Arc::new(Ed25519Scheme), &private, "https://a/#main-key");
    let digest = AuthToken::digest(b"{\"type\":\"Note\"}");
    let req = request(&digest);

    let header = token.signature_header(&req).unwrap();
    assert!(header.starts_with("keyId=\"https://a/#main-key\""));
    assert!(header.contains(&format!("headers=\"{SIGNED_HEADERS}\"")));

    let sig = signature_value(&header);
    assert!(Ed25519Scheme.verify(req.signing_string().as_bytes(), &sig, &public));
}

#[test]
fn debug_does_not_leak_key() {
    let (private, _) = generate_keypair();
    let token = build_http_auth(Arc::new(Ed25519Scheme), &private, "k");
    let dbg = format!("{token:?}");
    assert!(dbg.contains("AuthToken"));
    assert!(!dbg.contains("private_key"));
}
