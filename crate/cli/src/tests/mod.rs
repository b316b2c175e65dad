use clap::Parser;
use cosmian_oidc_auth::{OidcVerifier, VerificationError};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use crate::{Cli, CliCommands, error::CliError};

const JWKS: &str = include_str!("../../../oidc_auth/test_data/jwks.json");
const SIGNING_KEY: &[u8] = include_bytes!("../../../oidc_auth/test_data/signing_key.pem");

fn token(issuer: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("key-1".to_owned());
    let now = chrono::Utc::now().timestamp();
    jsonwebtoken::encode(
        &header,
        &json!({ "iss": issuer, "sub": "alice", "exp": now + 300, "iat": now }),
        &EncodingKey::from_rsa_pem(SIGNING_KEY).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_parse_offline_command() {
    let cli = Cli::try_parse_from([
        "cosmian_oidc",
        "--default-realm",
        "master",
        "offline",
        "--base-url",
        "http://localhost:8080",
        "Bearer abc.def.ghi",
    ])
    .unwrap();
    assert_eq!(cli.auth.default_realm, "master");
    let CliCommands::Offline(action) = cli.command else {
        panic!("expected the offline command");
    };
    assert_eq!(action.access_token, "Bearer abc.def.ghi");
    assert_eq!(action.realm, None);
}

#[test]
fn test_configuration_file_takes_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let conf = dir.path().join("oidc.toml");
    std::fs::write(&conf, "default_realm = \"master\"\nleeway = 30\n").unwrap();

    let cli = Cli::try_parse_from([
        "cosmian_oidc",
        "--conf",
        conf.to_str().unwrap(),
        "--default-realm",
        "ignored",
        "offline",
        "--base-url",
        "http://localhost:8080",
        "abc.def.ghi",
    ])
    .unwrap();
    let auth = cli.auth_config().unwrap();
    assert_eq!(auth.default_realm, "master");
    assert_eq!(auth.leeway, 30);

    let cli = Cli::try_parse_from([
        "cosmian_oidc",
        "--conf",
        "not_exist.toml",
        "offline",
        "--base-url",
        "http://localhost:8080",
        "abc.def.ghi",
    ])
    .unwrap();
    assert!(matches!(cli.auth_config(), Err(CliError::Configuration(_))));
}

#[tokio::test]
async fn test_offline_action() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/realms/community/protocol/openid-connect/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JWKS))
        .mount(&server)
        .await;
    let issuer = format!("{}/realms/community", server.uri());

    let cli = Cli::try_parse_from([
        "cosmian_oidc",
        "--jwt-issuer-uri",
        &issuer,
        "offline",
        "--base-url",
        &server.uri(),
        &format!("Bearer {}", token(&issuer)),
    ])
    .unwrap();
    let verifier = OidcVerifier::from_config(cli.auth_config().unwrap()).unwrap();
    let CliCommands::Offline(action) = &cli.command else {
        panic!("expected the offline command");
    };

    let result = action.run(&verifier).await.unwrap();
    assert!(result.status);
    assert_eq!(result.claim("sub"), Some(&json!("alice")));

    let cli = Cli::try_parse_from([
        "cosmian_oidc",
        "offline",
        "--base-url",
        &server.uri(),
        "abc",
    ])
    .unwrap();
    let CliCommands::Offline(action) = &cli.command else {
        panic!("expected the offline command");
    };
    assert!(matches!(
        action.run(&verifier).await,
        Err(CliError::Verification(VerificationError::ParseFailure(_)))
    ));
    verifier.shutdown();
}

#[tokio::test]
async fn test_online_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/realms/community/protocol/openid-connect/token/introspect"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "active": true, "username": "alice" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cli = Cli::try_parse_from([
        "cosmian_oidc",
        "online",
        "--base-url",
        &server.uri(),
        "--client-id",
        "my-client",
        "--client-secret",
        "s3cr3t",
        "abc.def.ghi",
    ])
    .unwrap();
    let verifier = OidcVerifier::from_config(cli.auth_config().unwrap()).unwrap();
    let CliCommands::Online(action) = &cli.command else {
        panic!("expected the online command");
    };

    let result = action.run(&verifier).await.unwrap();
    assert!(result.active);
    assert_eq!(result.claims.username.as_deref(), Some("alice"));
}
