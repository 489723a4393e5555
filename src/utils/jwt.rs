use std::sync::OnceLock;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};

use crate::session::Claims;

struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

static KEYS: OnceLock<JwtKeys> = OnceLock::new();

fn keys() -> &'static JwtKeys {
    KEYS.get_or_init(|| {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    })
}

pub fn create_jwt(claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claims, &keys().encoding)
}

pub fn decode_jwt(token: &str) -> Result<TokenData<Claims>, jsonwebtoken::errors::Error> {
    decode::<Claims>(token, &keys().decoding, &Validation::default())
}
