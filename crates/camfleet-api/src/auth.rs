use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Username/password pair for a camera.
///
/// The password never leaves this struct in clear text except when the
/// WS-Security digest is computed or a stream URL is assembled for a probe.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Whether there is anything to authenticate with.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }

    /// Build a fresh `<wsse:Security>` header with a random nonce and the
    /// current UTC time.
    pub fn ws_security_header(&self) -> String {
        let nonce: [u8; 16] = rand::thread_rng().r#gen();
        let created = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        self.ws_security_header_with(&nonce, &created)
    }

    pub(crate) fn ws_security_header_with(&self, nonce: &[u8], created: &str) -> String {
        let digest = password_digest(nonce, created, self.password.expose_secret());
        let nonce_b64 = STANDARD.encode(nonce);
        format!(
            r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="{WSSE_NS}" xmlns:wsu="{WSU_NS}"><wsse:UsernameToken><wsse:Username>{user}</wsse:Username><wsse:Password Type="{DIGEST_TYPE}">{digest}</wsse:Password><wsse:Nonce EncodingType="{NONCE_ENCODING}">{nonce_b64}</wsse:Nonce><wsu:Created>{created}</wsu:Created></wsse:UsernameToken></wsse:Security>"#,
            user = crate::xml::escape(&self.username),
        )
    }
}

/// `Base64(SHA1(nonce ++ created ++ password))`
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}
