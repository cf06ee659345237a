pub mod server;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        secret: SecretString,
        otp_expiry: i64,
        token_ttl: u64,
        bcrypt_cost: Option<u32>,
    },
}
