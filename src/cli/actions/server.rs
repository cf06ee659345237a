use crate::{api, auth::AuthConfig, cli::actions::Action};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            secret,
            otp_expiry,
            token_ttl,
            bcrypt_cost,
        } => {
            let mut config = AuthConfig::new(secret)
                .with_otp_expiry_seconds(otp_expiry)
                .with_token_ttl_seconds(token_ttl);

            if let Some(cost) = bcrypt_cost {
                config = config.with_bcrypt_cost(cost);
            }

            api::new(port, dsn, config).await?;
        }
    }

    Ok(())
}
