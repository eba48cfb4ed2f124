use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::warn;

const GENERATED_SECRET_LEN: usize = 64;
const DEFAULT_TTL_MINUTES: i64 = 60;
/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Which checks the user handlers apply.
#[derive(Debug, Clone, Copy)]
pub struct AccountPolicy {
    pub min_password_len: usize,
    /// Reject `""` for a field present in an update payload.
    pub reject_blank_updates: bool,
    /// Only the record's owner may update or delete it.
    pub owner_only: bool,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            min_password_len: 8,
            reject_blank_updates: true,
            owner_only: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent means the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub policy: AccountPolicy,
    pub seed_users: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                warn!("JWT_SECRET not set; generated an in-memory secret, tokens will not survive a restart");
                generate_secret()
            }
        };

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "user-service".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "user-service-clients".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref()),
        };

        let seed_users = std::env::var("SEED_USERS")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            jwt,
            policy: AccountPolicy::default(),
            seed_users,
        })
    }
}

pub fn generate_secret() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Positive minutes up to [`MAX_TTL_MINUTES`]; anything else falls back to the default.
fn parse_ttl_minutes(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return DEFAULT_TTL_MINUTES;
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if (1..=MAX_TTL_MINUTES).contains(&v) => v,
        _ => {
            warn!(value = raw, "JWT_TTL_MINUTES out of range; using {DEFAULT_TTL_MINUTES}");
            DEFAULT_TTL_MINUTES
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_differ() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), GENERATED_SECRET_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_flag_accepts_common_truthy_values() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn ttl_minutes_is_bounded() {
        assert_eq!(parse_ttl_minutes(None), 60);
        assert_eq!(parse_ttl_minutes(Some("15")), 15);
        assert_eq!(parse_ttl_minutes(Some("0")), 60);
        assert_eq!(parse_ttl_minutes(Some("-5")), 60);
        assert_eq!(parse_ttl_minutes(Some("abc")), 60);
        assert_eq!(parse_ttl_minutes(Some("9223372036854775807")), 60);
        assert_eq!(
            parse_ttl_minutes(Some(&MAX_TTL_MINUTES.to_string())),
            MAX_TTL_MINUTES
        );
    }

    #[test]
    fn default_policy_is_owner_only() {
        let policy = AccountPolicy::default();
        assert_eq!(policy.min_password_len, 8);
        assert!(policy.reject_blank_updates);
        assert!(policy.owner_only);
    }
}
