use crate::certificate::PngQrEncoder;
use crate::error::{CertError, Result};
use crate::routing::{StoreRole, StoreRouting};
use std::{env, fmt::Display, ops::RangeInclusive, path::PathBuf, str::FromStr};
use tracing::{info, warn};

const QR_BOX_SIZE_RANGE: RangeInclusive<u32> = 1..=64;
const QR_BORDER_RANGE: RangeInclusive<u32> = 0..=32;
/// One minute to one year
const SESSION_TTL_RANGE: RangeInclusive<i64> = 1..=525_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub primary_db: PathBuf,
    pub secondary_db: PathBuf,
    /// Base for absolute links in QR codes; derived from `Host` when unset
    pub public_url: Option<String>,
    pub static_dir: PathBuf,
    pub session_ttl_minutes: i64,
    pub qr_box_size: u32,
    pub qr_border: u32,
    pub routing: StoreRouting,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            primary_db: PathBuf::from("certificate.db"),
            secondary_db: PathBuf::from("certificate_secondary.db"),
            public_url: None,
            static_dir: PathBuf::from("web"),
            session_ttl_minutes: 720,
            qr_box_size: 8,
            qr_border: 5,
            routing: StoreRouting::default(),
        }
    }
}

impl Config {
    /// `.env` (if present) then process environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let owners: StoreRole = try_load(&lookup, "CERT_OWNER_STORE", "primary")?;
        let users: StoreRole = try_load(&lookup, "CERT_USER_STORE", "primary")?;

        Ok(Self {
            host: try_load(&lookup, "CERT_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "CERT_PORT", "3000")?,
            primary_db: try_load(&lookup, "CERT_PRIMARY_DB", "certificate.db")?,
            secondary_db: try_load(&lookup, "CERT_SECONDARY_DB", "certificate_secondary.db")?,
            public_url: lookup("CERT_PUBLIC_URL").filter(|s| !s.trim().is_empty()),
            static_dir: try_load(&lookup, "CERT_STATIC_DIR", "web")?,
            session_ttl_minutes: try_load_in(
                &lookup,
                "CERT_SESSION_TTL_MINUTES",
                "720",
                SESSION_TTL_RANGE,
            )?,
            qr_box_size: try_load_in(&lookup, "CERT_QR_BOX_SIZE", "8", QR_BOX_SIZE_RANGE)?,
            qr_border: try_load_in(&lookup, "CERT_QR_BORDER", "5", QR_BORDER_RANGE)?,
            routing: StoreRouting::new(owners, users),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn qr_encoder(&self) -> PngQrEncoder {
        PngQrEncoder::new(self.qr_box_size, self.qr_border)
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        CertError::Config {
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}

/// `try_load` plus a bounds check
fn try_load_in<T, F>(lookup: &F, key: &str, default: &str, range: RangeInclusive<T>) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value: T = try_load(lookup, key, default)?;
    if range.contains(&value) {
        return Ok(value);
    }

    warn!("{key} value {value} outside {}..={}", range.start(), range.end());
    Err(CertError::Config {
        key: key.to_string(),
        message: format!("must be between {} and {}", range.start(), range.end()),
    })
}
