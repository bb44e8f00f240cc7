//! Runs trust establishment once and exits.
//!
//! Exit status 0 on success (including the no-op case where neither
//! `CF_TARGET` nor `TRUST_CERTS` is set); 1 if trust could not be
//! established for any configured target.

use cf_cert_truster::{CertTruster, TrustStore};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let store = Arc::new(TrustStore::from_platform_roots());
    let truster = CertTruster::new(Arc::clone(&store));
    match truster.run_from_env().await {
        Ok(outcomes) => {
            log::info!(
                "trust establishment finished: {} target(s) processed",
                outcomes.len()
            );
            ExitCode::SUCCESS
        }
        // Already logged with target identity by the truster.
        Err(_) => ExitCode::from(1),
    }
}
