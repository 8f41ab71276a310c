//! Optional Sentry error tracking integration.
//!
//! Initializes the Sentry SDK with the provided DSN and environment. The
//! returned guard must be held for the lifetime of the process so that
//! route loop failures and panics are reported before exit.

pub fn init(dsn: &str, environment: Option<&str>) -> sentry::ClientInitGuard {
    let parsed_dsn = match dsn.parse() {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled");
            None
        }
    };

    sentry::init(sentry::ClientOptions {
        dsn: parsed_dsn,
        environment: environment.map(|e| e.to_string().into()),
        release: Some(concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION")).into()),
        attach_stacktrace: true,
        ..Default::default()
    })
}
