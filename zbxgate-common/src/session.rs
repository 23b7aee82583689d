use std::future::Future;

use crate::error::Result;
use crate::zabbix::AlertSource;

/// Run `body` inside a login/logout pair on `source`.
///
/// `logout` runs on every exit path once `login` has succeeded. When both the
/// body and `logout` fail, the body's error is returned and the logout
/// failure is only logged.
pub async fn with_session<'s, S, T, F, Fut>(source: &'s S, body: F) -> Result<T>
where
    S: AlertSource + ?Sized,
    F: FnOnce(&'s S) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    source.login().await?;

    let outcome = body(source).await;
    let released = source.logout().await;

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
        (Err(e), Err(logout_err)) => {
            tracing::warn!(error = %logout_err, "Logout failed after query error");
            Err(e)
        }
    }
}
