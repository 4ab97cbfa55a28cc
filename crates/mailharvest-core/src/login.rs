//! Sign-in through the webmail login form.
//!
//! Fills the form from the [`MailboxLayout`](crate::layout::MailboxLayout)
//! selectors and polls until the mailbox shows. When the page asks for a
//! second factor the wait is extended so the user can complete it in the
//! browser window.

use std::time::Duration;

use tracing::{info, warn};

use crate::account::Account;
use crate::config::CrawlContext;
use crate::driver::{DriverResult, Locator, PageDriver};

/// Signs in and waits for the mailbox.
///
/// Returns `Ok(false)` if the mailbox did not show within the login timeout
/// (plus the second factor timeout, if one was requested).
///
/// # Errors
///
/// Returns an error if the driver fails.
pub async fn login<D>(
    driver: &mut D,
    account: &Account,
    context: &CrawlContext,
) -> DriverResult<bool>
where
    D: PageDriver + ?Sized,
{
    let layout = &context.layout;
    let timeouts = &context.timeouts;
    info!("Logging in as {}", account.id);

    driver.navigate(&layout.login_url).await?;
    if !driver
        .wait_for_element(&layout.username_input, timeouts.login())
        .await?
    {
        warn!("Login form did not appear for {}", account.id);
        return Ok(false);
    }
    driver
        .fill(&layout.username_input, account.id.as_str())
        .await?;
    driver
        .fill(&layout.password_input, account.credential.expose())
        .await?;
    driver
        .click(&Locator::css(layout.submit_button.as_str()))
        .await?;

    let interval = timeouts.poll_interval();
    let mut remaining = polls(timeouts.login(), interval);
    let mut second_factor = false;

    while remaining > 0 {
        let url = driver.current_url().await?;
        if url.contains(&layout.mailbox_url_marker)
            || driver.element_count(layout.mailbox_ready()).await? > 0
        {
            info!("Logged in as {}", account.id);
            return Ok(true);
        }

        if !second_factor
            && (url.to_lowercase().contains(&layout.two_factor_url_marker)
                || driver.element_count(&layout.two_factor_input).await? > 0)
        {
            second_factor = true;
            remaining += polls(timeouts.two_factor(), interval);
            warn!(
                "Second factor required for {}; complete it in the browser within {}s",
                account.id,
                timeouts.two_factor().as_secs()
            );
        }

        remaining -= 1;
        tokio::time::sleep(interval).await;
    }

    warn!("Login timed out for {}", account.id);
    Ok(false)
}

/// Number of polls that fit in `timeout`.
fn polls(timeout: Duration, interval: Duration) -> u128 {
    let step = interval.max(Duration::from_millis(1)).as_millis();
    (timeout.as_millis() / step).max(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::driver::BrowserLauncher;
    use crate::driver::mock::MockMailbox;
    use crate::layout::MailboxLayout;

    fn context() -> CrawlContext {
        CrawlContext::builder("unused")
            .timeouts(Timeouts::immediate())
            .build()
    }

    #[test]
    fn test_polls() {
        assert_eq!(polls(Duration::from_secs(30), Duration::from_millis(250)), 120);
        assert_eq!(polls(Duration::from_secs(1), Duration::ZERO), 1000);
        assert_eq!(polls(Duration::ZERO, Duration::from_millis(250)), 1);
    }

    #[tokio::test]
    async fn test_login_succeeds() {
        let mailbox = MockMailbox::new(MailboxLayout::default()).folder("Inbox", vec![]);
        let mut session = mailbox.launch().await.unwrap();
        let account = Account::new("a@x.com", "pw");

        assert!(login(&mut session, &account, &context()).await.unwrap());
        assert_eq!(mailbox.logins(), 1);
    }

    #[tokio::test]
    async fn test_rejected_login_times_out() {
        let mailbox = MockMailbox::new(MailboxLayout::default())
            .folder("Inbox", vec![])
            .reject_login("a@x.com");
        let mut session = mailbox.launch().await.unwrap();
        let account = Account::new("a@x.com", "wrong");

        assert!(!login(&mut session, &account, &context()).await.unwrap());
        assert_eq!(mailbox.logins(), 0);
    }

    #[tokio::test]
    async fn test_second_factor_wait() {
        let mailbox = MockMailbox::new(MailboxLayout::default())
            .folder("Inbox", vec![])
            .with_two_factor(3);
        let mut session = mailbox.launch().await.unwrap();
        let account = Account::new("a@x.com", "pw");

        assert!(login(&mut session, &account, &context()).await.unwrap());
        assert_eq!(mailbox.logins(), 1);
    }
}
