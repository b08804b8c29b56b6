//! Headless/visible switch
//!
//! Rebuilds a session's driver with the opposite rendering mode without
//! losing authentication: snapshot location and cookies, destroy the old
//! driver, launch the replacement, replay cookies, return to where the
//! session was.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::driver::{DriverFactory, DriverHandle, LaunchSpec};
use crate::session::session::Session;
use crate::Result;

/// Visibility toggler
pub struct VisibilityToggler {
    factory: Arc<dyn DriverFactory>,
    config: Config,
}

impl VisibilityToggler {
    /// Create a new toggler
    pub fn new(factory: Arc<dyn DriverFactory>, config: Config) -> Self {
        Self { factory, config }
    }

    /// Flip the session's rendering mode in place.
    ///
    /// A single cookie failing to replay is a warning, not a failure. A hard
    /// failure in any step marks the session `Error` and leaves the key
    /// registered so the caller can close it explicitly.
    pub async fn toggle(&self, session: &Session) -> Result<()> {
        let target_headless = !session.is_headless();
        info!(
            "Toggling session {} to headless={}",
            session.key(),
            target_headless
        );

        match self.try_toggle(session, target_headless).await {
            Ok(()) => {
                session.touch();
                info!(
                    "Session {} now running headless={}",
                    session.key(),
                    target_headless
                );
                Ok(())
            }
            Err(e) => {
                session.mark_error();
                error!(
                    "Toggle failed for {}, session left in error state: {}",
                    session.key(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn try_toggle(&self, session: &Session, target_headless: bool) -> Result<()> {
        let old = session.driver()?;

        // 1. Snapshot the navigation state before anything is destroyed
        let location = old.current_url().await?;
        let cookies = old.cookies().await?;
        debug!(
            "Session {} snapshot: {} cookies at {}",
            session.key(),
            cookies.len(),
            location
        );

        // 2. Release the old driver (graceful quit, forced after the grace period)
        old.quit().await?;

        // 3. Replacement driver: flipped mode, same proxy assignment
        let spec = LaunchSpec {
            headless: target_headless,
            proxy: session.proxy().cloned(),
            user_agent: self.config.user_agent.clone(),
            window_width: self.config.window_width,
            window_height: self.config.window_height,
            chrome_path: self.config.chrome_path.clone(),
        };
        let fresh = self.factory.build(&spec).await?;

        // 4. Restore authentication at the site root
        fresh.navigate(&self.config.base_url).await?;
        for cookie in &cookies {
            if let Err(e) = fresh.set_cookie(cookie).await {
                warn!("Cookie {} failed to replay: {}", cookie.name, e);
            }
        }

        // 5. Back to where the session was
        fresh.navigate(&location).await?;

        // 6. Swap into the session; key and status are preserved
        session.replace_driver(fresh)?;

        Ok(())
    }
}
