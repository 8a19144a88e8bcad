use cadence_engine::config::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

pub type CdpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A launched Chromium with its CDP handler loop and the first page.
pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    user_data_dir: PathBuf,
    cleanup_user_data_dir: bool,
}

impl CdpClient {
    pub async fn launch(config: &BrowserConfig) -> CdpResult<Self> {
        let mut builder = chromiumoxide::BrowserConfig::builder().no_sandbox();
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir(config)?;
        builder = builder.user_data_dir(&user_data_dir);

        if config.visible {
            tracing::info!("Launching browser in visible mode");
            builder = builder.with_head();
        } else {
            tracing::info!("Launching browser in headless mode");
        }

        let executable = config
            .chrome_executable
            .clone()
            .or_else(|| std::env::var_os("CHROME_BIN").map(PathBuf::from));
        if let Some(executable) = executable {
            tracing::info!("Using Chrome binary: {}", executable.display());
            builder = builder.chrome_executable(executable);
        }

        let (browser, mut handler) = Browser::launch(
            builder
                .build()
                .map_err(|e| format!("Failed to build browser config: {}", e))?,
        )
        .await
        .map_err(|e| format!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error (ignoring): {}", e);
                }
            }
            tracing::info!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to create page: {}", e))?;
        accept_dialogs(&page).await?;

        Ok(Self {
            browser,
            handler_task,
            page,
            user_data_dir,
            cleanup_user_data_dir,
        })
    }

    pub async fn close(mut self) -> CdpResult<()> {
        self.browser
            .close()
            .await
            .map_err(|e| format!("Error closing browser: {}", e))?;
        self.handler_task
            .await
            .map_err(|e| format!("Error awaiting handler: {}", e))?;

        if self.cleanup_user_data_dir {
            if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
                tracing::debug!(
                    "Failed to clean up user-data-dir {}: {}",
                    self.user_data_dir.display(),
                    e
                );
            }
        }
        Ok(())
    }
}

/// Auto-accept alert/confirm/prompt dialogs on `page`. They block script
/// evaluation otherwise.
pub async fn accept_dialogs(page: &Page) -> CdpResult<()> {
    let mut dialogs = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = dialogs.next().await {
            tracing::info!("Accepting dialog: {} ({:?})", event.message, event.r#type);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                tracing::warn!("Failed to accept dialog: {}", e);
            }
        }
    });
    Ok(())
}

fn resolve_user_data_dir(config: &BrowserConfig) -> CdpResult<(PathBuf, bool)> {
    if let Some(path) = &config.user_data_dir {
        std::fs::create_dir_all(path)?;
        tracing::info!("Using configured user data dir: {}", path.display());
        return Ok((path.clone(), false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("cadence-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::debug!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
