//! Application launcher - spawning and health checking the app under test

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to a running application process
pub struct AppServer {
    child: Child,
    base_url: String,
    port: u16,
}

impl AppServer {
    /// Spawn the application and wait until it answers its health path
    pub async fn spawn(config: &AppConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning application on port {}", port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.args(&config.args)
            .env("CATALOG_APP_PORT", port.to_string())
            .env("CATALOG_APP_HOST", "127.0.0.1");
        if let Some(db_path) = &config.db_path {
            cmd.env("CATALOG_DB_PATH", db_path);
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|e| {
            E2eError::AppStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let server = AppServer {
            child,
            base_url: base_url.clone(),
            port,
        };

        server
            .wait_for_healthy(&config.health_path, config.startup_timeout())
            .await?;

        info!("Application is healthy at {}", base_url);
        Ok(server)
    }

    async fn wait_for_healthy(&self, health_path: &str, timeout: Duration) -> E2eResult<()> {
        let health_url = format!("{}{}", self.base_url, health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!("Health check returned {}", resp.status()),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application to start...");
                    }
                    // refused connections are expected during startup
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::AppHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop the application, gracefully first
    pub fn stop(&mut self) -> E2eResult<()> {
        info!("Stopping application (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning the application under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub binary_path: PathBuf,
    pub args: Vec<String>,
    /// Port to listen on (None = find a free port)
    pub port: Option<u16>,
    /// Database the application should use; shared with the harness store
    pub db_path: Option<PathBuf>,
    pub health_path: String,
    pub startup_timeout_ms: u64,
}

impl AppConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("bin/catalog-app"),
            args: Vec::new(),
            port: None,
            db_path: None,
            health_path: "/login".to_string(),
            startup_timeout_ms: 30_000,
        }
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
