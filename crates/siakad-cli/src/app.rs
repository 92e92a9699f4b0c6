//! Application state for the siakad shell.
//!
//! Wires the configuration, the file-backed session storage, the mounted auth
//! provider, the router and the API client together, and implements the
//! shell's commands on top of them.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use siakad_core::api::ApiClient;
use siakad_core::routes::{Router, View};
use siakad_core::{AuthProvider, AuthState, Config, FileStorage, Route, SessionStore};

pub struct App {
    config: Config,
    api: ApiClient,
    provider: AuthProvider,
    router: Router,
}

impl App {
    /// Create the application and mount the session. Must run inside the runtime.
    pub fn new() -> Result<Self> {
        debug!("App::new() starting");
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        if let Ok(url) = std::env::var("SIAKAD_API_URL") {
            config.api_base_url = Some(url);
        }

        let storage_dir = config.storage_dir()?;
        debug!(?storage_dir, "Storage directory configured");
        let storage = FileStorage::open(&storage_dir, config.poll_interval())
            .with_context(|| format!("Failed to open session storage in {}", storage_dir.display()))?;

        let provider = AuthProvider::mount(SessionStore::new(Arc::new(storage)));
        let router = Router::new(provider.context().clone());
        let api = ApiClient::new(config.api_base_url())?;

        Ok(Self {
            config,
            api,
            provider,
            router,
        })
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Sign in, prompting for whatever the environment does not provide
    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username
            .or_else(|| std::env::var("SIAKAD_USERNAME").ok())
            .or_else(|| self.config.last_username.clone())
        {
            Some(name) if !name.is_empty() => name,
            _ => Self::prompt_username()?,
        };
        let password = match std::env::var("SIAKAD_PASSWORD") {
            Ok(password) => password,
            Err(_) => Self::prompt_password()?,
        };
        if username.is_empty() || password.is_empty() {
            return Err(anyhow::anyhow!("Username and password required"));
        }

        eprintln!("Authenticating...");
        let user = self.api.authenticate(&username, &password).await?;
        self.provider.context().login(user)?;

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!("Login successful");
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        let view = self.router.logout()?;
        debug!(?view, "Logged out");
        println!("Logged out.");
        Ok(())
    }

    pub fn status(&self) {
        print_state(&self.provider.context().state());
    }

    /// Open a page the way the browser would, signing in first if the guard asks for it
    pub async fn open(&mut self, href: &str) -> Result<()> {
        let mut view = self.router.open(href);
        if let View::Login { ref from } = view {
            if let Some(from) = from {
                eprintln!("Sign in to open {}", from);
            }
            self.login(None).await?;
            view = self.router.complete_login();
        }
        self.show(view).await
    }

    /// Print every session change until interrupted
    pub async fn watch(&self) -> Result<()> {
        let mut changes = self.provider.context().watch();
        print_state(&changes.borrow_and_update());

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    print_state(&changes.borrow_and_update());
                }
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    async fn show(&self, view: View) -> Result<()> {
        match view {
            View::Loading => println!("Memverifikasi autentikasi..."),
            View::Login { .. } => println!("Not signed in."),
            View::NotFound(location) => println!("Page not found: {}", location),
            View::Page(route) => self.show_page(route).await?,
        }
        Ok(())
    }

    async fn show_page(&self, route: Route) -> Result<()> {
        let api = self.api.for_session(self.provider.context())?;
        println!("== {} ==", route.title());

        match route.collection() {
            None => {
                let stats = api.fetch_dashboard_stats().await?;
                println!("Total Mahasiswa: {}", stats.students);
                println!("Total Dosen:     {}", stats.lecturers);
                println!("Mata Kuliah:     {}", stats.courses);
                println!("Fakultas:        {}", stats.faculties);
            }
            Some(collection) => {
                let records = api.fetch_collection(collection).await?;
                println!("{} records", records.len());
                println!("{}", serde_json::to_string_pretty(&Value::Array(records))?);
            }
        }
        Ok(())
    }

    fn prompt_username() -> Result<String> {
        print!("Username: ");
        io::stdout().flush()?;

        let mut username = String::new();
        io::stdin().read_line(&mut username)?;
        Ok(username.trim().to_string())
    }

    fn prompt_password() -> Result<String> {
        let password = rpassword::prompt_password("Password: ")?;
        Ok(password)
    }
}

fn print_state(state: &AuthState) {
    match (state.is_loading, &state.user) {
        (true, _) => println!("Memverifikasi autentikasi..."),
        (false, None) => println!("Not signed in."),
        (false, Some(user)) => println!(
            "[{}] Signed in as {}{}",
            user.initial(),
            user.display_name(),
            if user.token.is_some() { "" } else { " (no token)" }
        ),
    }
}
