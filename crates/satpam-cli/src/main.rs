//! `satpam` — terminal front-end for the session authority.
//!
//! Reads `satpam.toml` (or the path given with `--config`), wires the
//! HTTP backend into a session authority, and exposes the sign-in,
//! inspection, and sign-out flows.
//!
//! # Usage
//!
//! ```
//! satpam login alice@example.org
//! satpam whoami
//! satpam watch
//! satpam logout
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use satpam_backend_http::{
  HttpConfig, HttpCredentialBackend, HttpProfileStore,
};
use satpam_session::{AuthSnapshot, SessionAuthority, Timings};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type Authority = SessionAuthority<HttpCredentialBackend>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "satpam", version, about = "Session authority CLI")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "satpam.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
  /// Sign in with an email address; the password is read from stdin.
  Login { email: String },
  /// Print the current session, profile, and derived permissions.
  Whoami,
  /// Follow the snapshot and print every transition until interrupted.
  Watch,
  /// Sign out and discard the persisted session.
  Logout,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration: file first, then SATPAM_* environment overrides.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SATPAM"))
    .build()
    .context("failed to read config")?;
  let http_config: HttpConfig = settings
    .try_deserialize()
    .context("failed to deserialise HttpConfig")?;

  let credentials = Arc::new(
    HttpCredentialBackend::new(http_config.clone())
      .context("building credential backend")?,
  );
  let profiles = Arc::new(HttpProfileStore::new(
    http_config,
    Arc::clone(&credentials),
  ));
  let authority = SessionAuthority::spawn(
    Arc::clone(&credentials),
    profiles,
    Timings::default(),
  );
  authority.initialize().await;

  match cli.command {
    Cmd::Login { email } => login(&authority, &email).await,
    Cmd::Whoami => whoami(&authority).await,
    Cmd::Watch => watch(&authority, &credentials).await,
    Cmd::Logout => logout(&authority).await,
  }
}

// ─── Subcommands ──────────────────────────────────────────────────────────────

async fn login(authority: &Authority, email: &str) -> Result<()> {
  let password = read_password()?;
  authority
    .sign_in(email, &password)
    .await
    .context("sign-in failed")?;

  // The profile arrives via the change notification; wait for it.
  let snap =
    settled(authority, |s| s.profile.is_some() || s.error.is_some()).await?;
  print_snapshot(&snap);
  Ok(())
}

async fn whoami(authority: &Authority) -> Result<()> {
  let snap = settled(authority, |s| !s.loading).await?;
  print_snapshot(&snap);
  Ok(())
}

async fn watch(
  authority: &Authority,
  credentials: &Arc<HttpCredentialBackend>,
) -> Result<()> {
  let refresh = credentials.start_auto_refresh();
  let mut rx = authority.subscribe();
  print_snapshot(&rx.borrow_and_update().clone());

  loop {
    tokio::select! {
      changed = rx.changed() => {
        if changed.is_err() {
          break;
        }
        println!("---");
        print_snapshot(&rx.borrow_and_update().clone());
      }
      _ = tokio::signal::ctrl_c() => break,
    }
  }
  refresh.abort();
  Ok(())
}

async fn logout(authority: &Authority) -> Result<()> {
  // Let any persisted session load first so the remote revoke has a
  // token to present.
  let _ = settled(authority, |s| !s.loading).await;
  authority.sign_out().await.context("sign-out failed")?;
  println!("signed out");
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Follow the snapshot until `pred` accepts it.
async fn settled(
  authority: &Authority,
  mut pred: impl FnMut(&AuthSnapshot) -> bool,
) -> Result<AuthSnapshot> {
  let mut rx = authority.subscribe();
  tokio::time::timeout(Duration::from_secs(15), async {
    loop {
      {
        let snap = rx.borrow_and_update().clone();
        if pred(&snap) {
          return Ok(snap);
        }
      }
      if rx.changed().await.is_err() {
        bail!("session authority stopped");
      }
    }
  })
  .await
  .context("timed out waiting for the session authority")?
}

fn print_snapshot(snap: &AuthSnapshot) {
  if snap.loading {
    println!("(loading)");
  }
  match (&snap.user, &snap.profile) {
    (Some(user), Some(profile)) => {
      println!("{} <{}>", profile.full_name, user.email);
      println!("  role:              {}", profile.role);
      println!("  manage users:      {}", snap.can_manage_users());
      println!("  manage members:    {}", snap.can_manage_members());
      println!("  manage leadership: {}", snap.can_manage_leadership());
      println!("  publish articles:  {}", snap.can_publish_articles());
    }
    (Some(user), None) => {
      println!("signed in as {} (profile pending)", user.email);
    }
    _ => println!("not signed in"),
  }
  if let Some(session) = &snap.session {
    println!("  session expires:   {}", session.expires_at);
  }
  if let Some(error) = &snap.error {
    println!("  warning: {error}");
  }
}

/// Read a password from stdin.
fn read_password() -> Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
