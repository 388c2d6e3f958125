//! Agent root (spec.md §4.7): owns the live config, the check registry, the
//! listener set and the managed-exporter supervisors, and reacts to
//! SIGHUP/SIGINT/SIGTERM.
//!
//! **Grounding.** Config hot-swap uses `arc_swap::ArcSwap`, the mechanism
//! the teacher uses for its own router hot-swap (`app_context.rs`,
//! `proxy/mod.rs`'s `SharedProxyState`). Signal handling uses
//! `tokio::signal::unix::signal` rather than raw `nix` masks so it composes
//! with `select!` alongside the other suspension points in the run loop.
//!
//! **Scoping note.** The original config schema supports an open set of
//! handler modules (`WEBServer`, `CheckExternalScripts`, `CheckNSCP`, …),
//! each owning its own section layout. The sample pack only carries a full
//! implementation for the managed-exporter reverse-proxy handler, so this
//! binds exactly two concrete config sections: `/settings/WEB/server` (one
//! HTTP listener) and `/settings/ManagedExporter/default` (one supervised
//! exporter, optionally proxied over that listener). Recorded in DESIGN.md.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use sentinel_config::ConfigTree;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;

use crate::acl::AllowedHosts;
use crate::checks::{CheckArgs, CheckRegistry, CheckResult, builtin_registry};
use crate::error::{AgentError, Result};
use crate::http::{HttpDispatcher, ManagedExporterHandler, PasswordConfig};
use crate::net::listener::{BindSpec, Listener};
use crate::net::registry::ListenerRegistry;
use crate::net::tls::load_acceptor;
use crate::net::parse_port_spec;
use crate::supervisor::{ManagedExporterConfig, ProcStatusMemoryReader, Supervisor};
use crate::task_group::TaskGroup;

const WEB_SECTION: &str = "/settings/WEB/server";
const MANAGED_EXPORTER_SECTION: &str = "/settings/ManagedExporter/default";
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

pub struct Agent {
    config_path: PathBuf,
    config: ArcSwap<ConfigTree>,
    checks: CheckRegistry,
    listeners: Mutex<ListenerRegistry>,
    supervisors: Mutex<Vec<Arc<Supervisor>>>,
    tasks: Mutex<TaskGroup>,
}

impl Agent {
    pub fn new(config_path: PathBuf) -> Result<Self> {
        let tree = sentinel_config::load(&config_path)?;
        Ok(Self {
            config_path,
            config: ArcSwap::from_pointee(tree),
            checks: builtin_registry(),
            listeners: Mutex::new(ListenerRegistry::new()),
            supervisors: Mutex::new(Vec::new()),
            tasks: Mutex::new(TaskGroup::new()),
        })
    }

    /// Runs a single named check (`sentineld check <name> [args...]`), the
    /// one-shot CLI entry point.
    pub fn run_check(&self, name: &str, argv: &[String]) -> std::result::Result<CheckResult, crate::checks::CheckError> {
        self.checks.run(name, &CheckArgs::parse(argv))
    }

    /// Starts the daemon: binds whatever the initial config describes, then
    /// blocks reacting to SIGHUP (reload) and SIGINT/SIGTERM (drain-stop)
    /// until one of the latter two is received.
    pub async fn run(&self) -> Result<()> {
        let tree = self.config.load_full();
        self.apply_config(&tree).await?;
        self.start_supervisors(&tree).await?;

        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    if let Err(e) = self.reload().await {
                        tracing::error!(error = %e, "config reload failed, keeping previous configuration");
                    }
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Rebuilds the config tree from disk and diffs the listener set:
    /// listeners whose relevant config is unchanged are left running, the
    /// rest are stopped and recreated (spec.md §4.7).
    async fn reload(&self) -> Result<()> {
        let tree = sentinel_config::load(&self.config_path)?;
        self.apply_config(&tree).await?;
        self.config.store(Arc::new(tree));
        Ok(())
    }

    async fn apply_config(&self, tree: &ConfigTree) -> Result<()> {
        let defaults = HashMap::new();

        let Some(port_raw) = tree.get_string(WEB_SECTION, "port", &defaults) else {
            tracing::info!(section = WEB_SECTION, "no web listener configured");
            return Ok(());
        };
        let Some((port, tls)) = parse_port_spec(&port_raw) else {
            return Err(AgentError::InvalidConfig(format!("invalid port {port_raw:?} in {WEB_SECTION}")));
        };
        let bind_raw = tree.get_string(WEB_SECTION, "bind", &defaults).unwrap_or_else(|| "0.0.0.0".to_string());
        let bind: IpAddr = bind_raw
            .parse()
            .map_err(|_| AgentError::InvalidConfig(format!("invalid bind address {bind_raw:?} in {WEB_SECTION}")))?;
        let allowed_hosts_raw = tree.get_string(WEB_SECTION, "allowed hosts", &defaults).unwrap_or_default();
        let cache_dns = tree.get_bool(WEB_SECTION, "cache allowed hosts", &defaults).unwrap_or(false);

        let spec = BindSpec { bind, port, tls };

        let mut dispatcher = HttpDispatcher::new();
        if let Some(handler) = self.build_managed_exporter_handler(tree, &defaults)? {
            dispatcher.register(Arc::new(handler));
        }

        let config_hash = hash_section(&[&bind_raw, &port_raw, &allowed_hosts_raw]);

        let mut listeners = self.listeners.lock().await;
        if listeners.is_unchanged(&spec, config_hash) {
            return Ok(());
        }
        if let Some(previous) = listeners.remove(&spec) {
            previous.handle.stop().await;
        }

        if dispatcher.is_empty() {
            tracing::warn!(%spec, "web listener configured but no handler has any URL mapping; not binding");
            return Ok(());
        }

        let allowed_hosts = AllowedHosts::parse(&allowed_hosts_raw, cache_dns)?;
        let tls_acceptor = if tls {
            let cert = tree
                .get_string(WEB_SECTION, "certificate", &defaults)
                .ok_or_else(|| AgentError::InvalidConfig(format!("{WEB_SECTION} port is TLS but certificate is unset")))?;
            let key = tree
                .get_string(WEB_SECTION, "certificate key", &defaults)
                .ok_or_else(|| AgentError::InvalidConfig(format!("{WEB_SECTION} port is TLS but certificate key is unset")))?;
            Some(load_acceptor(Path::new(&cert), Path::new(&key))?)
        } else {
            None
        };

        let listener = Listener::new(spec.clone(), tls_acceptor, allowed_hosts, Arc::new(dispatcher))?;
        let handle = listener.start().await?;
        listeners.insert(spec, handle, config_hash);
        Ok(())
    }

    fn build_managed_exporter_handler(
        &self,
        tree: &ConfigTree,
        defaults: &HashMap<String, String>,
    ) -> Result<Option<ManagedExporterHandler>> {
        let Some(url) = tree.get_string(MANAGED_EXPORTER_SECTION, "url", defaults) else {
            return Ok(None);
        };
        let upstream = tree
            .get_string(MANAGED_EXPORTER_SECTION, "upstream", defaults)
            .unwrap_or_else(|| "127.0.0.1:9100".to_string());
        let password = PasswordConfig::parse(&tree.get_string(MANAGED_EXPORTER_SECTION, "password", defaults).unwrap_or_default());
        Ok(Some(ManagedExporterHandler::new("ManagedExporter".to_string(), url, upstream, password)))
    }

    /// Builds and starts the managed-exporter supervisor described by
    /// `/settings/ManagedExporter/default`, if any. Only runs once, at
    /// startup: supervisor lifecycles are independent of listener reload.
    async fn start_supervisors(&self, tree: &ConfigTree) -> Result<()> {
        let defaults = HashMap::new();
        let Some(agent_cmd) = tree.get_string(MANAGED_EXPORTER_SECTION, "agent", &defaults) else {
            return Ok(());
        };

        let extra_args_raw = tree.get_string(MANAGED_EXPORTER_SECTION, "agent extra args", &defaults).unwrap_or_default();
        let user = tree.get_string(MANAGED_EXPORTER_SECTION, "agent user", &defaults);
        let max_memory_bytes = tree.get_int(MANAGED_EXPORTER_SECTION, "agent max memory", &defaults).and_then(|v| {
            if v > 0 {
                Some(v as u64)
            } else {
                None
            }
        });

        let config = ManagedExporterConfig {
            name: "ManagedExporter".to_string(),
            args: crate::supervisor::tokenize_args(&agent_cmd),
            extra_args: crate::supervisor::tokenize_args(&extra_args_raw),
            user,
            max_memory_bytes,
        };

        let supervisor = Arc::new(Supervisor::new(config, Arc::new(ProcStatusMemoryReader)));
        let mut tasks = self.tasks.lock().await;
        supervisor.start(&mut tasks);
        self.supervisors.lock().await.push(supervisor);
        Ok(())
    }

    /// Drain-stops every listener (5s grace each, handled internally) and
    /// kills every supervised child, then waits for every registered task
    /// to wind down before returning.
    async fn shutdown(&self) {
        let listeners = std::mem::take(&mut *self.listeners.lock().await);
        listeners.stop_all().await;

        for supervisor in self.supervisors.lock().await.drain(..) {
            supervisor.stop();
        }

        self.tasks.lock().await.shutdown(SHUTDOWN_GRACE).await;
    }
}

fn hash_section(values: &[&str]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for value in values {
        value.hash(&mut hasher);
    }
    hasher.finish()
}
