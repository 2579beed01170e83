//! Direct-message thread registry.
//!
//! One canonical thread per unordered pair of users, visible only to its two
//! members. The pieces, leaf first:
//!
//! - [`membership::MembershipIndex`]: who is in which thread
//! - [`dedup::DedupResolver`]: find-or-create the thread for a pair
//! - [`access::AccessGuard`]: members-only checkpoint
//! - [`view::ThreadViewBuilder`]: thread id + the other participant's profile
//! - [`ThreadRegistry`]: the request-facing entry points tying them together
//!
//! Group threads are out of scope. `other_member` assumes two parties; adding
//! groups means replacing it with an explicit member list.

pub mod access;
pub mod auth;
pub mod dedup;
pub mod integrity;
pub mod membership;
pub mod view;

use crate::core::config::{ListPolicy, RegistryConfig};
use crate::core::error::DmregError;
use crate::core::store::{ThreadId, ThreadStore, UserId};
use crate::core::time;
use access::AccessGuard;
use auth::{AuthGate, Request};
use colored::Colorize;
use dedup::DedupResolver;
use membership::MembershipIndex;
use rayon::prelude::*;
use view::{ThreadView, ThreadViewBuilder};

/// Result of `open_thread`: the view plus whether this call created it.
#[derive(Debug, Clone)]
pub struct OpenedThread {
    pub view: ThreadView,
    pub created: bool,
}

pub struct ThreadRegistry<S, A> {
    store: S,
    auth: A,
    list_policy: ListPolicy,
    create_retries: u32,
}

impl<S: ThreadStore, A: AuthGate> ThreadRegistry<S, A> {
    pub fn new(store: S, auth: A) -> Self {
        let defaults = RegistryConfig::default();
        Self {
            store,
            auth,
            list_policy: defaults.list_policy,
            create_retries: defaults.create_retries,
        }
    }

    pub fn with_config(mut self, config: &RegistryConfig) -> Self {
        self.list_policy = config.list_policy;
        self.create_retries = config.create_retries;
        self
    }

    pub fn with_list_policy(mut self, policy: ListPolicy) -> Self {
        self.list_policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Request-facing API ---

    pub fn list_threads(&self, request: &Request) -> Result<Vec<ThreadView>, DmregError> {
        let caller = self.auth.current_user(request)?;
        self.list_for(&caller.id)
    }

    pub fn get_thread(
        &self,
        request: &Request,
        thread: &ThreadId,
    ) -> Result<ThreadView, DmregError> {
        let caller = self.auth.current_user(request)?;
        self.get_for(thread, &caller.id)
    }

    pub fn create_or_get_thread(
        &self,
        request: &Request,
        username: &str,
    ) -> Result<ThreadView, DmregError> {
        Ok(self.open_thread(request, username)?.view)
    }

    pub fn open_thread(
        &self,
        request: &Request,
        username: &str,
    ) -> Result<OpenedThread, DmregError> {
        let caller = self.auth.current_user(request)?;
        let resolution = DedupResolver::new(&self.store, self.create_retries)
            .resolve_or_create(&caller.id, username)?;
        let view =
            ThreadViewBuilder::new(&self.store).build_view(resolution.thread_id(), &caller.id)?;
        Ok(OpenedThread {
            view,
            created: resolution.was_created(),
        })
    }

    // --- Caller-id entry points ---

    /// Views of every thread `caller` belongs to, newest first.
    ///
    /// Views are built in parallel. Under `ListPolicy::SkipBroken`, a thread
    /// whose view fails with an integrity-class error (or whose thread row is
    /// gone) is logged and left out; any other error fails the call. Under
    /// `ListPolicy::Strict` any failure fails the call.
    pub fn list_for(&self, caller: &UserId) -> Result<Vec<ThreadView>, DmregError> {
        let thread_ids: Vec<ThreadId> = MembershipIndex::new(&self.store)
            .threads_of(caller)?
            .into_iter()
            .collect();
        let builder = ThreadViewBuilder::new(&self.store);

        let built: Vec<(ThreadId, Result<ThreadView, DmregError>)> = thread_ids
            .into_par_iter()
            .map(|id| {
                let view = builder.build_view(&id, caller);
                (id, view)
            })
            .collect();

        let mut views = Vec::with_capacity(built.len());
        for (id, result) in built {
            match result {
                Ok(view) => views.push(view),
                Err(e) if self.list_policy == ListPolicy::SkipBroken && is_skippable(&e) => {
                    tracing::warn!(thread = %id, caller = %caller, error = %e, "omitting broken thread from list");
                }
                Err(e) => return Err(e),
            }
        }

        views.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.thread_id.cmp(&a.thread_id))
        });
        Ok(views)
    }

    pub fn get_for(&self, thread: &ThreadId, caller: &UserId) -> Result<ThreadView, DmregError> {
        AccessGuard::new(&self.store).authorize(thread, caller)?;
        ThreadViewBuilder::new(&self.store).build_view(thread, caller)
    }
}

fn is_skippable(err: &DmregError) -> bool {
    err.is_integrity() || matches!(err, DmregError::ThreadNotFound(_))
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "dm",
        "version": "0.1.0",
        "description": "Direct-message thread registry: one thread per user pair, members-only access",
        "commands": [
            { "name": "list", "description": "List the caller's threads" },
            { "name": "get", "description": "Show one thread the caller belongs to", "parameters": ["thread_id"] },
            { "name": "create", "description": "Open the caller's thread with a user, creating it on first contact", "parameters": ["username"] },
            { "name": "verify", "description": "Scan all threads for broken registry invariants" }
        ],
        "storage": ["dmreg.db", "broker.events.jsonl"]
    })
}

// CLI types for clap integration
#[derive(clap::Args, Debug)]
pub struct DmCli {
    #[clap(subcommand)]
    pub command: DmCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum DmCommand {
    /// List your direct-message threads
    List {
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Show one of your threads
    Get {
        /// Thread id
        thread_id: String,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Open (or create) your thread with another user
    Create {
        /// Username of the other participant
        username: String,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Check every thread for broken registry invariants
    Verify {
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
}

impl DmCommand {
    pub fn op_name(&self) -> &'static str {
        match self {
            DmCommand::List { .. } => "dm.list",
            DmCommand::Get { .. } => "dm.get",
            DmCommand::Create { .. } => "dm.create",
            DmCommand::Verify { .. } => "dm.verify",
        }
    }

    fn format(&self) -> &str {
        match self {
            DmCommand::List { format }
            | DmCommand::Get { format, .. }
            | DmCommand::Create { format, .. }
            | DmCommand::Verify { format } => format,
        }
    }
}

fn print_view(view: &ThreadView) {
    let image = view.other_user.profile_image.as_deref().unwrap_or("-");
    println!(
        "{}  {}  {}",
        view.thread_id.as_str().bright_cyan(),
        view.other_user.username.bold(),
        image.dimmed()
    );
}

fn print_json(value: &serde_json::Value) -> Result<(), DmregError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| DmregError::ValidationError(format!("json encode: {e}")))?;
    println!("{}", out);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DmregError> {
    serde_json::to_value(value).map_err(|e| DmregError::ValidationError(format!("json encode: {e}")))
}

pub fn run_dm_cli<S: ThreadStore, A: AuthGate>(
    registry: &ThreadRegistry<S, A>,
    request: &Request,
    cli: DmCli,
) -> Result<(), DmregError> {
    let op = cli.command.op_name();
    let json = cli.command.format() == "json";
    // `dm verify` writes exactly one envelope of its own on every path.
    let owns_envelope = matches!(cli.command, DmCommand::Verify { .. });

    let result = dispatch(registry, request, cli.command, json);
    if let (true, false, Err(e)) = (json, owns_envelope, &result) {
        print_json(&time::error_envelope(op, e))?;
    }
    result
}

fn dispatch<S: ThreadStore, A: AuthGate>(
    registry: &ThreadRegistry<S, A>,
    request: &Request,
    command: DmCommand,
    json: bool,
) -> Result<(), DmregError> {
    match command {
        DmCommand::List { .. } => {
            let views = registry.list_threads(request)?;
            if json {
                print_json(&time::command_envelope(
                    "dm.list",
                    "ok",
                    serde_json::json!({ "threads": to_json(&views)? }),
                ))?;
            } else if views.is_empty() {
                println!("No direct messages yet.");
            } else {
                for view in &views {
                    print_view(view);
                }
            }
        }
        DmCommand::Get { thread_id, .. } => {
            let view = registry.get_thread(request, &ThreadId::from(thread_id))?;
            if json {
                print_json(&time::command_envelope(
                    "dm.get",
                    "ok",
                    serde_json::json!({ "thread": to_json(&view)? }),
                ))?;
            } else {
                print_view(&view);
            }
        }
        DmCommand::Create { username, .. } => {
            let opened = registry.open_thread(request, &username)?;
            if json {
                print_json(&time::command_envelope(
                    "dm.create",
                    "ok",
                    serde_json::json!({
                        "created": opened.created,
                        "thread": to_json(&opened.view)?
                    }),
                ))?;
            } else {
                let verb = if opened.created { "Created" } else { "Existing" };
                print!("{} ", format!("{verb}:").green());
                print_view(&opened.view);
            }
        }
        DmCommand::Verify { .. } => verify(registry.store(), json)?,
    }
    Ok(())
}

/// Integrity scan for `dm verify`. Violations fail the command; under JSON
/// the error envelope carries the full report.
fn verify<S: ThreadStore>(store: &S, json: bool) -> Result<(), DmregError> {
    let report = match integrity::audit_integrity(store) {
        Ok(report) => report,
        Err(e) => {
            if json {
                print_json(&time::error_envelope("dm.verify", &e))?;
            }
            return Err(e);
        }
    };

    if !json {
        println!("Scanned {} thread(s).", report.threads_scanned);
        for v in &report.violations {
            println!("  {} {} {:?}: {}", "✗".red(), v.thread_id, v.kind, v.detail);
        }
    }
    if report.is_clean() {
        if json {
            print_json(&time::command_envelope(
                "dm.verify",
                "ok",
                serde_json::json!({ "report": to_json(&report)? }),
            ))?;
        }
        return Ok(());
    }

    let err = DmregError::IntegrityViolation(format!(
        "{} violation(s) found",
        report.violations.len()
    ));
    if json {
        let mut envelope = time::error_envelope("dm.verify", &err);
        if let Some(obj) = envelope.as_object_mut() {
            obj.insert("report".to_string(), to_json(&report)?);
        }
        print_json(&envelope)?;
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_store::MemoryStore;
    use auth::DirectoryAuth;
    use std::sync::Arc;

    fn registry() -> ThreadRegistry<Arc<MemoryStore>, DirectoryAuth<Arc<MemoryStore>>> {
        let store = Arc::new(MemoryStore::new());
        for name in ["alice", "bob", "carol"] {
            store.insert_user(name, None).unwrap();
        }
        ThreadRegistry::new(Arc::clone(&store), DirectoryAuth::new(store))
    }

    #[test]
    fn strict_policy_fails_whole_list_on_one_broken_thread() {
        let reg = registry().with_list_policy(ListPolicy::Strict);
        let alice = Request::as_user("alice");
        reg.create_or_get_thread(&alice, "bob").unwrap();
        let a = reg.store().user_by_username("alice").unwrap().unwrap().id;
        reg.store().inject_thread(std::slice::from_ref(&a)).unwrap();

        assert!(matches!(
            reg.list_threads(&alice),
            Err(DmregError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn skip_policy_omits_broken_threads_only() {
        let reg = registry();
        let alice = Request::as_user("alice");
        let good = reg.create_or_get_thread(&alice, "bob").unwrap();
        let a = reg.store().user_by_username("alice").unwrap().unwrap().id;
        reg.store().inject_thread(std::slice::from_ref(&a)).unwrap();

        let views = reg.list_threads(&alice).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].thread_id, good.thread_id);
    }

    #[test]
    fn open_thread_reports_creation_once() {
        let reg = registry();
        let alice = Request::as_user("alice");
        assert!(reg.open_thread(&alice, "carol").unwrap().created);
        assert!(!reg.open_thread(&alice, "carol").unwrap().created);
        assert!(!reg.open_thread(&Request::as_user("carol"), "alice").unwrap().created);
    }
}
