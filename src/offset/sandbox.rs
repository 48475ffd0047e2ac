// src/offset/sandbox.rs
//
// The offset-function engine. At most one record is active; readers take
// an Arc snapshot through a parking_lot RwLock while apply operations are
// serialized by an atomic busy flag. Scripts run on a dedicated thread
// with a wall-clock deadline enforced through rhai's progress callback,
// so a runaway script always terminates and never blocks a request.
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use log::{error, info};
use parking_lot::RwLock;
use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST};
use serde_json::Value;

use crate::offset::merge::merge;
use crate::storage::offset_file;

/// The function every offset script must define.
pub const OFFSET_FN_NAME: &str = "offset";

/// Built-in identity transform: an empty map merges as a no-op.
pub const DEFAULT_SOURCE: &str = "\
// Receives the synthesized status and the raw backend list; whatever map
// it returns is merged onto the status before it is sent to clients.
fn offset(origin, backends) {
    #{}
}
";

/// Extra slack past the script deadline before the supervisor gives up
/// waiting on the channel. The progress callback fires well within this.
const REAP_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub enum OffsetError {
    /// Another validate-and-apply is already in flight.
    Busy,
    Compile(String),
    /// The script defines no functions at all.
    MissingExport,
    /// The script defines functions, but no 2-parameter `offset`.
    AmbiguousModule,
    ValidationTimeout,
    Runtime(String),
    SchemaViolation(String),
    Persist(io::Error),
}

impl fmt::Display for OffsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "another offset apply is in progress"),
            Self::Compile(msg) => write!(f, "offset source does not compile: {}", msg),
            Self::MissingExport => {
                write!(f, "offset source must define fn {}(origin, backends)", OFFSET_FN_NAME)
            }
            Self::AmbiguousModule => write!(
                f,
                "offset source defines functions but no 2-parameter `{}`",
                OFFSET_FN_NAME
            ),
            Self::ValidationTimeout => write!(f, "offset validation run exceeded its budget"),
            Self::Runtime(msg) => write!(f, "offset execution failed: {}", msg),
            Self::SchemaViolation(msg) => write!(f, "merged status violates schema: {}", msg),
            Self::Persist(e) => write!(f, "failed to persist offset source: {}", e),
        }
    }
}

impl std::error::Error for OffsetError {}

/// The active transform: normalized source plus its compiled form.
pub struct OffsetFunctionRecord {
    pub source: String,
    pub accepted_at: SystemTime,
    ast: AST,
}

/// Normalizes and compiles a candidate source, checking the script shape:
/// exactly the one entry point `fn offset(origin, backends)` must exist.
pub fn compile_record(candidate: &str) -> Result<OffsetFunctionRecord, OffsetError> {
    let source = format!("{}\n", candidate.trim_end());
    let engine = Engine::new();
    let ast = engine
        .compile(&source)
        .map_err(|e| OffsetError::Compile(e.to_string()))?;

    let mut any_fn = false;
    let mut entry_point = false;
    for f in ast.iter_functions() {
        any_fn = true;
        if f.name == OFFSET_FN_NAME && f.params.len() == 2 {
            entry_point = true;
        }
    }
    if !any_fn {
        return Err(OffsetError::MissingExport);
    }
    if !entry_point {
        return Err(OffsetError::AmbiguousModule);
    }

    Ok(OffsetFunctionRecord {
        source,
        accepted_at: SystemTime::now(),
        ast,
    })
}

enum ExecFailure {
    Timeout,
    Runtime(String),
}

/// Runs the record's function against the two inputs on its own thread.
///
/// The engine sees only the two values; no host functions are registered.
/// The progress callback aborts evaluation once the deadline passes, which
/// guarantees the worker thread winds down even when the supervisor has
/// already given up on it.
fn run_isolated(
    record: &OffsetFunctionRecord,
    origin: Value,
    backends: Value,
    budget: Duration,
) -> Result<Value, ExecFailure> {
    let ast = record.ast.clone();
    let deadline = Instant::now() + budget;
    let (tx, rx) = mpsc::channel::<Result<Value, ExecFailure>>();

    let spawned = thread::Builder::new()
        .name("offset-run".to_string())
        .spawn(move || {
            let mut engine = Engine::new();
            engine.on_progress(move |_ops| {
                if Instant::now() >= deadline {
                    Some(Dynamic::UNIT)
                } else {
                    None
                }
            });

            let outcome = (|| {
                let origin_dyn = rhai::serde::to_dynamic(origin)
                    .map_err(|e| ExecFailure::Runtime(e.to_string()))?;
                let backends_dyn = rhai::serde::to_dynamic(backends)
                    .map_err(|e| ExecFailure::Runtime(e.to_string()))?;
                let mut scope = Scope::new();
                let out: Dynamic = engine
                    .call_fn(&mut scope, &ast, OFFSET_FN_NAME, (origin_dyn, backends_dyn))
                    .map_err(|e| match *e {
                        EvalAltResult::ErrorTerminated(..) => ExecFailure::Timeout,
                        other => ExecFailure::Runtime(other.to_string()),
                    })?;
                rhai::serde::from_dynamic::<Value>(&out)
                    .map_err(|e| ExecFailure::Runtime(e.to_string()))
            })();
            let _ = tx.send(outcome);
        });

    if let Err(e) = spawned {
        return Err(ExecFailure::Runtime(format!("failed to spawn worker: {}", e)));
    }

    match rx.recv_timeout(budget + REAP_GRACE) {
        Ok(outcome) => outcome,
        Err(_) => Err(ExecFailure::Timeout),
    }
}

/// Structural check of the merged status: the listed keys must exist with
/// the right JSON types. Values are not inspected.
fn check_invariant(merged: &Value) -> Result<(), String> {
    let root = merged
        .as_object()
        .ok_or_else(|| "merged status is not an object".to_string())?;

    let version = root
        .get("version")
        .and_then(Value::as_object)
        .ok_or_else(|| "missing object key `version`".to_string())?;
    if !version.get("name").map(Value::is_string).unwrap_or(false) {
        return Err("missing string key `version.name`".to_string());
    }
    if !version.get("protocol").map(Value::is_i64).unwrap_or(false) {
        return Err("missing integer key `version.protocol`".to_string());
    }

    let players = root
        .get("players")
        .and_then(Value::as_object)
        .ok_or_else(|| "missing object key `players`".to_string())?;
    for key in ["max", "online"] {
        if !players.get(key).map(Value::is_i64).unwrap_or(false) {
            return Err(format!("missing integer key `players.{}`", key));
        }
    }

    if !root.contains_key("description") {
        return Err("missing key `description`".to_string());
    }
    Ok(())
}

pub struct OffsetStore {
    active: RwLock<Arc<OffsetFunctionRecord>>,
    applying: AtomicBool,
    path: PathBuf,
    validate_budget: Duration,
    transform_budget: Duration,
}

impl OffsetStore {
    /// Loads the persisted source, seeding the file with the built-in
    /// default on first run. An unreadable or uncompilable persisted
    /// source is a startup failure.
    pub fn load(
        path: PathBuf,
        validate_budget: Duration,
        transform_budget: Duration,
    ) -> io::Result<Self> {
        let record = match offset_file::read_source(&path)? {
            Some(source) => compile_record(&source).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("persisted offset source at {} is invalid: {}", path.display(), e),
                )
            })?,
            None => {
                let record = compile_record(DEFAULT_SOURCE)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                offset_file::write_source_atomic(&path, &record.source)?;
                info!("seeded default offset function at {}", path.display());
                record
            }
        };

        Ok(Self {
            active: RwLock::new(Arc::new(record)),
            applying: AtomicBool::new(false),
            path,
            validate_budget,
            transform_budget,
        })
    }

    /// Source text of the active record. Never blocks on a pending apply.
    pub fn source(&self) -> String {
        self.active.read().source.clone()
    }

    /// Claims the apply slot, failing fast when one is already in flight.
    pub fn begin_apply(store: &Arc<Self>) -> Result<ApplyTicket, OffsetError> {
        if store
            .applying
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OffsetError::Busy);
        }
        Ok(ApplyTicket {
            store: Arc::clone(store),
        })
    }

    /// Applies the active transform to a live response. Degrades to the
    /// untouched origin on any failure; the client never sees an error.
    pub fn transform(&self, origin: Value, backends: Value) -> Value {
        let record = Arc::clone(&*self.active.read());
        match run_isolated(&record, origin.clone(), backends, self.transform_budget) {
            Ok(Value::Object(patch)) => merge(origin, Value::Object(patch)),
            Ok(other) => {
                error!(
                    "offset function returned a non-object ({}), skipping transform",
                    kind_of(&other)
                );
                origin
            }
            Err(ExecFailure::Timeout) => {
                error!("offset function exceeded its per-request budget, skipping transform");
                origin
            }
            Err(ExecFailure::Runtime(msg)) => {
                error!("offset function failed at request time: {}", msg);
                origin
            }
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Exclusive right to run one validate-and-apply. Dropping the ticket
/// releases the slot no matter how the apply ended.
pub struct ApplyTicket {
    store: Arc<OffsetStore>,
}

impl Drop for ApplyTicket {
    fn drop(&mut self) {
        self.store.applying.store(false, Ordering::SeqCst);
    }
}

impl ApplyTicket {
    /// Validates the candidate against the live sample, persists it, and
    /// swaps it in. Any failure leaves the previous record active both in
    /// memory and on disk.
    pub fn commit(
        self,
        record: OffsetFunctionRecord,
        sample_origin: Value,
        sample_backends: Value,
    ) -> Result<(), OffsetError> {
        let store = &self.store;

        let out = run_isolated(
            &record,
            sample_origin.clone(),
            sample_backends,
            store.validate_budget,
        )
        .map_err(|e| match e {
            ExecFailure::Timeout => OffsetError::ValidationTimeout,
            ExecFailure::Runtime(msg) => OffsetError::Runtime(msg),
        })?;

        let merged = merge(sample_origin, out);
        check_invariant(&merged).map_err(OffsetError::SchemaViolation)?;

        // Durable first: the file is atomically replaced before the
        // in-memory swap, so a crash between the two re-loads the new
        // source and a persist failure leaves the old one untouched.
        offset_file::write_source_atomic(&store.path, &record.source)
            .map_err(OffsetError::Persist)?;

        *store.active.write() = Arc::new(record);
        info!("offset function replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_source_compiles() {
        let record = compile_record(DEFAULT_SOURCE).unwrap();
        assert!(record.source.contains("fn offset"));
    }

    #[test]
    fn script_without_functions_is_missing_export() {
        assert!(matches!(
            compile_record("let x = 1 + 1;"),
            Err(OffsetError::MissingExport)
        ));
    }

    #[test]
    fn wrong_arity_is_ambiguous() {
        assert!(matches!(
            compile_record("fn offset(origin) { #{} }"),
            Err(OffsetError::AmbiguousModule)
        ));
        assert!(matches!(
            compile_record("fn transform(a, b) { #{} }"),
            Err(OffsetError::AmbiguousModule)
        ));
    }

    #[test]
    fn syntax_error_is_compile_error() {
        assert!(matches!(
            compile_record("fn offset(origin, backends) {"),
            Err(OffsetError::Compile(_))
        ));
    }

    #[test]
    fn isolated_run_returns_patch_map() {
        let record = compile_record(
            r#"fn offset(origin, backends) {
                #{ players: #{ online: origin.players.online + 10 } }
            }"#,
        )
        .unwrap();
        let origin = json!({"players": {"online": 5, "max": 5}});
        let out = run_isolated(&record, origin, json!([]), Duration::from_secs(2));
        match out {
            Ok(value) => assert_eq!(value, json!({"players": {"online": 15}})),
            Err(_) => panic!("expected successful run"),
        }
    }

    #[test]
    fn infinite_loop_times_out() {
        let record =
            compile_record("fn offset(origin, backends) { loop { } }").unwrap();
        let started = Instant::now();
        let out = run_isolated(&record, json!({}), json!([]), Duration::from_millis(100));
        assert!(matches!(out, Err(ExecFailure::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn invariant_accepts_complete_status() {
        let merged = json!({
            "version": {"name": "mortar", "protocol": 754},
            "players": {"max": 0, "online": 0, "sample": []},
            "description": ""
        });
        assert!(check_invariant(&merged).is_ok());
    }

    #[test]
    fn invariant_rejects_scalar_and_missing_keys() {
        assert!(check_invariant(&json!(42)).is_err());
        assert!(check_invariant(&json!({
            "version": {"name": "mortar", "protocol": "754"},
            "players": {"max": 0, "online": 0},
            "description": ""
        }))
        .is_err());
        assert!(check_invariant(&json!({
            "version": {"name": "mortar", "protocol": 754},
            "players": {"max": 0, "online": 0}
        }))
        .is_err());
    }
}
