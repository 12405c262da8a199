//! In-memory backend
//!
//! Keeps tables, accounts and tokens in process memory and answers the same
//! query surface as the hosted service: `eq` filters, ordering, limits and
//! one embedded join. Inserts require a valid access token whose user owns
//! the row, mirroring the row-level security policy the hosted project uses.
//!
//! Call counters and failure switches let tests observe which requests were
//! issued and force the error paths.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{AuthService, DataService, RemoteError, RemoteResult, Select, SignUpRequest};
use crate::models::{AuthSession, User};

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "demo1234";

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    next_ids: HashMap<String, i64>,
    /// Keyed by email
    accounts: HashMap<String, Account>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    selects: Vec<Select>,
}

/// In-process implementation of both backend surfaces.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    token_ttl: Mutex<Duration>,
    select_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    user_lookups: AtomicUsize,
    fail_reads: AtomicBool,
    fail_user_lookup: AtomicBool,
    fail_sign_out: AtomicBool,
    write_failure: Mutex<Option<String>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a backend with empty `posts` and `profiles` tables
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.tables.insert("posts".to_string(), Vec::new());
        state.tables.insert("profiles".to_string(), Vec::new());

        Self {
            state: Mutex::new(state),
            token_ttl: Mutex::new(Duration::hours(1)),
            select_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            user_lookups: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_user_lookup: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            write_failure: Mutex::new(None),
        }
    }

    /// Create a backend with a demo account (`demo@example.com` / `demo1234`),
    /// its profile and one welcome post.
    pub fn with_demo_data() -> Self {
        let backend = Self::new();
        let user = backend.add_user(DEMO_EMAIL, DEMO_PASSWORD);
        backend.add_profile(&user.id, "demo", None);
        backend.add_row(
            "posts",
            serde_json::json!({
                "title": "첫 번째 글",
                "content": "블로그에 오신 것을 환영합니다.",
                "user_id": user.id,
                "created_at": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            }),
        );
        tracing::info!(email = DEMO_EMAIL, "Demo account created");
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Register an account directly, bypassing sign-up
    pub fn add_user(&self, email: &str, password: &str) -> User {
        let user = User::new(uuid::Uuid::new_v4().to_string(), Some(email.to_string()));
        self.lock().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Create the profile row for `user_id`
    pub fn add_profile(&self, user_id: &str, username: &str, avatar_url: Option<&str>) {
        let mut state = self.lock();
        state.tables.entry("profiles".to_string()).or_default().push(serde_json::json!({
            "id": user_id,
            "username": username,
            "avatar_url": avatar_url,
        }));
    }

    /// Append a row, assigning a numeric id when it has none.
    ///
    /// Returns the numeric id, or 0 when the row brings a non-numeric one.
    pub fn add_row(&self, table: &str, mut row: Value) -> i64 {
        let mut state = self.lock();
        let id = match row.get("id") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(_)) => 0,
            _ => {
                let next = state.next_ids.entry(table.to_string()).or_insert(0);
                *next += 1;
                let id = *next;
                if let Some(obj) = row.as_object_mut() {
                    obj.insert("id".to_string(), Value::from(id));
                }
                id
            }
        };
        state.tables.entry(table.to_string()).or_default().push(row);
        id
    }

    /// Issue a session for an existing account without going through sign-in
    pub fn issue_session(&self, user: &User) -> AuthSession {
        let mut state = self.lock();
        self.issue_locked(&mut state, user)
    }

    fn issue_locked(&self, state: &mut MemoryState, user: &User) -> AuthSession {
        let access_token = uuid::Uuid::new_v4().simple().to_string();
        let refresh_token = uuid::Uuid::new_v4().simple().to_string();
        state.access_tokens.insert(access_token.clone(), user.id.clone());
        state.refresh_tokens.insert(refresh_token.clone(), user.id.clone());

        let ttl = *self.token_ttl.lock().unwrap_or_else(PoisonError::into_inner);
        AuthSession {
            access_token,
            refresh_token: Some(refresh_token),
            expires_at: Some(Utc::now() + ttl),
            user: user.clone(),
        }
    }

    fn user_by_id(state: &MemoryState, user_id: &str) -> Option<User> {
        state
            .accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }

    // =========================================================================
    // Test controls
    // =========================================================================

    /// Lifetime of newly issued access tokens; negative values issue expired tokens
    pub fn set_token_ttl(&self, ttl: Duration) {
        *self.token_ttl.lock().unwrap_or_else(PoisonError::into_inner) = ttl;
    }

    /// Make every read fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    /// Make every insert fail with `message`, or clear the failure
    pub fn fail_writes(&self, message: Option<&str>) {
        *self.write_failure.lock().unwrap_or_else(PoisonError::into_inner) = message.map(str::to_string);
    }

    /// Make current-user lookups fail with a transport-like error
    pub fn fail_user_lookup(&self, fail: bool) {
        self.fail_user_lookup.store(fail, AtomicOrdering::SeqCst);
    }

    /// Make remote sign-out fail
    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, AtomicOrdering::SeqCst);
    }

    /// Invalidate every outstanding access and refresh token
    pub fn revoke_all_tokens(&self) {
        let mut state = self.lock();
        state.access_tokens.clear();
        state.refresh_tokens.clear();
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(AtomicOrdering::SeqCst)
    }

    /// Every select issued so far, in order
    pub fn recorded_selects(&self) -> Vec<Select> {
        self.lock().selects.clone()
    }

    /// Current contents of `table`
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }
}

/// Render a cell the way PostgREST compares it against an `eq.` literal.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => cell_text(x).cmp(&cell_text(y)),
    }
}

fn project(row: &Value, columns: &[String]) -> Value {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    let mut out = Map::new();
    for column in columns {
        if let Some(value) = row.get(column) {
            out.insert(column.clone(), value.clone());
        }
    }
    Value::Object(out)
}

#[async_trait]
impl DataService for MemoryBackend {
    async fn select(&self, query: &Select, _access_token: Option<&str>) -> RemoteResult<Vec<Value>> {
        self.select_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut state = self.lock();
        state.selects.push(query.clone());

        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::api(503, "service unavailable"));
        }

        let Some(table) = state.tables.get(&query.table) else {
            return Err(RemoteError::api(
                404,
                format!("relation \"public.{}\" does not exist", query.table),
            ));
        };

        let mut rows: Vec<&Value> = table
            .iter()
            .filter(|row| {
                query.filters.iter().all(|f| {
                    row.get(&f.column).map(cell_text).as_deref() == Some(f.value.as_str())
                })
            })
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_cells(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    super::Direction::Asc => ord,
                    super::Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        let joined = query.join.as_ref().map(|join| {
            (join, state.tables.get(&join.table).cloned().unwrap_or_default())
        });

        let result = rows
            .into_iter()
            .map(|row| {
                let mut out = project(row, &query.columns);
                if let Some((join, related)) = &joined {
                    let key = row.get(&join.foreign_key).map(cell_text);
                    let embedded = related
                        .iter()
                        .find(|r| r.get("id").map(cell_text) == key)
                        .map(|r| project(r, &join.columns))
                        .unwrap_or(Value::Null);
                    if let Some(obj) = out.as_object_mut() {
                        obj.insert(join.alias.clone(), embedded);
                    }
                }
                out
            })
            .collect();

        Ok(result)
    }

    async fn insert(&self, table: &str, row: Value, access_token: Option<&str>) -> RemoteResult<()> {
        self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst);

        if let Some(message) = self.write_failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(RemoteError::api(400, message));
        }

        let owner = {
            let state = self.lock();
            access_token.and_then(|t| state.access_tokens.get(t).cloned())
        };
        let row_owner = row.get("user_id").map(cell_text);
        match owner {
            Some(user_id) if row_owner.as_deref() == Some(user_id.as_str()) => {}
            _ => {
                return Err(RemoteError::Unauthorized(format!(
                    "new row violates row-level security policy for table \"{}\"",
                    table
                )))
            }
        }

        self.add_row(table, row);
        Ok(())
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<AuthSession> {
        let mut state = self.lock();
        let user = match state.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(RemoteError::Unauthorized("Invalid login credentials".to_string())),
        };
        Ok(self.issue_locked(&mut state, &user))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> RemoteResult<Option<AuthSession>> {
        if self.lock().accounts.contains_key(&request.email) {
            return Err(RemoteError::api(422, "User already registered"));
        }
        let user = self.add_user(&request.email, &request.password);
        Ok(Some(self.issue_session(&user)))
    }

    async fn get_user(&self, access_token: &str) -> RemoteResult<Option<User>> {
        self.user_lookups.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail_user_lookup.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::api(502, "auth service unreachable"));
        }
        let state = self.lock();
        Ok(state
            .access_tokens
            .get(access_token)
            .and_then(|user_id| Self::user_by_id(&state, user_id)))
    }

    async fn refresh_session(&self, refresh_token: &str) -> RemoteResult<AuthSession> {
        let mut state = self.lock();
        let user = state
            .refresh_tokens
            .remove(refresh_token)
            .and_then(|user_id| Self::user_by_id(&state, &user_id))
            .ok_or_else(|| RemoteError::Unauthorized("Invalid Refresh Token".to_string()))?;
        Ok(self.issue_locked(&mut state, &user))
    }

    async fn sign_out(&self, access_token: &str) -> RemoteResult<()> {
        if self.fail_sign_out.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::api(500, "logout failed"));
        }
        let mut state = self.lock();
        if let Some(user_id) = state.access_tokens.remove(access_token) {
            state.refresh_tokens.retain(|_, owner| *owner != user_id);
        }
        Ok(())
    }
}
