//! Action tokens and path routing

use std::fmt;

/// Database used when a path names only an action
pub const ADMIN_DB: &str = "admin";

/// Every operation the dispatcher knows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Hello,
    Status,
    Connect,
    Authenticate,
    Disconnect,
    Command,
    Find,
    More,
    Insert,
    Update,
    InsertOrUpdate,
    Remove,
    Batch,
    EnsureIndex,
}

impl Action {
    /// Parse an underscore-prefixed path token such as `_find`
    pub fn from_token(token: &str) -> Option<Self> {
        token.strip_prefix('_').and_then(Self::from_name)
    }

    /// Parse a bare action name such as `find`, accepting camel-case aliases
    pub fn from_name(name: &str) -> Option<Self> {
        let action = match name {
            "hello" | "ping" => Self::Hello,
            "status" => Self::Status,
            "connect" => Self::Connect,
            "authenticate" => Self::Authenticate,
            "disconnect" => Self::Disconnect,
            "cmd" | "runCommand" => Self::Command,
            "find" => Self::Find,
            "more" => Self::More,
            "insert" => Self::Insert,
            "update" => Self::Update,
            "insert_or_update" | "insertOrUpdate" => Self::InsertOrUpdate,
            "remove" => Self::Remove,
            "batch" => Self::Batch,
            "ensure_index" | "ensureIndex" => Self::EnsureIndex,
            _ => return None,
        };
        Some(action)
    }

    /// Canonical path token
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Hello => "_hello",
            Self::Status => "_status",
            Self::Connect => "_connect",
            Self::Authenticate => "_authenticate",
            Self::Disconnect => "_disconnect",
            Self::Command => "_cmd",
            Self::Find => "_find",
            Self::More => "_more",
            Self::Insert => "_insert",
            Self::Update => "_update",
            Self::InsertOrUpdate => "_insert_or_update",
            Self::Remove => "_remove",
            Self::Batch => "_batch",
            Self::EnsureIndex => "_ensure_index",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// A request path decomposed into `/database/collection/_action`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub database: String,
    pub collection: Option<String>,
    pub action: Action,
}

impl Route {
    /// Decompose a URL path. Returns `None` when the last segment is not a
    /// known action token.
    ///
    /// - `/_status` routes to `admin`
    /// - `/db/_cmd` has no collection
    /// - `/db/a/b/_find` uses collection `a.b`
    pub fn parse(path: &str) -> Option<Self> {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).ok())
            .collect::<Option<Vec<_>>>()?;
        let (last, rest) = segments.split_last()?;
        let action = Action::from_token(last)?;

        let route = match rest {
            [] => Self {
                database: ADMIN_DB.to_string(),
                collection: None,
                action,
            },
            [db] => Self {
                database: db.to_string(),
                collection: None,
                action,
            },
            [db, collection @ ..] => Self {
                database: db.to_string(),
                collection: Some(collection.join(".")),
                action,
            },
        };
        Some(route)
    }
}
