use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::models::Dataset;
use crate::services::insights::ChartData;
use crate::services::profile::DatasetProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(SessionId)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything derived from one upload.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub filename: String,
    pub dataset: Arc<Dataset>,
    pub profile: Arc<DatasetProfile>,
    pub report: Arc<str>,
    pub charts: Arc<ChartData>,
    pub risk_analysis: Option<Arc<str>>,
}

/// In-memory sessions, least recently used evicted first.
pub struct SessionStore {
    sessions: Mutex<LruCache<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            next_id: AtomicU64::new(seed()),
        }
    }

    pub fn create(
        &self,
        filename: String,
        dataset: Dataset,
        profile: DatasetProfile,
        report: String,
        charts: ChartData,
    ) -> Arc<Session> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session {
            id,
            filename,
            dataset: Arc::new(dataset),
            profile: Arc::new(profile),
            report: report.into(),
            charts: Arc::new(charts),
            risk_analysis: None,
        });

        let mut sessions = self.sessions.lock();
        if let Some((evicted, _)) = sessions.push(id, session.clone()) {
            if evicted != id {
                tracing::debug!("Evicted session {}", evicted);
            }
        }
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Stores a risk analysis on an existing session. Returns the updated
    /// session, or `None` if it was evicted meanwhile.
    pub fn set_risk_analysis(&self, id: SessionId, analysis: String) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(&id)?;
        let mut updated = Session::clone(entry);
        updated.risk_analysis = Some(analysis.into());
        *entry = Arc::new(updated);
        Some(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}
