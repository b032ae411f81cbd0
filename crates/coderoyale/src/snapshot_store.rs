//! A filesystem-backed [`SnapshotStore`]: one JSON file per room under
//! `snapshots/`, and one newline-delimited JSON file per finished
//! match under `matches/`. A real deployment would point this at
//! whatever the Results Store actually is; this is enough to survive
//! a restart and to give finished matches somewhere durable to land.

use std::io;
use std::path::{Path, PathBuf};

use coderoyale_protocol::RoomId;
use coderoyale_room::{FinishedMatchRecord, MatchPlayerRecord, RoomSnapshotRecord, SnapshotStore};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, io::Error> {
        let root = root.into();
        fs::create_dir_all(root.join("snapshots")).await?;
        fs::create_dir_all(root.join("matches")).await?;
        Ok(FsSnapshotStore { root })
    }

    fn snapshot_path(&self, room_id: RoomId) -> PathBuf {
        self.root.join("snapshots").join(format!("{}.json", room_id.0))
    }

    fn matches_path(&self) -> PathBuf {
        self.root.join("matches").join("matches.ndjson")
    }
}

/// Writes via a temp file and renames over the target, so a crash
/// mid-write never leaves a half-written snapshot behind.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let tmp_path = path.with_extension("json.tmp");
    let mut tmp = fs::File::create(&tmp_path).await?;
    tmp.write_all(bytes).await?;
    tmp.flush().await?;
    fs::rename(&tmp_path, path).await
}

impl SnapshotStore for FsSnapshotStore {
    async fn save_snapshot(&self, snapshot: &RoomSnapshotRecord) -> Result<(), io::Error> {
        let path = self.snapshot_path(snapshot.room_id);
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&path, &bytes).await
    }

    async fn load_snapshot(&self, room_id: RoomId) -> Result<Option<RoomSnapshotRecord>, io::Error> {
        let path = self.snapshot_path(room_id);
        match fs::read(&path).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_finished_match(
        &self,
        record: &FinishedMatchRecord,
        players: &[MatchPlayerRecord],
    ) -> Result<(), io::Error> {
        #[derive(serde::Serialize)]
        struct Row<'a> {
            r#match: &'a FinishedMatchRecord,
            players: &'a [MatchPlayerRecord],
        }
        let mut line = serde_json::to_vec(&Row {
            r#match: record,
            players,
        })
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.matches_path())
            .await?;
        file.write_all(&line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderoyale_protocol::{MatchEndReason, MatchId, MatchPhase, RoomSettings};
    use coderoyale_room::MatchRecord;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_DIR: AtomicU64 = AtomicU64::new(0);

    #[tokio::test]
    async fn test_save_and_load_snapshot_round_trips() {
        let dir = tempfile_dir();
        let store = FsSnapshotStore::new(&dir).await.unwrap();
        let snapshot = RoomSnapshotRecord {
            room_id: RoomId(7),
            settings: RoomSettings::default(),
            players: vec![],
            chat: vec![],
            event_log: vec![],
            bot_counter: 0,
            join_counter: 0,
            match_counter: 0,
            seen_problem_ids: Default::default(),
            match_record: MatchRecord {
                match_id: None,
                phase: MatchPhase::Lobby,
                start_at_ms: None,
                end_at_ms: None,
                end_reason: None,
                settings: RoomSettings::default(),
            },
            next_problem_arrival_at_ms: None,
        };
        store.save_snapshot(&snapshot).await.unwrap();
        let loaded = store.load_snapshot(RoomId(7)).await.unwrap().unwrap();
        assert_eq!(loaded.room_id, RoomId(7));
        assert_eq!(loaded.join_counter, 0);
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_returns_none() {
        let dir = tempfile_dir();
        let store = FsSnapshotStore::new(&dir).await.unwrap();
        assert!(store.load_snapshot(RoomId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_finished_match_appends_ndjson() {
        let dir = tempfile_dir();
        let store = FsSnapshotStore::new(&dir).await.unwrap();
        let record = FinishedMatchRecord {
            match_id: MatchId(1),
            room_id: RoomId(1),
            started_at_ms: 0,
            ended_at_ms: 1000,
            end_reason: MatchEndReason::LastStanding,
            settings: RoomSettings::default(),
        };
        store.save_finished_match(&record, &[]).await.unwrap();
        store.save_finished_match(&record, &[]).await.unwrap();
        let contents = fs::read_to_string(store.matches_path()).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    fn tempfile_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let n = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
        dir.push(format!("coderoyale-test-{}-{}", std::process::id(), n));
        dir
    }
}
