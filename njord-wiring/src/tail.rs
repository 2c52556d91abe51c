//! `njord tail <topic>` follows today's journal file for a topic the way
//! `tail -f` follows a log file — the journal, not the in-process bus, is
//! the only thing a separate CLI invocation can observe (spec §6: the bus
//! itself has no cross-process transport in this implementation).

use chrono::Utc;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncSeekExt, BufReader},
    sync::watch,
};

fn today_path(journal_dir: &Path, topic: &str) -> PathBuf {
    journal_dir.join(format!("{}.{}.ndjson", topic, Utc::now().format("%Y-%m-%d")))
}

/// Poll `journal_dir`'s file for `topic` every 500ms, invoking `on_line`
/// for every newly-appended line, until `shutdown` fires.
pub async fn tail_topic(
    journal_dir: &Path,
    topic: &str,
    mut shutdown: watch::Receiver<bool>,
    mut on_line: impl FnMut(&str),
) -> std::io::Result<()> {
    let path = today_path(journal_dir, topic);
    let mut pos: u64 = 0;
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                let Ok(metadata) = tokio::fs::metadata(&path).await else {
                    continue;
                };
                if metadata.len() <= pos {
                    continue;
                }
                let mut file = tokio::fs::File::open(&path).await?;
                file.seek(std::io::SeekFrom::Start(pos)).await?;
                let mut reader = BufReader::new(file);
                loop {
                    let mut line = String::new();
                    let n = reader.read_line(&mut line).await?;
                    if n == 0 {
                        break;
                    }
                    pos += n as u64;
                    on_line(line.trim_end());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn newly_appended_lines_are_delivered_once() {
        let dir = tempdir().unwrap();
        let path = today_path(dir.path(), "fills.new");
        tokio::fs::write(&path, b"").await.unwrap();

        let (tx, rx) = watch::channel(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let dir_path = dir.path().to_path_buf();
        let handle = tokio::spawn(async move {
            tail_topic(&dir_path, "fills.new", rx, |line| seen2.lock().unwrap().push(line.to_string()))
                .await
                .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut file = tokio::fs::OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(b"{\"a\":1}\n").await.unwrap();
        file.flush().await.unwrap();

        tokio::time::sleep(Duration::from_millis(700)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), &["{\"a\":1}".to_string()]);
    }
}
