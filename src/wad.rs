/*
 *  wad.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Single-use WAD downloader with progress reporting
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::error::{WidgetError, WidgetResult};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    pub downloaded: u64,
    pub total: Option<u64>,
}

impl Progress {
    /// 0..=1 when the server sent a length.
    pub fn fraction(&self) -> Option<f64> {
        self.total
            .filter(|t| *t > 0)
            .map(|t| (self.downloaded as f64 / t as f64).clamp(0.0, 1.0))
    }
}

/// True when the file starts with an IWAD/PWAD header.
pub fn is_wad(path: &Path) -> bool {
    use std::io::Read;
    let mut magic = [0u8; 4];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|_| &magic == b"IWAD" || &magic == b"PWAD")
        .unwrap_or(false)
}

/// Downloads at most once per instance; later calls fail fast.
pub struct WadFetcher {
    used: AtomicBool,
    client: Client,
}

impl WadFetcher {
    pub fn new() -> WidgetResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WidgetError::NotInitialized(e.to_string()))?;
        Ok(Self { used: AtomicBool::new(false), client })
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::SeqCst)
    }

    /// Stream `url` into `dest`, reporting progress per chunk. An existing
    /// `dest` is returned untouched.
    pub async fn fetch<F>(&self, url: &str, dest: &Path, mut progress: F) -> WidgetResult<PathBuf>
    where
        F: FnMut(Progress),
    {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(WidgetError::Resource("WAD fetch already attempted".into()));
        }
        if dest.exists() {
            return Ok(dest.to_path_buf());
        }
        info!("downloading WAD from {} to {}", url, dest.display());

        let mut resp = self.client.get(url).send().await?.error_for_status()?;
        let mut state = Progress { downloaded: 0, total: resp.content_length() };
        progress(state);

        if let Some(dir) = dest.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let part = dest.with_extension("part");
        let mut file = tokio::fs::File::create(&part).await?;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            state.downloaded += chunk.len() as u64;
            progress(state);
        }
        file.flush().await?;
        drop(file);

        if !is_wad(&part) {
            let _ = tokio::fs::remove_file(&part).await;
            warn!("downloaded file is not a WAD");
            return Err(WidgetError::Decode(format!("{url} did not return a WAD")));
        }
        tokio::fs::rename(&part, dest).await?;
        info!("WAD saved ({} bytes)", state.downloaded);
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        assert_eq!(Progress { downloaded: 50, total: Some(200) }.fraction(), Some(0.25));
        assert_eq!(Progress { downloaded: 50, total: None }.fraction(), None);
        assert_eq!(Progress { downloaded: 5, total: Some(0) }.fraction(), None);
    }

    #[test]
    fn test_is_wad() {
        let dir = std::env::temp_dir().join(format!("lumadeck-wad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.wad");
        std::fs::write(&good, b"IWAD\x00\x00\x00\x00").unwrap();
        let bad = dir.join("bad.wad");
        std::fs::write(&bad, b"<html>").unwrap();
        assert!(is_wad(&good));
        assert!(!is_wad(&bad));
        assert!(!is_wad(&dir.join("missing.wad")));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_single_use_gate() {
        let dir = std::env::temp_dir().join(format!("lumadeck-gate-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("doom1.wad");
        std::fs::write(&dest, b"IWAD").unwrap();

        let f = WadFetcher::new().unwrap();
        let got = f.fetch("http://127.0.0.1:9/doom1.wad", &dest, |_| {}).await.unwrap();
        assert_eq!(got, dest);
        assert!(f.is_used());
        let again = f.fetch("http://127.0.0.1:9/doom1.wad", &dest, |_| {}).await;
        assert!(matches!(again, Err(WidgetError::Resource(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
