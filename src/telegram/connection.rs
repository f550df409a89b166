/*
 *  telegram/connection.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Reconnecting long-poll loop for the shared client
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

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::client::{ClientCore, Transport};
use super::ConnectionStatus;
use crate::constants::TELEGRAM_LONG_POLL;
use crate::error::{WidgetError, WidgetResult};

/// `base · 2^attempt`, capped at `max`.
pub fn backoff_delay(base: Duration, attempt: u32, max: Duration) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16)).min(max)
}

pub struct ConnectionManager {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl ConnectionManager {
    pub fn start(
        transport: Arc<dyn Transport>,
        core: Arc<ClientCore>,
        reconnect: Duration,
        max_reconnect: Duration,
    ) -> WidgetResult<Self> {
        let rt = tokio::runtime::Handle::try_current()
            .map_err(|e| WidgetError::NotInitialized(format!("telegram connection: {e}")))?;
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let handle = rt.spawn(run(transport, core, reconnect, max_reconnect, stop_rx));
        Ok(Self { stop_tx, handle })
    }

    pub fn stop(&self) {
        if self.stop_tx.try_send(()).is_err() {
            self.handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run(
    transport: Arc<dyn Transport>,
    core: Arc<ClientCore>,
    reconnect: Duration,
    max_reconnect: Duration,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let mut attempt = 0u32;
    let mut offset: Option<i64> = None;
    loop {
        core.set_status(ConnectionStatus::Connecting);
        let result = tokio::select! {
            r = session(transport.as_ref(), &core, &mut offset, &mut attempt) => r,
            _ = stop_rx.recv() => break,
        };
        if let Err(e) = result {
            if attempt == 0 {
                warn!("telegram connection failed: {}", e);
            } else {
                debug!("telegram retry {} failed: {}", attempt, e);
            }
            core.set_status(ConnectionStatus::Error(e.to_string()));
            core.dispatch_error(&e);
            let delay = backoff_delay(reconnect, attempt, max_reconnect);
            attempt = attempt.saturating_add(1);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_rx.recv() => break,
            }
        }
    }
    core.set_status(ConnectionStatus::Disconnected);
    info!("telegram connection task received stop signal. Exiting.");
}

/// Authenticate, skip the backlog on first connect, then long-poll until an
/// error ends the session.
async fn session(
    transport: &dyn Transport,
    core: &ClientCore,
    offset: &mut Option<i64>,
    attempt: &mut u32,
) -> WidgetResult<()> {
    let me = transport.get_me().await?;
    if *attempt > 0 {
        info!("telegram reconnected as {} after {} attempts", me, attempt);
    } else {
        info!("telegram connected as {}", me);
    }
    *attempt = 0;
    core.set_status(ConnectionStatus::Connected);

    if offset.is_none() {
        let backlog = transport.get_updates(None, Duration::ZERO).await?;
        *offset = Some(backlog.iter().map(|u| u.update_id + 1).max().unwrap_or(0));
    }

    loop {
        let updates = transport.get_updates(*offset, TELEGRAM_LONG_POLL).await?;
        for u in updates {
            *offset = Some(offset.unwrap_or(0).max(u.update_id + 1));
            if let Some(msg) = &u.message {
                core.dispatch_message(msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::client::{TelegramClient, Update};
    use crate::telegram::{Message, TelegramListener};
    use crate::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_backoff_is_bounded() {
        let b = Duration::from_secs(5);
        let max = Duration::from_secs(300);
        assert_eq!(backoff_delay(b, 0, max), Duration::from_secs(5));
        assert_eq!(backoff_delay(b, 2, max), Duration::from_secs(20));
        assert_eq!(backoff_delay(b, 10, max), max);
        assert_eq!(backoff_delay(b, 60, max), max);
    }

    struct Scripted {
        me_calls: AtomicUsize,
        polls: AtomicUsize,
    }

    impl Transport for Scripted {
        fn get_me<'a>(&'a self) -> BoxFuture<'a, WidgetResult<String>> {
            Box::pin(async move {
                if self.me_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WidgetError::Connection("refused".into()))
                } else {
                    Ok("testbot".into())
                }
            })
        }

        fn get_updates<'a>(&'a self, offset: Option<i64>, _t: Duration) -> BoxFuture<'a, WidgetResult<Vec<Update>>> {
            Box::pin(async move {
                match (offset, self.polls.fetch_add(1, Ordering::SeqCst)) {
                    // backlog drain
                    (None, _) => Ok(vec![Update { update_id: 4, message: Some(Message::default()) }]),
                    (Some(5), 1) => Ok(vec![Update {
                        update_id: 5,
                        message: Some(Message { id: 42, text: "new".into(), ..Message::default() }),
                    }]),
                    _ => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(Vec::new())
                    }
                }
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        ids: Mutex<Vec<i64>>,
        errors: AtomicUsize,
    }

    impl TelegramListener for Recorder {
        fn on_message(&self, msg: &Message) {
            self.ids.lock().unwrap().push(msg.id);
        }
        fn on_error(&self, _err: &WidgetError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unread_count(&self, _count: usize) {}
    }

    #[tokio::test]
    async fn test_retry_then_deliver_skipping_backlog() {
        let transport = Arc::new(Scripted { me_calls: AtomicUsize::new(0), polls: AtomicUsize::new(0) });
        let client = TelegramClient::new(transport, Duration::from_millis(10));
        let rec = Arc::new(Recorder::default());
        client.add_listener(rec.clone());
        let mut status = client.subscribe_status();
        client.connect().unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while *status.borrow_and_update() != ConnectionStatus::Connected {
                status.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*rec.ids.lock().unwrap(), vec![42]);
        assert_eq!(rec.errors.load(Ordering::SeqCst), 1);
        assert_eq!(client.unread_count(), 1);

        client.disconnect();
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}
