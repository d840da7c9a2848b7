use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{clock::Clock, error::ApplicationError, repository::MessageRepository};

/// 过期消息清理任务
pub struct MessageReaper {
    messages: Arc<dyn MessageRepository>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl MessageReaper {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            messages,
            clock,
            interval,
        }
    }

    /// 删除 `expires_at <= now` 的消息，返回删除条数
    pub async fn sweep(&self) -> Result<u64, ApplicationError> {
        let deleted = self.messages.delete_expired(self.clock.now()).await?;
        if deleted > 0 {
            tracing::info!(deleted, "reaped expired messages");
        }
        Ok(deleted)
    }

    /// 立即清理一次，之后按固定间隔执行；单次失败只记录日志
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep().await {
                    tracing::error!(error = %err, "message reaper sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::MemoryMessageRepository;
    use crate::repository::MockMessageRepository;
    use crate::test_support::message_in;
    use domain::RepositoryError;

    #[tokio::test]
    async fn sweep_deletes_only_expired_messages() {
        let clock = Arc::new(ManualClock::default());
        let repository = Arc::new(MemoryMessageRepository::new());
        let now = clock.now();
        repository
            .insert(message_in("general", "old", now - chrono::Duration::minutes(5)))
            .await
            .unwrap();
        repository
            .insert(message_in("general", "fresh", now))
            .await
            .unwrap();

        let reaper = MessageReaper::new(repository.clone(), clock, Duration::from_secs(300));
        assert_eq!(reaper.sweep().await.unwrap(), 1);
        assert_eq!(repository.list_active(None, now).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sweep_does_not_stop_schedule() {
        let mut repository = MockMessageRepository::new();
        let mut calls = 0;
        repository
            .expect_delete_expired()
            .times(2..)
            .returning(move |_| {
                calls += 1;
                if calls == 1 {
                    Err(RepositoryError::storage("connection reset"))
                } else {
                    Ok(0)
                }
            });

        let reaper = Arc::new(MessageReaper::new(
            Arc::new(repository),
            Arc::new(ManualClock::default()),
            Duration::from_secs(300),
        ));
        let handle = reaper.clone().spawn();

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
