//! # 并发编排器
//!
//! 固定数量的 worker 从共享队列领取密钥，逐个探测并按需重试。
//! 每个密钥完成后立即通过通道发出，完成顺序与提交顺序无关。

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::retry::RetryPolicy;
use crate::logging::{LogComponent, LogStage};
use crate::provider::{ProbeOutcome, ProviderAdapter};
use crate::utils::mask_key;
use crate::{ldebug, lerror, lwarn};

/// 单个密钥的最终结果
#[derive(Clone)]
pub struct KeyCompletion {
    /// 提交顺序中的下标
    pub index: usize,
    pub key: String,
    pub outcome: ProbeOutcome,
    /// 实际发出的请求次数，取消于排队阶段时为 0
    pub attempts: u32,
}

impl std::fmt::Debug for KeyCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCompletion")
            .field("index", &self.index)
            .field("key", &mask_key(&self.key))
            .field("outcome", &self.outcome)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// 一个批次共享的探测参数
#[derive(Debug, Clone)]
pub struct ProbePlan {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub model: String,
    pub proxy_base_url: Option<String>,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

type Job = (usize, String);

const PROBE_PANICKED: &str = "Probe aborted unexpectedly";

/// 有界并发的探测编排器
#[derive(Debug)]
pub struct Orchestrator {
    plan: Arc<ProbePlan>,
    cancel: CancellationToken,
    request_id: String,
}

impl Orchestrator {
    #[must_use]
    pub fn new(plan: ProbePlan, cancel: CancellationToken, request_id: impl Into<String>) -> Self {
        Self {
            plan: Arc::new(plan),
            cancel,
            request_id: request_id.into(),
        }
    }

    /// 启动 worker 池，返回完成事件流
    ///
    /// 所有密钥都会恰好产生一个事件；流在最后一个事件之后结束。
    pub fn spawn(self, keys: Vec<String>) -> ReceiverStream<KeyCompletion> {
        let total = keys.len();
        let (queue_tx, queue_rx) = async_channel::bounded::<Job>(total.max(1));
        for job in keys.into_iter().enumerate() {
            // 容量与密钥数一致，不会失败
            let _ = queue_tx.try_send(job);
        }
        queue_tx.close();

        let (tx, rx) = mpsc::channel(total.max(1));
        let workers = self.plan.concurrency.clamp(1, total.max(1));

        ldebug!(
            &self.request_id,
            LogStage::Scheduling,
            LogComponent::Orchestrator,
            "pool_start",
            "启动探测 worker 池",
            workers = workers,
            keys = total
        );

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            set.spawn(run_worker(
                worker_id,
                Arc::clone(&self.plan),
                queue_rx.clone(),
                tx.clone(),
                self.cancel.clone(),
                self.request_id.clone(),
            ));
        }

        tokio::spawn(supervise(set, queue_rx, tx, self.request_id));

        ReceiverStream::new(rx)
    }
}

/// 等待所有 worker 退出，再把队列中剩余的密钥标记为取消
async fn supervise(
    mut set: JoinSet<()>,
    queue: async_channel::Receiver<Job>,
    tx: mpsc::Sender<KeyCompletion>,
    request_id: String,
) {
    while let Some(joined) = set.join_next().await {
        if let Err(err) = joined {
            lerror!(
                &request_id,
                LogStage::Internal,
                LogComponent::Orchestrator,
                "worker_aborted",
                &format!("探测 worker 异常退出: {err}")
            );
        }
    }

    let mut drained = 0_usize;
    while let Ok((index, key)) = queue.try_recv() {
        drained += 1;
        let completion = KeyCompletion {
            index,
            key,
            outcome: ProbeOutcome::cancelled(),
            attempts: 0,
        };
        if tx.send(completion).await.is_err() {
            return;
        }
    }

    if drained > 0 {
        lwarn!(
            &request_id,
            LogStage::Scheduling,
            LogComponent::Orchestrator,
            "pending_cancelled",
            "批次取消，未调度的密钥标记为取消",
            pending = drained
        );
    }
}

async fn run_worker(
    worker_id: usize,
    plan: Arc<ProbePlan>,
    queue: async_channel::Receiver<Job>,
    tx: mpsc::Sender<KeyCompletion>,
    cancel: CancellationToken,
    request_id: String,
) {
    loop {
        let job = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            job = queue.recv() => match job {
                Ok(job) => job,
                Err(_) => break,
            },
        };

        let (index, key) = job;
        let (outcome, attempts) = probe_with_retry(&plan, &key, &cancel, &request_id).await;
        let completion = KeyCompletion {
            index,
            key,
            outcome,
            attempts,
        };
        if tx.send(completion).await.is_err() {
            // 接收端已关闭，批次不再需要结果
            break;
        }
    }

    ldebug!(
        &request_id,
        LogStage::Scheduling,
        LogComponent::Orchestrator,
        "worker_exit",
        "worker 退出",
        worker = worker_id
    );
}

/// 探测单个密钥，瞬时失败按退避策略重试
async fn probe_with_retry(
    plan: &ProbePlan,
    key: &str,
    cancel: &CancellationToken,
    request_id: &str,
) -> (ProbeOutcome, u32) {
    let mut attempt = 0_u32;
    loop {
        attempt += 1;
        let probe = AssertUnwindSafe(plan.adapter.probe(
            key,
            &plan.model,
            plan.proxy_base_url.as_deref(),
        ))
        .catch_unwind();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return (ProbeOutcome::cancelled(), attempt),
            outcome = probe => outcome.unwrap_or_else(|_| {
                lerror!(
                    request_id,
                    LogStage::Internal,
                    LogComponent::Orchestrator,
                    "probe_panicked",
                    "适配器探测过程 panic",
                    key = %mask_key(key)
                );
                ProbeOutcome::protocol_error(PROBE_PANICKED)
            }),
        };

        if !outcome.is_transient() || !plan.retry.allows_retry(attempt) {
            return (outcome, attempt);
        }

        let delay = plan.retry.calculate_delay(attempt);
        lwarn!(
            request_id,
            LogStage::Retry,
            LogComponent::Orchestrator,
            "probe_retry",
            &format!(
                "瞬时失败，{}ms 后重试: {}",
                delay.as_millis(),
                outcome.error.as_deref().unwrap_or("unknown")
            ),
            key = %mask_key(key),
            attempt = attempt
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return (ProbeOutcome::cancelled(), attempt),
            () = tokio::time::sleep(delay) => {}
        }
    }
}
