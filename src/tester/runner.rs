//! # 批次协调器
//!
//! 校验批次参数、创建会话、驱动编排器、逐条持久化结果，最后一次性写入汇总。

use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use super::classifier::ResultCounters;
use super::orchestrator::{Orchestrator, ProbePlan};
use super::retry::RetryPolicy;
use super::types::{
    BatchItem, BatchReport, ClassifiedResult, ResultQuery, ResultsPage, SessionAggregate,
    ValidationRequest, new_test_id,
};
use crate::config::{AppConfig, MAX_KEYS_PER_BATCH};
use crate::error::config::ConfigError;
use crate::error::{ConfigResult, Context, Result, TesterError};
use crate::logging::{LogComponent, LogStage};
use crate::provider::{AdapterRegistry, ProbeOutcome, ProviderType};
use crate::storage::Storage;
use crate::utils::mask_key;
use crate::{ldebug, lerror, linfo, lwarn};

/// 批次运行所需的协作者
#[derive(Debug, Clone)]
pub struct TesterContext {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<AdapterRegistry>,
}

impl TesterContext {
    #[must_use]
    pub const fn new(
        config: Arc<AppConfig>,
        storage: Arc<dyn Storage>,
        registry: Arc<AdapterRegistry>,
    ) -> Self {
        Self {
            config,
            storage,
            registry,
        }
    }
}

/// 通过校验的批次参数
#[derive(Debug)]
struct BatchPlan {
    provider: ProviderType,
    model: String,
    proxy_base_url: Option<String>,
    concurrency: usize,
    retry_count: u32,
}

/// 批次协调器
#[derive(Debug, Clone)]
pub struct BatchRunner {
    ctx: TesterContext,
}

impl BatchRunner {
    #[must_use]
    pub const fn new(ctx: TesterContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub const fn context(&self) -> &TesterContext {
        &self.ctx
    }

    /// 运行一个完整批次并等待全部密钥完成
    pub async fn run_batch(&self, request: ValidationRequest) -> Result<BatchReport> {
        self.run_batch_with_cancel(request, CancellationToken::new())
            .await
    }

    /// 可外部取消的批次运行
    ///
    /// 取消后未完成的密钥以 "Cancelled before completion" 归为无效，会话仍会正常结束。
    pub async fn run_batch_with_cancel(
        &self,
        request: ValidationRequest,
        cancel: CancellationToken,
    ) -> Result<BatchReport> {
        let plan = match self.validate(&request) {
            Ok(plan) => plan,
            Err(err) => {
                lwarn!(
                    "system",
                    LogStage::Validation,
                    LogComponent::BatchRunner,
                    "batch_rejected",
                    &format!("批次参数校验失败: {err}"),
                    keys = request.keys.len()
                );
                return Err(err.into());
            }
        };
        let adapter = self.ctx.registry.resolve(plan.provider)?;

        let test_id = new_test_id();
        let total = request.keys.len();
        let session = SessionAggregate::running(
            test_id.clone(),
            plan.provider,
            plan.model.clone(),
            total,
        );
        self.ctx
            .storage
            .create_session(&session)
            .await
            .context("创建测试会话失败")?;

        linfo!(
            &test_id,
            LogStage::Scheduling,
            LogComponent::BatchRunner,
            "batch_start",
            "开始批量测试",
            provider = %plan.provider,
            model = %plan.model,
            keys = total,
            concurrency = plan.concurrency,
            retry_count = plan.retry_count
        );

        // 批次结束时取消子令牌，同时停止超时计时任务
        let batch_cancel = cancel.child_token();
        let _guard = batch_cancel.clone().drop_guard();
        if let Some(timeout) = self.ctx.config.tester.batch_timeout() {
            let timer_token = batch_cancel.clone();
            let timer_test_id = test_id.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = timer_token.cancelled() => {}
                    () = tokio::time::sleep(timeout) => {
                        lwarn!(
                            &timer_test_id,
                            LogStage::Scheduling,
                            LogComponent::BatchRunner,
                            "batch_timeout",
                            "批次超时，取消剩余密钥",
                            timeout_secs = timeout.as_secs()
                        );
                        timer_token.cancel();
                    }
                }
            });
        }

        let orchestrator = Orchestrator::new(
            ProbePlan {
                adapter,
                model: plan.model.clone(),
                proxy_base_url: plan.proxy_base_url.clone(),
                concurrency: plan.concurrency,
                retry: RetryPolicy::new(plan.retry_count, &self.ctx.config.retry),
            },
            batch_cancel,
            test_id.clone(),
        );
        let keys = request.keys;
        let mut completions = orchestrator.spawn(keys.clone());

        let counters = ResultCounters::new();
        let mut slots: Vec<Option<BatchItem>> = vec![None; total];

        while let Some(completion) = completions.next().await {
            let item = self
                .record(&test_id, &plan, &counters, completion.key, &completion.outcome)
                .await;
            ldebug!(
                &test_id,
                LogStage::Classification,
                LogComponent::BatchRunner,
                "key_classified",
                "密钥测试完成",
                index = completion.index,
                key = %item.result.key_masked,
                status = %item.result.status,
                attempts = completion.attempts
            );
            if let Some(slot) = slots.get_mut(completion.index) {
                *slot = Some(item);
            }
        }

        let items = self
            .settle_missing(&test_id, &plan, &counters, slots, &keys)
            .await;

        let counts = counters.snapshot();
        if let Err(err) = self
            .ctx
            .storage
            .update_session_aggregate(&test_id, counts)
            .await
        {
            lerror!(
                &test_id,
                LogStage::Db,
                LogComponent::BatchRunner,
                "finalize_failed",
                &format!("写入会话汇总失败: {err}")
            );
        }

        linfo!(
            &test_id,
            LogStage::Scheduling,
            LogComponent::BatchRunner,
            "batch_complete",
            "批量测试完成",
            valid = counts.valid,
            invalid = counts.invalid,
            rate_limited = counts.rate_limited
        );

        Ok(BatchReport {
            test_id,
            total,
            counts,
            items,
        })
    }

    /// 归类、计数并持久化单个结果；持久化失败只记录日志
    async fn record(
        &self,
        test_id: &str,
        plan: &BatchPlan,
        counters: &ResultCounters,
        key: String,
        outcome: &ProbeOutcome,
    ) -> BatchItem {
        let result = ClassifiedResult::from_outcome(test_id, plan.provider, &plan.model, &key, outcome);
        counters.record(result.status);

        if let Err(err) = self.ctx.storage.save_result(&result).await {
            lerror!(
                test_id,
                LogStage::Db,
                LogComponent::BatchRunner,
                "save_result_failed",
                &format!("保存测试结果失败: {err}"),
                key = %mask_key(&key)
            );
        }

        BatchItem { key, result }
    }

    /// 没有完成事件的密钥按取消处理，保证计数与总数一致、会话能够结束
    async fn settle_missing(
        &self,
        test_id: &str,
        plan: &BatchPlan,
        counters: &ResultCounters,
        slots: Vec<Option<BatchItem>>,
        keys: &[String],
    ) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            if let Some(item) = slot {
                items.push(item);
                continue;
            }
            let Some(key) = keys.get(index) else {
                continue;
            };
            lerror!(
                test_id,
                LogStage::Internal,
                LogComponent::BatchRunner,
                "missing_completion",
                "密钥缺少完成事件，按取消处理",
                index = index,
                key = %mask_key(key)
            );
            let item = self
                .record(test_id, plan, counters, key.clone(), &ProbeOutcome::cancelled())
                .await;
            items.push(item);
        }
        items
    }

    /// 在任何网络活动之前校验批次参数
    fn validate(&self, request: &ValidationRequest) -> ConfigResult<BatchPlan> {
        let tester = &self.ctx.config.tester;
        let provider = ProviderType::parse(&request.provider)?;

        let model = request.model.trim();
        if model.is_empty() {
            return Err(ConfigError::MissingField("model"));
        }

        // 未经 validate 的配置也不能突破硬上限
        let max_keys = tester.max_keys_per_batch.min(MAX_KEYS_PER_BATCH);
        let count = request.keys.len();
        if count == 0 || count > max_keys {
            return Err(ConfigError::BatchSize {
                actual: count,
                min: 1,
                max: max_keys,
            });
        }
        if let Some(index) = request.keys.iter().position(|k| k.trim().is_empty()) {
            return Err(ConfigError::InvalidField {
                field: "keys",
                message: format!("key at position {index} is empty"),
            });
        }

        let concurrency = request.concurrency.unwrap_or(tester.default_concurrency);
        if concurrency == 0 {
            return Err(ConfigError::InvalidField {
                field: "concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        let concurrency = concurrency.min(tester.max_concurrency);

        let proxy_base_url = match request.proxy_base_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(url) => {
                url::Url::parse(url).map_err(|e| ConfigError::InvalidField {
                    field: "proxy_base_url",
                    message: e.to_string(),
                })?;
                Some(url.to_string())
            }
        };

        Ok(BatchPlan {
            provider,
            model: model.to_string(),
            proxy_base_url,
            concurrency,
            retry_count: request.retry_count.unwrap_or(tester.default_retry_count),
        })
    }

    /// 查询会话汇总
    pub async fn session(&self, test_id: &str) -> Result<SessionAggregate> {
        self.ctx
            .storage
            .get_session(test_id)
            .await?
            .ok_or_else(|| TesterError::not_found("test session", test_id))
    }

    /// 分页查询会话结果，最新的在前
    pub async fn results(&self, test_id: &str, query: ResultQuery) -> Result<ResultsPage> {
        let session = self.session(test_id).await?;
        let items = self.ctx.storage.query_results(test_id, &query).await?;
        Ok(ResultsPage {
            session,
            page: query.page(),
            page_size: query.page_size(),
            items,
        })
    }
}
