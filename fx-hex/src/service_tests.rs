//! ConversionService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Datelike, NaiveDate};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use fx_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RateCache, RetryPolicy};
    use fx_types::{
        ConversionResult, CurrencyCode, FxError, HistoricalRateSet, RateMap, RateProvider,
        RateSnapshot,
    };

    use crate::{ConversionService, ServiceConfig};

    /// Scripted upstream: pops queued failures first, then answers with canned data.
    #[derive(Default)]
    pub struct MockProvider {
        failures: Mutex<VecDeque<FxError>>,
        calls: AtomicUsize,
        latency: Option<Duration>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_latency(latency: Duration) -> Self {
            Self {
                latency: Some(latency),
                ..Self::default()
            }
        }

        pub fn fail_next(&self, err: FxError, times: usize) {
            let mut failures = self.failures.lock().unwrap();
            failures.extend(std::iter::repeat_n(err, times));
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn next_outcome(&self) -> Result<(), FxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            match self.failures.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn code(raw: &str) -> CurrencyCode {
        CurrencyCode::parse(raw).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[async_trait]
    impl RateProvider for MockProvider {
        async fn fetch_latest(
            &self,
            base: Option<&CurrencyCode>,
        ) -> Result<RateSnapshot, FxError> {
            self.next_outcome().await?;
            let base = base.cloned().unwrap_or_else(|| code("EUR"));
            let mut rates = RateMap::new();
            rates.insert(code("GBP"), dec!(0.78));
            Ok(RateSnapshot::new(Decimal::ONE, base, day(15), rates))
        }

        async fn fetch_pair(
            &self,
            from: &CurrencyCode,
            to: &CurrencyCode,
        ) -> Result<ConversionResult, FxError> {
            self.next_outcome().await?;
            let mut rates = RateMap::new();
            rates.insert(to.clone(), dec!(0.875));
            Ok(ConversionResult::new(Decimal::ONE, from.clone(), day(15), rates))
        }

        async fn fetch_range(
            &self,
            base: &CurrencyCode,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<HistoricalRateSet, FxError> {
            self.next_outcome().await?;
            let rates: BTreeMap<NaiveDate, RateMap> = start
                .iter_days()
                .take_while(|date| *date <= end)
                .map(|date| {
                    let mut rates = RateMap::new();
                    rates.insert(code("EUR"), Decimal::new(900 + date.day() as i64, 3));
                    (date, rates)
                })
                .collect();
            Ok(HistoricalRateSet::new(
                Decimal::ONE,
                base.clone(),
                start,
                end,
                rates,
            ))
        }
    }

    fn service_with(provider: MockProvider, retry: RetryPolicy) -> ConversionService<MockProvider> {
        ConversionService::new(
            provider,
            ServiceConfig {
                latest_ttl: Duration::from_secs(3600),
                retry,
            },
            Arc::new(RateCache::new()),
            Arc::new(CircuitBreaker::new(
                "test-upstream",
                CircuitBreakerConfig::default(),
            )),
        )
    }

    fn service() -> ConversionService<MockProvider> {
        service_with(MockProvider::new(), RetryPolicy::default())
    }

    fn transient() -> FxError {
        FxError::Transient("503 Service Unavailable".into())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Latest rates
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_latest_rates_are_cached_within_ttl() {
        let service = service();

        let first = service.get_latest_rates(Some("USD")).await.unwrap();
        tokio::time::advance(Duration::from_secs(3599)).await;
        let second = service.get_latest_rates(Some("USD")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.provider().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_rates_refetched_after_ttl() {
        let service = service();

        service.get_latest_rates(Some("USD")).await.unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;
        service.get_latest_rates(Some("USD")).await.unwrap();
        service.get_latest_rates(Some("USD")).await.unwrap();

        assert_eq!(service.provider().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_rates_keyed_by_normalized_base() {
        let service = service();

        let default_base = service.get_latest_rates(None).await.unwrap();
        service.get_latest_rates(Some("")).await.unwrap();
        service.get_latest_rates(Some("usd")).await.unwrap();
        let usd = service.get_latest_rates(Some(" USD ")).await.unwrap();

        assert_eq!(default_base.base().as_str(), "EUR");
        assert_eq!(usd.base().as_str(), "USD");
        assert_eq!(service.provider().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_rates_rejects_invalid_base_without_upstream_call() {
        let service = service();

        let err = service.get_latest_rates(Some("DOLLARS")).await.unwrap_err();

        assert!(matches!(err, FxError::Validation(_)));
        assert_eq!(service.provider().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried_then_cached() {
        let service = service();
        service.provider().fail_next(transient(), 2);

        let snapshot = service.get_latest_rates(Some("USD")).await.unwrap();

        assert_eq!(snapshot.base().as_str(), "USD");
        assert_eq!(service.provider().calls(), 3);
        assert_eq!(service.circuit_status().consecutive_failures, 0);

        service.get_latest_rates(Some("USD")).await.unwrap();
        assert_eq!(service.provider().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_count_once_against_breaker() {
        let service = service();
        service.provider().fail_next(transient(), 3);

        let err = service.get_latest_rates(Some("USD")).await.unwrap_err();

        assert!(matches!(err, FxError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(service.provider().calls(), 3);
        assert_eq!(service.circuit_status().consecutive_failures, 1);
        assert_eq!(service.circuit_status().state, "closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_not_cached() {
        let service = service_with(MockProvider::new(), RetryPolicy::new(1, Duration::ZERO));
        service.provider().fail_next(transient(), 1);

        assert!(service.get_latest_rates(None).await.is_err());
        assert!(service.get_latest_rates(None).await.is_ok());
        assert_eq!(service.provider().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_is_not_retried_but_counted() {
        let service = service();
        service
            .provider()
            .fail_next(FxError::Parse("expected value".into()), 1);

        let err = service.get_latest_rates(None).await.unwrap_err();

        assert!(matches!(err, FxError::Parse(_)));
        assert_eq!(service.provider().calls(), 1);
        assert_eq!(service.circuit_status().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_rejection_is_neither_retried_nor_counted() {
        let service = service();
        service.provider().fail_next(
            FxError::UpstreamRejected {
                status: 404,
                message: "not found".into(),
            },
            1,
        );

        let err = service.get_latest_rates(Some("XXX")).await.unwrap_err();

        assert!(matches!(err, FxError::UpstreamRejected { status: 404, .. }));
        assert_eq!(service.provider().calls(), 1);
        assert_eq!(service.circuit_status().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_issue_one_upstream_call() {
        let service = Arc::new(service_with(
            MockProvider::with_latency(Duration::from_millis(200)),
            RetryPolicy::default(),
        ));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.get_latest_rates(Some("USD")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().base().as_str(), "USD");
        }

        assert_eq!(service.provider().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_failed_fetch() {
        let provider = MockProvider::with_latency(Duration::from_millis(100));
        provider.fail_next(transient(), 100);
        let service = Arc::new(ConversionService::new(
            provider,
            ServiceConfig::default(),
            Arc::new(RateCache::new()),
            Arc::new(CircuitBreaker::new(
                "test-upstream",
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    break_duration: Duration::from_secs(60),
                },
            )),
        ));
        let started = tokio::time::Instant::now();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.get_latest_rates(Some("USD")).await })
            })
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(FxError::RetriesExhausted { attempts: 3, .. })
            ));
        }

        assert_eq!(service.provider().calls(), 3);
        assert_eq!(service.breaker().state(), CircuitState::Open);
        // One retry budget: 3 calls of 100ms plus 2s and 4s of backoff.
        assert!(started.elapsed() < Duration::from_secs(7));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Circuit breaker
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_after_five_failures_and_fails_fast() {
        let service = service_with(MockProvider::new(), RetryPolicy::new(1, Duration::ZERO));
        service.provider().fail_next(transient(), 5);

        for _ in 0..5 {
            assert!(service.convert("USD", "EUR", dec!(1)).await.is_err());
        }
        assert_eq!(service.breaker().state(), CircuitState::Open);
        assert_eq!(service.provider().calls(), 5);

        let err = service.convert("USD", "EUR", dec!(1)).await.unwrap_err();
        assert!(matches!(err, FxError::CircuitOpen { .. }));
        let err = service
            .get_historical_rates("USD", "2024-01-01", "2024-01-05", 1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FxError::CircuitOpen { .. }));
        assert_eq!(service.provider().calls(), 5, "open circuit must not reach upstream");
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_admits_trial_after_break_and_closes() {
        let service = service_with(MockProvider::new(), RetryPolicy::new(1, Duration::ZERO));
        service.provider().fail_next(transient(), 5);
        for _ in 0..5 {
            let _ = service.get_latest_rates(None).await;
        }
        assert_eq!(service.circuit_status().state, "open");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(matches!(
            service.get_latest_rates(None).await,
            Err(FxError::CircuitOpen { .. })
        ));

        tokio::time::advance(Duration::from_secs(1)).await;
        service.get_latest_rates(None).await.unwrap();

        assert_eq!(service.provider().calls(), 6);
        assert_eq!(service.circuit_status().state, "closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_rejects_cached_keys() {
        let service = service_with(MockProvider::new(), RetryPolicy::new(1, Duration::ZERO));
        service.get_latest_rates(Some("USD")).await.unwrap();

        service.provider().fail_next(transient(), 5);
        for _ in 0..5 {
            let _ = service.convert("USD", "EUR", dec!(1)).await;
        }

        assert!(matches!(
            service.get_latest_rates(Some("USD")).await,
            Err(FxError::CircuitOpen { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hits_do_not_reset_failure_count() {
        let service = service_with(MockProvider::new(), RetryPolicy::new(1, Duration::ZERO));
        service.get_latest_rates(Some("USD")).await.unwrap();
        service.provider().fail_next(transient(), 2);
        let _ = service.convert("USD", "EUR", dec!(1)).await;
        let _ = service.convert("USD", "EUR", dec!(1)).await;

        service.get_latest_rates(Some("USD")).await.unwrap();

        assert_eq!(service.circuit_status().consecutive_failures, 2);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Conversion
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_convert_scales_by_amount() {
        let service = service();

        let result = service.convert("usd", "eur", dec!(100)).await.unwrap();

        assert_eq!(result.amount(), dec!(100));
        assert_eq!(result.base().as_str(), "USD");
        assert_eq!(result.rates().get(&code("EUR")), Some(&dec!(87.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_convert_is_not_cached() {
        let service = service();

        service.convert("USD", "EUR", dec!(10)).await.unwrap();
        service.convert("USD", "EUR", dec!(10)).await.unwrap();

        assert_eq!(service.provider().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_convert_validation_precedes_upstream() {
        let service = service();

        for (from, to, amount) in [
            ("", "EUR", dec!(10)),
            ("USD", " ", dec!(10)),
            ("USD", "EUR", dec!(0)),
            ("USD", "EUR", dec!(-5)),
        ] {
            assert!(
                matches!(
                    service.convert(from, to, amount).await,
                    Err(FxError::Validation(_))
                ),
                "{from}->{to} {amount} should be rejected"
            );
        }
        assert_eq!(service.provider().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_convert_to_disallowed_target_is_unsupported() {
        let service = service();

        for target in ["TRY", "pln", "THB", "MXN"] {
            assert!(matches!(
                service.convert("USD", target, dec!(10)).await,
                Err(FxError::Unsupported(_))
            ));
        }
        assert_eq!(service.provider().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors_bypass_open_circuit() {
        let service = service_with(MockProvider::new(), RetryPolicy::new(1, Duration::ZERO));
        service.provider().fail_next(transient(), 5);
        for _ in 0..5 {
            let _ = service.convert("USD", "EUR", dec!(1)).await;
        }

        assert!(matches!(
            service.convert("USD", "EUR", dec!(0)).await,
            Err(FxError::Validation(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Historical rates
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_historical_second_page() {
        let service = service();

        let page = service
            .get_historical_rates("USD", "2024-01-01", "2024-01-30", 2, 10)
            .await
            .unwrap();

        let days: Vec<u32> = page.rates().keys().map(|d| d.day()).collect();
        assert_eq!(days, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.amount(), Decimal::ONE);
        assert_eq!(page.base().as_str(), "USD");
        assert_eq!(page.start_date(), day(1));
        assert_eq!(page.end_date(), day(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_historical_page_past_end_is_empty() {
        let service = service();

        let page = service
            .get_historical_rates("USD", "2024-01-01", "2024-01-05", 3, 10)
            .await
            .unwrap();

        assert!(page.rates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_historical_validation_precedes_upstream() {
        let service = service();

        for (base, start, end, page, size) in [
            ("", "2024-01-01", "2024-01-31", 1, 10),
            ("USD", "2024-13-01", "2024-01-31", 1, 10),
            ("USD", "2024-01-01", "last week", 1, 10),
            ("USD", "2024-02-01", "2024-01-01", 1, 10),
            ("USD", "2024-01-01", "2024-01-31", 0, 10),
            ("USD", "2024-01-01", "2024-01-31", 1, -1),
        ] {
            assert!(
                matches!(
                    service
                        .get_historical_rates(base, start, end, page, size)
                        .await,
                    Err(FxError::Validation(_))
                ),
                "{base} {start}..{end} page={page} size={size} should be rejected"
            );
        }
        assert_eq!(service.provider().calls(), 0);
    }
}
