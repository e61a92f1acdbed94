//! # Request Scenarios
//!
//! Timeout, duplicate-delivery and leak behaviour of a running processor:
//!
//! 1. An unanswered request times out inside its window and leaves no entry
//! 2. A response delivered twice resolves the caller once
//! 3. A non-positive timeout is rejected at construction

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use mux_core::{
        LoopbackConfig, LoopbackTransport, MuxError, ProcessorConfig, Request, RequestId,
        RequestProcessor, RequestProcessorApi,
    };
    use tokio_util::sync::CancellationToken;

    use crate::fixtures::{eventually, started_processor, ScriptedPeer};

    // =============================================================================
    // TIMEOUT
    // =============================================================================

    #[tokio::test]
    async fn test_unanswered_request_times_out_within_window() {
        let peer = Arc::new(ScriptedPeer::new());
        let processor = started_processor(Arc::clone(&peer), Duration::from_millis(20)).await;

        let lost = Request::fresh();
        peer.blackhole(lost.id());

        let started_at = Instant::now();
        let err = processor
            .send(lost, &CancellationToken::new())
            .await
            .unwrap_err();
        let elapsed = started_at.elapsed();

        assert!(err.is_timeout(), "expected timeout, got {err}");
        assert!(elapsed >= Duration::from_millis(20), "too early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(50), "too late: {elapsed:?}");

        // A fresh identifier goes through
        let fresh = Request::fresh();
        let response = processor
            .send(fresh.clone(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.id(), fresh.id());
    }

    #[tokio::test]
    async fn test_timeouts_leave_no_pending_entries() {
        let peer = Arc::new(ScriptedPeer::new());
        let processor = started_processor(Arc::clone(&peer), Duration::from_millis(30)).await;
        let before = processor.pending_count();

        peer.go_silent();
        let calls: Vec<_> = (0..16)
            .map(|_| {
                let processor = Arc::clone(&processor);
                tokio::spawn(async move {
                    processor
                        .send(Request::fresh(), &CancellationToken::new())
                        .await
                })
            })
            .collect();

        for call in calls {
            assert!(call.await.unwrap().unwrap_err().is_timeout());
        }
        assert_eq!(processor.pending_count(), before);

        let stats = processor.stats();
        assert_eq!(stats.timeouts, 16);
        assert_eq!(stats.registered, 16);
    }

    #[tokio::test]
    async fn test_late_response_after_timeout_is_ignored() {
        let peer = Arc::new(ScriptedPeer::new());
        peer.set_latency(Duration::from_millis(60));
        let processor = started_processor(Arc::clone(&peer), Duration::from_millis(20)).await;

        let err = processor
            .send(Request::fresh(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        // The answer lands after the caller gave up and is dropped quietly
        assert!(eventually(|| processor.stats().dropped_responses == 1).await);
        assert!(processor.is_dispatch_alive());
        assert_eq!(processor.pending_count(), 0);
    }

    // =============================================================================
    // DUPLICATE DELIVERY
    // =============================================================================

    #[tokio::test]
    async fn test_duplicate_response_single_resolution() {
        let peer = Arc::new(ScriptedPeer::new());
        peer.set_copies(2);
        let processor = started_processor(Arc::clone(&peer), Duration::from_secs(5)).await;

        let request = Request::new(RequestId::new(), b"A".to_vec());
        let response = processor
            .send(request.clone(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.id(), request.id());

        assert!(eventually(|| processor.stats().dropped_responses == 1).await);
        let stats = processor.stats();
        assert_eq!(stats.completed, 1);
        assert!(processor.is_dispatch_alive());

        // The processor keeps serving after the duplicate
        let next = Request::fresh();
        assert_eq!(
            processor
                .send(next.clone(), &CancellationToken::new())
                .await
                .unwrap()
                .id(),
            next.id()
        );
    }

    #[tokio::test]
    async fn test_loopback_duplicates_never_mismatch() {
        let transport = Arc::new(LoopbackTransport::new(LoopbackConfig {
            duplicate_probability: 1.0,
            ..LoopbackConfig::for_testing()
        }));
        let processor = started_processor(Arc::clone(&transport), Duration::from_secs(5)).await;

        for _ in 0..50 {
            let request = Request::fresh();
            let response = processor
                .send(request.clone(), &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(response.id(), request.id());
        }

        assert!(eventually(|| processor.stats().dropped_responses == 50).await);
        assert_eq!(transport.stats().duplicates, 50);
        assert_eq!(processor.stats().completed, 50);
    }

    // =============================================================================
    // CONSTRUCTION
    // =============================================================================

    #[test]
    fn test_non_positive_timeout_rejected() {
        let transport = Arc::new(LoopbackTransport::default());

        let zero = RequestProcessor::with_timeout(Arc::clone(&transport), Duration::ZERO);
        assert!(matches!(zero, Err(MuxError::InvalidConfig(_))));

        let config = ProcessorConfig {
            request_timeout_ms: 0,
            ..ProcessorConfig::default()
        };
        assert!(RequestProcessor::new(transport, config).is_err());
    }
}
