//! # Concurrency Tests
//!
//! Many independent callers sharing one processor and one transport.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use mux_core::{
        LoopbackConfig, LoopbackTransport, MockTransport, MuxError, Request, RequestId,
        RequestProcessorApi, Response,
    };
    use tokio_util::sync::CancellationToken;

    use crate::fixtures::{eventually, started_processor, ScriptedPeer};

    async fn send_from_many<P>(processor: Arc<P>, callers: usize) -> Vec<(Request, Response)>
    where
        P: RequestProcessorApi + 'static,
    {
        let calls = (0..callers).map(|i| {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                let request = Request::new(RequestId::new(), (i as u32).to_be_bytes().to_vec());
                let response = processor
                    .send(request.clone(), &CancellationToken::new())
                    .await
                    .unwrap_or_else(|e| panic!("caller {i} failed: {e}"));
                (request, response)
            })
        });
        join_all(calls)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_each_caller_gets_own_response() {
        let peer = Arc::new(ScriptedPeer::new());
        peer.set_latency(Duration::from_millis(2));
        let processor = started_processor(Arc::clone(&peer), Duration::from_secs(5)).await;

        let results = send_from_many(Arc::clone(&processor), 128).await;

        let mut seen = HashSet::new();
        for (request, response) in &results {
            assert_eq!(response.id(), request.id());
            assert_eq!(response.payload(), request.payload());
            assert!(seen.insert(response.id()), "response delivered twice");
        }
        assert_eq!(processor.stats().completed, 128);
        assert_eq!(processor.pending_count(), 0);
        assert!(!peer.reentrancy_detected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_faulty_peer_under_load() {
        let transport = Arc::new(LoopbackTransport::new(LoopbackConfig {
            max_latency_ms: 3,
            duplicate_probability: 0.5,
            drop_probability: 0.0,
            queue_capacity: 16,
        }));
        let processor = started_processor(Arc::clone(&transport), Duration::from_secs(5)).await;

        let results = send_from_many(Arc::clone(&processor), 64).await;
        assert!(results
            .iter()
            .all(|(request, response)| request.id() == response.id()));

        let duplicates = transport.stats().duplicates;
        assert!(eventually(|| processor.stats().dropped_responses == duplicates).await);
        assert_eq!(processor.stats().completed, 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writes_never_overlap() {
        let transport = Arc::new(MockTransport::echoing());
        transport.set_write_delay(Duration::from_millis(1));
        let processor = started_processor(Arc::clone(&transport), Duration::from_secs(5)).await;

        send_from_many(Arc::clone(&processor), 32).await;

        assert_eq!(transport.written_count(), 32);
        assert!(!transport.reentrancy_detected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelling_some_callers_leaves_others_untouched() {
        let peer = Arc::new(ScriptedPeer::new());
        let processor = started_processor(Arc::clone(&peer), Duration::from_secs(5)).await;

        let mut doomed = Vec::new();
        let cancel = CancellationToken::new();
        for _ in 0..8 {
            let request = Request::fresh();
            peer.blackhole(request.id());
            let processor = Arc::clone(&processor);
            let cancel = cancel.clone();
            doomed.push(tokio::spawn(async move {
                processor.send(request, &cancel).await
            }));
        }

        let survivors = send_from_many(Arc::clone(&processor), 16).await;
        assert_eq!(survivors.len(), 16);
        assert!(eventually(|| processor.pending_count() == 8).await);

        cancel.cancel();
        for call in doomed {
            assert!(matches!(call.await.unwrap(), Err(MuxError::Cancelled(_))));
        }
        let stats = processor.stats();
        assert_eq!(stats.cancelled, 8);
        assert_eq!(stats.completed, 16);
        assert_eq!(processor.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_identifier_across_callers() {
        let peer = Arc::new(ScriptedPeer::new());
        let processor = started_processor(Arc::clone(&peer), Duration::from_secs(5)).await;
        let request = Request::fresh();
        peer.blackhole(request.id());

        let cancel = CancellationToken::new();
        let first = {
            let processor = Arc::clone(&processor);
            let request = request.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { processor.send(request, &cancel).await })
        };
        assert!(eventually(|| processor.pending_count() == 1).await);

        let second = processor
            .send(request.clone(), &CancellationToken::new())
            .await;
        assert!(matches!(second, Err(MuxError::DuplicateIdentifier(id)) if id == request.id()));
        assert_eq!(processor.pending_count(), 1);

        cancel.cancel();
        assert!(first.await.unwrap().unwrap_err().is_cancelled());
    }
}
