mod common;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{cache, json_handler, manual_clock};
use http::Method;
use serde_json::{json, Value};
use waypoint::cache::{CacheDirectives, CacheManager};
use waypoint::clock::ManualClock;
use waypoint::dispatcher::Dispatcher;
use waypoint::message::Response;
use waypoint::middleware::{CacheMiddleware, ErrorHandlerMiddleware, FieldFilterMiddleware};
use waypoint::pipeline::{handler_fn, MiddlewarePipeline, Pipeline, RequestHandler};
use waypoint::router::Router;
use waypoint::Request;

fn directives() -> CacheDirectives {
    CacheDirectives {
        max_age: 600,
        vary: vec!["Accept".to_string(), "Authorization".to_string()],
        ..CacheDirectives::default()
    }
}

fn cached_dispatcher(cache: Arc<CacheManager>) -> Dispatcher {
    let mut router = Router::new();
    router
        .group("", &["cache"], |r| {
            r.get("/api/test", "test.show")?;
            r.post("/api/test", "test.store")?;
            r.get("/api/volatile", "volatile.show")?;
            r.get("/api/gone", "gone.show")?;
            Ok(())
        })
        .unwrap();

    Dispatcher::builder(router)
        .middleware(ErrorHandlerMiddleware)
        .alias("cache", CacheMiddleware::new(cache, directives()))
        .handler("test.show", json_handler(json!({ "id": 1, "name": "test" })))
        .handler("test.store", json_handler(json!({ "created": true })))
        .handler(
            "volatile.show",
            handler_fn(|_req| {
                Ok(Response::ok(json!({ "now": "ticking" })).with_header("Cache-Control", "no-cache"))
            }),
        )
        .handler("gone.show", handler_fn(|_req| Ok(Response::error(410, "gone"))))
        .build()
        .unwrap()
}

#[test]
fn test_conditional_get_answers_304() {
    let clock = manual_clock();
    let dispatcher = cached_dispatcher(cache(&clock));

    let first = dispatcher.dispatch(Request::get("/api/test")).unwrap();
    assert_eq!(first.status, 200);
    let etag = first.get_header("ETag").unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    assert_eq!(first.get_header("Cache-Control"), Some("public, max-age=600"));
    assert_eq!(first.get_header("Vary"), Some("Accept, Authorization"));

    let second = dispatcher
        .dispatch(Request::get("/api/test").with_header("If-None-Match", etag.clone()))
        .unwrap();
    assert_eq!(second.status, 304);
    assert_eq!(second.body, Value::Null);
    assert_eq!(second.get_header("ETag"), Some(etag.as_str()));
    assert!(second.get_header("Content-Type").is_none());
    assert_eq!(second.get_header("Cache-Control"), Some("public, max-age=600"));
}

#[test]
fn test_stale_etag_gets_full_response() {
    let clock = manual_clock();
    let dispatcher = cached_dispatcher(cache(&clock));
    let res = dispatcher
        .dispatch(Request::get("/api/test").with_header("If-None-Match", "\"stale\""))
        .unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body["name"], "test");
}

#[test]
fn test_etag_lists_and_wildcards_match() {
    let clock = manual_clock();
    let dispatcher = cached_dispatcher(cache(&clock));
    let etag = dispatcher
        .dispatch(Request::get("/api/test"))
        .unwrap()
        .get_header("ETag")
        .unwrap()
        .to_string();

    let listed = format!("\"other\", W/{etag}");
    let res = dispatcher
        .dispatch(Request::get("/api/test").with_header("If-None-Match", listed))
        .unwrap();
    assert_eq!(res.status, 304);

    let res = dispatcher
        .dispatch(Request::get("/api/test").with_header("If-None-Match", "*"))
        .unwrap();
    assert_eq!(res.status, 304);
}

#[test]
fn test_only_get_and_head_are_cached() {
    let clock = manual_clock();
    let dispatcher = cached_dispatcher(cache(&clock));

    let res = dispatcher
        .dispatch(Request::new(Method::POST, "/api/test").with_header("If-None-Match", "*"))
        .unwrap();
    assert_eq!(res.status, 200);
    assert!(res.get_header("ETag").is_none());
    assert!(res.get_header("Cache-Control").is_none());
}

#[test]
fn test_no_cache_responses_pass_through() {
    let clock = manual_clock();
    let dispatcher = cached_dispatcher(cache(&clock));
    let res = dispatcher
        .dispatch(Request::get("/api/volatile").with_header("If-None-Match", "*"))
        .unwrap();
    assert_eq!(res.status, 200);
    assert!(res.get_header("ETag").is_none());
    assert_eq!(res.get_header("Cache-Control"), Some("no-cache"));
    assert!(res.get_header("Vary").is_none());
}

#[test]
fn test_cacheable_error_statuses_get_cache_headers() {
    let clock = manual_clock();
    let dispatcher = cached_dispatcher(cache(&clock));
    let res = dispatcher.dispatch(Request::get("/api/gone")).unwrap();
    assert_eq!(res.status, 410);
    assert!(res.get_header("ETag").is_none());
    assert_eq!(res.get_header("Cache-Control"), Some("public, max-age=600"));
}

fn last_modified_pipeline(clock: &Arc<ManualClock>, revision: &Arc<AtomicU64>) -> Pipeline {
    let revision = Arc::clone(revision);
    MiddlewarePipeline::new()
        .pipe(
            CacheMiddleware::new(cache(clock), CacheDirectives::default())
                .with_last_modified(Duration::from_secs(3600)),
        )
        .then(handler_fn(move |_req| {
            Ok(Response::ok(json!({ "revision": revision.load(Ordering::SeqCst) })))
        }))
}

#[test]
fn test_last_modified_is_first_seen_time() {
    let clock = manual_clock();
    let revision = Arc::new(AtomicU64::new(1));
    let pipeline = last_modified_pipeline(&clock, &revision);

    let first = pipeline.handle(Request::get("/report")).unwrap();
    let stamp = "Tue, 14 Nov 2023 22:13:20 GMT";
    assert_eq!(first.get_header("Last-Modified"), Some(stamp));

    // Unchanged content keeps its original timestamp.
    clock.advance(Duration::from_secs(90));
    let again = pipeline.handle(Request::get("/report")).unwrap();
    assert_eq!(again.get_header("Last-Modified"), Some(stamp));

    let res = pipeline
        .handle(Request::get("/report").with_header("If-Modified-Since", stamp))
        .unwrap();
    assert_eq!(res.status, 304);

    let res = pipeline
        .handle(Request::get("/report").with_header("If-Modified-Since", "Tue, 14 Nov 2023 22:00:00 GMT"))
        .unwrap();
    assert_eq!(res.status, 200);
}

#[test]
fn test_changed_content_gets_new_validators() {
    let clock = manual_clock();
    let revision = Arc::new(AtomicU64::new(1));
    let pipeline = last_modified_pipeline(&clock, &revision);

    let first = pipeline.handle(Request::get("/report")).unwrap();
    let first_etag = first.get_header("ETag").unwrap().to_string();
    let first_stamp = first.get_header("Last-Modified").unwrap().to_string();

    clock.advance(Duration::from_secs(60));
    revision.store(2, Ordering::SeqCst);

    let res = pipeline
        .handle(
            Request::get("/report")
                .with_header("If-None-Match", first_etag.clone())
                .with_header("If-Modified-Since", first_stamp.clone()),
        )
        .unwrap();
    assert_eq!(res.status, 200);
    assert_ne!(res.get_header("ETag"), Some(first_etag.as_str()));
    assert_eq!(res.get_header("Last-Modified"), Some("Tue, 14 Nov 2023 22:14:20 GMT"));

    // A stale If-Modified-Since no longer matches the newer content.
    let res = pipeline
        .handle(Request::get("/report").with_header("If-Modified-Since", first_stamp))
        .unwrap();
    assert_eq!(res.status, 200);
}

#[test]
fn test_if_none_match_takes_precedence() {
    let clock = manual_clock();
    let revision = Arc::new(AtomicU64::new(1));
    let pipeline = last_modified_pipeline(&clock, &revision);
    let stamp = pipeline
        .handle(Request::get("/report"))
        .unwrap()
        .get_header("Last-Modified")
        .unwrap()
        .to_string();

    let res = pipeline
        .handle(
            Request::get("/report")
                .with_header("If-None-Match", "\"mismatch\"")
                .with_header("If-Modified-Since", stamp),
        )
        .unwrap();
    assert_eq!(res.status, 200);
}

#[test]
fn test_cache_manager_values() {
    let clock = manual_clock();
    let cache = cache(&clock);

    assert_eq!(cache.generate_etag(b"payload"), cache.generate_etag(b"payload"));
    assert_ne!(cache.generate_etag(b"payload"), cache.generate_etag(b"payload!"));

    cache.put("k", &json!({ "v": 1 }), Duration::from_secs(60)).unwrap();
    assert!(cache.has("k"));
    assert_eq!(cache.get::<Value>("k").unwrap(), Some(json!({ "v": 1 })));

    assert!(cache.invalidate("k"));
    assert!(!cache.has("k"));
    assert_eq!(cache.get::<Value>("k").unwrap(), None);

    cache.put("short", &5u32, Duration::from_secs(1)).unwrap();
    clock.advance(Duration::from_secs(1));
    assert!(!cache.has("short"));
}

#[test]
fn test_remember_invokes_producer_once() {
    let clock = manual_clock();
    let cache = cache(&clock);
    let calls = AtomicUsize::new(0);
    let produce = || {
        calls.fetch_add(1, Ordering::SeqCst);
        vec!["a".to_string(), "b".to_string()]
    };

    let first = cache.remember("k", Duration::from_secs(60), produce).unwrap();
    let second = cache.remember("k", Duration::from_secs(60), produce).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(60));
    cache.remember("k", Duration::from_secs(60), produce).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failed_producer_is_not_cached() {
    let clock = manual_clock();
    let cache = cache(&clock);
    let err = cache
        .try_remember::<u32, _>("k", Duration::from_secs(60), || Err(anyhow::anyhow!("upstream down")))
        .unwrap_err();
    assert!(err.to_string().contains("upstream down"));
    assert!(!cache.has("k"));

    let value = cache.try_remember("k", Duration::from_secs(60), || Ok(7u32)).unwrap();
    assert_eq!(value, 7);
}

#[test]
fn test_concurrent_remember_runs_producer_once() {
    let clock = manual_clock();
    let cache = cache(&clock);
    let calls = AtomicUsize::new(0);

    let values: Vec<u64> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    cache
                        .remember("expensive", Duration::from_secs(60), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            42u64
                        })
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(values.iter().all(|&v| v == 42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_field_selections_validate_separately() {
    let clock = manual_clock();
    let cache = cache(&clock);
    let pipeline = MiddlewarePipeline::new()
        .pipe(ErrorHandlerMiddleware)
        .pipe(FieldFilterMiddleware::default())
        .pipe(CacheMiddleware::new(Arc::clone(&cache), directives()))
        .then(json_handler(json!({ "id": 1, "name": "test" })));

    let ids = pipeline.handle(Request::get("/api/test?fields=id")).unwrap();
    assert_eq!(ids.body, json!({ "id": 1 }));
    let etag = ids.get_header("ETag").unwrap().to_string();
    assert_eq!(etag, cache.generate_etag(br#"{"id":1}"#));

    let names = pipeline
        .handle(Request::get("/api/test?fields=name").with_header("If-None-Match", etag.clone()))
        .unwrap();
    assert_eq!(names.status, 200);
    assert_eq!(names.body, json!({ "name": "test" }));
    assert_ne!(names.get_header("ETag"), Some(etag.as_str()));

    let again = pipeline
        .handle(Request::get("/api/test?fields=id").with_header("If-None-Match", etag))
        .unwrap();
    assert_eq!(again.status, 304);
    assert_eq!(again.body, Value::Null);
}
