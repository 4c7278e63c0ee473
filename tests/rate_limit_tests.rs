mod common;

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{json_handler, limiter, manual_clock, START};
use serde_json::json;
use waypoint::clock::{Clock, ManualClock};
use waypoint::dispatcher::Dispatcher;
use waypoint::middleware::{ErrorHandlerMiddleware, RateLimitMiddleware};
use waypoint::pipeline::{middleware_fn, MiddlewarePipeline, RequestHandler};
use waypoint::rate_limit::{RateLimitPolicy, RateLimitRule, RateLimiter};
use waypoint::router::Router;
use waypoint::store::{MemoryStore, TtlStore};
use waypoint::Request;

fn ip(addr: &str) -> IpAddr {
    addr.parse().unwrap()
}

fn from(addr: &str, path: &str) -> Request {
    Request::get(path).with_remote_addr(ip(addr))
}

fn policy() -> RateLimitPolicy {
    RateLimitPolicy::global(RateLimitRule::new(5, 60))
        .with_group("/api/admin", RateLimitRule::new(2, 60))
        .with_route("auth.login", RateLimitRule::new(1, 300))
}

fn limited_dispatcher(limiter: RateLimiter) -> Dispatcher {
    let mut router = Router::new();
    router.get("/api/login", "auth.login").unwrap().name("auth.login").unwrap();
    router.get("/api/clients", "clients.index").unwrap();
    router
        .group("/api/admin", &[], |r| {
            r.get("/users", "admin.users")?;
            r.get("/audit", "admin.audit")?.name("admin.audit")?;
            Ok(())
        })
        .unwrap();

    let mut builder = Dispatcher::builder(router)
        .middleware(ErrorHandlerMiddleware)
        .middleware(RateLimitMiddleware::new(limiter, policy()));
    for handler in ["auth.login", "clients.index", "admin.users", "admin.audit"] {
        builder = builder.handler(handler, json_handler(json!({ "handler": handler })));
    }
    builder.build().unwrap()
}

fn setup() -> (Arc<ManualClock>, RateLimiter, Dispatcher) {
    let clock = manual_clock();
    let limiter = limiter(&clock);
    let dispatcher = limited_dispatcher(limiter.clone());
    (clock, limiter, dispatcher)
}

#[test]
fn test_limiter_trips_after_max_attempts() {
    let clock = manual_clock();
    let limiter = limiter(&clock);
    let window = Duration::from_secs(10);

    for _ in 0..3 {
        assert!(!limiter.too_many_attempts("k", 3));
        limiter.hit("k", window);
    }
    assert!(limiter.too_many_attempts("k", 3));
    assert_eq!(limiter.remaining("k", 3), 0);
    let wait = limiter.available_in("k");
    assert!(wait > 0 && wait <= 10, "available_in was {wait}");
}

#[test]
fn test_success_carries_rate_limit_headers() {
    let (_clock, _limiter, dispatcher) = setup();
    let res = dispatcher.dispatch(from("10.0.0.1", "/api/clients")).unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("X-RateLimit-Limit"), Some("5"));
    assert_eq!(res.get_header("X-RateLimit-Remaining"), Some("4"));
    let reset = (START + 60).to_string();
    assert_eq!(res.get_header("X-RateLimit-Reset"), Some(reset.as_str()));
}

#[test]
fn test_rejection_is_429_with_retry_after() {
    let (clock, _limiter, dispatcher) = setup();
    assert_eq!(dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap().status, 200);

    let res = dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap();
    assert_eq!(res.status, 429);
    assert_eq!(res.get_header("Retry-After"), Some("300"));
    assert_eq!(res.get_header("X-RateLimit-Limit"), Some("1"));
    assert_eq!(res.get_header("X-RateLimit-Remaining"), Some("0"));
    assert_eq!(res.body["error"], "Too Many Requests");
    assert_eq!(res.body["retry_after"], 300);

    clock.advance(Duration::from_secs(120));
    let res = dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap();
    assert_eq!(res.get_header("Retry-After"), Some("180"));
}

#[test]
fn test_window_reopens_after_expiry() {
    let (clock, _limiter, dispatcher) = setup();
    dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap();
    assert_eq!(dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap().status, 429);

    clock.advance(Duration::from_secs(300));
    let res = dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("X-RateLimit-Remaining"), Some("0"));
}

#[test]
fn test_route_rule_beats_group_rule_beats_global() {
    let (_clock, limiter, dispatcher) = setup();
    let caller = "10.0.0.1";

    // Group limit of 2 for /api/admin/users.
    for _ in 0..2 {
        assert_eq!(dispatcher.dispatch(from(caller, "/api/admin/users")).unwrap().status, 200);
    }
    assert_eq!(dispatcher.dispatch(from(caller, "/api/admin/users")).unwrap().status, 429);

    // Named admin route without a route rule shares the group counter.
    assert_eq!(dispatcher.dispatch(from(caller, "/api/admin/audit")).unwrap().status, 429);

    // Global scope is untouched by the group's traffic.
    let res = dispatcher.dispatch(from(caller, "/api/clients")).unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("X-RateLimit-Remaining"), Some("4"));

    assert_eq!(limiter.attempts("group:/api/admin|ip:10.0.0.1"), 2);
    assert_eq!(limiter.attempts("global|ip:10.0.0.1"), 1);
    assert_eq!(limiter.attempts("route:auth.login|ip:10.0.0.1"), 0);
}

#[test]
fn test_callers_are_counted_separately() {
    let (_clock, _limiter, dispatcher) = setup();
    assert_eq!(dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap().status, 200);
    assert_eq!(dispatcher.dispatch(from("10.0.0.2", "/api/login")).unwrap().status, 200);
    assert_eq!(dispatcher.dispatch(from("10.0.0.1", "/api/login")).unwrap().status, 429);
}

#[test]
fn test_authenticated_callers_are_keyed_by_user() {
    let clock = manual_clock();
    let limiter = limiter(&clock);
    let pipeline = MiddlewarePipeline::new()
        .pipe(middleware_fn(|req, next| {
            let user = req.get_header("X-User").unwrap_or("anonymous").to_string();
            next.run(req.with_user(user, None))
        }))
        .pipe(RateLimitMiddleware::new(
            limiter.clone(),
            RateLimitPolicy::global(RateLimitRule::new(1, 60)),
        ))
        .then(json_handler(json!({})));

    // Same address, different users.
    let alice = from("10.0.0.1", "/").with_header("X-User", "alice");
    let bob = from("10.0.0.1", "/").with_header("X-User", "bob");
    assert!(pipeline.handle(alice.clone()).is_ok());
    assert!(pipeline.handle(bob).is_ok());
    assert!(pipeline.handle(alice).is_err());
    assert_eq!(limiter.attempts("global|user:alice"), 1);
    assert_eq!(limiter.attempts("global|ip:10.0.0.1"), 0);
}

#[test]
fn test_identity_falls_back_to_unknown() {
    assert_eq!(RateLimitMiddleware::identity(&Request::get("/")), "ip:unknown");
    assert_eq!(
        RateLimitMiddleware::identity(&from("::1", "/")),
        "ip:::1"
    );
}

#[test]
fn test_unlimited_requests_pass_without_headers() {
    let clock = manual_clock();
    let pipeline = MiddlewarePipeline::new()
        .pipe(RateLimitMiddleware::new(
            limiter(&clock),
            RateLimitPolicy::default().with_group("/api", RateLimitRule::new(1, 60)),
        ))
        .then(json_handler(json!({})));

    for _ in 0..3 {
        let res = pipeline.handle(from("10.0.0.1", "/health")).unwrap();
        assert!(res.get_header("X-RateLimit-Limit").is_none());
    }
}

#[test]
fn test_concurrent_hits_lose_no_updates() {
    let clock = manual_clock();
    let limiter = limiter(&clock);
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..100 {
                    limiter.hit("shared", Duration::from_secs(60));
                }
            });
        }
    });
    assert_eq!(limiter.attempts("shared"), 800);
}

#[test]
fn test_concurrent_requests_admit_exactly_the_limit() {
    let clock = manual_clock();
    let pipeline = MiddlewarePipeline::new()
        .pipe(RateLimitMiddleware::new(
            limiter(&clock),
            RateLimitPolicy::global(RateLimitRule::new(50, 60)),
        ))
        .then(json_handler(json!({})));
    let admitted = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..20 {
                    if pipeline.handle(from("10.0.0.1", "/")).is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });
    assert_eq!(admitted.load(Ordering::SeqCst), 50);
}

#[test]
fn test_expired_counters_of_departed_callers_are_reclaimed() {
    let clock = manual_clock();
    let store = Arc::new(MemoryStore::with_clock(Arc::clone(&clock) as Arc<dyn Clock>).with_purge_interval(8));
    let limiter = RateLimiter::new(Arc::clone(&store) as Arc<dyn TtlStore>, Arc::clone(&clock) as Arc<dyn Clock>);

    for n in 1..=5 {
        limiter.hit(&format!("global|ip:10.0.0.{n}"), Duration::from_secs(60));
    }
    assert_eq!(store.len(), 5);

    clock.advance(Duration::from_secs(61));
    for n in 6..=8 {
        limiter.hit(&format!("global|ip:10.0.0.{n}"), Duration::from_secs(60));
    }
    assert_eq!(store.len(), 3);
    assert_eq!(limiter.attempts("global|ip:10.0.0.8"), 1);
}
