use std::collections::HashMap;

use http::Method;
use waypoint::router::Router;
use waypoint::RouteError;

fn clients_router() -> Router {
    let mut router = Router::new();
    router
        .get(r"/api/clients/{id:\d+}", "clients.show")
        .unwrap()
        .name("clients.show")
        .unwrap();
    router.post("/api/clients", "clients.store").unwrap();
    router
}

fn assert_route_match(router: &Router, method: Method, path: &str, expected_handler: &str) {
    match router.match_route(&method, path) {
        Some(m) => {
            println!("✅ {} {} → {}", method, path, m.handler_name());
            assert_eq!(
                m.handler_name(),
                expected_handler,
                "Handler mismatch for {method} {path}"
            );
        }
        None => {
            println!("❌ {} {} → no match", method, path);
            assert_eq!(expected_handler, "<none>", "Expected route to match for {method} {path}");
        }
    }
}

#[test]
fn test_url_for_named_route() {
    let router = clients_router();
    let url = router.url_for("clients.show").param("id", 42).build().unwrap();
    assert_eq!(url, "/api/clients/42");
}

#[test]
fn test_url_missing_required_parameter() {
    let router = clients_router();
    let err = router.url("clients.show", &HashMap::new(), &[]).unwrap_err();
    assert_eq!(
        err,
        RouteError::MissingParameter {
            route: "clients.show".to_string(),
            parameter: "id".to_string(),
        }
    );
}

#[test]
fn test_url_appends_encoded_query() {
    let router = clients_router();
    let url = router
        .url_for("clients.show")
        .param("id", 7)
        .query("include", "bills")
        .query("q", "a b")
        .build()
        .unwrap();
    assert_eq!(url, "/api/clients/7?include=bills&q=a%20b");
}

#[test]
fn test_url_unknown_route() {
    let router = clients_router();
    assert_eq!(
        router.url_for("nope").build().unwrap_err(),
        RouteError::UnknownRoute("nope".to_string())
    );
    assert!(router.has_route("clients.show"));
    assert!(!router.has_route("clients.store"));
}

#[test]
fn test_regex_constraint() {
    let router = clients_router();
    let m = router.match_route(&Method::GET, "/api/clients/123").unwrap();
    assert_eq!(m.get_path_param("id"), Some("123"));
    assert_route_match(&router, Method::GET, "/api/clients/abc", "<none>");
}

#[test]
fn test_match_is_anchored_and_method_aware() {
    let router = clients_router();
    assert_route_match(&router, Method::GET, "/api/clients/123/bills", "<none>");
    assert_route_match(&router, Method::GET, "/prefix/api/clients/123", "<none>");
    assert_route_match(&router, Method::DELETE, "/api/clients/123", "<none>");
    assert_route_match(&router, Method::POST, "/api/clients", "clients.store");
}

#[test]
fn test_first_registered_route_wins() {
    let mut router = Router::new();
    router.get("/items/{id}", "items.show").unwrap();
    router.get("/items/special", "items.special").unwrap();

    let m = router.match_route(&Method::GET, "/items/special").unwrap();
    assert_eq!(m.handler_name(), "items.show");
    assert_eq!(m.get_path_param("id"), Some("special"));
}

#[test]
fn test_literal_registered_first_takes_precedence() {
    let mut router = Router::new();
    router.get("/items/special", "items.special").unwrap();
    router.get("/items/{id}", "items.show").unwrap();

    assert_route_match(&router, Method::GET, "/items/special", "items.special");
    assert_route_match(&router, Method::GET, "/items/9", "items.show");
}

#[test]
fn test_nested_groups_compose_prefix_and_middleware() {
    let mut router = Router::new();
    router
        .group("/api", &["auth"], |r| {
            r.get("/me", "profile.show")?;
            r.group("/admin", &["admin"], |r| {
                let _users = r.get("/users", "admin.users")?.middleware(&["audit"]);
                Ok(())
            })
        })
        .unwrap();
    router.get("/health", "health").unwrap();

    let routes = router.routes();
    assert_eq!(routes[0].pattern(), "/api/me");
    assert_eq!(routes[0].middleware(), ["auth"]);
    assert_eq!(routes[1].pattern(), "/api/admin/users");
    assert_eq!(routes[1].middleware(), ["auth", "admin", "audit"]);
    assert_eq!(routes[2].pattern(), "/health");
    assert!(routes[2].middleware().is_empty());
}

#[test]
fn test_group_context_restored_after_error() {
    let mut router = Router::new();
    let result = router.group("/api", &["auth"], |r| {
        r.get("/{bad", "broken")?;
        Ok(())
    });
    assert!(matches!(result, Err(RouteError::InvalidPattern { .. })));

    router.get("/after", "after").unwrap();
    assert_eq!(router.routes()[0].pattern(), "/after");
    assert!(router.routes()[0].middleware().is_empty());
}

#[test]
fn test_optional_parameter() {
    let mut router = Router::new();
    router.get("/users/{id?}", "users").unwrap().name("users").unwrap();

    let all = router.match_route(&Method::GET, "/users").unwrap();
    assert!(all.params.is_empty());
    let one = router.match_route(&Method::GET, "/users/5").unwrap();
    assert_eq!(one.get_path_param("id"), Some("5"));

    assert_eq!(router.url_for("users").build().unwrap(), "/users");
    assert_eq!(router.url_for("users").param("id", 5).build().unwrap(), "/users/5");
}

#[test]
fn test_duplicate_route_name_is_rejected() {
    let mut router = clients_router();
    let err = router
        .get("/v2/clients/{id}", "clients.show.v2")
        .unwrap()
        .name("clients.show")
        .err();
    assert_eq!(err, Some(RouteError::DuplicateName("clients.show".to_string())));

    // The original name still points at the first route.
    let route = router.route_by_name("clients.show").unwrap();
    assert_eq!(route.handler(), "clients.show");
}

#[test]
fn test_match_request_carries_query() {
    let router = clients_router();
    let request = waypoint::Request::get("/api/clients/5?include=bills");
    let m = router.match_request(&request).unwrap();
    assert_eq!(m.get_query_param("include"), Some("bills"));
}
