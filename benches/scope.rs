//! Performance benchmarks for a3s-session
//!
//! Run with: cargo bench

use a3s_session::{
    Application, Broker, CookieOptions, Decoration, MountPoint, Session, SessionConfig,
    SessionLayer, SessionRequest,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn decorated_request(isolated: bool) -> SessionRequest {
    let mut session = Session::new(&CookieOptions::default());
    session.decorate(Decoration::new(isolated));
    let mut req = SessionRequest::new().with_broker(Broker::new("sports"));
    req.set_session(session);
    req
}

fn bench_scoped_access(c: &mut Criterion) {
    for (label, isolated) in [("flat", false), ("isolated", true)] {
        let mut req = decorated_request(isolated);

        c.bench_function(&format!("ScopedSession::set ({})", label), |b| {
            b.iter(|| {
                req.scoped()
                    .unwrap()
                    .set("cart", Some(serde_json::json!({"items": [1, 2, 3]})))
            });
        });

        c.bench_function(&format!("ScopedSession::get ({})", label), |b| {
            b.iter(|| req.scoped().unwrap().get("cart").is_some());
        });
    }
}

fn bench_request_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let layer = SessionLayer::mount(
        SessionConfig::default().with_secret("bench").isolated(true),
        &MountPoint::application(Arc::new(Application::new())),
    )
    .unwrap();

    c.bench_function("SessionLayer handle + commit (memory)", |b| {
        b.to_async(&rt).iter(|| async {
            let mut req = SessionRequest::new().with_broker(Broker::new("sports"));
            layer.handle(&mut req).await.unwrap();
            req.scoped()
                .unwrap()
                .set("visits", Some(serde_json::json!(1)));
            layer.commit(&mut req).await.unwrap()
        });
    });
}

criterion_group!(benches, bench_scoped_access, bench_request_cycle);
criterion_main!(benches);
