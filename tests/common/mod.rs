//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::net::TcpListener;

use mirror_router::catalog::{MirrorCatalog, NewMirror};
use mirror_router::geo::TableResolver;
use mirror_router::{AppContext, HttpServer, RouterConfig, Shutdown};

pub fn at_hour(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(hour, 15, 0)
        .unwrap()
}

/// A valid mirror with https and http endpoints named after it.
pub fn new_mirror(name: &str, subnets: &[&str], asn: Option<&str>, lat: f64, lon: f64) -> NewMirror {
    NewMirror {
        name: name.to_string(),
        continent: "Europe".to_string(),
        country: "Germany".to_string(),
        ip: "192.0.2.1".to_string(),
        latitude: lat,
        longitude: lon,
        is_expired: false,
        update_frequency: at_hour(4),
        sponsor_name: format!("{name} sponsor"),
        sponsor_url: format!("https://{name}.example.org"),
        email: None,
        asn: asn.map(String::from),
        subnets: subnets.iter().map(|s| s.to_string()).collect(),
        urls: vec![
            ("https".to_string(), format!("https://{name}.example.org/pub")),
            ("http".to_string(), format!("http://{name}.example.org/pub")),
        ],
    }
}

/// A: subnet 10.0.0.0/8, ASN 1, (0, 0)
/// B: ASN 2, (10, 10)
/// C: ASN 1, (50, 50)
pub fn scenario_mirrors() -> Vec<NewMirror> {
    vec![
        new_mirror("a", &["10.0.0.0/8"], Some("1"), 0.0, 0.0),
        new_mirror("b", &[], Some("2"), 10.0, 10.0),
        new_mirror("c", &[], Some("1"), 50.0, 50.0),
    ]
}

pub async fn catalog_with(mirrors: &[NewMirror]) -> MirrorCatalog {
    let catalog = MirrorCatalog::in_memory().await.unwrap();
    for mirror in mirrors {
        catalog.insert_mirror(mirror).await.unwrap();
    }
    catalog
}

/// Client 10.1.2.3 resolves to ASN 1 at (5, 5). Nothing else resolves.
pub fn scenario_resolver() -> TableResolver {
    TableResolver::new()
        .with_geo("10.1.2.3/32".parse().unwrap(), 5.0, 5.0)
        .with_asn("10.1.2.3/32".parse().unwrap(), 1)
}

pub fn context_with(catalog: MirrorCatalog, resolver: TableResolver) -> AppContext {
    let resolver = Arc::new(resolver);
    AppContext::from_parts(RouterConfig::default(), catalog, resolver.clone(), resolver)
}

pub async fn scenario_context() -> AppContext {
    context_with(catalog_with(&scenario_mirrors()).await, scenario_resolver())
}

/// Serve `context` on an ephemeral port until `shutdown` fires.
pub async fn start_server(context: AppContext, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        HttpServer::new(context).run(listener, &shutdown).await.unwrap();
    });
    addr
}
