use criterion::{criterion_group, criterion_main, Criterion};

use bustrack_core::broadcast_hub::Topic;
use bustrack_core::config::TrackingConfig;
use bustrack_core::location_fix::NewFix;
use bustrack_core::vehicle_registry::StaticVehicleRegistry;
use bustrack_core::Tracker;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

const NUM_OF_VEHICLES: i64 = 50;

fn tracker() -> Tracker {
    let config = TrackingConfig {
        subscriber_buffer: 1024,
        ..TrackingConfig::default()
    };
    let registry = StaticVehicleRegistry::with_vehicles(1..=NUM_OF_VEHICLES);
    Tracker::open(config, Arc::new(registry)).unwrap()
}

fn fix(vehicle_id: i64, i: i64) -> NewFix {
    NewFix {
        vehicle_id,
        latitude: 12.97 + (i % 1000) as f64 * 1e-5,
        longitude: 77.59,
        speed: Some(30.0),
        heading: Some(180.0),
        accuracy: Some(5.0),
        timestamp: Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
    }
}

fn ingest(c: &mut Criterion) {
    c.bench_function("ingest_single_vehicle", |b| {
        let tracker = tracker();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            std::hint::black_box(tracker.ingest_fix(fix(1, i)).unwrap());
        });
    });

    c.bench_function("ingest_many_vehicles_with_subscribers", |b| {
        let tracker = tracker();
        let subscriptions = (0..10)
            .map(|_| {
                let sub = tracker.hub().connect();
                tracker.hub().join(sub.session_id(), Topic::Tracking);
                sub
            })
            .collect::<Vec<_>>();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            std::hint::black_box(
                tracker
                    .ingest_fix(fix(i % NUM_OF_VEHICLES + 1, i))
                    .unwrap(),
            );
            for sub in &subscriptions {
                while sub.try_recv().is_some() {}
            }
        });
    });
}

fn latest_locations(c: &mut Criterion) {
    c.bench_function("latest_of_each", |b| {
        let tracker = tracker();
        for i in 0..10_000 {
            tracker.ingest_fix(fix(i % NUM_OF_VEHICLES + 1, i)).unwrap();
        }
        b.iter(|| std::hint::black_box(tracker.store().latest_of_each()));
    });
}

criterion_group!(benches, ingest, latest_locations);
criterion_main!(benches);
