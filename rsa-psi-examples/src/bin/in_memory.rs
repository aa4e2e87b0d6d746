//! In-memory example of a blind-RSA intersection run.
//!
//! Both parties run inside one process connected by the in-memory
//! channel. Two sessions run back to back against the same cache store:
//! the first misses and stores the host's signed set, the second hits and
//! skips the transfer entirely.
//!
//! Run with:
//! ```bash
//! cargo run --bin in_memory
//! ```

use num_bigint::BigUint;
use num_integer::Integer;
use rsa_psi_protocol::{
    duplex, CacheConfig, GuestConfig, HostCacheConfig, HostConfig, HostMode, IntersectMode,
    IntersectionGuest, IntersectionHost, IntersectionResult, MemoryCacheStore, RsaPrivateKey,
};
use std::thread;
use tracing_subscriber::EnvFilter;

/// Demo keypair from two fixed primes. Real deployments bring their own
/// key material; this one is only big enough to watch the protocol work.
fn demo_key() -> RsaPrivateKey {
    let p = BigUint::from(1_000_000_007u64);
    let q = BigUint::from(998_244_353u64);
    let e = BigUint::from(65_537u32);
    let n = &p * &q;
    let lambda = (&p - 1u32).lcm(&(&q - 1u32));
    let d = e.modinv(&lambda).expect("exponent is coprime to lambda(n)");
    RsaPrivateKey { e, d, n }
}

fn guest_config() -> GuestConfig {
    GuestConfig {
        guest_party_id: 9_999,
        host_party_id: 10_000,
        synchronize_intersect_ids: true,
        only_output_key: false,
        mode: IntersectMode::RsaBlind {
            random_bit_length: 128,
            cache: Some(CacheConfig {
                id_type: "phone".to_string(),
                encrypt_type: "rsa".to_string(),
            }),
        },
    }
}

fn host_config() -> HostConfig {
    HostConfig {
        guest_party_id: 9_999,
        host_party_id: 10_000,
        mode: HostMode::RsaBlind {
            synchronize_intersect_ids: true,
            cache: Some(HostCacheConfig {
                id_type: "phone".to_string(),
                encrypt_type: "rsa".to_string(),
                version: "20260815".to_string(),
            }),
        },
    }
}

fn run_session(
    key: RsaPrivateKey,
    store: &mut MemoryCacheStore,
    guest_records: &[(String, String)],
    host_ids: &[String],
) -> Result<(IntersectionResult<String>, Option<Vec<String>>), Box<dyn std::error::Error>> {
    let (guest_channel, host_channel) = duplex();

    let host_ids = host_ids.to_vec();
    let host = thread::spawn(move || {
        IntersectionHost::new(host_config(), key, host_channel).run(&host_ids)
    });

    let guest = IntersectionGuest::new(guest_config(), guest_channel, store);
    let result = guest.run(guest_records)?;
    let host_outcome = host.join().map_err(|_| "host thread panicked")??;

    Ok((result, host_outcome))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Blind-RSA Intersection In-Memory Example ===\n");

    let guest_records: Vec<(String, String)> = vec![
        ("13800000001".to_string(), "plan-basic".to_string()),
        ("13800000002".to_string(), "plan-family".to_string()),
        ("13800000003".to_string(), "plan-basic".to_string()),
        ("13800000004".to_string(), "plan-pro".to_string()),
    ];
    let host_ids: Vec<String> = vec![
        "13800000002".to_string(),
        "13800000004".to_string(),
        "13800000005".to_string(),
    ];

    println!("Guest records ({}):", guest_records.len());
    for (sid, value) in &guest_records {
        println!("  {sid} -> {value}");
    }
    println!("\nHost identifiers ({}):", host_ids.len());
    for sid in &host_ids {
        println!("  {sid}");
    }

    let key = demo_key();
    let mut store = MemoryCacheStore::new();

    println!("\n--- Session 1: cold cache ---");
    let (first, host_outcome) = run_session(key.clone(), &mut store, &guest_records, &host_ids)?;
    println!("Guest matched {} identifiers", first.len());
    println!(
        "Host learned the intersection via synchronization: {:?}",
        host_outcome
    );
    println!("Cache entries recorded: {}", store.entry_count());

    println!("\n--- Session 2: warm cache, same host version ---");
    let (second, _) = run_session(key, &mut store, &guest_records, &host_ids)?;
    println!("Guest matched {} identifiers", second.len());

    println!("\n=== Results ===");
    let mut matched = first.ids.clone();
    matched.sort();
    println!("Intersection: {:?}", matched);
    if let Some(values) = &first.values {
        println!("Matched payloads:");
        let mut rows: Vec<_> = values.iter().collect();
        rows.sort();
        for (sid, value) in rows {
            println!("  {sid} -> {value}");
        }
    }

    let first_set: std::collections::HashSet<_> = first.ids.iter().collect();
    let second_set: std::collections::HashSet<_> = second.ids.iter().collect();
    assert_eq!(first_set, second_set, "Sessions disagree on the intersection!");

    println!("\n✓ Both sessions computed the same intersection");
    println!("✓ Session 2 reused the stored host signed set instead of receiving it again");

    Ok(())
}
