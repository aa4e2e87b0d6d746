//! TCP example: a guest client against a host server.
//!
//! Messages travel as newline-delimited JSON, one message per line. Big
//! integers are rendered in decimal and signed keys in hex, so the wire
//! stays readable with a packet capture or `nc`.
//!
//! Run the host:
//! ```bash
//! cargo run --bin tcp_sync -- server
//! ```
//!
//! Run the guest (in another terminal):
//! ```bash
//! cargo run --bin tcp_sync -- client
//! ```

use num_bigint::BigUint;
use num_integer::Integer;
use rsa_psi_protocol::{
    BlindedIds, CacheVersionInfo, CacheVersionMatch, Channel, GuestConfig, GuestMessage,
    HostConfig, HostMessage, HostMode, HostSignedSet, IntersectMode, IntersectionGuest,
    IntersectionHost, IntersectionIds, MemoryCacheStore, ProcessedIds, PsiError, RawIds,
    RawIntersection, RsaPrivateKey, RsaPublicKey, SignedKey,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

const ADDRESS: &str = "127.0.0.1:7878";

/// Message bodies as they appear on the wire.
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    pub enum Guest {
        BlindedIds {
            values: Vec<String>,
        },
        CacheVersionInfo {
            table_name: Option<String>,
            namespace: Option<String>,
            id_type: String,
            encrypt_type: String,
            tag: String,
        },
        IntersectionIds {
            keys: Vec<String>,
        },
        RawIds {
            ids: Vec<String>,
        },
        RawIntersection {
            ids: Vec<String>,
        },
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub enum Host {
        PublicKey {
            e: String,
            n: String,
        },
        CacheVersionMatch {
            version_match: bool,
            version: Option<String>,
        },
        HostSignedSet {
            keys: Vec<String>,
        },
        ProcessedIds {
            pairs: Vec<(String, String)>,
        },
        RawIds {
            ids: Vec<String>,
        },
        RawIntersection {
            ids: Vec<String>,
        },
    }
}

fn int_to_wire(value: &BigUint) -> String {
    value.to_str_radix(10)
}

fn int_from_wire(value: &str) -> Result<BigUint, PsiError> {
    value
        .parse()
        .map_err(|err| PsiError::Protocol(format!("malformed integer on the wire: {err}")))
}

fn key_to_wire(key: &SignedKey) -> String {
    hex::encode(key)
}

fn key_from_wire(key: &str) -> Result<SignedKey, PsiError> {
    let bytes = hex::decode(key)
        .map_err(|err| PsiError::Protocol(format!("malformed signed key on the wire: {err}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| PsiError::Protocol("signed key with wrong width on the wire".to_string()))
}

fn guest_to_wire(message: GuestMessage) -> wire::Guest {
    match message {
        GuestMessage::BlindedIds(m) => wire::Guest::BlindedIds {
            values: m.values.iter().map(int_to_wire).collect(),
        },
        GuestMessage::CacheVersionInfo(m) => wire::Guest::CacheVersionInfo {
            table_name: m.table_name,
            namespace: m.namespace,
            id_type: m.id_type,
            encrypt_type: m.encrypt_type,
            tag: m.tag,
        },
        GuestMessage::IntersectionIds(m) => wire::Guest::IntersectionIds {
            keys: m.keys.iter().map(key_to_wire).collect(),
        },
        GuestMessage::RawIds(m) => wire::Guest::RawIds { ids: m.ids },
        GuestMessage::RawIntersection(m) => wire::Guest::RawIntersection { ids: m.ids },
    }
}

fn guest_from_wire(message: wire::Guest) -> Result<GuestMessage, PsiError> {
    Ok(match message {
        wire::Guest::BlindedIds { values } => {
            let values = values
                .iter()
                .map(|value| int_from_wire(value))
                .collect::<Result<_, _>>()?;
            GuestMessage::BlindedIds(BlindedIds::new(values))
        }
        wire::Guest::CacheVersionInfo {
            table_name,
            namespace,
            id_type,
            encrypt_type,
            tag,
        } => GuestMessage::CacheVersionInfo(CacheVersionInfo {
            table_name,
            namespace,
            id_type,
            encrypt_type,
            tag,
        }),
        wire::Guest::IntersectionIds { keys } => {
            let keys = keys
                .iter()
                .map(|key| key_from_wire(key))
                .collect::<Result<_, _>>()?;
            GuestMessage::IntersectionIds(IntersectionIds::new(keys))
        }
        wire::Guest::RawIds { ids } => GuestMessage::RawIds(RawIds::new(ids)),
        wire::Guest::RawIntersection { ids } => {
            GuestMessage::RawIntersection(RawIntersection::new(ids))
        }
    })
}

fn host_to_wire(message: HostMessage) -> wire::Host {
    match message {
        HostMessage::PublicKey(m) => wire::Host::PublicKey {
            e: int_to_wire(&m.e),
            n: int_to_wire(&m.n),
        },
        HostMessage::CacheVersionMatch(m) => wire::Host::CacheVersionMatch {
            version_match: m.version_match,
            version: m.version,
        },
        HostMessage::HostSignedSet(m) => wire::Host::HostSignedSet {
            keys: m.keys.iter().map(key_to_wire).collect(),
        },
        HostMessage::ProcessedIds(m) => wire::Host::ProcessedIds {
            pairs: m
                .pairs
                .iter()
                .map(|(blinded, signed)| (int_to_wire(blinded), int_to_wire(signed)))
                .collect(),
        },
        HostMessage::RawIds(m) => wire::Host::RawIds { ids: m.ids },
        HostMessage::RawIntersection(m) => wire::Host::RawIntersection { ids: m.ids },
    }
}

fn host_from_wire(message: wire::Host) -> Result<HostMessage, PsiError> {
    Ok(match message {
        wire::Host::PublicKey { e, n } => HostMessage::PublicKey(RsaPublicKey {
            e: int_from_wire(&e)?,
            n: int_from_wire(&n)?,
        }),
        wire::Host::CacheVersionMatch {
            version_match,
            version,
        } => HostMessage::CacheVersionMatch(CacheVersionMatch {
            version_match,
            version,
        }),
        wire::Host::HostSignedSet { keys } => {
            let keys = keys
                .iter()
                .map(|key| key_from_wire(key))
                .collect::<Result<_, _>>()?;
            HostMessage::HostSignedSet(HostSignedSet::new(keys))
        }
        wire::Host::ProcessedIds { pairs } => {
            let pairs = pairs
                .iter()
                .map(|(blinded, signed)| Ok((int_from_wire(blinded)?, int_from_wire(signed)?)))
                .collect::<Result<_, PsiError>>()?;
            HostMessage::ProcessedIds(ProcessedIds::new(pairs))
        }
        wire::Host::RawIds { ids } => HostMessage::RawIds(RawIds::new(ids)),
        wire::Host::RawIntersection { ids } => {
            HostMessage::RawIntersection(RawIntersection::new(ids))
        }
    })
}

/// One blocking JSON message per line over a TCP stream.
struct JsonLinesChannel {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl JsonLinesChannel {
    fn new(stream: TcpStream) -> std::io::Result<Self> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
        })
    }

    fn send_json<T: Serialize>(&mut self, message: &T) -> Result<(), PsiError> {
        let mut line = serde_json::to_string(message)
            .map_err(|err| PsiError::Channel(format!("encoding failed: {err}")))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|err| PsiError::Channel(format!("send failed: {err}")))
    }

    fn recv_json<T: DeserializeOwned>(&mut self) -> Result<T, PsiError> {
        let mut line = String::new();
        let bytes = self
            .reader
            .read_line(&mut line)
            .map_err(|err| PsiError::Channel(format!("receive failed: {err}")))?;
        if bytes == 0 {
            return Err(PsiError::Channel("connection closed by peer".to_string()));
        }
        serde_json::from_str(line.trim_end())
            .map_err(|err| PsiError::Protocol(format!("malformed message on the wire: {err}")))
    }
}

impl Channel<GuestMessage, HostMessage> for JsonLinesChannel {
    fn send(&mut self, message: GuestMessage) -> Result<(), PsiError> {
        self.send_json(&guest_to_wire(message))
    }

    fn recv(&mut self) -> Result<HostMessage, PsiError> {
        host_from_wire(self.recv_json()?)
    }
}

impl Channel<HostMessage, GuestMessage> for JsonLinesChannel {
    fn send(&mut self, message: HostMessage) -> Result<(), PsiError> {
        self.send_json(&host_to_wire(message))
    }

    fn recv(&mut self) -> Result<GuestMessage, PsiError> {
        guest_from_wire(self.recv_json()?)
    }
}

/// Host keypair from two Mersenne primes, giving an 1128-bit modulus
/// without shipping key-generation code. Real deployments bring their own
/// key material.
fn server_key() -> RsaPrivateKey {
    let p = (BigUint::from(1u32) << 521) - 1u32;
    let q = (BigUint::from(1u32) << 607) - 1u32;
    let e = BigUint::from(65_537u32);
    let n = &p * &q;
    let lambda = (&p - 1u32).lcm(&(&q - 1u32));
    let d = e.modinv(&lambda).expect("exponent is coprime to lambda(n)");
    RsaPrivateKey { e, d, n }
}

/// Run the host (server).
fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Intersection Host (server) ===");
    println!("Listening on {ADDRESS}");

    let listener = TcpListener::bind(ADDRESS)?;
    println!("Waiting for a guest connection...");
    let (stream, addr) = listener.accept()?;
    println!("Connected to {addr}");

    let host_ids: Vec<String> = vec![
        "acct-2001".to_string(),
        "acct-2002".to_string(),
        "acct-4001".to_string(),
        "acct-4002".to_string(),
    ];
    println!("\nHost identifiers ({}):", host_ids.len());
    for sid in &host_ids {
        println!("  {sid}");
    }

    let config = HostConfig {
        guest_party_id: 9_999,
        host_party_id: 10_000,
        mode: HostMode::RsaBlind {
            synchronize_intersect_ids: true,
            cache: None,
        },
    };
    println!("\nServing one blind-RSA session...");
    let channel = JsonLinesChannel::new(stream)?;
    let outcome = IntersectionHost::new(config, server_key(), channel).run(&host_ids)?;

    println!("\n=== Results ===");
    match outcome {
        Some(mut matched) => {
            matched.sort();
            println!("Synchronized intersection: {matched:?}");
        }
        None => println!("Session completed; the guest kept the intersection private"),
    }

    println!("\n✓ Host session completed!");
    Ok(())
}

/// Run the guest (client).
fn run_client() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Intersection Guest (client) ===");
    println!("Connecting to {ADDRESS}");

    let stream = TcpStream::connect(ADDRESS)?;
    println!("Connected to host");

    let records: Vec<(String, String)> = vec![
        ("acct-1001".to_string(), "tier-silver".to_string()),
        ("acct-1002".to_string(), "tier-gold".to_string()),
        ("acct-2001".to_string(), "tier-silver".to_string()),
        ("acct-2002".to_string(), "tier-gold".to_string()),
        ("acct-3001".to_string(), "tier-silver".to_string()),
    ];
    println!("\nGuest records ({}):", records.len());
    for (sid, value) in &records {
        println!("  {sid} -> {value}");
    }

    let config = GuestConfig {
        guest_party_id: 9_999,
        host_party_id: 10_000,
        synchronize_intersect_ids: true,
        only_output_key: false,
        mode: IntersectMode::RsaBlind {
            random_bit_length: 128,
            cache: None,
        },
    };
    println!("\nRunning one blind-RSA session...");
    let channel = JsonLinesChannel::new(stream)?;
    let guest = IntersectionGuest::new(config, channel, MemoryCacheStore::new());
    let result = guest.run(&records)?;

    println!("\n=== Results ===");
    let mut matched = result.ids.clone();
    matched.sort();
    println!("Intersection ({}): {matched:?}", result.len());
    if let Some(values) = &result.values {
        println!("Matched payloads:");
        let mut rows: Vec<_> = values.iter().collect();
        rows.sort();
        for (sid, value) in rows {
            println!("  {sid} -> {value}");
        }
    }

    println!("\n✓ Guest session completed!");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <server|client>", args[0]);
        eprintln!("\nRun the host first: {} server", args[0]);
        eprintln!("Then the guest: {} client", args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "server" => run_server(),
        "client" => run_client(),
        _ => {
            eprintln!("Unknown mode: {}", args[1]);
            eprintln!("Usage: {} <server|client>", args[0]);
            std::process::exit(1);
        }
    }
}
