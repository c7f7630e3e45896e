use std::time::Duration;

use comms::{Endpoint, MuxKind};
use workforce::{WorkforceConfig, connect};

#[tokio::test]
async fn socket_strategy_comes_from_the_worker_list() {
    let text = r#"{
        "timeout_ms": 3000,
        "tick_ms": 200,
        "socket_mux": "simple",
        "workers": [
            { "host": "127.0.0.1", "port": 9400 },
            { "host": "::1", "port": 9401 }
        ]
    }"#;
    let config = WorkforceConfig::from_json(text).unwrap();

    let conn = connect(&config).unwrap();

    assert_eq!(conn.mux, MuxKind::Simple);
    assert_ne!(conn.reply_port, 0);
    assert!(conn.local.is_none());

    // Only the IPv4 worker is reachable from the shared socket.
    assert_eq!(conn.roster.len(), 1);
    assert_eq!(
        conn.roster[0].endpoint,
        Endpoint::Net("127.0.0.1:9400".parse().unwrap())
    );
    assert_eq!(conn.roster[0].timeout, Duration::from_secs(3));
    assert!(conn.mux.build(config.tick_interval).is_some());
}

#[tokio::test]
async fn default_socket_strategy_polls() {
    let config = WorkforceConfig::from_host_list("127.0.0.1\n");

    let conn = connect(&config).unwrap();

    assert_eq!(conn.mux, MuxKind::Poll);
    assert_eq!(conn.roster[0].name, "127.0.0.1:9359");
}
