mod common;

use std::collections::HashSet;

use common::{bulk, bulk_array, exchange, ping_handshake, scan_page, spawn_script, Exchange, ScriptedServer};
use rkv_client::{ClientError, Connection, SCAN_START};

const WRONGTYPE: &[u8] = b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";

fn open(script: Vec<Exchange>) -> (ScriptedServer, Connection) {
    let mut steps = vec![ping_handshake()];
    steps.extend(script);
    let server = spawn_script(steps);
    let conn = Connection::connect(&server.url()).expect("connect");
    (server, conn)
}

#[test]
fn del_and_set_roundtrip() {
    let (server, mut conn) = open(vec![
        exchange(&["DEL", "key"], b":1\r\n"),
        exchange(&["SET", "key", "value"], b"+OK\r\n"),
        exchange(&["GET", "key"], &bulk("value")),
        exchange(&["GET", "missing"], b"$-1\r\n"),
    ]);

    assert_eq!(conn.del("key").expect("del"), 1);
    conn.set("key", "value").expect("set");
    assert_eq!(conn.get("key").expect("get"), Some("value".to_string()));
    assert_eq!(conn.get("missing").expect("get"), None);
    server.finish();
}

#[test]
fn set_rejects_non_ok_reply() {
    let (server, mut conn) = open(vec![exchange(&["SET", "key", "value"], b"$-1\r\n")]);

    assert!(matches!(
        conn.set("key", "value"),
        Err(ClientError::UnexpectedResponse)
    ));
    server.finish();
}

#[test]
fn pf_add_reports_register_changes() {
    let (server, mut conn) = open(vec![
        exchange(&["PFADD", "hll", "bar"], b":1\r\n"),
        exchange(&["PFADD", "hll", "bar"], b":0\r\n"),
    ]);

    assert_eq!(conn.pf_add("hll", &["bar"]).expect("first add"), 1);
    assert_eq!(conn.pf_add("hll", &["bar"]).expect("second add"), 0);
    server.finish();
}

#[test]
fn pf_add_against_wrong_type_is_an_error() {
    let (server, mut conn) = open(vec![exchange(&["PFADD", "str", "a", "b"], WRONGTYPE)]);

    let err = conn.pf_add("str", &["a", "b"]).expect_err("wrong type");
    assert!(err.is_wrong_type());
    server.finish();
}

#[test]
fn pf_count_passes_estimate_through() {
    let (server, mut conn) = open(vec![exchange(&["PFCOUNT", "hll"], b":20137\r\n")]);

    assert_eq!(conn.pf_count("hll").expect("count"), 20137);
    server.finish();
}

#[test]
fn pf_merge_returns_true_on_ok() {
    let (server, mut conn) = open(vec![
        exchange(&["PFMERGE", "hll1+2", "hll1", "hll2"], b"+OK\r\n"),
        exchange(&["PFCOUNT", "hll1+2"], b":7\r\n"),
    ]);

    assert!(conn.pf_merge("hll1+2", &["hll1", "hll2"]).expect("merge"));
    assert_eq!(conn.pf_count("hll1+2").expect("count"), 7);
    server.finish();
}

#[test]
fn list_trim_sends_signed_indices() {
    let (server, mut conn) = open(vec![
        exchange(&["LPUSH", "list", "4"], b":5\r\n"),
        exchange(&["LLEN", "list"], b":5\r\n"),
        exchange(&["LTRIM", "list", "1", "5"], b"+OK\r\n"),
        exchange(&["LPOP", "list"], &bulk("3")),
        exchange(&["LTRIM", "list", "-4", "-1"], b"+OK\r\n"),
        exchange(&["LLEN", "list"], b":3\r\n"),
    ]);

    assert_eq!(conn.lpush("list", "4").expect("lpush"), 5);
    assert_eq!(conn.llen("list").expect("llen"), 5);
    conn.ltrim("list", 1, 5).expect("trim head");
    assert_eq!(conn.lpop("list").expect("lpop"), Some("3".to_string()));
    conn.ltrim("list", -4, -1).expect("trim tail");
    assert_eq!(conn.llen("list").expect("llen"), 3);
    server.finish();
}

#[test]
fn list_commands_on_wrong_type_are_errors() {
    let (server, mut conn) = open(vec![
        exchange(&["LTRIM", "not-list", "0", "4"], WRONGTYPE),
        exchange(&["LLEN", "not-list"], WRONGTYPE),
        exchange(&["LRANGE", "not-list", "0", "-1"], WRONGTYPE),
    ]);

    assert!(conn.ltrim("not-list", 0, 4).expect_err("ltrim").is_wrong_type());
    assert!(conn.llen("not-list").expect_err("llen").is_wrong_type());
    assert!(conn.lrange("not-list", 0, -1).expect_err("lrange").is_wrong_type());
    server.finish();
}

#[test]
fn lrange_on_missing_key_is_empty() {
    let (server, mut conn) = open(vec![
        exchange(&["LRANGE", "list", "0", "-1"], b"*0\r\n"),
        exchange(&["LRANGE", "list", "-1", "-1"], &bulk_array(&["0"])),
    ]);

    assert!(conn.lrange("list", 0, -1).expect("empty range").is_empty());
    assert_eq!(conn.lrange("list", -1, -1).expect("tail"), vec!["0".to_string()]);
    server.finish();
}

#[test]
fn lpop_distinguishes_nil_from_empty_string() {
    let (server, mut conn) = open(vec![
        exchange(&["LPOP", "list"], b"$0\r\n\r\n"),
        exchange(&["LPOP", "list"], b"$-1\r\n"),
    ]);

    assert_eq!(conn.lpop("list").expect("empty element"), Some(String::new()));
    assert_eq!(conn.lpop("list").expect("no element"), None);
    server.finish();
}

#[test]
fn set_members_and_move() {
    let (server, mut conn) = open(vec![
        exchange(&["SADD", "a", "foobar"], b":1\r\n"),
        exchange(&["SMOVE", "a", "b", "foobar"], b":1\r\n"),
        exchange(&["SMEMBERS", "a"], b"*0\r\n"),
        exchange(&["SMEMBERS", "b"], &bulk_array(&["foobar"])),
        exchange(&["SMOVE", "a", "b", "foobar"], b":0\r\n"),
    ]);

    assert_eq!(conn.sadd("a", &["foobar"]).expect("sadd"), 1);
    assert!(conn.smove("a", "b", "foobar").expect("first move"));
    assert!(conn.smembers("a").expect("members a").is_empty());
    assert_eq!(conn.smembers("b").expect("members b"), vec!["foobar".to_string()]);
    assert!(!conn.smove("a", "b", "foobar").expect("second move"));
    server.finish();
}

#[test]
fn srem_and_scard_return_counts() {
    let (server, mut conn) = open(vec![
        exchange(&["SREM", "s", "x", "y"], b":1\r\n"),
        exchange(&["SCARD", "s"], b":4\r\n"),
    ]);

    assert_eq!(conn.srem("s", &["x", "y"]).expect("srem"), 1);
    assert_eq!(conn.scard("s").expect("scard"), 4);
    server.finish();
}

#[test]
fn sscan_follows_cursor_until_zero() {
    let (server, mut conn) = open(vec![
        exchange(&["SSCAN", "set", "0", "COUNT", "1"], &scan_page(4, &["a"])),
        exchange(&["SSCAN", "set", "4", "COUNT", "1"], &scan_page(2, &["b", "c"])),
        exchange(&["SSCAN", "set", "2", "COUNT", "1"], &scan_page(6, &[])),
        exchange(&["SSCAN", "set", "6", "COUNT", "1"], &scan_page(0, &["d", "e", "c"])),
    ]);

    let mut scanned = Vec::new();
    let (mut cursor, matches) = conn.sscan("set", SCAN_START, "", 1).expect("first page");
    scanned.extend(matches);
    while cursor != SCAN_START {
        let (next, matches) = conn.sscan("set", cursor, "", 1).expect("next page");
        cursor = next;
        scanned.extend(matches);
    }

    // Duplicates across pages are kept as received.
    assert_eq!(scanned.len(), 6);
    let unique: HashSet<_> = scanned.iter().map(String::as_str).collect();
    assert_eq!(unique, HashSet::from(["a", "b", "c", "d", "e"]));
    server.finish();
}

#[test]
fn sscan_sends_match_only_for_non_empty_pattern() {
    let (server, mut conn) = open(vec![
        exchange(&["SSCAN", "set", "0", "MATCH", "a*"], &scan_page(0, &["ab"])),
        exchange(&["SSCAN", "set", "0"], &scan_page(0, &["ab", "cd"])),
    ]);

    let (cursor, matches) = conn.sscan("set", 0, "a*", 0).expect("filtered");
    assert_eq!(cursor, 0);
    assert_eq!(matches, vec!["ab".to_string()]);

    let (_, matches) = conn.sscan("set", 0, "", 0).expect("unfiltered");
    assert_eq!(matches.len(), 2);
    server.finish();
}

#[test]
fn sscan_iter_drains_every_page() {
    let (server, mut conn) = open(vec![
        exchange(&["SSCAN", "set", "0", "COUNT", "2"], &scan_page(3, &["a", "b"])),
        exchange(&["SSCAN", "set", "3", "COUNT", "2"], &scan_page(0, &["c"])),
    ]);

    let members: Vec<String> = conn
        .sscan_iter("set", "", 2)
        .collect::<Result<_, _>>()
        .expect("scan");
    assert_eq!(members, vec!["a", "b", "c"]);
    server.finish();
}

#[test]
fn sscan_iter_stops_after_error() {
    let (server, mut conn) = open(vec![exchange(&["SSCAN", "str", "0"], WRONGTYPE)]);

    let mut iter = conn.sscan_iter("str", "", 0);
    assert!(iter.next().expect("error item").expect_err("wrong type").is_wrong_type());
    assert!(iter.next().is_none());
    server.finish();
}

#[test]
fn sscan_rejects_malformed_page() {
    let (server, mut conn) = open(vec![exchange(&["SSCAN", "set", "0"], &bulk_array(&["0"]))]);

    assert!(matches!(
        conn.sscan("set", 0, "", 0),
        Err(ClientError::UnexpectedResponse)
    ));
    server.finish();
}

#[test]
fn non_utf8_payload_is_reported() {
    let (server, mut conn) = open(vec![exchange(&["GET", "bin"], b"$2\r\n\xff\xfe\r\n")]);

    assert!(matches!(conn.get("bin"), Err(ClientError::InvalidUtf8)));
    server.finish();
}
