#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use kvwire::codec::FrameCodec;
use kvwire::{Config, Frame};

/// Binds a listener on a random local port and a client config pointing at it.
pub async fn bind() -> (TcpListener, Config) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config::new(addr.ip().to_string(), addr.port())
        .with_transaction_timeout(Duration::from_millis(300));
    (listener, config)
}

/// Reads from `socket` until `n` complete commands have been decoded.
pub async fn read_commands(socket: &mut TcpStream, buffer: &mut BytesMut, n: usize) -> Vec<Vec<String>> {
    let mut codec = FrameCodec::default();
    let mut commands = Vec::new();
    loop {
        for frame in codec.decode_all(buffer).unwrap() {
            commands.push(args(frame));
        }
        if commands.len() >= n {
            return commands;
        }
        let read = socket.read_buf(buffer).await.unwrap();
        assert!(read > 0, "client closed the socket early");
    }
}

pub async fn write_frames(socket: &mut TcpStream, frames: &[Frame]) {
    let bytes: Vec<u8> = frames.iter().flat_map(|frame| frame.serialize()).collect();
    socket.write_all(&bytes).await.unwrap();
}

fn args(frame: Frame) -> Vec<String> {
    match frame {
        Frame::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Frame::Bulk(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
                other => panic!("expected bulk string argument, got {:?}", other),
            })
            .collect(),
        other => panic!("expected array command, got {:?}", other),
    }
}

#[derive(Clone, Debug)]
enum Stored {
    Str(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    List(Vec<String>),
    ZSet(Vec<(String, f64)>),
    Json(String),
    Vector(Vec<f64>),
    Doc(String),
}

impl Stored {
    fn type_name(&self) -> &'static str {
        match self {
            Stored::Str(_) => "string",
            Stored::Hash(_) => "hash",
            Stored::Set(_) => "set",
            Stored::List(_) => "list",
            Stored::ZSet(_) => "zset",
            Stored::Json(_) => "ReJSON-RL",
            Stored::Vector(_) => "vector",
            Stored::Doc(_) => "doc",
        }
    }
}

type Db = Arc<Mutex<HashMap<String, Stored>>>;
type Log = Arc<Mutex<Vec<Vec<String>>>>;

/// An in-memory server understanding the subset of commands the client issues in tests.
pub struct StoreServer {
    pub config: Config,
    db: Db,
    log: Log,
}

impl StoreServer {
    pub async fn start() -> StoreServer {
        let (listener, config) = bind().await;
        let db: Db = Arc::default();
        let log: Log = Arc::default();

        tokio::spawn({
            let db = db.clone();
            let log = log.clone();
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    tokio::spawn(serve(socket, db.clone(), log.clone()));
                }
            }
        });

        StoreServer { config, db, log }
    }

    /// Every command received with the given verb, in arrival order.
    pub fn received(&self, verb: &str) -> Vec<Vec<String>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|command| command[0].eq_ignore_ascii_case(verb))
            .cloned()
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.db.lock().unwrap().contains_key(key)
    }

    /// Removes a key behind the client's back, like an expiry or another writer would.
    pub fn evict(&self, key: &str) {
        self.db.lock().unwrap().remove(key);
    }
}

async fn serve(mut socket: TcpStream, db: Db, log: Log) {
    let mut codec = FrameCodec::default();
    let mut buffer = BytesMut::new();
    let mut queued: Option<Vec<Vec<String>>> = None;

    loop {
        match socket.read_buf(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let mut out = Vec::new();
        for frame in codec.decode_all(&mut buffer).unwrap() {
            let command = args(frame);
            log.lock().unwrap().push(command.clone());
            let verb = command[0].to_uppercase();
            let reply = if verb == "MULTI" {
                queued = Some(Vec::new());
                ok()
            } else if verb == "EXEC" {
                match queued.take() {
                    Some(commands) => {
                        let mut db = db.lock().unwrap();
                        Frame::Array(commands.iter().map(|c| execute(&mut db, c)).collect())
                    }
                    None => Frame::Error("ERR EXEC without MULTI".to_string()),
                }
            } else if let Some(commands) = queued.as_mut() {
                commands.push(command);
                Frame::Simple("QUEUED".to_string())
            } else {
                execute(&mut db.lock().unwrap(), &command)
            };
            out.extend(reply.serialize());
        }

        if socket.write_all(&out).await.is_err() {
            return;
        }
    }
}

fn bulk(s: impl Into<String>) -> Frame {
    Frame::Bulk(Bytes::from(s.into()))
}

fn ok() -> Frame {
    Frame::Simple("OK".to_string())
}

fn wrong_type() -> Frame {
    Frame::Error("WRONGTYPE Operation against a key holding the wrong kind of value".to_string())
}

/// Inclusive `start..=stop` range with negative indices counted from the end, as LRANGE and
/// ZRANGE take it.
fn span(len: usize, start: i64, stop: i64) -> std::ops::Range<usize> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop {
        return 0..0;
    }
    start as usize..stop as usize + 1
}

fn number(arg: &str) -> i64 {
    arg.parse().unwrap()
}

fn strings_reply<'a>(items: impl IntoIterator<Item = &'a String>) -> Frame {
    Frame::Array(items.into_iter().map(|item| bulk(item.clone())).collect())
}

/// Top level field named by a document path such as `$.tags`, `.tags` or `tags`.
fn field(path: &str) -> &str {
    path.trim_start_matches('$').trim_start_matches('.')
}

fn json_or_string(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn vectors(db: &HashMap<String, Stored>, key: &str) -> Option<Vec<f64>> {
    match db.get(key) {
        Some(Stored::Vector(v)) => Some(v.clone()),
        _ => None,
    }
}

fn documents(db: &HashMap<String, Stored>) -> Vec<serde_json::Value> {
    let mut keys: Vec<&String> = db.keys().collect();
    keys.sort();
    keys.into_iter()
        .filter_map(|key| match &db[key] {
            Stored::Doc(text) => serde_json::from_str(text).ok(),
            _ => None,
        })
        .collect()
}

fn add_to_string(db: &mut HashMap<String, Stored>, key: &str, delta: i64) -> Frame {
    let entry = db
        .entry(key.to_string())
        .or_insert_with(|| Stored::Str("0".to_string()));
    match entry {
        Stored::Str(s) => match s.parse::<i64>() {
            Ok(n) => {
                *s = (n + delta).to_string();
                Frame::Integer(n + delta)
            }
            Err(_) => Frame::Error("ERR value is not an integer or out of range".to_string()),
        },
        _ => wrong_type(),
    }
}

fn set_operation(db: &HashMap<String, Stored>, verb: &str, keys: &[String]) -> Frame {
    let mut sets = Vec::new();
    for key in keys {
        match db.get(key) {
            Some(Stored::Set(set)) => sets.push(set.clone()),
            Some(_) => return wrong_type(),
            None => sets.push(BTreeSet::new()),
        }
    }
    let mut sets = sets.into_iter();
    let first = sets.next().unwrap_or_default();
    let result = sets.fold(first, |acc, set| match verb {
        "SINTER" => acc.intersection(&set).cloned().collect(),
        "SUNION" => acc.union(&set).cloned().collect(),
        _ => acc.difference(&set).cloned().collect(),
    });
    strings_reply(&result)
}

fn execute(db: &mut HashMap<String, Stored>, command: &[String]) -> Frame {
    let verb = command[0].to_uppercase();
    let args = &command[1..];

    match verb.as_str() {
        "PING" => Frame::Simple("PONG".to_string()),
        "SET" => {
            db.insert(args[0].clone(), Stored::Str(args[1].clone()));
            ok()
        }
        "GET" => match db.get(&args[0]) {
            Some(Stored::Str(s)) => bulk(s.clone()),
            Some(_) => wrong_type(),
            None => Frame::Null,
        },
        "APPEND" => {
            let entry = db
                .entry(args[0].clone())
                .or_insert_with(|| Stored::Str(String::new()));
            match entry {
                Stored::Str(s) => {
                    s.push_str(&args[1]);
                    Frame::Integer(s.len() as i64)
                }
                _ => wrong_type(),
            }
        }
        "INCR" => add_to_string(db, &args[0], 1),
        "DECR" => add_to_string(db, &args[0], -1),
        "INCRBY" => add_to_string(db, &args[0], number(&args[1])),
        "DECRBY" => add_to_string(db, &args[0], -number(&args[1])),
        "SETRANGE" => {
            let offset = number(&args[1]) as usize;
            let entry = db
                .entry(args[0].clone())
                .or_insert_with(|| Stored::Str(String::new()));
            match entry {
                Stored::Str(s) => {
                    let mut bytes = s.clone().into_bytes();
                    let end = offset + args[2].len();
                    if bytes.len() < end {
                        bytes.resize(end, 0);
                    }
                    bytes[offset..end].copy_from_slice(args[2].as_bytes());
                    *s = String::from_utf8(bytes).unwrap();
                    Frame::Integer(s.len() as i64)
                }
                _ => wrong_type(),
            }
        }
        "GETRANGE" => match db.get(&args[0]) {
            Some(Stored::Str(s)) => {
                let range = span(s.len(), number(&args[1]), number(&args[2]));
                bulk(&s[range])
            }
            Some(_) => wrong_type(),
            None => bulk(""),
        },
        "STRLEN" => match db.get(&args[0]) {
            Some(Stored::Str(s)) => Frame::Integer(s.len() as i64),
            Some(_) => wrong_type(),
            None => Frame::Integer(0),
        },
        "DEL" | "VDEL" => {
            Frame::Integer(args.iter().filter(|k| db.remove(*k).is_some()).count() as i64)
        }
        "EXISTS" => Frame::Integer(args.iter().filter(|k| db.contains_key(*k)).count() as i64),
        "TYPE" => Frame::Simple(
            db.get(&args[0])
                .map(Stored::type_name)
                .unwrap_or("none")
                .to_string(),
        ),
        "TTL" => Frame::Integer(if db.contains_key(&args[0]) { -1 } else { -2 }),
        "SADD" => {
            let entry = db
                .entry(args[0].clone())
                .or_insert_with(|| Stored::Set(BTreeSet::new()));
            match entry {
                Stored::Set(set) => {
                    let added = args[1..].iter().filter(|m| set.insert((*m).clone())).count();
                    Frame::Integer(added as i64)
                }
                _ => wrong_type(),
            }
        }
        "SREM" => match db.get_mut(&args[0]) {
            Some(Stored::Set(set)) => {
                let removed = args[1..].iter().filter(|m| set.remove(*m)).count();
                if set.is_empty() {
                    db.remove(&args[0]);
                }
                Frame::Integer(removed as i64)
            }
            Some(_) => wrong_type(),
            None => Frame::Integer(0),
        },
        "SMEMBERS" => match db.get(&args[0]) {
            Some(Stored::Set(set)) => strings_reply(set),
            Some(_) => wrong_type(),
            None => Frame::Array(vec![]),
        },
        "SINTER" | "SUNION" | "SDIFF" => set_operation(db, &verb, args),
        "HSET" => {
            let entry = db
                .entry(args[0].clone())
                .or_insert_with(|| Stored::Hash(BTreeMap::new()));
            match entry {
                Stored::Hash(hash) => {
                    let created = args[1..]
                        .chunks(2)
                        .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                        .count();
                    Frame::Integer(created as i64)
                }
                _ => wrong_type(),
            }
        }
        "HGET" => match db.get(&args[0]) {
            Some(Stored::Hash(hash)) => hash.get(&args[1]).map(|v| bulk(v.clone())).unwrap_or(Frame::Null),
            Some(_) => wrong_type(),
            None => Frame::Null,
        },
        "HGETALL" => match db.get(&args[0]) {
            Some(Stored::Hash(hash)) => Frame::Array(
                hash.iter()
                    .flat_map(|(f, v)| [bulk(f.clone()), bulk(v.clone())])
                    .collect(),
            ),
            Some(_) => wrong_type(),
            None => Frame::Array(vec![]),
        },
        "RPUSH" | "LPUSH" => {
            let entry = db
                .entry(args[0].clone())
                .or_insert_with(|| Stored::List(Vec::new()));
            match entry {
                Stored::List(list) => {
                    for item in &args[1..] {
                        if verb == "RPUSH" {
                            list.push(item.clone());
                        } else {
                            list.insert(0, item.clone());
                        }
                    }
                    Frame::Integer(list.len() as i64)
                }
                _ => wrong_type(),
            }
        }
        "LRANGE" => match db.get(&args[0]) {
            Some(Stored::List(list)) => {
                strings_reply(&list[span(list.len(), number(&args[1]), number(&args[2]))])
            }
            Some(_) => wrong_type(),
            None => Frame::Array(vec![]),
        },
        "ZADD" => {
            let entry = db
                .entry(args[0].clone())
                .or_insert_with(|| Stored::ZSet(Vec::new()));
            match entry {
                Stored::ZSet(zset) => {
                    let mut added = 0;
                    for pair in args[1..].chunks(2) {
                        let score: f64 = pair[0].parse().unwrap();
                        match zset.iter_mut().find(|(m, _)| *m == pair[1]) {
                            Some(existing) => existing.1 = score,
                            None => {
                                zset.push((pair[1].clone(), score));
                                added += 1;
                            }
                        }
                    }
                    zset.sort_by(|a, b| a.1.total_cmp(&b.1));
                    Frame::Integer(added)
                }
                _ => wrong_type(),
            }
        }
        "ZRANGE" => match db.get(&args[0]) {
            Some(Stored::ZSet(zset)) => {
                let with_scores = args.len() > 3;
                let range = span(zset.len(), number(&args[1]), number(&args[2]));
                Frame::Array(
                    zset[range]
                        .iter()
                        .flat_map(|(m, s)| {
                            let mut items = vec![bulk(m.clone())];
                            if with_scores {
                                items.push(bulk(s.to_string()));
                            }
                            items
                        })
                        .collect(),
                )
            }
            Some(_) => wrong_type(),
            None => Frame::Array(vec![]),
        },
        "ZRANK" => match db.get(&args[0]) {
            Some(Stored::ZSet(zset)) => zset
                .iter()
                .position(|(m, _)| *m == args[1])
                .map(|rank| Frame::Integer(rank as i64))
                .unwrap_or(Frame::Null),
            Some(_) => wrong_type(),
            None => Frame::Null,
        },
        "ZREM" => match db.get_mut(&args[0]) {
            Some(Stored::ZSet(zset)) => {
                let before = zset.len();
                zset.retain(|(m, _)| !args[1..].contains(m));
                Frame::Integer((before - zset.len()) as i64)
            }
            Some(_) => wrong_type(),
            None => Frame::Integer(0),
        },
        "JSON.SET" => {
            db.insert(args[0].clone(), Stored::Json(args[1].clone()));
            ok()
        }
        "JSON.GET" => match db.get(&args[0]) {
            Some(Stored::Json(text)) => bulk(text.clone()),
            Some(_) => wrong_type(),
            None => Frame::Null,
        },
        "JSON.ARRAPPEND" => match db.get_mut(&args[0]) {
            Some(Stored::Json(text)) => {
                let mut value: serde_json::Value = serde_json::from_str(text).unwrap();
                match value.get_mut(field(&args[1])).and_then(|v| v.as_array_mut()) {
                    Some(array) => {
                        array.push(serde_json::from_str(&args[2]).unwrap());
                        let len = array.len();
                        *text = value.to_string();
                        Frame::Integer(len as i64)
                    }
                    None => Frame::Error("ERR path is not an array".to_string()),
                }
            }
            Some(_) => wrong_type(),
            None => Frame::Error("ERR could not perform this operation on a key that doesn't exist".to_string()),
        },
        "VSET" => {
            let components = args[1..].iter().map(|c| c.parse().unwrap()).collect();
            db.insert(args[0].clone(), Stored::Vector(components));
            ok()
        }
        "VGET" => match db.get(&args[0]) {
            Some(Stored::Vector(v)) => Frame::Array(v.iter().map(|c| bulk(c.to_string())).collect()),
            Some(_) => wrong_type(),
            None => Frame::Null,
        },
        "VSEARCH" => {
            let k = number(&args[0]) as usize;
            let query = match args[2].strip_prefix("QUERYKEY:") {
                Some(key) => match vectors(db, key) {
                    Some(v) => v,
                    None => return Frame::Error("ERR query key not found".to_string()),
                },
                None => args[2..].iter().map(|c| c.parse().unwrap()).collect(),
            };
            let mut found: Vec<(f64, String)> = db
                .iter()
                .filter_map(|(key, stored)| match stored {
                    Stored::Vector(v) => {
                        let distance: f64 = v.iter().zip(&query).map(|(a, b)| (a - b) * (a - b)).sum();
                        Some((distance, key.clone()))
                    }
                    _ => None,
                })
                .collect();
            found.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            Frame::Array(found.into_iter().take(k).map(|(_, key)| bulk(key)).collect())
        }
        "VDOT" => match (vectors(db, &args[0]), vectors(db, &args[1])) {
            (Some(a), Some(b)) => bulk(a.iter().zip(&b).map(|(x, y)| x * y).sum::<f64>().to_string()),
            _ => Frame::Error("ERR vector not found".to_string()),
        },
        "VADDV" | "VSUBV" => match (vectors(db, &args[1]), vectors(db, &args[2])) {
            (Some(a), Some(b)) => {
                let sign = if verb == "VADDV" { 1.0 } else { -1.0 };
                let result = a.iter().zip(&b).map(|(x, y)| x + sign * y).collect();
                db.insert(args[0].clone(), Stored::Vector(result));
                ok()
            }
            _ => Frame::Error("ERR vector not found".to_string()),
        },
        "DOCSET" => {
            db.insert(args[0].clone(), Stored::Doc(args[1].clone()));
            ok()
        }
        "DOCGET" => match db.get(&args[0]) {
            Some(Stored::Doc(text)) => bulk(text.clone()),
            Some(_) => wrong_type(),
            None => Frame::Null,
        },
        "DOCUPDATE" | "DOCARRPUSH" | "DOCARRPOP" => match db.get_mut(&args[0]) {
            Some(Stored::Doc(text)) => {
                let mut doc: serde_json::Value = serde_json::from_str(text).unwrap();
                let name = field(&args[1]).to_string();
                let reply = match verb.as_str() {
                    "DOCUPDATE" => {
                        doc[name.as_str()] = json_or_string(&args[2]);
                        ok()
                    }
                    "DOCARRPUSH" => match doc.get_mut(&name).and_then(|v| v.as_array_mut()) {
                        Some(array) => {
                            array.push(json_or_string(&args[2]));
                            ok()
                        }
                        None => return Frame::Error("ERR path is not an array".to_string()),
                    },
                    _ => match doc.get_mut(&name).and_then(|v| v.as_array_mut()) {
                        Some(array) => array.pop().map(|v| bulk(v.to_string())).unwrap_or(Frame::Null),
                        None => return Frame::Error("ERR path is not an array".to_string()),
                    },
                };
                *text = doc.to_string();
                reply
            }
            Some(_) => wrong_type(),
            None => Frame::Error("ERR no such document".to_string()),
        },
        "DOCFIND" => {
            let (name, op, wanted) = (&args[0], &args[1], json_or_string(&args[2]));
            let matches = documents(db)
                .into_iter()
                .filter(|doc| match (doc.get(name), op.as_str()) {
                    (Some(value), "=") => *value == wanted,
                    (Some(value), ">") => value.as_f64() > wanted.as_f64(),
                    (Some(value), "<") => value.as_f64() < wanted.as_f64(),
                    _ => false,
                })
                .map(|doc| bulk(doc.to_string()))
                .collect();
            Frame::Array(matches)
        }
        "DOCCOUNT" => Frame::Integer(
            documents(db)
                .iter()
                .filter(|doc| doc.get(&args[0]).is_some())
                .count() as i64,
        ),
        "DOCSUM" | "DOCAVG" => {
            let values: Vec<f64> = documents(db)
                .iter()
                .filter_map(|doc| doc.get(&args[0]).and_then(|v| v.as_f64()))
                .collect();
            let sum: f64 = values.iter().sum();
            if verb == "DOCSUM" {
                bulk(sum.to_string())
            } else if values.is_empty() {
                bulk("0")
            } else {
                bulk((sum / values.len() as f64).to_string())
            }
        }
        _ => Frame::Error(format!("ERR unknown command '{}'", command[0])),
    }
}
