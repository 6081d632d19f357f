//! Command handlers.
//!
//! Each handler validates its own arity and options, performs the
//! storage operation, and builds the reply frame. Handlers are pure
//! with respect to the engine: they see only the parsed arguments and
//! the store. SAVE and BGSAVE live in the engine because they capture
//! the snapshot handle.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use moonres_core::{Expiry, SetOptions, ShardedStore, StoreError};
use moonres_protocol::Frame;

use crate::docs;

/// What every handler gets: the argument frames (command name already
/// stripped), the store, and the peer that sent the command.
pub struct Context<'a> {
    pub args: &'a [Frame],
    pub store: &'a ShardedStore,
    pub peer: Option<SocketAddr>,
}

/// Standard arity-mismatch error.
pub fn wrong_arity(cmd: &str) -> Frame {
    Frame::error(format!("wrong number of arguments for {cmd} command"))
}

fn invalid_argument() -> Frame {
    Frame::error("ERR invalid argument")
}

/// Extracts raw bytes from a Bulk or Simple argument frame.
fn arg_bytes(frame: &Frame) -> Option<Bytes> {
    frame.as_bytes()
}

fn wrongtype_reply(err: StoreError) -> Frame {
    Frame::error(err.to_string())
}

/// PING: no args replies `+PONG`, one arg echoes it as a bulk.
pub fn ping(ctx: &Context) -> Frame {
    if let Some(peer) = ctx.peer {
        tracing::debug!(%peer, "ping");
    }
    match ctx.args.len() {
        0 => Frame::Simple("PONG".into()),
        1 => match arg_bytes(&ctx.args[0]) {
            Some(msg) => Frame::Bulk(msg),
            None => invalid_argument(),
        },
        _ => wrong_arity("PING"),
    }
}

/// GET key: bulk value, nil bulk when absent, WRONGTYPE otherwise.
pub fn get(ctx: &Context) -> Frame {
    if ctx.args.len() != 1 {
        return wrong_arity("GET");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };

    match ctx.store.get(&key) {
        Ok(Some(value)) => Frame::Bulk(value),
        Ok(None) => Frame::NullBulk,
        Err(e) => wrongtype_reply(e),
    }
}

/// SET key value [NX|XX] [EX s|PX ms|EXAT ts|PXAT ts|KEEPTTL]
///
/// Options are processed left to right, case-insensitively. At most
/// one TTL source may appear; NX and XX are mutually exclusive.
/// Replies `+OK`, or nil bulk when an NX/XX gate blocked the write.
pub fn set(ctx: &Context) -> Frame {
    if ctx.args.len() < 2 {
        return wrong_arity("SET");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };
    let Some(value) = arg_bytes(&ctx.args[1]) else {
        return invalid_argument();
    };

    let mut opts = SetOptions::default();
    let mut has_ttl = false;

    let mut i = 2;
    while i < ctx.args.len() {
        let Some(raw) = arg_bytes(&ctx.args[i]) else {
            return invalid_argument();
        };
        let token = String::from_utf8_lossy(&raw).to_ascii_uppercase();

        match token.as_str() {
            "NX" => {
                if opts.xx {
                    return Frame::error("NX cannot use with XX");
                }
                opts.nx = true;
            }
            "XX" => {
                if opts.nx {
                    return Frame::error("XX cannot use with NX");
                }
                opts.xx = true;
            }
            "KEEPTTL" => {
                if has_ttl {
                    return Frame::error("TTL already specified");
                }
                opts.keep_ttl = true;
                has_ttl = true;
            }
            "EX" | "PX" | "EXAT" | "PXAT" => {
                if has_ttl {
                    return Frame::error("TTL already specified");
                }
                let Some(raw_value) = ctx.args.get(i + 1).and_then(arg_bytes) else {
                    return Frame::error("syntax error");
                };
                let Some(amount) = std::str::from_utf8(&raw_value)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                else {
                    return Frame::error("value TTL is not integer or out of range");
                };

                opts.ttl = match token.as_str() {
                    "EX" => {
                        if amount <= 0 {
                            return Frame::error("invalid expire time in 'SET' command");
                        }
                        Some(Duration::from_secs(amount as u64))
                    }
                    "PX" => {
                        if amount <= 0 {
                            return Frame::error("invalid expire time in 'SET' command");
                        }
                        Some(Duration::from_millis(amount as u64))
                    }
                    // absolute timestamps may already be in the past: the
                    // key is still written, with the minimum positive
                    // deadline, so the write is observable but expires on
                    // the next access
                    "EXAT" => Some(ttl_until(amount.saturating_mul(1_000_000_000))),
                    _ => Some(ttl_until(amount.saturating_mul(1_000_000))),
                };
                has_ttl = true;
                i += 1;
            }
            other => {
                return Frame::error(format!("syntax error with command: {other}"));
            }
        }
        i += 1;
    }

    if ctx.store.set(key, value, &opts) {
        Frame::Simple("OK".into())
    } else {
        Frame::NullBulk
    }
}

/// Remaining TTL until an absolute wall-clock deadline in nanoseconds,
/// clamped to the minimum positive duration when already past.
fn ttl_until(deadline_nanos: i64) -> Duration {
    let remaining = deadline_nanos.saturating_sub(moonres_core::time::now_nanos());
    if remaining <= 0 {
        Duration::from_nanos(1)
    } else {
        Duration::from_nanos(remaining as u64)
    }
}

/// DEL key [key ...]: integer count of keys actually removed.
pub fn del(ctx: &Context) -> Frame {
    if ctx.args.is_empty() {
        return wrong_arity("DEL");
    }

    let mut removed = 0i64;
    for arg in ctx.args {
        let Some(key) = arg_bytes(arg) else {
            return invalid_argument();
        };
        if ctx.store.delete(&key) {
            removed += 1;
        }
    }
    Frame::Integer(removed)
}

/// TTL key: seconds remaining; -1 without expiration; -2 when absent.
pub fn ttl(ctx: &Context) -> Frame {
    if ctx.args.len() != 1 {
        return wrong_arity("TTL");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };

    match ctx.store.expiry(&key) {
        Expiry::NotFound => Frame::Integer(-2),
        Expiry::NoTimeout => Frame::Integer(-1),
        // round up so TTL right after SET ... EX n reports n
        Expiry::Active(nanos) => {
            Frame::Integer(nanos.saturating_add(999_999_999) / 1_000_000_000)
        }
    }
}

/// PTTL key: like TTL but in milliseconds.
pub fn pttl(ctx: &Context) -> Frame {
    if ctx.args.len() != 1 {
        return wrong_arity("PTTL");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };

    match ctx.store.expiry(&key) {
        Expiry::NotFound => Frame::Integer(-2),
        Expiry::NoTimeout => Frame::Integer(-1),
        Expiry::Active(nanos) => Frame::Integer(nanos.saturating_add(999_999) / 1_000_000),
    }
}

/// PERSIST key: 1 if a deadline was removed, else 0.
pub fn persist(ctx: &Context) -> Frame {
    if ctx.args.len() != 1 {
        return wrong_arity("PERSIST");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };

    Frame::Integer(ctx.store.persist(&key))
}

/// COMMAND [COUNT | DOCS [name ...]]: introspection.
pub fn command(ctx: &Context) -> Frame {
    if ctx.args.is_empty() {
        return docs::all_commands_frame();
    }

    let Some(sub) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };
    match String::from_utf8_lossy(&sub).to_ascii_uppercase().as_str() {
        "COUNT" => Frame::Integer(docs::command_count()),
        "DOCS" => {
            let targets: Vec<String> = ctx.args[1..]
                .iter()
                .filter_map(arg_bytes)
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .collect();
            docs::docs_frame(&targets)
        }
        _ => wrong_arity("COMMAND"),
    }
}

// ---------------------------------------------------------------------------
// hash commands
// ---------------------------------------------------------------------------

/// HSET key field value [field value ...]: count of new fields.
pub fn hset(ctx: &Context) -> Frame {
    if ctx.args.len() < 3 || ctx.args.len() % 2 == 0 {
        return wrong_arity("HSET");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };

    let mut fields = Vec::with_capacity((ctx.args.len() - 1) / 2);
    let mut i = 1;
    while i < ctx.args.len() {
        let (Some(field), Some(value)) =
            (arg_bytes(&ctx.args[i]), arg_bytes(&ctx.args[i + 1]))
        else {
            return invalid_argument();
        };
        fields.push((field, value));
        i += 2;
    }

    match ctx.store.hset(key, fields) {
        Ok(created) => Frame::Integer(created),
        Err(e) => wrongtype_reply(e),
    }
}

/// HGET key field: bulk value or nil bulk.
pub fn hget(ctx: &Context) -> Frame {
    if ctx.args.len() != 2 {
        return wrong_arity("HGET");
    }
    let (Some(key), Some(field)) = (arg_bytes(&ctx.args[0]), arg_bytes(&ctx.args[1])) else {
        return invalid_argument();
    };

    match ctx.store.hget(&key, &field) {
        Ok(Some(value)) => Frame::Bulk(value),
        Ok(None) => Frame::NullBulk,
        Err(e) => wrongtype_reply(e),
    }
}

/// HGETALL key: flat array of field, value, field, value, ...
pub fn hgetall(ctx: &Context) -> Frame {
    if ctx.args.len() != 1 {
        return wrong_arity("HGETALL");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };

    match ctx.store.hget_all(&key) {
        Ok(pairs) => {
            let mut items = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                items.push(Frame::Bulk(field));
                items.push(Frame::Bulk(value));
            }
            Frame::Array(items)
        }
        Err(e) => wrongtype_reply(e),
    }
}

/// HDEL key field [field ...]: count of removed fields.
pub fn hdel(ctx: &Context) -> Frame {
    if ctx.args.len() < 2 {
        return wrong_arity("HDEL");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };
    let fields: Vec<Bytes> = match ctx.args[1..].iter().map(arg_bytes).collect::<Option<_>>() {
        Some(f) => f,
        None => return invalid_argument(),
    };

    match ctx.store.hdel(&key, &fields) {
        Ok(removed) => Frame::Integer(removed),
        Err(e) => wrongtype_reply(e),
    }
}

/// HEXISTS key field: 1 or 0.
pub fn hexists(ctx: &Context) -> Frame {
    if ctx.args.len() != 2 {
        return wrong_arity("HEXISTS");
    }
    let (Some(key), Some(field)) = (arg_bytes(&ctx.args[0]), arg_bytes(&ctx.args[1])) else {
        return invalid_argument();
    };

    match ctx.store.hexists(&key, &field) {
        Ok(n) => Frame::Integer(n),
        Err(e) => wrongtype_reply(e),
    }
}

/// HLEN key: number of fields.
pub fn hlen(ctx: &Context) -> Frame {
    if ctx.args.len() != 1 {
        return wrong_arity("HLEN");
    }
    let Some(key) = arg_bytes(&ctx.args[0]) else {
        return invalid_argument();
    };

    match ctx.store.hlen(&key) {
        Ok(n) => Frame::Integer(n),
        Err(e) => wrongtype_reply(e),
    }
}
