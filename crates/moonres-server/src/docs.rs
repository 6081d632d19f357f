//! COMMAND introspection registries.
//!
//! Metadata (arity, flags, key positions) and documentation (summary,
//! complexity, group) for every registered command. Arity includes the
//! command name itself; a negative arity means "at least that many".

use moonres_protocol::Frame;

pub struct CommandMeta {
    pub name: &'static str,
    pub arity: i64,
    pub flags: &'static [&'static str],
    /// 1-based index of the first key.
    pub first_key: i64,
    /// 1-based index of the last key; -1 means "through the end".
    pub last_key: i64,
    /// Step count for finding keys.
    pub step: i64,
}

pub const REGISTRY: &[CommandMeta] = &[
    CommandMeta { name: "ping", arity: -1, flags: &["fast", "stale"], first_key: 0, last_key: 0, step: 0 },
    CommandMeta { name: "get", arity: 2, flags: &["readonly", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "set", arity: -3, flags: &["write", "denyoom"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "del", arity: -2, flags: &["write"], first_key: 1, last_key: -1, step: 1 },
    CommandMeta { name: "ttl", arity: 2, flags: &["readonly", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "pttl", arity: 2, flags: &["readonly", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "persist", arity: 2, flags: &["write", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "command", arity: -1, flags: &["random", "loading", "stale"], first_key: 0, last_key: 0, step: 0 },
    CommandMeta { name: "save", arity: 1, flags: &["admin", "noscript"], first_key: 0, last_key: 0, step: 0 },
    CommandMeta { name: "bgsave", arity: 1, flags: &["admin", "noscript"], first_key: 0, last_key: 0, step: 0 },
    CommandMeta { name: "hset", arity: -4, flags: &["write", "denyoom", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "hget", arity: 3, flags: &["readonly", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "hgetall", arity: 2, flags: &["readonly"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "hdel", arity: -3, flags: &["write", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "hexists", arity: 3, flags: &["readonly", "fast"], first_key: 1, last_key: 1, step: 1 },
    CommandMeta { name: "hlen", arity: 2, flags: &["readonly", "fast"], first_key: 1, last_key: 1, step: 1 },
];

pub struct CommandDoc {
    pub name: &'static str,
    pub summary: &'static str,
    pub complexity: &'static str,
    pub group: &'static str,
    pub since: &'static str,
}

pub const DOCS: &[CommandDoc] = &[
    CommandDoc { name: "PING", summary: "Ping the server.", complexity: "O(1)", group: "connection", since: "1.0.0" },
    CommandDoc { name: "GET", summary: "Get the value of a key.", complexity: "O(1)", group: "string", since: "1.0.0" },
    CommandDoc { name: "SET", summary: "Set the string value of a key.", complexity: "O(1)", group: "string", since: "1.0.0" },
    CommandDoc { name: "DEL", summary: "Delete a key.", complexity: "O(N) where N is the number of keys that will be removed.", group: "generic", since: "1.0.0" },
    CommandDoc { name: "TTL", summary: "Get the time to live for a key in seconds.", complexity: "O(1)", group: "generic", since: "1.0.0" },
    CommandDoc { name: "PTTL", summary: "Get the time to live for a key in milliseconds.", complexity: "O(1)", group: "generic", since: "1.0.0" },
    CommandDoc { name: "PERSIST", summary: "Remove the expiration from a key.", complexity: "O(1)", group: "generic", since: "1.0.0" },
    CommandDoc { name: "COMMAND", summary: "Get array of command details.", complexity: "O(N) where N is the number of commands to look up.", group: "server", since: "1.0.0" },
    CommandDoc { name: "SAVE", summary: "Synchronously save the dataset to disk.", complexity: "O(N) where N is the total number of keys.", group: "server", since: "1.0.0" },
    CommandDoc { name: "BGSAVE", summary: "Asynchronously save the dataset to disk.", complexity: "O(1) to start the save.", group: "server", since: "1.0.0" },
    CommandDoc { name: "HSET", summary: "Set the string value of a hash field.", complexity: "O(N) where N is the number of fields being set.", group: "hash", since: "1.0.0" },
    CommandDoc { name: "HGET", summary: "Get the value of a hash field.", complexity: "O(1)", group: "hash", since: "1.0.0" },
    CommandDoc { name: "HGETALL", summary: "Get all the fields and values in a hash.", complexity: "O(N) where N is the size of the hash.", group: "hash", since: "1.0.0" },
    CommandDoc { name: "HDEL", summary: "Delete one or more hash fields.", complexity: "O(N) where N is the number of fields to be removed.", group: "hash", since: "1.0.0" },
    CommandDoc { name: "HEXISTS", summary: "Determine if a hash field exists.", complexity: "O(1)", group: "hash", since: "1.0.0" },
    CommandDoc { name: "HLEN", summary: "Get the number of fields in a hash.", complexity: "O(1)", group: "hash", since: "1.0.0" },
];

fn flags_frame(flags: &[&str]) -> Frame {
    Frame::Array(flags.iter().map(|f| Frame::Simple((*f).into())).collect())
}

fn meta_frame(meta: &CommandMeta) -> Frame {
    Frame::Array(vec![
        Frame::bulk(meta.name),
        Frame::Integer(meta.arity),
        flags_frame(meta.flags),
        Frame::Integer(meta.first_key),
        Frame::Integer(meta.last_key),
        Frame::Integer(meta.step),
    ])
}

/// Reply for bare `COMMAND`: one metadata array per command.
pub fn all_commands_frame() -> Frame {
    Frame::Array(REGISTRY.iter().map(meta_frame).collect())
}

/// Reply for `COMMAND COUNT`.
pub fn command_count() -> i64 {
    REGISTRY.len() as i64
}

/// Reply for `COMMAND DOCS [name ...]`.
///
/// Flat array: name, properties, name, properties, ... Unknown names
/// are silently skipped; no names means every documented command.
pub fn docs_frame(targets: &[String]) -> Frame {
    let selected: Vec<&CommandDoc> = if targets.is_empty() {
        DOCS.iter().collect()
    } else {
        targets
            .iter()
            .filter_map(|t| {
                let upper = t.to_ascii_uppercase();
                DOCS.iter().find(|d| d.name == upper)
            })
            .collect()
    };

    let mut result = Vec::with_capacity(selected.len() * 2);
    for doc in selected {
        result.push(Frame::bulk(doc.name));
        result.push(Frame::Array(vec![
            Frame::bulk("summary"),
            Frame::bulk(doc.summary),
            Frame::bulk("since"),
            Frame::bulk(doc.since),
            Frame::bulk("group"),
            Frame::bulk(doc.group),
            Frame::bulk("complexity"),
            Frame::bulk(doc.complexity),
        ]));
    }
    Frame::Array(result)
}
