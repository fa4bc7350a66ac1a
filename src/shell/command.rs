use tracing::warn;

use crate::error::LocalsError;
use crate::host::HostStore;
use crate::mirror::{KeyValueMirror, Resolved};
use crate::shell::reply::Reply;

/// Shell command types
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// GET [key...]
    Get(Vec<String>),
    /// SET key text
    Set { key: String, value: String },
    /// SETJSON key json
    SetJson { key: String, json: String },
    /// GETALL
    GetAll,
    /// REMOVE key...
    Remove(Vec<String>),
    /// NICK
    Nick,
    /// QUIT
    Quit,
    /// Unknown or malformed command
    Unknown(String),
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (line, ""),
        };
        let args: Vec<String> = rest.split_whitespace().map(str::to_string).collect();

        let cmd = match name.to_uppercase().as_str() {
            "GET" => Command::Get(args),
            "GETALL" => Command::GetAll,
            "NICK" => Command::Nick,
            "QUIT" | "EXIT" => Command::Quit,
            "REMOVE" | "DEL" if args.is_empty() => {
                Command::Unknown("ERR wrong number of arguments for 'remove' command".to_string())
            }
            "REMOVE" | "DEL" => Command::Remove(args),
            "SET" => match Self::key_and_payload(rest) {
                Some((key, value)) => Command::Set { key, value },
                None => Command::Unknown("ERR wrong number of arguments for 'set' command".to_string()),
            },
            "SETJSON" => match Self::key_and_payload(rest) {
                Some((key, json)) => Command::SetJson { key, json },
                None => {
                    Command::Unknown("ERR wrong number of arguments for 'setjson' command".to_string())
                }
            },
            other => Command::Unknown(format!("ERR unknown command '{}'", other)),
        };
        Some(cmd)
    }

    // Payload is the remainder of the line and may contain spaces.
    fn key_and_payload(rest: &str) -> Option<(String, String)> {
        let (key, payload) = rest.split_once(char::is_whitespace)?;
        Some((key.to_string(), payload.trim_start().to_string()))
    }

    /// Execute the command against the mirror and return the reply
    pub fn execute<H: HostStore>(&self, mirror: &mut KeyValueMirror<H>) -> Reply {
        match self {
            Command::Get(keys) => match mirror.get_many(keys) {
                Ok(lookup) => {
                    if !lookup.is_complete() {
                        warn!(faults = ?lookup.faults(), "GET skipped inconsistent keys");
                    }
                    match lookup.into_resolved() {
                        Resolved::One(value) => Reply::Value(value),
                        Resolved::Many(values) => Reply::Array(values),
                    }
                }
                Err(LocalsError::NoKey) => Reply::Nil,
                Err(e) => Reply::error(e),
            },
            Command::Set { key, value } => match mirror.set(key.as_str(), value.as_str()) {
                Ok(_) => Reply::Ok,
                Err(e) => Reply::error(e),
            },
            Command::SetJson { key, json } => {
                let parsed = match serde_json::from_str(json) {
                    Ok(parsed) => parsed,
                    Err(e) => return Reply::error(LocalsError::Json(e)),
                };
                match mirror.set_json(key.as_str(), parsed) {
                    Ok(_) => Reply::Ok,
                    Err(e) => Reply::error(e),
                }
            }
            Command::GetAll => Reply::map(mirror.get_all()),
            Command::Remove(keys) => match mirror.remove(keys) {
                Ok(remaining) => Reply::map(remaining),
                Err(e) => Reply::error(e),
            },
            Command::Nick => match mirror.nick() {
                Some(nick) => Reply::Value(nick.into()),
                None => Reply::Nil,
            },
            Command::Quit => Reply::Ok,
            Command::Unknown(msg) => Reply::Error(msg.clone()),
        }
    }
}
