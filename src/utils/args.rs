//! Argv lexing into the resolver's input contract.
//!
//! This is the thin adapter in front of the command resolver: bare tokens
//! become positionals, `--flag value` / `--flag=value` / `-f value` become
//! string-valued flags, and a flag with no value becomes `true`. Flag
//! values are kept as strings; interpretation belongs to the action that
//! declared the option.

use serde_json::Value;

use crate::command::RawArgs;

pub fn parse<I>(args: I) -> RawArgs
where
    I: IntoIterator<Item = String>,
{
    let mut raw = RawArgs::default();
    let mut args = args.into_iter().peekable();

    while let Some(token) = args.next() {
        let name = token
            .strip_prefix("--")
            .or_else(|| token.strip_prefix('-'))
            .map(str::to_string);

        let Some(name) = name else {
            raw.positional.push(token);
            continue;
        };
        if name.is_empty() {
            continue;
        }

        if let Some((key, value)) = name.split_once('=') {
            raw.flags
                .insert(key.to_string(), Value::String(value.to_string()));
            continue;
        }

        // A following non-flag token is this flag's value.
        match args.peek() {
            Some(next) if !next.starts_with('-') => {
                let value = args.next().expect("peeked token exists");
                raw.flags.insert(name, Value::String(value));
            }
            _ => {
                raw.flags.insert(name, Value::Bool(true));
            }
        }
    }

    raw
}
