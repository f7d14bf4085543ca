use crate::parse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Option<String>,
}

/// Splits a list/table fragment into one- or two-token entries. Fails with
/// the offending key on a duplicate or an over-long command.
pub fn parse_entries(fragment: &str) -> Result<Vec<Entry>, String> {
    let script = parse(fragment);
    let mut entries: Vec<Entry> = Vec::with_capacity(script.len());
    for command in &script.commands {
        let entry = match command.args.as_slice() {
            [key] => Entry {
                key: key.value.clone(),
                value: None,
            },
            [key, value] => Entry {
                key: key.value.clone(),
                value: Some(value.value.clone()),
            },
            args => {
                let key = args.first().map(|arg| arg.value.as_str()).unwrap_or("");
                return Err(format!(
                    "Entry \"{}\" has {} tokens, expected 1 or 2",
                    key,
                    args.len()
                ));
            }
        };
        if entries.iter().any(|existing| existing.key == entry.key) {
            return Err(format!("Duplicate key \"{}\"", entry.key));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Flattens EXPAND text into the arguments of every command, in order.
pub fn expand_values(text: &str) -> Vec<String> {
    parse(text)
        .commands
        .into_iter()
        .flat_map(|command| command.args.into_iter().map(|arg| arg.value))
        .collect()
}
